//! CSV rendering for the export artifact.
//!
//! Hand-rolled on purpose: the format is fixed (header plus one row per
//! guest, selective quoting) and pulling a writer crate in would cost more
//! than these few lines.

use crate::GuestRecord;

/// Header row of the export file.
pub const HEADER: &str = "Nombre,Teléfono,Acompañantes,Fecha y Hora";

/// Render the guest list as CSV, one row per guest in the given order.
///
/// Name, phone and entry time are double-quoted; the companion count is
/// bare. No trailing newline.
pub fn render(guests: &[GuestRecord]) -> String {
    let mut out = String::with_capacity(HEADER.len() + guests.len() * 48);
    out.push_str(HEADER);
    for guest in guests {
        out.push('\n');
        out.push_str(&quoted(guest.name.as_str()));
        out.push(',');
        out.push_str(&quoted(guest.phone.as_deref().unwrap_or("")));
        out.push(',');
        out.push_str(&guest.companions.to_string());
        out.push(',');
        out.push_str(&quoted(&guest.entry_time));
    }
    out
}

fn quoted(field: &str) -> String {
    format!("\"{}\"", field.replace('"', "\"\""))
}

/// Export filename carrying the current date, e.g.
/// `registro_fiesta_2024-03-08.csv`.
pub fn filename(date_ymd: &str) -> String {
    format!("registro_fiesta_{date_ymd}.csv")
}

#[cfg(test)]
mod tests {
    use std::time::{Duration, UNIX_EPOCH};

    use super::*;
    use crate::{GuestId, GuestName};

    fn guest(name: &str, phone: Option<&str>, companions: u32, entry: &str) -> GuestRecord {
        GuestRecord {
            id: GuestId::new("g1").unwrap(),
            name: GuestName::new(name).unwrap(),
            phone: phone.map(str::to_string),
            companions,
            created_at: UNIX_EPOCH + Duration::from_secs(1),
            entry_time: entry.to_string(),
        }
    }

    #[test]
    fn renders_known_vector() {
        let guests = vec![guest("Ana", Some("555"), 2, "1/1/24, 10:00")];
        assert_eq!(
            render(&guests),
            "Nombre,Teléfono,Acompañantes,Fecha y Hora\n\"Ana\",\"555\",2,\"1/1/24, 10:00\""
        );
    }

    #[test]
    fn missing_phone_renders_empty_quoted_field() {
        let guests = vec![guest("Luis", None, 0, "2/1/24, 21:30")];
        let out = render(&guests);
        assert!(out.ends_with("\"Luis\",\"\",0,\"2/1/24, 21:30\""));
    }

    #[test]
    fn header_only_for_empty_list() {
        assert_eq!(render(&[]), HEADER);
    }

    #[test]
    fn doubles_embedded_quotes() {
        let guests = vec![guest("An\"a", Some("555"), 1, "1/1/24, 10:00")];
        assert!(render(&guests).contains("\"An\"\"a\""));
    }

    #[test]
    fn filename_embeds_date() {
        assert_eq!(filename("2024-03-08"), "registro_fiesta_2024-03-08.csv");
    }
}
