//! Read-side helpers consumed by the presentation layer.

use crate::GuestRecord;

/// Display cap for the recent-guests list.
pub const RECENT_LIMIT: usize = 10;

/// Aggregate counts shown in the stats header.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Stats {
    pub total_guests: usize,
    pub total_companions: u64,
}

pub fn stats(guests: &[GuestRecord]) -> Stats {
    Stats {
        total_guests: guests.len(),
        total_companions: guests.iter().map(|g| u64::from(g.companions)).sum(),
    }
}

/// The `limit` most recently created records, newest first.
///
/// Collection order at rest is insertion order, which is not display order;
/// always re-sort by the creation instant.
pub fn recent(guests: &[GuestRecord], limit: usize) -> Vec<GuestRecord> {
    let mut sorted = guests.to_vec();
    sorted.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    sorted.truncate(limit);
    sorted
}

#[cfg(test)]
mod tests {
    use std::time::{Duration, UNIX_EPOCH};

    use super::*;
    use crate::{GuestId, GuestName};

    fn guest(id: &str, companions: u32, at_secs: u64) -> GuestRecord {
        GuestRecord {
            id: GuestId::new(id).unwrap(),
            name: GuestName::new("Guest").unwrap(),
            phone: None,
            companions,
            created_at: UNIX_EPOCH + Duration::from_secs(at_secs),
            entry_time: String::new(),
        }
    }

    #[test]
    fn stats_counts_guests_and_companions() {
        let guests = vec![guest("a", 2, 1), guest("b", 0, 2), guest("c", 3, 3)];
        let s = stats(&guests);
        assert_eq!(s.total_guests, 3);
        assert_eq!(s.total_companions, 5);
    }

    #[test]
    fn recent_caps_and_sorts_descending() {
        // Insert out of order on purpose
        let guests: Vec<_> = [5u64, 12, 1, 9, 3, 14, 7, 2, 11, 8, 6, 13]
            .iter()
            .enumerate()
            .map(|(i, &t)| guest(&format!("g{i}"), 0, t))
            .collect();
        let shown = recent(&guests, RECENT_LIMIT);
        assert_eq!(shown.len(), RECENT_LIMIT);
        for pair in shown.windows(2) {
            assert!(pair[0].created_at > pair[1].created_at);
        }
        // The two oldest entries fell off
        assert!(shown.iter().all(|g| {
            let secs = g
                .created_at
                .duration_since(UNIX_EPOCH)
                .unwrap()
                .as_secs();
            secs > 2
        }));
    }

    #[test]
    fn recent_handles_short_lists() {
        let guests = vec![guest("a", 0, 1)];
        assert_eq!(recent(&guests, RECENT_LIMIT).len(), 1);
    }
}
