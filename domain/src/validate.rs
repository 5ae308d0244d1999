//! Lightweight input normalization helpers. Keep logic minimal and deterministic.

/// Parse a companion count from raw form input.
///
/// Absent, blank or non-numeric values count as zero; negatives clamp to
/// zero. The count can never go negative downstream.
pub fn parse_companions(raw: Option<&str>) -> u32 {
    let Some(s) = raw else { return 0 };
    match s.trim().parse::<i64>() {
        Ok(n) if n <= 0 => 0,
        Ok(n) => u32::try_from(n).unwrap_or(u32::MAX),
        Err(_) => 0,
    }
}

/// Normalize a phone field: trimmed, empty becomes `None`. No format checks.
pub fn normalize_phone(raw: Option<&str>) -> Option<String> {
    let trimmed = raw?.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn companions_defaults_to_zero() {
        assert_eq!(parse_companions(None), 0);
        assert_eq!(parse_companions(Some("")), 0);
        assert_eq!(parse_companions(Some("abc")), 0);
        assert_eq!(parse_companions(Some("2.5")), 0);
    }

    #[test]
    fn companions_never_negative() {
        assert_eq!(parse_companions(Some("-3")), 0);
        assert_eq!(parse_companions(Some("0")), 0);
    }

    #[test]
    fn companions_parses_plain_integers() {
        assert_eq!(parse_companions(Some("2")), 2);
        assert_eq!(parse_companions(Some(" 7 ")), 7);
    }

    #[test]
    fn phone_normalization() {
        assert_eq!(normalize_phone(None), None);
        assert_eq!(normalize_phone(Some("   ")), None);
        assert_eq!(normalize_phone(Some(" 555 123 ")), Some("555 123".into()));
    }
}
