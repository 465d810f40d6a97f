//! Wall-clock time normalization.

use chrono::NaiveTime;

use crate::SchedulerError;

/// Accepted input formats, tried in order. First match wins.
const FORMATS: &[&str] = &["%I %M %p", "%I:%M %p", "%H:%M", "%H%M"];

/// Parse a human time-of-day string in one of the accepted formats.
///
/// Accepts `"6 40 pm"`, `"6:40 PM"`, `"18:40"` and `"1840"`.
pub fn parse_time(input: &str) -> Result<NaiveTime, SchedulerError> {
    let cleaned = input.trim().to_lowercase().replace('.', "");
    for format in FORMATS {
        if let Ok(time) = NaiveTime::parse_from_str(&cleaned, format) {
            return Ok(time);
        }
    }
    Err(SchedulerError::InvalidTimeFormat(input.to_string()))
}

/// Normalize a human time-of-day string to canonical 24-hour `HH:MM`.
pub fn normalize_time(input: &str) -> Result<String, SchedulerError> {
    Ok(parse_time(input)?.format("%H:%M").to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_equivalent_formats_normalize_identically() {
        for input in ["6 40 pm", "6:40 PM", "6:40 pm", "18:40", "1840"] {
            assert_eq!(normalize_time(input).unwrap(), "18:40", "input: {input}");
        }
    }

    #[test]
    fn test_morning_and_midnight() {
        assert_eq!(normalize_time("12:00 am").unwrap(), "00:00");
        assert_eq!(normalize_time("12:00 pm").unwrap(), "12:00");
        assert_eq!(normalize_time("7 05 am").unwrap(), "07:05");
        assert_eq!(normalize_time("0705").unwrap(), "07:05");
    }

    #[test]
    fn test_dotted_meridiem_and_whitespace() {
        assert_eq!(normalize_time("  6:40 p.m. ").unwrap(), "18:40");
    }

    #[test]
    fn test_invalid_inputs() {
        for input in ["25:99", "not-a-time", "", "13:00 pm junk"] {
            let err = normalize_time(input).unwrap_err();
            assert!(
                matches!(err, SchedulerError::InvalidTimeFormat(_)),
                "input: {input}"
            );
        }
    }

    #[test]
    fn test_already_canonical_is_stable() {
        assert_eq!(normalize_time("09:00").unwrap(), "09:00");
        assert_eq!(normalize_time("23:59").unwrap(), "23:59");
    }
}
