//! Best-effort date reformatting to the `DD/MM/YYYY` display form

use chrono::{Duration, NaiveDate, NaiveDateTime};

/// Display format written into date columns
pub const DISPLAY_FORMAT: &str = "%d/%m/%Y";

/// Parse a cell's text as a date and render it as `DD/MM/YYYY`
///
/// Accepts ISO dates and datetimes, day-first slash/dash dates and Excel
/// serial numbers. Returns `None` when nothing matches; callers keep the
/// original text in that case.
pub fn to_display_date(text: &str) -> Option<String> {
    parse_date(text.trim()).map(|d| d.format(DISPLAY_FORMAT).to_string())
}

fn parse_date(s: &str) -> Option<NaiveDate> {
    if s.is_empty() {
        return None;
    }

    let datetime_formats = [
        "%Y-%m-%dT%H:%M:%S%.fZ", // 2024-01-15T10:30:00.000Z
        "%Y-%m-%dT%H:%M:%SZ",    // 2024-01-15T10:30:00Z
        "%Y-%m-%dT%H:%M:%S%.f",  // 2024-01-15T10:30:00.5
        "%Y-%m-%dT%H:%M:%S",     // 2024-01-15T10:30:00
        "%Y-%m-%d %H:%M:%S%.f",  // 2024-01-15 10:30:00.5
        "%Y-%m-%d %H:%M:%S",     // 2024-01-15 10:30:00
        "%d/%m/%Y %H:%M:%S",     // 15/01/2024 10:30:00
    ];
    for format in datetime_formats {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, format) {
            return Some(dt.date());
        }
    }

    let date_formats = [
        "%Y-%m-%d", // 2024-01-15
        "%Y/%m/%d", // 2024/01/15
        "%d/%m/%Y", // 15/01/2024
        "%d-%m-%Y", // 15-01-2024
        "%d.%m.%Y", // 15.01.2024
    ];
    for format in date_formats {
        if let Ok(d) = NaiveDate::parse_from_str(s, format) {
            return Some(d);
        }
    }

    if let Ok(dt) = chrono::DateTime::parse_from_rfc3339(s) {
        return Some(dt.date_naive());
    }

    excel_serial_to_date(s)
}

fn excel_serial_to_date(s: &str) -> Option<NaiveDate> {
    let serial: f64 = s.parse().ok()?;
    excel_serial_to_datetime(serial).map(|dt| dt.date())
}

/// Excel stores dates as days since 1899-12-30 (1900 date system)
pub fn excel_serial_to_datetime(serial: f64) -> Option<NaiveDateTime> {
    // 2958465 = 9999-12-31
    if !(1.0..2_958_466.0).contains(&serial) {
        return None;
    }
    let epoch = NaiveDate::from_ymd_opt(1899, 12, 30)?.and_hms_opt(0, 0, 0)?;
    let days = serial.trunc() as i64;
    let seconds = (serial.fract() * 86_400.0).round() as i64;
    epoch
        .checked_add_signed(Duration::days(days))?
        .checked_add_signed(Duration::seconds(seconds))
}

/// Render an Excel date cell as ISO text, dropping a midnight time part
pub fn excel_serial_to_iso(serial: f64) -> Option<String> {
    let dt = excel_serial_to_datetime(serial)?;
    if dt.time() == chrono::NaiveTime::MIN {
        Some(dt.format("%Y-%m-%d").to_string())
    } else {
        Some(dt.format("%Y-%m-%d %H:%M:%S").to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_iso_inputs() {
        assert_eq!(to_display_date("2001-03-09").as_deref(), Some("09/03/2001"));
        assert_eq!(
            to_display_date("2001-03-09T00:00:00").as_deref(),
            Some("09/03/2001")
        );
        assert_eq!(
            to_display_date("2001-03-09 14:22:01").as_deref(),
            Some("09/03/2001")
        );
    }

    #[test]
    fn test_day_first_inputs_are_stable() {
        assert_eq!(to_display_date("09/03/2001").as_deref(), Some("09/03/2001"));
        assert_eq!(to_display_date("9/3/2001").as_deref(), Some("09/03/2001"));
        assert_eq!(to_display_date("09-03-2001").as_deref(), Some("09/03/2001"));
    }

    #[test]
    fn test_excel_serial() {
        // 36959 = 2001-03-09
        assert_eq!(to_display_date("36959").as_deref(), Some("09/03/2001"));
        assert_eq!(to_display_date("36959.75").as_deref(), Some("09/03/2001"));
    }

    #[test]
    fn test_excel_serial_to_iso() {
        assert_eq!(excel_serial_to_iso(36959.0).as_deref(), Some("2001-03-09"));
        assert_eq!(
            excel_serial_to_iso(36959.5).as_deref(),
            Some("2001-03-09 12:00:00")
        );
        assert_eq!(excel_serial_to_iso(-3.0), None);
    }

    #[test]
    fn test_unparseable_returns_none() {
        assert_eq!(to_display_date(""), None);
        assert_eq!(to_display_date("sem data"), None);
        assert_eq!(to_display_date("31/02/2001"), None);
        assert_eq!(to_display_date("0"), None);
    }
}
