//! Date engine and number-format properties through the public API.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::float_cmp)]

use chrono::{Datelike, Days, NaiveDate};
use test_case::test_case;
use xlimport::date::{date_to_excel_serial, excel_serial_to_date, format_serial};
use xlimport::numfmt::{classify_number_format, is_date_format};

#[test]
fn test_serial_round_trip_1900_to_2100() {
    let mut day = NaiveDate::from_ymd_opt(1900, 1, 1).unwrap();
    let last = NaiveDate::from_ymd_opt(2100, 12, 31).unwrap();
    while day <= last {
        for date1904 in [false, true] {
            let Some(serial) = date_to_excel_serial(day.and_hms_opt(0, 0, 0).unwrap(), date1904)
            else {
                // before the 1904 epoch
                assert!(date1904 && day.year() < 1904);
                continue;
            };
            let back = excel_serial_to_date(serial, date1904).unwrap();
            assert_eq!(back.date(), day, "serial {serial} (1904: {date1904})");
        }
        day = day.checked_add_days(Days::new(1)).unwrap();
    }
}

#[test_case(1.0, "1900-01-01"; "first serial")]
#[test_case(59.0, "1900-02-28"; "day before phantom leap day")]
#[test_case(61.0, "1900-03-01"; "after phantom leap day")]
#[test_case(45306.0, "2024-01-15"; "recent date")]
#[test_case(45306.75, "2024-01-15"; "time part ignored by date pattern")]
fn test_serial_to_iso(serial: f64, expected: &str) {
    assert_eq!(format_serial(serial, "yyyy-mm-dd", false), expected);
}

#[test]
fn test_time_pattern() {
    assert_eq!(format_serial(0.75, "hh:mm", false), "18:00");
}

#[test_case("#,##0.00", 2, true, false, false; "thousands with decimals")]
#[test_case("0%", 0, false, true, false; "percent")]
#[test_case("0.00E+00", 2, false, false, true; "scientific")]
#[test_case("General", 0, false, false, false; "general")]
fn test_classification(
    code: &str,
    decimals: u32,
    thousands: bool,
    percent: bool,
    scientific: bool,
) {
    let info = classify_number_format(code);
    assert_eq!(info.pattern, code);
    assert_eq!(info.decimal_places, decimals);
    assert_eq!(info.has_thousands_separator, thousands);
    assert_eq!(info.is_percent, percent);
    assert_eq!(info.is_scientific, scientific);
    assert!(!info.is_date_time);
}

#[test]
fn test_currency_and_negative_sections() {
    let info = classify_number_format("\"$\"#,##0.00;[Red]-\"$\"#,##0.00");
    assert!(info.is_currency);
    assert!(info.has_negative_format);
}

#[test_case("yyyy-mm-dd", true)]
#[test_case("[h]:mm:ss", true)]
#[test_case("mmm d", true)]
#[test_case("0.00", false)]
#[test_case("\"day\" 0", false)]
#[test_case("[Red]0", false)]
fn test_date_detection(code: &str, expected: bool) {
    assert_eq!(is_date_format(code), expected);
}
