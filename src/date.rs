//! Date engine.
//!
//! Serial numbers use the 1900 system (epoch 1899-12-30, with the phantom
//! 1900-02-29 folded onto 1900-02-28) or the 1904 system. Display strings
//! are rendered from the cell's format code; string input is parsed against
//! the same pattern families plus a bounded generic fallback.
//!
//! Every failure path yields `""` or `None`. Output never contains `NaN`.

use chrono::{DateTime, Datelike, Days, NaiveDate, NaiveDateTime, NaiveTime, Timelike};

/// Serial of 9999-12-31 plus one day; anything at or above is out of range.
const MAX_SERIAL: f64 = 2_958_466.0;

const SECONDS_PER_DAY: f64 = 86_400.0;

const GENERIC_YEAR_RANGE: std::ops::RangeInclusive<i32> = 1900..=2100;

fn epoch(date1904: bool) -> Option<NaiveDate> {
    if date1904 {
        NaiveDate::from_ymd_opt(1904, 1, 1)
    } else {
        NaiveDate::from_ymd_opt(1899, 12, 30)
    }
}

/// Convert a serial number to a calendar date-time.
///
/// In the 1900 system serials below 60 count from 1899-12-31 so that serial
/// 1 is 1900-01-01; serial 60 (the nonexistent 1900-02-29) lands on
/// 1900-02-28.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn excel_serial_to_date(serial: f64, date1904: bool) -> Option<NaiveDateTime> {
    if !serial.is_finite() || !(0.0..MAX_SERIAL).contains(&serial) {
        return None;
    }
    let mut days = serial.floor();
    let mut seconds = ((serial - days) * SECONDS_PER_DAY).round();
    if seconds >= SECONDS_PER_DAY {
        days += 1.0;
        seconds = 0.0;
    }
    // both values are finite, non-negative and bounded by MAX_SERIAL / 86400
    let days = days as u64;
    let seconds = seconds as u32;

    let base = if !date1904 && days < 60 {
        NaiveDate::from_ymd_opt(1899, 12, 31)?
    } else {
        epoch(date1904)?
    };
    let date = base.checked_add_days(Days::new(days))?;
    let time = NaiveTime::from_num_seconds_from_midnight_opt(seconds, 0)?;
    Some(date.and_time(time))
}

/// Convert a calendar date-time to a serial number.
///
/// Returns `None` for dates before the epoch.
#[allow(clippy::cast_precision_loss)]
pub fn date_to_excel_serial(dt: NaiveDateTime, date1904: bool) -> Option<f64> {
    let mut days = dt.date().signed_duration_since(epoch(date1904)?).num_days();
    if !date1904 && days <= 60 {
        days -= 1;
    }
    if days < 0 {
        return None;
    }
    let seconds = f64::from(dt.time().num_seconds_from_midnight());
    Some(days as f64 + seconds / SECONDS_PER_DAY)
}

/// Format a serial number with a date/time format code.
pub fn format_serial(serial: f64, pattern: &str, date1904: bool) -> String {
    excel_serial_to_date(serial, date1904)
        .map(|dt| format_date(dt, pattern))
        .unwrap_or_default()
}

/// Parse a date string and re-render it with a format code.
pub fn format_date_string(value: &str, pattern: &str) -> String {
    parse_date_string(value)
        .map(|dt| format_date(dt, pattern))
        .unwrap_or_default()
}

/// Default pattern for date cells that carry no usable format code.
pub fn default_pattern(dt: NaiveDateTime) -> &'static str {
    if dt.time() == NaiveTime::MIN {
        "yyyy-mm-dd"
    } else {
        "yyyy-mm-dd hh:mm:ss"
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Year4,
    Year2,
    Month(usize),
    Day(usize),
    Hour(usize),
    Minute(usize),
    Second(usize),
    AmPm { short: bool, upper: bool },
    Literal(String),
}

impl Token {
    fn is_date_part(&self) -> bool {
        !matches!(self, Self::Literal(_))
    }
}

/// Split a format code into date tokens. Only the first section counts.
fn tokenize(pattern: &str) -> Vec<Token> {
    let section = crate::numfmt::split_sections(pattern)
        .into_iter()
        .next()
        .unwrap_or_default();
    let chars: Vec<char> = section.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;
    let mut after_hour = false;

    while let Some(&c) = chars.get(i) {
        let lower = c.to_ascii_lowercase();
        match lower {
            '"' => {
                let literal: String = chars
                    .iter()
                    .skip(i + 1)
                    .take_while(|&&q| q != '"')
                    .collect();
                i += literal.chars().count() + 2;
                tokens.push(Token::Literal(literal));
            }
            '\\' => {
                if let Some(next) = chars.get(i + 1) {
                    tokens.push(Token::Literal(next.to_string()));
                }
                i += 2;
            }
            '_' | '*' => i += 2,
            '[' => {
                let inner: String = chars
                    .iter()
                    .skip(i + 1)
                    .take_while(|&&b| b != ']')
                    .collect();
                i += inner.chars().count() + 2;
                let inner = inner.to_ascii_lowercase();
                match inner.chars().next() {
                    Some('h') if inner.chars().all(|ch| ch == 'h') => {
                        after_hour = true;
                        tokens.push(Token::Hour(inner.len()));
                    }
                    Some('m') if inner.chars().all(|ch| ch == 'm') => {
                        tokens.push(Token::Minute(inner.len()));
                    }
                    Some('s') if inner.chars().all(|ch| ch == 's') => {
                        tokens.push(Token::Second(inner.len()));
                    }
                    _ => {}
                }
            }
            'a' => {
                let rest: String = chars.iter().skip(i).take(5).collect();
                let rest_lower = rest.to_ascii_lowercase();
                if rest_lower.starts_with("am/pm") {
                    tokens.push(Token::AmPm {
                        short: false,
                        upper: c.is_ascii_uppercase(),
                    });
                    i += 5;
                } else if rest_lower.starts_with("a/p") {
                    tokens.push(Token::AmPm {
                        short: true,
                        upper: c.is_ascii_uppercase(),
                    });
                    i += 3;
                } else {
                    tokens.push(Token::Literal(c.to_string()));
                    i += 1;
                }
            }
            'y' | 'm' | 'd' | 'h' | 's' => {
                let count = chars
                    .iter()
                    .skip(i)
                    .take_while(|ch| ch.to_ascii_lowercase() == lower)
                    .count();
                let token = match lower {
                    'y' if count >= 3 => Token::Year4,
                    'y' => Token::Year2,
                    'd' => Token::Day(count),
                    'h' => {
                        after_hour = true;
                        Token::Hour(count)
                    }
                    's' => {
                        after_hour = false;
                        Token::Second(count)
                    }
                    _ => {
                        if after_hour || seconds_follow(&chars, i + count) {
                            Token::Minute(count)
                        } else {
                            Token::Month(count)
                        }
                    }
                };
                tokens.push(token);
                i += count;
            }
            '0' if matches!(tokens.last(), Some(Token::Literal(l)) if l == ".") => {
                // fractional seconds are dropped along with their point
                tokens.pop();
                i += chars.iter().skip(i).take_while(|&&ch| ch == '0').count();
            }
            _ => {
                tokens.push(Token::Literal(c.to_string()));
                i += 1;
            }
        }
    }
    tokens
}

/// An `m` run is minutes when the next date letter is `s`.
fn seconds_follow(chars: &[char], start: usize) -> bool {
    chars
        .iter()
        .skip(start)
        .map(char::to_ascii_lowercase)
        .find(|c| matches!(c, 's' | 'h' | 'y' | 'd' | 'm'))
        == Some('s')
}

/// Render a date-time with a format code.
///
/// Codes with no recognizable date/time token fall back to ISO `yyyy-mm-dd`.
pub fn format_date(dt: NaiveDateTime, pattern: &str) -> String {
    let mut tokens = tokenize(pattern);
    if !tokens.iter().any(Token::is_date_part) {
        tokens = tokenize(default_pattern(dt));
    }
    let twelve_hour = tokens.iter().any(|t| matches!(t, Token::AmPm { .. }));
    let year = dt.year();
    if !(1..=9999).contains(&year) {
        return String::new();
    }

    let mut out = String::new();
    for token in &tokens {
        match token {
            Token::Year4 => out.push_str(&format!("{year:04}")),
            Token::Year2 => out.push_str(&format!("{:02}", year.rem_euclid(100))),
            Token::Month(1) => out.push_str(&dt.month().to_string()),
            Token::Month(2) => out.push_str(&format!("{:02}", dt.month())),
            Token::Month(3) => out.push_str(&dt.format("%b").to_string()),
            Token::Month(4) => out.push_str(&dt.format("%B").to_string()),
            Token::Month(_) => out.extend(dt.format("%B").to_string().chars().take(1)),
            Token::Day(1) => out.push_str(&dt.day().to_string()),
            Token::Day(2) => out.push_str(&format!("{:02}", dt.day())),
            Token::Day(3) => out.push_str(&dt.format("%a").to_string()),
            Token::Day(_) => out.push_str(&dt.format("%A").to_string()),
            Token::Hour(n) => {
                let hour = if twelve_hour {
                    match dt.hour() % 12 {
                        0 => 12,
                        h => h,
                    }
                } else {
                    dt.hour()
                };
                if *n >= 2 {
                    out.push_str(&format!("{hour:02}"));
                } else {
                    out.push_str(&hour.to_string());
                }
            }
            Token::Minute(n) | Token::Second(n) => {
                let v = if matches!(token, Token::Minute(_)) {
                    dt.minute()
                } else {
                    dt.second()
                };
                if *n >= 2 {
                    out.push_str(&format!("{v:02}"));
                } else {
                    out.push_str(&v.to_string());
                }
            }
            Token::AmPm { short, upper } => {
                let pm = dt.hour() >= 12;
                let text = match (short, pm) {
                    (false, false) => "AM",
                    (false, true) => "PM",
                    (true, false) => "A",
                    (true, true) => "P",
                };
                if *upper {
                    out.push_str(text);
                } else {
                    out.push_str(&text.to_ascii_lowercase());
                }
            }
            Token::Literal(s) => out.push_str(s),
        }
    }

    if out.contains("NaN") {
        return String::new();
    }
    out
}

/// Literal string layouts, tried in priority order.
///
/// Each family accepts an optional `h:mm` or `h:mm:ss` suffix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateFamily {
    /// `2024/3/5`
    YearSlash,
    /// `2024-03-05`, also ISO `2024-03-05T10:00:00`
    YearDash,
    /// `3/5/2024` or `3/5/24`
    MonthDayYear,
    /// `5/3/2024` or `5/3/24`, only when the first number cannot be a month
    DayMonthYear,
    /// `2024年3月5日`
    Cjk,
}

impl DateFamily {
    pub const ALL: [Self; 5] = [
        Self::YearSlash,
        Self::YearDash,
        Self::MonthDayYear,
        Self::DayMonthYear,
        Self::Cjk,
    ];

    fn date_layouts(self) -> &'static [&'static str] {
        match self {
            Self::YearSlash => &["%Y/%m/%d"],
            Self::YearDash => &["%Y-%m-%d"],
            Self::MonthDayYear => &["%m/%d/%Y", "%m/%d/%y"],
            Self::DayMonthYear => &["%d/%m/%Y", "%d/%m/%y"],
            Self::Cjk => &["%Y年%m月%d日"],
        }
    }

    fn parse(self, value: &str) -> Option<NaiveDateTime> {
        const TIME_SUFFIXES: [&str; 3] = ["%H:%M:%S%.f", "%H:%M:%S", "%H:%M"];
        for layout in self.date_layouts() {
            // %Y happily takes "24" as year 24
            let plausible = |dt: &NaiveDateTime| !layout.contains("%Y") || dt.year() >= 1000;
            let date_only = NaiveDate::parse_from_str(value, layout)
                .ok()
                .map(|date| date.and_time(NaiveTime::MIN));
            if let Some(dt) = date_only.filter(plausible) {
                return Some(dt);
            }
            for sep in [" ", "T"] {
                for time in TIME_SUFFIXES {
                    let full = format!("{layout}{sep}{time}");
                    let parsed = NaiveDateTime::parse_from_str(value, &full).ok();
                    if let Some(dt) = parsed.filter(plausible) {
                        return Some(dt);
                    }
                }
            }
        }
        None
    }
}

/// Parse a date string.
///
/// The literal families are tried first; then RFC 3339 / RFC 2822 and
/// month-name layouts, accepted only for years 1900-2100.
pub fn parse_date_string(value: &str) -> Option<NaiveDateTime> {
    let value = value.trim().trim_end_matches('Z');
    if value.is_empty() || value.contains("NaN") {
        return None;
    }

    if let Some(dt) = DateFamily::ALL.iter().find_map(|f| f.parse(value)) {
        return Some(dt);
    }

    let generic = DateTime::parse_from_rfc3339(value)
        .or_else(|_| DateTime::parse_from_rfc2822(value))
        .map(|dt| dt.naive_local())
        .ok()
        .or_else(|| {
            ["%B %d, %Y", "%b %d, %Y", "%d %B %Y", "%d %b %Y", "%d-%b-%Y"]
                .iter()
                .find_map(|layout| NaiveDate::parse_from_str(value, layout).ok())
                .map(|d| d.and_time(NaiveTime::MIN))
        })?;

    GENERIC_YEAR_RANGE
        .contains(&generic.year())
        .then_some(generic)
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::indexing_slicing,
    clippy::float_cmp,
    clippy::panic
)]
mod tests {
    use super::*;
    use test_case::test_case;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_time(NaiveTime::MIN)
    }

    #[test_case(1.0, 1900, 1, 1)]
    #[test_case(59.0, 1900, 2, 28)]
    #[test_case(61.0, 1900, 3, 1)]
    #[test_case(45_000.0, 2023, 3, 15)]
    #[test_case(2_958_465.0, 9999, 12, 31)]
    fn test_serial_to_date(serial: f64, y: i32, m: u32, d: u32) {
        assert_eq!(excel_serial_to_date(serial, false), Some(ymd(y, m, d)));
    }

    #[test]
    fn test_phantom_leap_day_folds() {
        assert_eq!(excel_serial_to_date(60.0, false), Some(ymd(1900, 2, 28)));
    }

    #[test]
    fn test_serial_1904() {
        assert_eq!(excel_serial_to_date(0.0, true), Some(ymd(1904, 1, 1)));
        assert_eq!(date_to_excel_serial(ymd(1904, 1, 2), true), Some(1.0));
    }

    #[test]
    fn test_invalid_serials() {
        assert_eq!(excel_serial_to_date(f64::NAN, false), None);
        assert_eq!(excel_serial_to_date(f64::INFINITY, false), None);
        assert_eq!(excel_serial_to_date(-1.0, false), None);
        assert_eq!(excel_serial_to_date(3_000_000.0, false), None);
        assert_eq!(format_serial(f64::NAN, "yyyy-mm-dd", false), "");
    }

    #[test]
    fn test_round_trip_every_day_1900_to_2100() {
        let mut day = ymd(1900, 1, 1).date();
        let last = ymd(2100, 12, 31).date();
        while day <= last {
            let dt = day.and_time(NaiveTime::MIN);
            let serial = date_to_excel_serial(dt, false).unwrap();
            assert_eq!(excel_serial_to_date(serial, false).unwrap().date(), day);
            day = day.succ_opt().unwrap();
        }
    }

    #[test]
    fn test_time_fraction() {
        let dt = excel_serial_to_date(45_000.75, false).unwrap();
        assert_eq!((dt.hour(), dt.minute()), (18, 0));
        // rounding to the next midnight rolls the day
        let dt = excel_serial_to_date(45_000.999_999_9, false).unwrap();
        assert_eq!(dt, ymd(2023, 3, 16));
    }

    #[test_case("yyyy/m/d", "2024/3/5")]
    #[test_case("yyyy-mm-dd", "2024-03-05")]
    #[test_case("m/d/yy", "3/5/24")]
    #[test_case("d/m/yyyy", "5/3/2024")]
    #[test_case("yyyy\"年\"m\"月\"d\"日\"", "2024年3月5日")]
    #[test_case("yyyy年m月d日", "2024年3月5日")]
    #[test_case("d-mmm-yy", "5-Mar-24")]
    #[test_case("mmmm d, yyyy", "March 5, 2024")]
    #[test_case("m/d/yy h:mm", "3/5/24 14:07")]
    #[test_case("yyyy-mm-dd hh:mm:ss", "2024-03-05 14:07:09")]
    #[test_case("h:mm AM/PM", "2:07 PM")]
    #[test_case("[$-409]m/d/yy", "3/5/24")]
    #[test_case("General", "2024-03-05 14:07:09")]
    fn test_format_date(pattern: &str, expected: &str) {
        let dt = NaiveDate::from_ymd_opt(2024, 3, 5)
            .unwrap()
            .and_hms_opt(14, 7, 9)
            .unwrap();
        assert_eq!(format_date(dt, pattern), expected);
    }

    #[test]
    fn test_minutes_before_seconds() {
        let dt = ymd(2024, 3, 5) + chrono::Duration::seconds(125);
        assert_eq!(format_date(dt, "mm:ss"), "02:05");
    }

    #[test_case("2024/3/5", Some((2024, 3, 5)))]
    #[test_case("2024-03-05", Some((2024, 3, 5)))]
    #[test_case("2024-03-05T10:30:00", Some((2024, 3, 5)))]
    #[test_case("3/5/2024", Some((2024, 3, 5)))]
    #[test_case("3/5/24", Some((2024, 3, 5)))]
    #[test_case("25/12/2024", Some((2024, 12, 25)))]
    #[test_case("2024年3月5日", Some((2024, 3, 5)))]
    #[test_case("2024/3/5 9:15", Some((2024, 3, 5)))]
    #[test_case("March 5, 2024", Some((2024, 3, 5)))]
    #[test_case("March 5, 1850", None)]
    #[test_case("not a date", None)]
    #[test_case("NaN", None)]
    #[test_case("", None)]
    fn test_parse_date_string(input: &str, expected: Option<(i32, u32, u32)>) {
        let parsed = parse_date_string(input).map(|dt| (dt.year(), dt.month(), dt.day()));
        assert_eq!(parsed, expected);
    }

    #[test]
    fn test_format_date_string_failure_is_empty() {
        assert_eq!(format_date_string("garbage", "yyyy-mm-dd"), "");
        assert_eq!(format_date_string("2024-01-02", "d/m/yyyy"), "2/1/2024");
    }
}
