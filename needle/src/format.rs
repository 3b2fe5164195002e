//! Human-facing formatting of numbers and dates (Russian locale).

use chrono::{Datelike, NaiveDate};

const MONTHS_GENITIVE: [&str; 12] = [
    "января",
    "февраля",
    "марта",
    "апреля",
    "мая",
    "июня",
    "июля",
    "августа",
    "сентября",
    "октября",
    "ноября",
    "декабря",
];

/// Format a count with space-separated thousands and a comma decimal.
///
/// Whole numbers have no fractional part (`1 115`); fractional numbers keep
/// one decimal digit (`254,5`).
#[must_use]
pub fn format_number(value: f64) -> String {
    let negative = value < 0.0;
    let abs = value.abs();
    let tenths = (abs * 10.0).round();
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let tenths = tenths as u64;
    let whole = group_thousands(tenths / 10);
    let frac = tenths % 10;
    let sign = if negative { "-" } else { "" };
    if frac == 0 {
        format!("{sign}{whole}")
    } else {
        format!("{sign}{whole},{frac}")
    }
}

fn group_thousands(mut value: u64) -> String {
    let mut groups = Vec::new();
    loop {
        groups.push(value % 1000);
        value /= 1000;
        if value == 0 {
            break;
        }
    }
    let mut out = String::new();
    for (i, group) in groups.iter().rev().enumerate() {
        if i == 0 {
            out.push_str(&group.to_string());
        } else {
            out.push(' ');
            out.push_str(&format!("{group:03}"));
        }
    }
    out
}

/// Format a date as `5 марта 2024`.
#[must_use]
pub fn format_date_long(date: NaiveDate) -> String {
    format!(
        "{} {} {}",
        date.day(),
        MONTHS_GENITIVE[date.month0() as usize],
        date.year()
    )
}

/// Format a date as `05.03.2024`.
#[must_use]
pub fn format_date_short(date: NaiveDate) -> String {
    date.format("%d.%m.%Y").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_number_whole() {
        assert_eq!(format_number(0.0), "0");
        assert_eq!(format_number(300.0), "300");
        assert_eq!(format_number(1115.0), "1 115");
        assert_eq!(format_number(1_000_000.0), "1 000 000");
    }

    #[test]
    fn test_format_number_fraction() {
        assert_eq!(format_number(254.5), "254,5");
        assert_eq!(format_number(1234.5), "1 234,5");
    }

    #[test]
    fn test_format_date() {
        let date = NaiveDate::from_ymd_opt(2024, 3, 5).unwrap();
        assert_eq!(format_date_long(date), "5 марта 2024");
        assert_eq!(format_date_short(date), "05.03.2024");
    }
}
