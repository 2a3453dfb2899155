//! Deterministic display formatting for amounts and dates.

use chrono::NaiveDate;

/// Display locale. Only US English is supported today.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Locale {
    #[default]
    EnUs,
}

impl Locale {
    fn currency_symbol(&self) -> &'static str {
        match self {
            Locale::EnUs => "$",
        }
    }

    fn group_separator(&self) -> char {
        match self {
            Locale::EnUs => ',',
        }
    }

    fn decimal_separator(&self) -> char {
        match self {
            Locale::EnUs => '.',
        }
    }
}

/// `1234.5` becomes `"$1,234.50"` in the default locale.
pub fn format_currency(amount: f64) -> String {
    format_currency_in(amount, Locale::default())
}

pub fn format_currency_in(amount: f64, locale: Locale) -> String {
    let symbol = locale.currency_symbol();
    if amount.is_nan() {
        return format!("{}NaN", symbol);
    }
    let sign = if amount < 0.0 { "-" } else { "" };
    if amount.is_infinite() {
        return format!("{}{}∞", sign, symbol);
    }

    let cents = (amount.abs() * 100.0).round() as u128;
    let whole = (cents / 100).to_string();
    let fraction = cents % 100;

    let mut grouped = String::with_capacity(whole.len() + whole.len() / 3);
    for (i, digit) in whole.chars().enumerate() {
        if i > 0 && (whole.len() - i) % 3 == 0 {
            grouped.push(locale.group_separator());
        }
        grouped.push(digit);
    }

    format!(
        "{}{}{}{}{:02}",
        sign,
        symbol,
        grouped,
        locale.decimal_separator(),
        fraction
    )
}

/// `2024-01-05` becomes `"January 5, 2024"` in the default locale.
pub fn format_date(date: NaiveDate) -> String {
    format_date_in(date, Locale::default())
}

pub fn format_date_in(date: NaiveDate, locale: Locale) -> String {
    match locale {
        Locale::EnUs => date.format("%B %-d, %Y").to_string(),
    }
}

/// Parse a report date from `YYYY-MM-DD` or a full RFC 3339 timestamp.
pub fn parse_date(input: &str) -> Option<NaiveDate> {
    let input = input.trim();
    NaiveDate::parse_from_str(input, "%Y-%m-%d")
        .ok()
        .or_else(|| {
            chrono::DateTime::parse_from_rfc3339(input)
                .ok()
                .map(|dt| dt.date_naive())
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_currency() {
        assert_eq!(format_currency(1234.5), "$1,234.50");
        assert_eq!(format_currency(0.0), "$0.00");
        assert_eq!(format_currency(999.999), "$1,000.00");
        assert_eq!(format_currency(1_234_567.891), "$1,234,567.89");
        assert_eq!(format_currency(-42.1), "-$42.10");
        assert_eq!(format_currency(100.0), "$100.00");
    }

    #[test]
    fn test_format_currency_non_finite() {
        assert_eq!(format_currency(f64::NAN), "$NaN");
        assert_eq!(format_currency(f64::NEG_INFINITY), "-$∞");
    }

    #[test]
    fn test_format_date() {
        let date = NaiveDate::from_ymd_opt(2024, 1, 5).unwrap();
        assert_eq!(format_date(date), "January 5, 2024");

        let date = NaiveDate::from_ymd_opt(2023, 12, 25).unwrap();
        assert_eq!(format_date_in(date, Locale::EnUs), "December 25, 2023");
    }

    #[test]
    fn test_parse_date() {
        let expected = NaiveDate::from_ymd_opt(2024, 1, 1);
        assert_eq!(parse_date("2024-01-01"), expected);
        assert_eq!(parse_date(" 2024-01-01T08:30:00Z "), expected);
        assert_eq!(parse_date("01/01/2024"), None);
    }
}
