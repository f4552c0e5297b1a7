//! Locale transforms between the portal's Brazilian formats and canonical
//! values.
//!
//! The portal encodes money as `R$ 1.234,56` (thousands `.`, decimals `,`)
//! and dates as `DD/MM/YYYY`; internally everything is `Decimal` and ISO
//! `NaiveDate`. Both transforms are strict round trips.

use chrono::NaiveDate;
use rust_decimal::{Decimal, RoundingStrategy};
use std::str::FromStr;

use crate::error::{Error, Result};

/// Parse a BRL currency string, tolerating the `R$` prefix.
pub fn parse_brl(input: &str) -> Result<Decimal> {
    let cleaned = input.trim();
    let cleaned = cleaned.strip_prefix("R$").unwrap_or(cleaned);
    parse_brl_plain(cleaned)
}

/// Parse a BRL-formatted number with no currency prefix: drop thousands
/// separators and swap the decimal comma for a period.
pub fn parse_brl_plain(input: &str) -> Result<Decimal> {
    let normalized = input.trim().replace('.', "").replace(',', ".");
    Decimal::from_str(&normalized)
        .map_err(|_| Error::Parse(format!("not a BRL amount: {input:?}")))
}

fn group_int_digits(int_part: &str) -> String {
    // Insert a separator every 3 digits, preserving any leading zeros.
    let mut out = String::with_capacity(int_part.len() + int_part.len() / 3);
    let len = int_part.len();
    for (i, ch) in int_part.chars().enumerate() {
        out.push(ch);
        let remaining = len.saturating_sub(i + 1);
        if remaining > 0 && remaining % 3 == 0 {
            out.push('.');
        }
    }
    out
}

fn pad_fraction(frac_part: &str, dp: usize) -> String {
    let mut out = String::with_capacity(dp);
    let mut written = 0usize;
    for ch in frac_part.chars().take(dp) {
        out.push(ch);
        written += 1;
    }
    while written < dp {
        out.push('0');
        written += 1;
    }
    out
}

/// Format a value as `R$ 1.234,56` with exactly two decimal places,
/// rounding half away from zero.
pub fn format_brl(value: Decimal) -> String {
    let rounded = value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
    let negative = rounded.is_sign_negative() && !rounded.is_zero();
    let abs = rounded.abs().normalize().to_string();

    let (int_part, frac_part) = match abs.split_once('.') {
        Some((i, f)) => (i, f),
        None => (abs.as_str(), ""),
    };

    let mut out = String::from("R$ ");
    if negative {
        out.push('-');
    }
    out.push_str(&group_int_digits(int_part));
    out.push(',');
    out.push_str(&pad_fraction(frac_part, 2));
    out
}

/// Format an `f64` amount the same way; investment payloads carry plain
/// JSON numbers rather than BRL strings.
pub fn format_brl_f64(value: f64) -> String {
    match Decimal::from_f64_retain(value) {
        Some(decimal) => format_brl(decimal),
        None => format!("R$ {value:.2}"),
    }
}

/// Render a canonical date in the portal's `DD/MM/YYYY` display form.
pub fn to_display_date(date: NaiveDate) -> String {
    date.format("%d/%m/%Y").to_string()
}

/// Parse a `DD/MM/YYYY` display date back into a canonical date.
pub fn parse_display_date(input: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(input.trim(), "%d/%m/%Y")
        .map_err(|_| Error::Parse(format!("not a DD/MM/YYYY date: {input:?}")))
}

/// Parse the portal's canonical `YYYY-MM-DD` date encoding.
pub fn parse_iso_date(input: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(input.trim(), "%Y-%m-%d")
        .map_err(|_| Error::Parse(format!("not a YYYY-MM-DD date: {input:?}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    #[test]
    fn parse_brl_handles_prefix_and_separators() {
        assert_eq!(parse_brl("R$ 1.234,56").unwrap(), dec("1234.56"));
        assert_eq!(parse_brl("1.234,56").unwrap(), dec("1234.56"));
        assert_eq!(parse_brl("R$ -12,30").unwrap(), dec("-12.30"));
    }

    #[test]
    fn parse_brl_plain_swaps_separators_only() {
        assert_eq!(parse_brl_plain("10.000,00").unwrap(), dec("10000.00"));
        assert!(parse_brl_plain("R$ 1,00").is_err());
    }

    #[test]
    fn format_brl_groups_and_pads() {
        assert_eq!(format_brl(dec("1234.56")), "R$ 1.234,56");
        assert_eq!(format_brl(dec("1234567.5")), "R$ 1.234.567,50");
        assert_eq!(format_brl(dec("0.5")), "R$ 0,50");
        assert_eq!(format_brl(dec("-1234.5")), "R$ -1.234,50");
    }

    #[test]
    fn currency_round_trips_for_two_decimal_values() {
        for raw in ["0.00", "0.01", "1.00", "12.34", "1234.56", "987654321.09"] {
            let value = dec(raw);
            assert_eq!(parse_brl(&format_brl(value)).unwrap(), value.normalize());
        }
    }

    #[test]
    fn display_date_round_trips() {
        for (y, m, d) in [(2023, 7, 8), (2000, 2, 29), (1999, 12, 31)] {
            let date = NaiveDate::from_ymd_opt(y, m, d).unwrap();
            let display = to_display_date(date);
            let back = parse_display_date(&display).unwrap();
            assert_eq!(to_display_date(back), display);
        }
    }

    #[test]
    fn iso_dates_parse_and_render_in_display_form() {
        let date = parse_iso_date("2023-07-08").unwrap();
        assert_eq!(to_display_date(date), "08/07/2023");
    }
}
