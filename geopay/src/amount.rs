//! Major/minor unit amount conversion.
//!
//! Gateways exchange amounts either as decimal major units (`"1,500.00"`,
//! `"100,50"`) or as integer minor units (`150000`). This module converts
//! between the two on top of [`rust_decimal`] so that no amount that is
//! compared or signed ever passes through binary floating point.
//!
//! # Separator handling
//!
//! Whitespace is dropped. When both `,` and `.` occur, the right-most one is
//! the decimal separator and the other groups thousands. A lone `,` groups
//! thousands when exactly three digits follow it (`"1,500"`), otherwise it is
//! the decimal separator (`"100,50"`). Repeated `.` or `,` are grouping.

use std::fmt;
use std::str::FromStr;

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};

use crate::error::Error;

/// Number of decimal places used by [`to_major`].
pub const MINOR_EXPONENT: u32 = 2;

/// An amount as received from configuration, request fields or callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RawAmount<'a> {
    /// Free-form text, possibly with grouping and a `,` decimal separator.
    Text(&'a str),
    /// A whole number of major units.
    Integer(i64),
    /// An exact decimal in major units.
    Decimal(Decimal),
}

impl RawAmount<'_> {
    fn is_zero_number(&self) -> bool {
        match self {
            Self::Integer(n) => *n == 0,
            Self::Decimal(d) => d.is_zero(),
            Self::Text(_) => false,
        }
    }

    fn to_decimal(self) -> Result<Decimal, Error> {
        match self {
            Self::Integer(n) => Ok(Decimal::from(n)),
            Self::Decimal(d) => Ok(d),
            Self::Text(s) => parse_decimal(s),
        }
    }
}

impl fmt::Display for RawAmount<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text(s) => f.write_str(s),
            Self::Integer(n) => write!(f, "{n}"),
            Self::Decimal(d) => write!(f, "{d}"),
        }
    }
}

impl<'a> From<&'a str> for RawAmount<'a> {
    fn from(value: &'a str) -> Self {
        Self::Text(value)
    }
}

impl<'a> From<&'a String> for RawAmount<'a> {
    fn from(value: &'a String) -> Self {
        Self::Text(value)
    }
}

impl From<i64> for RawAmount<'_> {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<i32> for RawAmount<'_> {
    fn from(value: i32) -> Self {
        Self::Integer(value.into())
    }
}

impl From<u32> for RawAmount<'_> {
    fn from(value: u32) -> Self {
        Self::Integer(value.into())
    }
}

impl From<Decimal> for RawAmount<'_> {
    fn from(value: Decimal) -> Self {
        Self::Decimal(value)
    }
}

impl From<Money> for RawAmount<'_> {
    fn from(value: Money) -> Self {
        Self::Decimal(value.0)
    }
}

/// A fixed-precision monetary amount in major units.
///
/// Equality is numeric, so `100.00` equals `100.0`; [`Display`](fmt::Display)
/// always shows the precision the value was formatted with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Money(Decimal);

impl Money {
    /// Rounds `value` half away from zero to `decimals` places and pins the
    /// scale so the value prints with exactly that many places.
    #[must_use]
    pub fn from_decimal(value: Decimal, decimals: u32) -> Self {
        let mut rounded =
            value.round_dp_with_strategy(decimals, RoundingStrategy::MidpointAwayFromZero);
        rounded.rescale(decimals);
        Self(rounded)
    }

    /// The underlying decimal.
    #[must_use]
    pub const fn amount(&self) -> Decimal {
        self.0
    }

    /// Number of decimal places carried.
    #[must_use]
    pub fn decimals(&self) -> u32 {
        self.0.scale()
    }

    /// Converts to minor units, see [`to_minor`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidAmount`] if the result does not fit in `i64`.
    pub fn to_minor(self) -> Result<i64, Error> {
        to_minor(self)
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl FromStr for Money {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        format(s, MINOR_EXPONENT)
    }
}

/// Converts a major-unit amount to integer minor units, truncating toward zero.
///
/// Numeric zero short-circuits to `0`.
///
/// # Errors
///
/// Returns [`Error::InvalidAmount`] if the text is not numeric or the result
/// overflows `i64`.
pub fn to_minor<'a>(input: impl Into<RawAmount<'a>>) -> Result<i64, Error> {
    let raw = input.into();
    if raw.is_zero_number() {
        return Ok(0);
    }
    let value = raw.to_decimal()?;
    value
        .checked_mul(Decimal::ONE_HUNDRED)
        .and_then(|cents| cents.trunc().to_i64())
        .ok_or_else(|| Error::InvalidAmount(raw.to_string()))
}

/// Parses an amount and drops any fractional part, truncating toward zero.
///
/// Used where a gateway field is already in minor units and must be sent as
/// a bare integer.
///
/// # Errors
///
/// Returns [`Error::InvalidAmount`] if the text is not numeric or does not fit
/// in `i64`.
pub fn whole_units<'a>(input: impl Into<RawAmount<'a>>) -> Result<i64, Error> {
    let raw = input.into();
    raw.to_decimal()?
        .trunc()
        .to_i64()
        .ok_or_else(|| Error::InvalidAmount(raw.to_string()))
}

/// Converts integer minor units to a two-decimal [`Money`].
#[must_use]
pub fn to_major(minor: i64) -> Money {
    Money::from_decimal(Decimal::new(minor, MINOR_EXPONENT), MINOR_EXPONENT)
}

/// Parses an amount and rounds it half away from zero to `decimals` places.
///
/// Formatting an already formatted value yields the same value.
///
/// # Errors
///
/// Returns [`Error::InvalidAmount`] if the text is not numeric.
pub fn format<'a>(input: impl Into<RawAmount<'a>>, decimals: u32) -> Result<Money, Error> {
    let value = input.into().to_decimal()?;
    Ok(Money::from_decimal(value, decimals))
}

fn parse_decimal(input: &str) -> Result<Decimal, Error> {
    let invalid = || Error::InvalidAmount(input.to_owned());
    let canonical = canonicalize(input).ok_or_else(invalid)?;
    Decimal::from_str(&canonical).map_err(|_| invalid())
}

/// Strips grouping, normalizes the decimal separator to `.` and checks the
/// result is a plain signed decimal literal.
fn canonicalize(input: &str) -> Option<String> {
    let compact: String = input.chars().filter(|c| !c.is_whitespace()).collect();

    let decimal_sep = match (compact.rfind(','), compact.rfind('.')) {
        (Some(comma), Some(dot)) => Some(if comma > dot { ',' } else { '.' }),
        (Some(comma), None) => comma_is_decimal(&compact, comma).then_some(','),
        (None, Some(_)) => (compact.matches('.').count() == 1).then_some('.'),
        (None, None) => None,
    };

    let mut out = String::with_capacity(compact.len());
    for c in compact.chars() {
        match c {
            ',' | '.' if Some(c) == decimal_sep => out.push('.'),
            ',' | '.' => {}
            _ => out.push(c),
        }
    }

    let digits = out.strip_prefix(['-', '+']).unwrap_or(&out);
    let (int_part, frac_part) = digits.split_once('.').unwrap_or((digits, ""));
    let well_formed = !(int_part.is_empty() && frac_part.is_empty())
        && int_part.chars().all(|c| c.is_ascii_digit())
        && frac_part.chars().all(|c| c.is_ascii_digit());
    well_formed.then_some(out)
}

fn comma_is_decimal(compact: &str, comma: usize) -> bool {
    if compact.matches(',').count() > 1 {
        return false;
    }
    let int_part = compact[..comma].trim_start_matches(['-', '+']);
    let frac_len = compact[comma + 1..].len();
    frac_len != 3 || int_part.is_empty() || int_part == "0"
}

#[cfg(test)]
mod tests {
    use super::*;

    fn money(s: &str) -> Money {
        Money::from_decimal(Decimal::from_str(s).unwrap(), 2)
    }

    #[test]
    fn test_to_minor_plain() {
        assert_eq!(to_minor("100").unwrap(), 10_000);
        assert_eq!(to_minor(100).unwrap(), 10_000);
        assert_eq!(to_minor(1500).unwrap(), 150_000);
    }

    #[test]
    fn test_to_minor_thousands_separator() {
        assert_eq!(to_minor("1,500").unwrap(), 150_000);
        assert_eq!(to_minor("1 500").unwrap(), 150_000);
        assert_eq!(to_minor("1,500,000").unwrap(), 150_000_000);
        assert_eq!(to_minor("1,500.25").unwrap(), 150_025);
        assert_eq!(to_minor("1.500,25").unwrap(), 150_025);
    }

    #[test]
    fn test_to_minor_comma_decimal() {
        assert_eq!(to_minor("100,50").unwrap(), 10_050);
        assert_eq!(to_minor("0,500").unwrap(), 50);
        assert_eq!(to_minor("  12,3 ").unwrap(), 1_230);
    }

    #[test]
    fn test_to_minor_truncates_toward_zero() {
        assert_eq!(to_minor("1.999").unwrap(), 199);
        assert_eq!(to_minor("-1.999").unwrap(), -199);
    }

    #[test]
    fn test_to_minor_zero_fast_path() {
        assert_eq!(to_minor(0).unwrap(), 0);
        assert_eq!(to_minor(Decimal::ZERO).unwrap(), 0);
        assert_eq!(to_minor("0.00").unwrap(), 0);
    }

    #[test]
    fn test_to_minor_rejects_garbage() {
        assert!(matches!(to_minor("abc"), Err(Error::InvalidAmount(_))));
        assert!(matches!(to_minor(""), Err(Error::InvalidAmount(_))));
        assert!(matches!(to_minor("1.2.3,4,5"), Err(Error::InvalidAmount(_))));
        assert!(matches!(to_minor("1e5"), Err(Error::InvalidAmount(_))));
        assert!(matches!(to_minor("--5"), Err(Error::InvalidAmount(_))));
    }

    #[test]
    fn test_to_minor_overflow() {
        assert!(matches!(
            to_minor("99999999999999999999"),
            Err(Error::InvalidAmount(_))
        ));
    }

    #[test]
    fn test_whole_units() {
        assert_eq!(whole_units("1050").unwrap(), 1050);
        assert_eq!(whole_units("10.99").unwrap(), 10);
        assert_eq!(whole_units(42).unwrap(), 42);
        assert!(matches!(whole_units("ten"), Err(Error::InvalidAmount(_))));
    }

    #[test]
    fn test_to_major() {
        assert_eq!(to_major(10_000), money("100.00"));
        assert_eq!(to_major(150_000), money("1500.00"));
        assert_eq!(to_major(10_000).to_string(), "100.00");
        assert_eq!(to_major(5).to_string(), "0.05");
        assert_eq!(to_major(0).to_string(), "0.00");
    }

    #[test]
    fn test_format_comma_decimal() {
        let formatted = format("100,50", 2).unwrap();
        assert_eq!(formatted, money("100.50"));
        assert_eq!(formatted.to_string(), "100.50");
    }

    #[test]
    fn test_format_is_idempotent() {
        let once = format("1 234.567", 2).unwrap();
        let twice = format(once, 2).unwrap();
        assert_eq!(once, twice);
        assert_eq!(twice.to_string(), "1234.57");
    }

    #[test]
    fn test_format_rounds_half_away_from_zero() {
        assert_eq!(format("2.345", 2).unwrap().to_string(), "2.35");
        assert_eq!(format("-2.345", 2).unwrap().to_string(), "-2.35");
        assert_eq!(format("2.5", 0).unwrap().to_string(), "3");
        assert_eq!(format("7", 3).unwrap().to_string(), "7.000");
    }

    #[test]
    fn test_money_from_str() {
        let parsed: Money = "1,500".parse().unwrap();
        assert_eq!(parsed.to_string(), "1500.00");
        assert_eq!(parsed.decimals(), 2);
    }

    #[test]
    fn test_minor_major_roundtrip() {
        let samples = (0..=2_000).chain([99_999, 1_000_000, 123_456_789, i64::MAX / 1_000]);
        for minor in samples {
            assert_eq!(to_major(minor).to_minor().unwrap(), minor, "minor = {minor}");
        }
    }
}
