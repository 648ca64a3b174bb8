//! Fixed-point money representation
//!
//! Monetary amounts are persisted as `i64` magnitudes scaled by `10^5`
//! (five implied fractional digits). Arithmetic never touches binary
//! floats: all computation happens on [`Decimal`] and results are rounded
//! to the *presentation* precision of the relevant currency with
//! round-half-to-even, so a value that is computed and then stored does
//! not re-introduce rounding drift.

use crate::error::{Error, Result};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Number of implied fractional digits in the stored representation
pub const STORED_SCALE: u32 = 5;

/// Multiplier between decimal units and stored units (`10^STORED_SCALE`)
pub const SCALE_FACTOR: i64 = 100_000;

/// ISO 4217 currency code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[non_exhaustive]
pub enum Currency {
    /// Euro
    EUR,
    /// US Dollar
    USD,
    /// British Pound
    GBP,
    /// Swiss Franc
    CHF,
    /// Japanese Yen
    JPY,
}

impl Currency {
    /// ISO 4217 code
    pub fn code(&self) -> &'static str {
        match self {
            Currency::EUR => "EUR",
            Currency::USD => "USD",
            Currency::GBP => "GBP",
            Currency::CHF => "CHF",
            Currency::JPY => "JPY",
        }
    }

    /// Presentation precision (fractional digits shown to callers)
    pub fn decimal_places(&self) -> u32 {
        match self {
            Currency::EUR | Currency::USD | Currency::GBP | Currency::CHF => 2,
            Currency::JPY => 0,
        }
    }

    /// Parse from string
    pub fn from_code(s: &str) -> Option<Self> {
        match s {
            "EUR" => Some(Currency::EUR),
            "USD" => Some(Currency::USD),
            "GBP" => Some(Currency::GBP),
            "CHF" => Some(Currency::CHF),
            "JPY" => Some(Currency::JPY),
            _ => None,
        }
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Convert a decimal amount to its stored scaled-integer form.
///
/// Rejects amounts with more than [`STORED_SCALE`] fractional digits:
/// silently truncating would lose money.
pub fn to_stored(value: Decimal, currency: Currency) -> Result<i64> {
    let normalized = value.normalize();
    if normalized.scale() > STORED_SCALE {
        return Err(Error::Precision(format!(
            "{} has more than {} fractional digits for {}",
            value, STORED_SCALE, currency
        )));
    }

    let scaled = value
        .checked_mul(Decimal::from(SCALE_FACTOR))
        .ok_or_else(|| Error::InvalidAmount(format!("{} out of range", value)))?;

    scaled
        .to_i64()
        .ok_or_else(|| Error::InvalidAmount(format!("{} out of range", value)))
}

/// Parse a decimal string and convert it to stored form
pub fn stored_from_str(value: &str, currency: Currency) -> Result<i64> {
    let parsed: Decimal = value
        .parse()
        .map_err(|_| Error::Precision(format!("'{}' is not a decimal number", value)))?;
    to_stored(parsed, currency)
}

/// Pure inverse of [`to_stored`]
pub fn from_stored(stored: i64) -> Decimal {
    Decimal::new(stored, STORED_SCALE).normalize()
}

/// Round a decimal to the presentation precision of a currency.
///
/// Round-half-to-even, the single rounding policy every caller shares.
pub fn round_for_currency(value: Decimal, currency: Currency) -> Decimal {
    value.round_dp_with_strategy(
        currency.decimal_places(),
        RoundingStrategy::MidpointNearestEven,
    )
}

/// Add two amounts, rounded for presentation
pub fn add(a: Decimal, b: Decimal, currency: Currency) -> Decimal {
    round_for_currency(a + b, currency)
}

/// Subtract `b` from `a`, rounded for presentation
pub fn subtract(a: Decimal, b: Decimal, currency: Currency) -> Decimal {
    round_for_currency(a - b, currency)
}

/// Multiply two amounts, rounded for presentation
pub fn multiply(a: Decimal, b: Decimal, currency: Currency) -> Decimal {
    round_for_currency(a * b, currency)
}

/// Divide `a` by `b`, rounded for presentation
pub fn divide(a: Decimal, b: Decimal, currency: Currency) -> Result<Decimal> {
    if b.is_zero() {
        return Err(Error::DivisionByZero);
    }
    Ok(round_for_currency(a / b, currency))
}

/// Format an amount with its currency code for display
pub fn format_amount(value: Decimal, currency: Currency) -> String {
    let rounded = value.round_dp_with_strategy(
        currency.decimal_places(),
        RoundingStrategy::MidpointNearestEven,
    );
    format!(
        "{:.*} {}",
        currency.decimal_places() as usize,
        rounded,
        currency.code()
    )
}
