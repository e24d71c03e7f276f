//! Exact decimal money and currency codes
//!
//! Amounts never flow through floating point. `Decimal` carries 28-29
//! significant digits, comfortably wide enough for the 18 fractional
//! digits native-token amounts need.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque currency code (ISO 4217 fiat code, or a token symbol such as "USDC").
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Currency(String);

impl Currency {
    /// Create a currency code, upper-casing for canonical comparison.
    pub fn new(code: impl Into<String>) -> Self {
        Self(code.into().to_uppercase())
    }

    /// Underlying code string.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Number of decimal places minor units are defined at for this
    /// currency. Fiat currencies use 2; common stablecoins use 6;
    /// native L1 tokens use 18. Unknown codes default to 18 (the widest,
    /// safest choice — truncation is worse than extra precision).
    pub fn minor_unit_scale(&self) -> u32 {
        match self.0.as_str() {
            "USD" | "EUR" | "GBP" | "AED" | "INR" => 2,
            "USDC" | "USDT" | "PYUSD" | "EURC" => 6,
            _ => 18,
        }
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// An exact monetary amount tagged with its currency.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Money {
    /// Exact decimal amount (never a float).
    pub amount: Decimal,
    /// Currency the amount is denominated in.
    pub currency: Currency,
}

impl Money {
    /// Construct a new monetary amount.
    pub fn new(amount: Decimal, currency: Currency) -> Self {
        Self { amount, currency }
    }

    /// Convert to an integer minor-unit representation
    /// (amount × 10^scale), truncating toward zero.
    pub fn to_minor_units(&self) -> i128 {
        let scale = self.currency.minor_unit_scale();
        let scaled = self.amount * Decimal::from(10i128.pow(scale));
        scaled.trunc().try_into().unwrap_or(i128::MAX)
    }

    /// Construct from an integer minor-unit amount.
    pub fn from_minor_units(minor: i128, currency: Currency) -> Self {
        let scale = currency.minor_unit_scale();
        let amount = Decimal::from_i128_with_scale(minor, scale);
        Self { amount, currency }
    }

    /// True if the amount is strictly positive.
    pub fn is_positive(&self) -> bool {
        self.amount > Decimal::ZERO
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.amount, self.currency)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minor_units_round_trip_fiat() {
        let m = Money::new(Decimal::new(2500, 2), Currency::new("USD"));
        assert_eq!(m.to_minor_units(), 250_000);
        let back = Money::from_minor_units(250_000, Currency::new("USD"));
        assert_eq!(back.amount, m.amount);
    }

    #[test]
    fn minor_units_usdc_six_decimals() {
        let m = Money::from_minor_units(25_000_000, Currency::new("USDC"));
        assert_eq!(m.amount, Decimal::new(25, 0));
    }

    #[test]
    fn currency_normalizes_case() {
        assert_eq!(Currency::new("usdc"), Currency::new("USDC"));
    }
}
