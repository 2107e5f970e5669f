//! # Exact Amounts
//!
//! Monetary quantities are carried in the chain's base unit (10^8 base units
//! per coin) as integers, so every sum, average and share is exact.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign};
use std::str::FromStr;
use thiserror::Error;

/// Number of decimal places in one coin.
pub const COIN_DECIMALS: u32 = 8;

/// Base units per coin.
pub const BASE_UNITS_PER_COIN: u128 = 100_000_000;

/// Amount parsing errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AmountParseError {
    /// Empty input.
    #[error("empty amount")]
    Empty,

    /// More fractional digits than the base unit can represent.
    #[error("amount {0:?} has more than 8 decimal places")]
    TooPrecise(String),

    /// Sign, exponent or other non-digit characters.
    #[error("invalid amount {0:?}")]
    Invalid(String),

    /// Does not fit in 128 bits of base units.
    #[error("amount {0:?} overflows")]
    Overflow(String),
}

/// Non-negative exact amount in base units.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Amount(u128);

impl Amount {
    /// Zero.
    pub const ZERO: Amount = Amount(0);

    /// Create from raw base units.
    pub const fn from_base_units(units: u128) -> Self {
        Amount(units)
    }

    /// Create from whole coins.
    pub const fn from_coins(coins: u64) -> Self {
        Amount(coins as u128 * BASE_UNITS_PER_COIN)
    }

    /// Raw base units.
    pub const fn base_units(self) -> u128 {
        self.0
    }

    /// True when zero.
    pub const fn is_zero(self) -> bool {
        self.0 == 0
    }

    /// Checked addition.
    pub fn checked_add(self, rhs: Amount) -> Option<Amount> {
        self.0.checked_add(rhs.0).map(Amount)
    }

    /// Checked subtraction (None when the result would be negative).
    pub fn checked_sub(self, rhs: Amount) -> Option<Amount> {
        self.0.checked_sub(rhs.0).map(Amount)
    }

    /// Subtraction floored at zero.
    pub fn saturating_sub(self, rhs: Amount) -> Amount {
        Amount(self.0.saturating_sub(rhs.0))
    }

    /// Multiply by an integer count.
    pub fn checked_mul(self, factor: u64) -> Option<Amount> {
        self.0.checked_mul(u128::from(factor)).map(Amount)
    }

    /// Divide by a count, rounding half up. None for a zero divisor.
    pub fn div_round(self, divisor: u64) -> Option<Amount> {
        if divisor == 0 {
            return None;
        }
        let divisor = u128::from(divisor);
        let quotient = self.0 / divisor;
        let remainder = self.0 % divisor;
        if remainder * 2 >= divisor {
            Some(Amount(quotient + 1))
        } else {
            Some(Amount(quotient))
        }
    }

    /// Render as coins with exactly eight decimal places, e.g. `5000.00000010`.
    pub fn to_coin_string(self) -> String {
        let whole = self.0 / BASE_UNITS_PER_COIN;
        let frac = self.0 % BASE_UNITS_PER_COIN;
        format!("{}.{:08}", whole, frac)
    }

    /// Render as coins without trailing fractional zeros, e.g. `25000000`.
    pub fn to_trimmed_coin_string(self) -> String {
        let fixed = self.to_coin_string();
        let trimmed = fixed.trim_end_matches('0').trim_end_matches('.');
        trimmed.to_string()
    }

    /// Parse a coin-denominated decimal string exactly.
    ///
    /// Accepts `"5000"`, `"5000.1"` and `"5000.00000010"`; rejects more than
    /// eight fractional digits rather than rounding.
    pub fn from_coin_str(input: &str) -> Result<Amount, AmountParseError> {
        let input = input.trim();
        if input.is_empty() {
            return Err(AmountParseError::Empty);
        }

        let (whole, frac) = match input.split_once('.') {
            Some((w, f)) => (w, f),
            None => (input, ""),
        };

        if whole.is_empty() && frac.is_empty() {
            return Err(AmountParseError::Invalid(input.to_string()));
        }
        if !whole.bytes().all(|b| b.is_ascii_digit()) || !frac.bytes().all(|b| b.is_ascii_digit())
        {
            return Err(AmountParseError::Invalid(input.to_string()));
        }

        let significant = frac.trim_end_matches('0');
        if significant.len() > COIN_DECIMALS as usize {
            return Err(AmountParseError::TooPrecise(input.to_string()));
        }

        let whole_units = if whole.is_empty() {
            0u128
        } else {
            whole
                .parse::<u128>()
                .map_err(|_| AmountParseError::Overflow(input.to_string()))?
        };

        let mut frac_units = 0u128;
        for (i, digit) in significant.bytes().enumerate() {
            let place = 10u128.pow(COIN_DECIMALS - 1 - i as u32);
            frac_units += u128::from(digit - b'0') * place;
        }

        whole_units
            .checked_mul(BASE_UNITS_PER_COIN)
            .and_then(|w| w.checked_add(frac_units))
            .map(Amount)
            .ok_or_else(|| AmountParseError::Overflow(input.to_string()))
    }
}

impl Add for Amount {
    type Output = Amount;

    fn add(self, rhs: Amount) -> Amount {
        Amount(self.0 + rhs.0)
    }
}

impl AddAssign for Amount {
    fn add_assign(&mut self, rhs: Amount) {
        self.0 += rhs.0;
    }
}

impl Sum for Amount {
    fn sum<I: Iterator<Item = Amount>>(iter: I) -> Amount {
        iter.fold(Amount::ZERO, Add::add)
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_coin_string())
    }
}

impl FromStr for Amount {
    type Err = AmountParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Amount::from_coin_str(s)
    }
}

// Base units travel as a decimal string: JSON numbers lose precision past 2^53.
impl Serialize for Amount {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0.to_string())
    }
}

impl<'de> Deserialize<'de> for Amount {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse::<u128>()
            .map(Amount)
            .map_err(|e| serde::de::Error::custom(format!("invalid base units {raw:?}: {e}")))
    }
}

/// Exact share of one amount in another, e.g. a day's stake reward over all
/// stake reward ever issued.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShareRatio {
    numerator: Amount,
    denominator: Amount,
}

impl ShareRatio {
    /// Build a ratio; None when the denominator is zero.
    pub fn new(numerator: Amount, denominator: Amount) -> Option<Self> {
        if denominator.is_zero() {
            None
        } else {
            Some(Self {
                numerator,
                denominator,
            })
        }
    }

    /// The zero share.
    pub fn zero() -> Self {
        Self {
            numerator: Amount::ZERO,
            denominator: Amount::from_base_units(1),
        }
    }

    /// Numerator.
    pub fn numerator(&self) -> Amount {
        self.numerator
    }

    /// Denominator.
    pub fn denominator(&self) -> Amount {
        self.denominator
    }

    /// Fixed eight-decimal rendering, rounded half up.
    pub fn to_decimal_string(&self) -> String {
        let scale = BASE_UNITS_PER_COIN;
        let num = self.numerator.base_units();
        let den = self.denominator.base_units();

        let whole = num / den;
        let rest = num % den;
        // rest < den, so rest * scale only overflows for astronomically large totals
        let scaled = rest.saturating_mul(scale);
        let mut frac = scaled / den;
        let mut whole = whole;
        if (scaled % den) * 2 >= den {
            frac += 1;
            if frac == scale {
                frac = 0;
                whole += 1;
            }
        }
        format!("{}.{:08}", whole, frac)
    }
}

impl fmt::Display for ShareRatio {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_decimal_string())
    }
}

impl Serialize for ShareRatio {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_decimal_string())
    }
}
