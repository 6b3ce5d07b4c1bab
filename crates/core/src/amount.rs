use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Number of fractional digits every amount is stored with.
pub const AMOUNT_SCALE: u32 = 2;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AmountError {
    #[error("amount must not be negative: {0}")]
    Negative(Decimal),
}

/// A non-negative, fixed-precision monetary magnitude.
///
/// Direction is never encoded in the sign; see [`crate::Direction`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "Decimal", into = "Decimal")]
pub struct Amount(Decimal);

impl Amount {
    /// Builds an amount from the absolute value of `decimal`, rounded to two places.
    pub fn magnitude_of(decimal: Decimal) -> Self {
        Amount(fixed(decimal.abs()))
    }

    pub fn from_cents(cents: i64) -> Result<Self, AmountError> {
        Self::try_from(Decimal::new(cents, AMOUNT_SCALE))
    }

    pub fn as_decimal(self) -> Decimal {
        self.0
    }
}

fn fixed(decimal: Decimal) -> Decimal {
    let mut d = decimal.round_dp(AMOUNT_SCALE);
    d.rescale(AMOUNT_SCALE);
    d
}

impl TryFrom<Decimal> for Amount {
    type Error = AmountError;

    fn try_from(decimal: Decimal) -> Result<Self, Self::Error> {
        if decimal.is_sign_negative() && !decimal.is_zero() {
            return Err(AmountError::Negative(decimal));
        }
        Ok(Amount(fixed(decimal.abs())))
    }
}

impl From<Amount> for Decimal {
    fn from(amount: Amount) -> Self {
        amount.0
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
