use crate::error::AppError;
use crate::models::Currency;
use rust_decimal::prelude::*;
use rust_decimal::RoundingStrategy;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

/// The ledger's only numeric type for monetary amounts. Always non-negative,
/// always tagged with a currency, never backed by a binary float.
///
/// `rust_decimal::Decimal` carries 28-29 significant digits of arithmetic
/// precision natively; this type quantizes to a fixed storage scale only at
/// the boundaries that need it (persistence, display), via [`Money::quantize`],
/// matching the ledger store's `DECIMAL(20, 2)` columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Money {
    amount: Decimal,
    currency: Currency,
}

/// Fixed fractional-digit count used by persisted balances and journal
/// entries, independent of a currency's display convention.
pub const STORAGE_SCALE: u32 = 2;

impl Money {
    /// Builds a Money from an already-exact Decimal. Rejects negative
    /// amounts.
    pub fn new(amount: Decimal, currency: Currency) -> Result<Self, AppError> {
        if amount.is_sign_negative() && !amount.is_zero() {
            return Err(AppError::InvalidAmount(format!(
                "amount cannot be negative: {amount}"
            )));
        }
        Ok(Self { amount, currency })
    }

    /// Parses a decimal string. Never accepts a binary float — callers that
    /// only have an `f64` must `to_string()` it first, as required by the
    /// arithmetic contract.
    pub fn parse(amount: &str, currency: Currency) -> Result<Self, AppError> {
        let decimal = Decimal::from_str(amount)
            .map_err(|e| AppError::InvalidAmount(format!("invalid amount '{amount}': {e}")))?;
        Self::new(decimal, currency)
    }

    pub fn zero(currency: Currency) -> Self {
        Self {
            amount: Decimal::ZERO,
            currency,
        }
    }

    pub fn amount(&self) -> Decimal {
        self.amount
    }

    pub fn currency(&self) -> Currency {
        self.currency
    }

    pub fn is_zero(&self) -> bool {
        self.amount.is_zero()
    }

    pub fn is_positive(&self) -> bool {
        self.amount.is_sign_positive() && !self.amount.is_zero()
    }

    fn check_currency(&self, other: &Money) -> Result<(), AppError> {
        if self.currency != other.currency {
            return Err(AppError::CurrencyMismatch(format!(
                "{} != {}",
                self.currency, other.currency
            )));
        }
        Ok(())
    }

    pub fn add(&self, other: &Money) -> Result<Money, AppError> {
        self.check_currency(other)?;
        Ok(Money {
            amount: self.amount + other.amount,
            currency: self.currency,
        })
    }

    pub fn sub(&self, other: &Money) -> Result<Money, AppError> {
        self.check_currency(other)?;
        let result = self.amount - other.amount;
        if result.is_sign_negative() && !result.is_zero() {
            return Err(AppError::InsufficientFunds(format!(
                "{} - {} would be negative",
                self.amount, other.amount
            )));
        }
        Ok(Money {
            amount: result,
            currency: self.currency,
        })
    }

    pub fn mul(&self, multiplier: Decimal) -> Result<Money, AppError> {
        Money::new(self.amount * multiplier, self.currency)
    }

    pub fn div(&self, divisor: Decimal) -> Result<Money, AppError> {
        if divisor.is_zero() {
            return Err(AppError::InvalidAmount("division by zero".to_string()));
        }
        Money::new(self.amount / divisor, self.currency)
    }

    /// Rounds to `n` fractional digits, half-away-from-zero.
    pub fn quantize(&self, n: u32) -> Money {
        let rounded = self
            .amount
            .round_dp_with_strategy(n, RoundingStrategy::MidpointAwayFromZero);
        Money {
            amount: rounded,
            currency: self.currency,
        }
    }

    /// Quantizes to this crate's fixed storage scale (2 digits), matching
    /// the `DECIMAL(20, 2)` ledger columns.
    pub fn to_storage(&self) -> Money {
        self.quantize(STORAGE_SCALE)
    }

    pub fn partial_cmp_same_currency(&self, other: &Money) -> Result<Ordering, AppError> {
        self.check_currency(other)?;
        Ok(self.amount.cmp(&other.amount))
    }

    pub fn lt(&self, other: &Money) -> Result<bool, AppError> {
        Ok(self.partial_cmp_same_currency(other)? == Ordering::Less)
    }

    pub fn le(&self, other: &Money) -> Result<bool, AppError> {
        Ok(self.partial_cmp_same_currency(other)? != Ordering::Greater)
    }

    pub fn gt(&self, other: &Money) -> Result<bool, AppError> {
        Ok(self.partial_cmp_same_currency(other)? == Ordering::Greater)
    }

    pub fn ge(&self, other: &Money) -> Result<bool, AppError> {
        Ok(self.partial_cmp_same_currency(other)? != Ordering::Less)
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
    use rust_decimal_macros::dec;

    #[test]
    fn add_same_currency() {
        let a = Money::new(dec!(10.00), Currency::USD).unwrap();
        let b = Money::new(dec!(5.00), Currency::USD).unwrap();
        assert_eq!(a.add(&b).unwrap().amount(), dec!(15.00));
    }

    #[test]
    fn add_cross_currency_fails() {
        let a = Money::new(dec!(10.00), Currency::USD).unwrap();
        let b = Money::new(dec!(5.00), Currency::EUR).unwrap();
        assert!(matches!(a.add(&b), Err(AppError::CurrencyMismatch(_))));
    }

    #[test]
    fn sub_negative_result_fails() {
        let a = Money::new(dec!(5.00), Currency::USD).unwrap();
        let b = Money::new(dec!(10.00), Currency::USD).unwrap();
        assert!(matches!(a.sub(&b), Err(AppError::InsufficientFunds(_))));
    }

    #[test]
    fn no_float_drift() {
        let a = Money::parse("0.10", Currency::USD).unwrap();
        let b = Money::parse("0.20", Currency::USD).unwrap();
        let sum = a.add(&b).unwrap();
        assert_eq!(sum.amount(), dec!(0.30));

        let c = Money::parse("0.1", Currency::USD).unwrap();
        let tripled = c.mul(dec!(3)).unwrap();
        assert_eq!(tripled.amount(), dec!(0.3));
    }

    #[test]
    fn negative_construction_rejected() {
        assert!(Money::new(dec!(-1.00), Currency::USD).is_err());
    }

    #[test]
    fn quantize_half_away_from_zero() {
        let m = Money::new(dec!(1.005), Currency::USD).unwrap();
        assert_eq!(m.quantize(2).amount(), dec!(1.01));

        let m2 = Money::new(dec!(1.015), Currency::USD).unwrap();
        assert_eq!(m2.quantize(2).amount(), dec!(1.02));
    }

    #[test]
    fn comparisons_require_same_currency() {
        let a = Money::new(dec!(10.00), Currency::USD).unwrap();
        let b = Money::new(dec!(5.00), Currency::EUR).unwrap();
        assert!(a.lt(&b).is_err());
    }

    #[test]
    fn zero_and_positive_predicates() {
        let zero = Money::zero(Currency::USD);
        assert!(zero.is_zero());
        assert!(!zero.is_positive());

        let pos = Money::parse("0.01", Currency::USD).unwrap();
        assert!(pos.is_positive());
    }
}
