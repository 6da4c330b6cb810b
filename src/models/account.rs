use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AppError;
use crate::models::{Currency, Money};

/// Lifecycle status of an account. SUSPENDED and CLOSED both block
/// mutation; only SUSPENDED is expected to be lifted again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "VARCHAR", rename_all = "UPPERCASE")]
#[serde(rename_all = "UPPERCASE")]
pub enum AccountStatus {
    Active,
    Suspended,
    Closed,
}

impl AccountStatus {
    pub fn is_operational(&self) -> bool {
        matches!(self, AccountStatus::Active)
    }
}

/// A single-currency balance-holding account.
#[derive(Debug, Clone, sqlx::FromRow, Serialize, Deserialize)]
pub struct Account {
    pub id: Uuid,
    pub user_id: Uuid,
    pub currency: Currency,
    pub balance: rust_decimal::Decimal,
    pub status: AccountStatus,
    pub version: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Account {
    pub fn new(user_id: Uuid, currency: Currency, initial_balance: Option<Money>) -> Result<Self, AppError> {
        let balance = match initial_balance {
            Some(money) => {
                if money.currency() != currency {
                    return Err(AppError::CurrencyMismatch(format!(
                        "initial balance currency {} != account currency {currency}",
                        money.currency()
                    )));
                }
                money.to_storage().amount()
            }
            None => rust_decimal::Decimal::ZERO,
        };

        let now = Utc::now();
        Ok(Self {
            id: Uuid::new_v4(),
            user_id,
            currency,
            balance,
            status: AccountStatus::Active,
            version: 0,
            created_at: now,
            updated_at: now,
        })
    }

    /// Returns the current balance as a [`Money`] value, tagged with this
    /// account's currency.
    pub fn money_balance(&self) -> Money {
        Money::new(self.balance, self.currency).expect("persisted balance is never negative")
    }

    pub fn can_be_debited(&self, amount: Money) -> bool {
        self.status.is_operational() && self.money_balance().ge(&amount).unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn new_account_starts_active_with_zero_balance() {
        let account = Account::new(Uuid::new_v4(), Currency::USD, None).unwrap();
        assert_eq!(account.status, AccountStatus::Active);
        assert_eq!(account.balance, dec!(0));
        assert_eq!(account.version, 0);
    }

    #[test]
    fn new_account_with_initial_balance() {
        let money = Money::parse("100.00", Currency::USD).unwrap();
        let account = Account::new(Uuid::new_v4(), Currency::USD, Some(money)).unwrap();
        assert_eq!(account.balance, dec!(100.00));
    }

    #[test]
    fn new_account_rejects_mismatched_initial_balance_currency() {
        let money = Money::parse("100.00", Currency::EUR).unwrap();
        let result = Account::new(Uuid::new_v4(), Currency::USD, Some(money));
        assert!(matches!(result, Err(AppError::CurrencyMismatch(_))));
    }

    #[test]
    fn can_be_debited_respects_status_and_balance() {
        let mut account = Account::new(Uuid::new_v4(), Currency::USD, Some(
            Money::parse("50.00", Currency::USD).unwrap()
        )).unwrap();
        let amount = Money::parse("30.00", Currency::USD).unwrap();
        assert!(account.can_be_debited(amount));

        account.status = AccountStatus::Suspended;
        assert!(!account.can_be_debited(amount));

        account.status = AccountStatus::Active;
        let too_much = Money::parse("100.00", Currency::USD).unwrap();
        assert!(!account.can_be_debited(too_much));
    }

    #[test]
    fn status_is_operational() {
        assert!(AccountStatus::Active.is_operational());
        assert!(!AccountStatus::Suspended.is_operational());
        assert!(!AccountStatus::Closed.is_operational());
    }
}
