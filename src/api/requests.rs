use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Validation error surfaced to the caller as a 400, distinct from the
/// domain-level [`crate::error::AppError::Validation`] kind used once a
/// request has passed shape validation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

/// `POST /accounts` body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateAccountRequest {
    pub user_id: Uuid,
    pub currency: String,
    pub initial_balance: Option<Decimal>,
}

impl CreateAccountRequest {
    pub fn validate(&self) -> Result<(), Vec<ValidationError>> {
        let mut errors = Vec::new();
        if self.currency.trim().len() != 3 {
            errors.push(ValidationError {
                field: "currency".to_string(),
                message: "currency must be a 3-letter ISO 4217 code".to_string(),
            });
        }
        if let Some(balance) = self.initial_balance {
            if balance < Decimal::ZERO {
                errors.push(ValidationError {
                    field: "initial_balance".to_string(),
                    message: "initial_balance cannot be negative".to_string(),
                });
            }
        }
        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

/// `POST /transfers` body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateTransferRequest {
    pub from_account_id: Uuid,
    pub to_account_id: Uuid,
    pub amount: Decimal,
    pub currency: String,
    pub idempotency_key: Option<String>,
    pub description: Option<String>,
    pub reference_id: Option<String>,
}

impl CreateTransferRequest {
    pub fn validate(&self) -> Result<(), Vec<ValidationError>> {
        let mut errors = Vec::new();
        if self.from_account_id == self.to_account_id {
            errors.push(ValidationError {
                field: "to_account_id".to_string(),
                message: "cannot transfer to the same account".to_string(),
            });
        }
        if self.currency.trim().len() != 3 {
            errors.push(ValidationError {
                field: "currency".to_string(),
                message: "currency must be a 3-letter ISO 4217 code".to_string(),
            });
        }
        if self.amount <= Decimal::ZERO {
            errors.push(ValidationError {
                field: "amount".to_string(),
                message: "amount must be positive".to_string(),
            });
        }
        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

/// `POST /transactions/{id}/reverse` body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReverseTransactionRequest {
    pub reason: String,
    pub idempotency_key: Option<String>,
}

impl ReverseTransactionRequest {
    pub fn validate(&self) -> Result<(), Vec<ValidationError>> {
        let mut errors = Vec::new();
        if self.reason.trim().chars().count() < 5 {
            errors.push(ValidationError {
                field: "reason".to_string(),
                message: "reason must be at least 5 characters".to_string(),
            });
        }
        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

/// Query params for `GET /accounts?currency=`.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ListAccountsQuery {
    pub user_id: Option<Uuid>,
    pub currency: Option<String>,
}

/// Query params for `GET /transactions/account/{id}/history`.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct TransactionHistoryQuery {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
    pub start_date: Option<chrono::DateTime<chrono::Utc>>,
    pub end_date: Option<chrono::DateTime<chrono::Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn create_account_request_validation() {
        let valid = CreateAccountRequest {
            user_id: Uuid::new_v4(),
            currency: "USD".to_string(),
            initial_balance: Some(dec!(100.00)),
        };
        assert!(valid.validate().is_ok());

        let invalid = CreateAccountRequest {
            user_id: Uuid::new_v4(),
            currency: "US".to_string(),
            initial_balance: Some(dec!(-1)),
        };
        let errors = invalid.validate().unwrap_err();
        assert_eq!(errors.len(), 2);
    }

    #[test]
    fn create_transfer_request_rejects_self_transfer_and_bad_amount() {
        let account_id = Uuid::new_v4();
        let request = CreateTransferRequest {
            from_account_id: account_id,
            to_account_id: account_id,
            amount: dec!(-5),
            currency: "USD".to_string(),
            idempotency_key: None,
            description: None,
            reference_id: None,
        };
        let errors = request.validate().unwrap_err();
        assert_eq!(errors.len(), 2);
    }

    #[test]
    fn reverse_request_requires_reason_length() {
        let short = ReverseTransactionRequest {
            reason: "bad".to_string(),
            idempotency_key: None,
        };
        assert!(short.validate().is_err());

        let ok = ReverseTransactionRequest {
            reason: "duplicate charge".to_string(),
            idempotency_key: None,
        };
        assert!(ok.validate().is_ok());
    }
}
