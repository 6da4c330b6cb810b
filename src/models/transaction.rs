use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Kind of monetary movement a transaction represents. Only TRANSFER and
/// REVERSAL are produced by the Payment Engine in this crate; DEPOSIT,
/// WITHDRAWAL, and REFUND are carried for data-model completeness and for
/// any future single-account mutator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "VARCHAR", rename_all = "UPPERCASE")]
#[serde(rename_all = "UPPERCASE")]
pub enum TransactionType {
    Transfer,
    Deposit,
    Withdrawal,
    Refund,
    Reversal,
}

/// Transaction.status state machine: PENDING -> COMPLETED -> REVERSED, or
/// PENDING -> FAILED. COMPLETED and FAILED are both terminal except that a
/// successful reversal retargets COMPLETED to REVERSED.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "VARCHAR", rename_all = "UPPERCASE")]
#[serde(rename_all = "UPPERCASE")]
pub enum TransactionStatus {
    Pending,
    Completed,
    Failed,
    Reversed,
}

impl TransactionStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TransactionStatus::Completed | TransactionStatus::Failed | TransactionStatus::Reversed
        )
    }

    pub fn can_be_reversed(&self) -> bool {
        matches!(self, TransactionStatus::Completed)
    }
}

/// A single recorded money movement. `from_account_id`/`to_account_id` are
/// both set for TRANSFER and REVERSAL, the only two types this crate's
/// Payment Engine produces.
#[derive(Debug, Clone, sqlx::FromRow, Serialize, Deserialize)]
pub struct Transaction {
    pub id: Uuid,
    pub from_account_id: Option<Uuid>,
    pub to_account_id: Option<Uuid>,
    pub amount: Decimal,
    pub currency: crate::models::Currency,
    pub transaction_type: TransactionType,
    pub status: TransactionStatus,
    pub idempotency_key: String,
    pub reference_id: Option<String>,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl Transaction {
    #[allow(clippy::too_many_arguments)]
    fn new_of_type(
        transaction_type: TransactionType,
        from_account_id: Uuid,
        to_account_id: Uuid,
        amount: Decimal,
        currency: crate::models::Currency,
        idempotency_key: String,
        reference_id: Option<String>,
        description: Option<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            from_account_id: Some(from_account_id),
            to_account_id: Some(to_account_id),
            amount,
            currency,
            transaction_type,
            status: TransactionStatus::Pending,
            idempotency_key,
            reference_id,
            description,
            created_at: Utc::now(),
            completed_at: None,
        }
    }

    #[allow(clippy::too_many_arguments)]
    pub fn new_transfer(
        from_account_id: Uuid,
        to_account_id: Uuid,
        amount: Decimal,
        currency: crate::models::Currency,
        idempotency_key: String,
        reference_id: Option<String>,
        description: Option<String>,
    ) -> Self {
        Self::new_of_type(
            TransactionType::Transfer,
            from_account_id,
            to_account_id,
            amount,
            currency,
            idempotency_key,
            reference_id,
            description,
        )
    }

    /// Builds the compensating transfer a reversal executes, tagged
    /// REVERSAL from the start rather than relabeled after the fact.
    #[allow(clippy::too_many_arguments)]
    pub fn new_reversal(
        from_account_id: Uuid,
        to_account_id: Uuid,
        amount: Decimal,
        currency: crate::models::Currency,
        idempotency_key: String,
        reference_id: Option<String>,
        description: Option<String>,
    ) -> Self {
        Self::new_of_type(
            TransactionType::Reversal,
            from_account_id,
            to_account_id,
            amount,
            currency,
            idempotency_key,
            reference_id,
            description,
        )
    }
}
