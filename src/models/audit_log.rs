use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Append-only audit trail row. Written alongside every balance mutation;
/// never updated or deleted. `action` identifies the kind of event (e.g.
/// `TRANSFER_DEBIT`, `TRANSFER_CREDIT`, `BALANCE_UPDATED`, `ACCOUNT_SUSPENDED`).
#[derive(Debug, Clone, sqlx::FromRow, Serialize, Deserialize)]
pub struct AuditLog {
    pub id: Uuid,
    pub transaction_id: Option<Uuid>,
    pub account_id: Option<Uuid>,
    pub action: String,
    pub old_balance: Option<Decimal>,
    pub new_balance: Option<Decimal>,
    pub user_id: Option<Uuid>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub extra_data: Option<Value>,
    pub created_at: DateTime<Utc>,
}

impl AuditLog {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        transaction_id: Option<Uuid>,
        account_id: Option<Uuid>,
        action: impl Into<String>,
        old_balance: Option<Decimal>,
        new_balance: Option<Decimal>,
        user_id: Option<Uuid>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            transaction_id,
            account_id,
            action: action.into(),
            old_balance,
            new_balance,
            user_id,
            ip_address: None,
            user_agent: None,
            extra_data: None,
            created_at: Utc::now(),
        }
    }

    pub fn with_request_context(mut self, ip_address: Option<String>, user_agent: Option<String>) -> Self {
        self.ip_address = ip_address;
        self.user_agent = user_agent;
        self
    }
}
