use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{Account, AccountStatus, Money, Transaction, TransactionStatus, TransactionType};
use crate::services::TransactionPage;

/// Standard API response wrapper.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<ErrorResponse>,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }
}

impl ApiResponse<()> {
    pub fn error(error: ErrorResponse) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(error),
        }
    }
}

/// Error response structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub code: String,
    pub message: String,
    pub details: Option<Vec<ValidationErrorDetail>>,
}

impl ErrorResponse {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: Vec<ValidationErrorDetail>) -> Self {
        self.details = Some(details);
        self
    }
}

/// Validation error detail.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationErrorDetail {
    pub field: String,
    pub message: String,
}

/// Health check response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub timestamp: DateTime<Utc>,
    pub services: ServiceHealth,
}

/// Service health status.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceHealth {
    pub database: bool,
    pub redis: bool,
    pub kafka: bool,
}

/// Account response DTO. Amounts are always serialized as strings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountResponse {
    pub account_id: Uuid,
    pub user_id: Uuid,
    pub currency: String,
    pub balance: String,
    pub status: AccountStatus,
    pub version: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Account> for AccountResponse {
    fn from(account: Account) -> Self {
        Self {
            account_id: account.id,
            user_id: account.user_id,
            currency: account.currency.to_string(),
            balance: account.balance.to_string(),
            status: account.status,
            version: account.version,
            created_at: account.created_at,
            updated_at: account.updated_at,
        }
    }
}

/// `GET /accounts/{id}/balance` response DTO.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BalanceResponse {
    pub account_id: Uuid,
    pub currency: String,
    pub balance: String,
}

impl BalanceResponse {
    pub fn new(account_id: Uuid, balance: Money) -> Self {
        Self {
            account_id,
            currency: balance.currency().to_string(),
            balance: balance.amount().to_string(),
        }
    }
}

/// Transaction response DTO. Amounts are always serialized as strings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionResponse {
    pub id: Uuid,
    pub from_account_id: Option<Uuid>,
    pub to_account_id: Option<Uuid>,
    pub transaction_type: TransactionType,
    pub status: TransactionStatus,
    pub amount: String,
    pub currency: String,
    pub idempotency_key: String,
    pub reference_id: Option<String>,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl From<Transaction> for TransactionResponse {
    fn from(tx: Transaction) -> Self {
        Self {
            id: tx.id,
            from_account_id: tx.from_account_id,
            to_account_id: tx.to_account_id,
            transaction_type: tx.transaction_type,
            status: tx.status,
            amount: tx.amount.to_string(),
            currency: tx.currency.to_string(),
            idempotency_key: tx.idempotency_key,
            reference_id: tx.reference_id,
            description: tx.description,
            created_at: tx.created_at,
            completed_at: tx.completed_at,
        }
    }
}

/// `GET /transactions/account/{id}/history` response DTO.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionHistoryResponse {
    pub transactions: Vec<TransactionResponse>,
    pub total_count: i64,
    pub limit: i64,
    pub offset: i64,
}

impl From<TransactionPage> for TransactionHistoryResponse {
    fn from(page: TransactionPage) -> Self {
        Self {
            transactions: page.transactions.into_iter().map(TransactionResponse::from).collect(),
            total_count: page.total_count,
            limit: page.limit,
            offset: page.offset,
        }
    }
}

/// Paginated list response, used for `GET /accounts?currency=`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaginatedResponse<T> {
    pub items: Vec<T>,
    pub total: i64,
}

impl<T> PaginatedResponse<T> {
    pub fn new(items: Vec<T>) -> Self {
        let total = items.len() as i64;
        Self { items, total }
    }
}
