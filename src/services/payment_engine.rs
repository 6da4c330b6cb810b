use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use rand::Rng;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::error::{AppError, Result};
use crate::idempotency::{IdempotencyCheckResult, IdempotencyManager};
use crate::models::{Money, Transaction};
use crate::repositories::TransactionRepository;
use crate::services::double_entry_engine::{DoubleEntryEngine, TransferRequest};

const MAX_ATTEMPTS: u32 = 3;
const BASE_BACKOFF_MS: u64 = 20;

/// Inputs to [`PaymentEngine::transfer`].
#[derive(Debug, Clone)]
pub struct TransferCommand {
    pub from_id: Uuid,
    pub to_id: Uuid,
    pub amount: Money,
    pub idempotency_key: String,
    pub description: Option<String>,
    pub reference_id: Option<String>,
    pub actor_user_id: Option<Uuid>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    /// Internal: set by [`PaymentEngine::reverse`] to mark this transfer as
    /// the compensating move for an original transaction. Never set by an
    /// HTTP-facing caller.
    pub reversal_of: Option<Uuid>,
}

/// Inputs to [`PaymentEngine::reverse`].
#[derive(Debug, Clone)]
pub struct ReversalCommand {
    pub original_transaction_id: Uuid,
    pub reason: String,
    pub idempotency_key: String,
    pub actor_user_id: Option<Uuid>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

/// One page of an account's transaction history.
#[derive(Debug, Clone)]
pub struct TransactionPage {
    pub transactions: Vec<Transaction>,
    pub total_count: i64,
    pub limit: i64,
    pub offset: i64,
}

/// Orchestrates the transfer and reversal algorithms on top of
/// [`DoubleEntryEngine`]'s locked unit-of-work core: idempotency, amount
/// validation, and bounded retry of the whole body on a concurrency
/// conflict.
pub struct PaymentEngine {
    double_entry: DoubleEntryEngine,
    idempotency: Arc<IdempotencyManager>,
    transaction_repo: TransactionRepository,
}

impl PaymentEngine {
    pub fn new(
        double_entry: DoubleEntryEngine,
        idempotency: Arc<IdempotencyManager>,
        transaction_repo: TransactionRepository,
    ) -> Self {
        Self {
            double_entry,
            idempotency,
            transaction_repo,
        }
    }

    /// Runs the full transfer algorithm. Retries the locked core up to
    /// [`MAX_ATTEMPTS`] times on [`AppError::ConcurrentModification`], with
    /// jittered backoff starting at [`BASE_BACKOFF_MS`]; any other error, or
    /// exhaustion of the retry budget, is surfaced as-is.
    pub async fn transfer(&self, command: TransferCommand) -> Result<Transaction> {
        // Idempotency check: a live record for this key means the original
        // outcome is authoritative and this call is a duplicate.
        if let IdempotencyCheckResult::Found(previous) = self.idempotency.check(&command.idempotency_key).await? {
            let original_transaction_id = previous
                .get("transaction_id")
                .and_then(Value::as_str)
                .and_then(|s| Uuid::parse_str(s).ok())
                .ok_or_else(|| AppError::Internal(anyhow::anyhow!("stored idempotency record missing transaction_id")))?;
            return Err(AppError::DuplicateTransaction { original_transaction_id });
        }

        // Amount validation.
        if !command.amount.is_positive() {
            return Err(AppError::InvalidAmount(format!(
                "transfer amount {} must be positive",
                command.amount
            )));
        }

        let result = self.execute_with_retry(&command).await?;

        // Store the idempotency record for the materialized outcome.
        self.idempotency
            .store(
                &command.idempotency_key,
                Some(result.id),
                json!({
                    "transaction_id": result.id,
                    "status": "COMPLETED",
                    "amount": result.amount.to_string(),
                    "currency": result.currency.to_string(),
                }),
                None,
            )
            .await?;

        Ok(result)
    }

    async fn execute_with_retry(&self, command: &TransferCommand) -> Result<Transaction> {
        let request = TransferRequest {
            from_id: command.from_id,
            to_id: command.to_id,
            amount: command.amount,
            idempotency_key: command.idempotency_key.clone(),
            description: command.description.clone(),
            reference_id: command.reference_id.clone(),
            actor_user_id: command.actor_user_id,
            ip_address: command.ip_address.clone(),
            user_agent: command.user_agent.clone(),
            reversal_of: command.reversal_of,
        };

        for attempt in 0..MAX_ATTEMPTS {
            match self.double_entry.execute_transfer(request.clone()).await {
                Ok(outcome) => return Ok(outcome.transaction),
                Err(AppError::ConcurrentModification(reason)) if attempt + 1 < MAX_ATTEMPTS => {
                    let delay = backoff_delay(attempt);
                    tracing::warn!(attempt, reason, delay_ms = delay.as_millis() as u64, "retrying transfer after concurrent modification");
                    tokio::time::sleep(delay).await;
                }
                Err(e) => return Err(e),
            }
        }

        Err(AppError::ConcurrentModification(format!(
            "transfer {} -> {} did not complete within {MAX_ATTEMPTS} attempts",
            command.from_id, command.to_id
        )))
    }

    /// Runs the reversal algorithm: the original must exist and be
    /// COMPLETED, the reason must be at least 5 characters; the underlying
    /// transfer moves funds back from the original's destination to its
    /// source and is reported under a fresh idempotency key. The original's
    /// COMPLETED -> REVERSED transition is not decided here — it happens
    /// inside the same locked unit of work as the compensating balance
    /// move (see [`DoubleEntryEngine::execute_transfer`]'s handling of
    /// `reversal_of`), so the two either both land or neither does, and two
    /// concurrent reversals of the same original cannot both succeed. On
    /// failure (most commonly `InsufficientFunds` if the destination has
    /// since drained, or the original having already been reversed) the
    /// original's status is left untouched.
    pub async fn reverse(&self, command: ReversalCommand) -> Result<Transaction> {
        if command.reason.trim().chars().count() < 5 {
            return Err(AppError::Validation("reversal reason must be at least 5 characters".to_string()));
        }

        let original = self
            .transaction_repo
            .find_by_id(command.original_transaction_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("transaction {} not found", command.original_transaction_id)))?;

        // Fail-fast check against a stale read; the authoritative guard
        // against double reversal is the locked, status-gated update inside
        // execute_transfer, not this unlocked read.
        if !original.status.can_be_reversed() {
            return Err(AppError::Validation(format!(
                "transaction {} is not in a reversible state",
                original.id
            )));
        }

        let (from_id, to_id) = match (original.from_account_id, original.to_account_id) {
            (Some(from), Some(to)) => (to, from),
            _ => {
                return Err(AppError::Validation(format!(
                    "transaction {} has no source/destination account pair to reverse",
                    original.id
                )))
            }
        };

        let amount = Money::new(original.amount, original.currency)?;
        let description = format!("reversal of {}: {}", original.id, command.reason);

        let reversal = TransferCommand {
            from_id,
            to_id,
            amount,
            idempotency_key: command.idempotency_key,
            description: Some(description),
            reference_id: Some(original.id.to_string()),
            actor_user_id: command.actor_user_id,
            ip_address: command.ip_address,
            user_agent: command.user_agent,
            reversal_of: Some(original.id),
        };

        self.transfer(reversal).await
    }

    /// Single transaction lookup.
    pub async fn get_transaction(&self, id: Uuid) -> Result<Option<Transaction>> {
        self.transaction_repo.find_by_id(id).await
    }

    /// One page of an account's history, bounded `1 <= limit <= 100`,
    /// `offset >= 0`, with an inclusive `[start, end]` date range.
    pub async fn get_account_transactions(
        &self,
        account_id: Uuid,
        limit: i64,
        offset: i64,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
    ) -> Result<TransactionPage> {
        let limit = limit.clamp(1, 100);
        let offset = offset.max(0);

        let (transactions, total_count) = self
            .transaction_repo
            .find_by_account(account_id, start, end, limit, offset)
            .await?;

        Ok(TransactionPage {
            transactions,
            total_count,
            limit,
            offset,
        })
    }

}

/// Jittered backoff starting at [`BASE_BACKOFF_MS`], doubling per attempt,
/// with up to 50% random jitter added to de-correlate competing retriers.
fn backoff_delay(attempt: u32) -> Duration {
    let base = BASE_BACKOFF_MS * 2u64.pow(attempt);
    let jitter = rand::thread_rng().gen_range(0..=base / 2);
    Duration::from_millis(base + jitter)
}
