use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, Transaction as DbTransaction};
use uuid::Uuid;

use crate::error::{AppError, Result};
use crate::models::{Transaction, TransactionStatus, TransactionType};

/// Repository for Transaction persistence. Writes that participate in the
/// transfer unit of work take an open `sqlx::Transaction` so they commit or
/// roll back atomically with the balance and journal writes.
pub struct TransactionRepository {
    pool: PgPool,
}

impl TransactionRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Inserts a PENDING transaction row within an open unit of work. A
    /// unique violation on `idempotency_key` (a concurrent request racing
    /// the same key) is surfaced as [`AppError::DuplicateTransaction`]
    /// pointing at the row that won the race.
    pub async fn create_pending(
        &self,
        tx: &mut DbTransaction<'_, Postgres>,
        transaction: &Transaction,
    ) -> Result<Transaction> {
        let result = sqlx::query_as::<_, Transaction>(
            r#"
            INSERT INTO transactions
                (id, from_account_id, to_account_id, amount, currency, transaction_type,
                 status, idempotency_key, reference_id, description, created_at, completed_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            RETURNING id, from_account_id, to_account_id, amount, currency, transaction_type,
                      status, idempotency_key, reference_id, description, created_at, completed_at
            "#,
        )
        .bind(transaction.id)
        .bind(transaction.from_account_id)
        .bind(transaction.to_account_id)
        .bind(transaction.amount)
        .bind(transaction.currency)
        .bind(transaction.transaction_type)
        .bind(transaction.status)
        .bind(&transaction.idempotency_key)
        .bind(&transaction.reference_id)
        .bind(&transaction.description)
        .bind(transaction.created_at)
        .bind(transaction.completed_at)
        .fetch_one(&mut **tx)
        .await;

        match result {
            Ok(row) => Ok(row),
            Err(sqlx::Error::Database(db_err)) if db_err.code().as_deref() == Some("23505") => {
                let existing = self.find_by_idempotency_key(&transaction.idempotency_key).await?;
                match existing {
                    Some(existing) => Err(AppError::DuplicateTransaction {
                        original_transaction_id: existing.id,
                    }),
                    None => Err(AppError::Database(sqlx::Error::Database(db_err))),
                }
            }
            Err(e) => Err(AppError::Database(e)),
        }
    }

    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<Transaction>> {
        sqlx::query_as::<_, Transaction>(
            r#"
            SELECT id, from_account_id, to_account_id, amount, currency, transaction_type,
                   status, idempotency_key, reference_id, description, created_at, completed_at
            FROM transactions
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(AppError::Database)
    }

    pub async fn find_by_idempotency_key(&self, idempotency_key: &str) -> Result<Option<Transaction>> {
        sqlx::query_as::<_, Transaction>(
            r#"
            SELECT id, from_account_id, to_account_id, amount, currency, transaction_type,
                   status, idempotency_key, reference_id, description, created_at, completed_at
            FROM transactions
            WHERE idempotency_key = $1
            "#,
        )
        .bind(idempotency_key)
        .fetch_optional(&self.pool)
        .await
        .map_err(AppError::Database)
    }

    /// Finalizes a PENDING transaction to COMPLETED within the open unit of
    /// work, stamping `completed_at`.
    pub async fn complete(
        &self,
        tx: &mut DbTransaction<'_, Postgres>,
        id: Uuid,
    ) -> Result<Transaction> {
        sqlx::query_as::<_, Transaction>(
            r#"
            UPDATE transactions
            SET status = 'COMPLETED', completed_at = NOW()
            WHERE id = $1
            RETURNING id, from_account_id, to_account_id, amount, currency, transaction_type,
                      status, idempotency_key, reference_id, description, created_at, completed_at
            "#,
        )
        .bind(id)
        .fetch_one(&mut **tx)
        .await
        .map_err(AppError::Database)
    }

    /// Marks a transaction FAILED outside the rolled-back unit of work; used
    /// on a best-effort basis after the engine aborts an attempt.
    pub async fn mark_failed(&self, id: Uuid) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE transactions
            SET status = 'FAILED'
            WHERE id = $1 AND status = 'PENDING'
            "#,
        )
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(AppError::Database)?;
        Ok(())
    }

    /// Relabels a just-completed transaction's type, used to turn the
    /// transfer a reversal executes under the hood into a REVERSAL record.
    pub async fn retag_type(&self, id: Uuid, transaction_type: TransactionType) -> Result<Transaction> {
        sqlx::query_as::<_, Transaction>(
            r#"
            UPDATE transactions
            SET transaction_type = $2
            WHERE id = $1
            RETURNING id, from_account_id, to_account_id, amount, currency, transaction_type,
                      status, idempotency_key, reference_id, description, created_at, completed_at
            "#,
        )
        .bind(id)
        .bind(transaction_type)
        .fetch_one(&self.pool)
        .await
        .map_err(AppError::Database)
    }

    /// Marks the original transaction REVERSED within the reversal's unit of
    /// work.
    pub async fn mark_reversed(
        &self,
        tx: &mut DbTransaction<'_, Postgres>,
        id: Uuid,
    ) -> Result<Transaction> {
        sqlx::query_as::<_, Transaction>(
            r#"
            UPDATE transactions
            SET status = 'REVERSED'
            WHERE id = $1 AND status = 'COMPLETED'
            RETURNING id, from_account_id, to_account_id, amount, currency, transaction_type,
                      status, idempotency_key, reference_id, description, created_at, completed_at
            "#,
        )
        .bind(id)
        .fetch_optional(&mut **tx)
        .await
        .map_err(AppError::Database)?
        .ok_or_else(|| AppError::Validation(format!("transaction {id} is not in a reversible state")))
    }

    /// Returns one page of an account's history alongside the true total
    /// count across the full filter, computed via a separate aggregation
    /// query rather than the page length.
    pub async fn find_by_account(
        &self,
        account_id: Uuid,
        start_date: Option<DateTime<Utc>>,
        end_date: Option<DateTime<Utc>>,
        limit: i64,
        offset: i64,
    ) -> Result<(Vec<Transaction>, i64)> {
        let rows = sqlx::query_as::<_, Transaction>(
            r#"
            SELECT id, from_account_id, to_account_id, amount, currency, transaction_type,
                   status, idempotency_key, reference_id, description, created_at, completed_at
            FROM transactions
            WHERE (from_account_id = $1 OR to_account_id = $1)
              AND ($2::timestamptz IS NULL OR created_at >= $2)
              AND ($3::timestamptz IS NULL OR created_at <= $3)
            ORDER BY created_at DESC
            LIMIT $4 OFFSET $5
            "#,
        )
        .bind(account_id)
        .bind(start_date)
        .bind(end_date)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await
        .map_err(AppError::Database)?;

        let (total_count,): (i64,) = sqlx::query_as(
            r#"
            SELECT COUNT(*)
            FROM transactions
            WHERE (from_account_id = $1 OR to_account_id = $1)
              AND ($2::timestamptz IS NULL OR created_at >= $2)
              AND ($3::timestamptz IS NULL OR created_at <= $3)
            "#,
        )
        .bind(account_id)
        .bind(start_date)
        .bind(end_date)
        .fetch_one(&self.pool)
        .await
        .map_err(AppError::Database)?;

        Ok((rows, total_count))
    }

    pub async fn count_by_status(&self, status: TransactionStatus) -> Result<i64> {
        let row: (i64,) = sqlx::query_as(
            r#"
            SELECT COUNT(*)
            FROM transactions
            WHERE status = $1
            "#,
        )
        .bind(status)
        .fetch_one(&self.pool)
        .await
        .map_err(AppError::Database)?;

        Ok(row.0)
    }
}
