use rust_decimal::Decimal;
use sqlx::{PgPool, Postgres, Transaction as DbTransaction};
use uuid::Uuid;

use crate::error::{AppError, Result};
use crate::models::LedgerEntry;

/// Repository for the append-only journal (TransactionEntry rows).
pub struct LedgerRepository {
    pool: PgPool,
}

impl LedgerRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Writes one journal line within an open unit of work.
    pub async fn create(
        &self,
        tx: &mut DbTransaction<'_, Postgres>,
        entry: &LedgerEntry,
    ) -> Result<LedgerEntry> {
        sqlx::query_as::<_, LedgerEntry>(
            r#"
            INSERT INTO ledger_entries (id, transaction_id, account_id, entry_type, amount, currency, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING id, transaction_id, account_id, entry_type, amount, currency, created_at
            "#,
        )
        .bind(entry.id)
        .bind(entry.transaction_id)
        .bind(entry.account_id)
        .bind(entry.entry_type)
        .bind(entry.amount)
        .bind(entry.currency)
        .bind(entry.created_at)
        .fetch_one(&mut **tx)
        .await
        .map_err(AppError::Database)
    }

    /// Writes the DEBIT+CREDIT pair for a transfer within an open unit of
    /// work.
    pub async fn create_pair(
        &self,
        tx: &mut DbTransaction<'_, Postgres>,
        debit: &LedgerEntry,
        credit: &LedgerEntry,
    ) -> Result<(LedgerEntry, LedgerEntry)> {
        let debit_row = self.create(tx, debit).await?;
        let credit_row = self.create(tx, credit).await?;
        Ok((debit_row, credit_row))
    }

    pub async fn find_by_transaction(&self, transaction_id: Uuid) -> Result<Vec<LedgerEntry>> {
        sqlx::query_as::<_, LedgerEntry>(
            r#"
            SELECT id, transaction_id, account_id, entry_type, amount, currency, created_at
            FROM ledger_entries
            WHERE transaction_id = $1
            ORDER BY created_at
            "#,
        )
        .bind(transaction_id)
        .fetch_all(&self.pool)
        .await
        .map_err(AppError::Database)
    }

    pub async fn find_by_account(
        &self,
        account_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<LedgerEntry>> {
        sqlx::query_as::<_, LedgerEntry>(
            r#"
            SELECT id, transaction_id, account_id, entry_type, amount, currency, created_at
            FROM ledger_entries
            WHERE account_id = $1
            ORDER BY created_at DESC
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(account_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await
        .map_err(AppError::Database)
    }

    /// Verifies the double-entry invariant that summed DEBIT equals summed
    /// CREDIT for a transaction's journal lines.
    pub async fn verify_transaction_balance(&self, transaction_id: Uuid) -> Result<bool> {
        let row: (Decimal, Decimal) = sqlx::query_as(
            r#"
            SELECT
                COALESCE(SUM(CASE WHEN entry_type = 'DEBIT' THEN amount ELSE 0 END), 0) as debits,
                COALESCE(SUM(CASE WHEN entry_type = 'CREDIT' THEN amount ELSE 0 END), 0) as credits
            FROM ledger_entries
            WHERE transaction_id = $1
            "#,
        )
        .bind(transaction_id)
        .fetch_one(&self.pool)
        .await
        .map_err(AppError::Database)?;

        Ok(row.0 == row.1)
    }
}
