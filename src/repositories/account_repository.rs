use sqlx::{PgPool, Postgres, Transaction as DbTransaction};
use uuid::Uuid;

use crate::error::{AppError, Result};
use crate::models::{Account, AccountStatus, Currency};

/// Repository for Account persistence. Locked reads go through a caller-
/// supplied `sqlx::Transaction` so the Payment Engine can hold the row lock
/// across the full unit of work.
#[derive(Clone)]
pub struct AccountRepository {
    pool: PgPool,
}

impl AccountRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn create(&self, account: &Account) -> Result<Account> {
        sqlx::query_as::<_, Account>(
            r#"
            INSERT INTO accounts (id, user_id, currency, balance, status, version, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING id, user_id, currency, balance, status, version, created_at, updated_at
            "#,
        )
        .bind(account.id)
        .bind(account.user_id)
        .bind(account.currency)
        .bind(account.balance)
        .bind(account.status)
        .bind(account.version)
        .bind(account.created_at)
        .bind(account.updated_at)
        .fetch_one(&self.pool)
        .await
        .map_err(AppError::Database)
    }

    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<Account>> {
        sqlx::query_as::<_, Account>(
            r#"
            SELECT id, user_id, currency, balance, status, version, created_at, updated_at
            FROM accounts
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(AppError::Database)
    }

    /// Locks and returns an account row for update within an open unit of
    /// work. Callers acquiring locks on two accounts must always invoke
    /// this in ascending `account_id` order to avoid deadlock.
    pub async fn find_for_update(
        &self,
        tx: &mut DbTransaction<'_, Postgres>,
        id: Uuid,
    ) -> Result<Option<Account>> {
        sqlx::query_as::<_, Account>(
            r#"
            SELECT id, user_id, currency, balance, status, version, created_at, updated_at
            FROM accounts
            WHERE id = $1
            FOR UPDATE
            "#,
        )
        .bind(id)
        .fetch_optional(&mut **tx)
        .await
        .map_err(AppError::Database)
    }

    pub async fn list_by_user(&self, user_id: Uuid, currency: Option<Currency>) -> Result<Vec<Account>> {
        sqlx::query_as::<_, Account>(
            r#"
            SELECT id, user_id, currency, balance, status, version, created_at, updated_at
            FROM accounts
            WHERE user_id = $1
              AND ($2::varchar IS NULL OR currency = $2)
            ORDER BY created_at DESC
            "#,
        )
        .bind(user_id)
        .bind(currency)
        .fetch_all(&self.pool)
        .await
        .map_err(AppError::Database)
    }

    /// Writes a new balance and increments `version` within an open unit of
    /// work. The caller must have already locked the row via
    /// [`Self::find_for_update`]; `expected_version` guards against a
    /// concurrent writer having slipped in between the lock and this write.
    pub async fn update_balance(
        &self,
        tx: &mut DbTransaction<'_, Postgres>,
        id: Uuid,
        new_balance: rust_decimal::Decimal,
        expected_version: i32,
    ) -> Result<Account> {
        sqlx::query_as::<_, Account>(
            r#"
            UPDATE accounts
            SET balance = $3, version = version + 1, updated_at = NOW()
            WHERE id = $1 AND version = $2
            RETURNING id, user_id, currency, balance, status, version, created_at, updated_at
            "#,
        )
        .bind(id)
        .bind(expected_version)
        .bind(new_balance)
        .fetch_optional(&mut **tx)
        .await
        .map_err(AppError::Database)?
        .ok_or_else(|| AppError::ConcurrentModification(format!("account {id} changed underneath this transfer")))
    }

    pub async fn update_status(&self, id: Uuid, status: AccountStatus) -> Result<Option<Account>> {
        sqlx::query_as::<_, Account>(
            r#"
            UPDATE accounts
            SET status = $2, updated_at = NOW()
            WHERE id = $1
            RETURNING id, user_id, currency, balance, status, version, created_at, updated_at
            "#,
        )
        .bind(id)
        .bind(status)
        .fetch_optional(&self.pool)
        .await
        .map_err(AppError::Database)
    }
}
