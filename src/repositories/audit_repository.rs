use sqlx::{PgPool, Postgres, Transaction as DbTransaction};
use uuid::Uuid;

use crate::error::{AppError, Result};
use crate::models::AuditLog;

/// Repository for the append-only audit trail.
#[derive(Clone)]
pub struct AuditRepository {
    pool: PgPool,
}

impl AuditRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Writes an audit row within an open unit of work, so it commits or
    /// rolls back atomically with the mutation it describes.
    pub async fn create(
        &self,
        tx: &mut DbTransaction<'_, Postgres>,
        log: &AuditLog,
    ) -> Result<AuditLog> {
        sqlx::query_as::<_, AuditLog>(
            r#"
            INSERT INTO audit_logs
                (id, transaction_id, account_id, action, old_balance, new_balance,
                 user_id, ip_address, user_agent, extra_data, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            RETURNING id, transaction_id, account_id, action, old_balance, new_balance,
                      user_id, ip_address, user_agent, extra_data, created_at
            "#,
        )
        .bind(log.id)
        .bind(log.transaction_id)
        .bind(log.account_id)
        .bind(&log.action)
        .bind(log.old_balance)
        .bind(log.new_balance)
        .bind(log.user_id)
        .bind(&log.ip_address)
        .bind(&log.user_agent)
        .bind(&log.extra_data)
        .bind(log.created_at)
        .fetch_one(&mut **tx)
        .await
        .map_err(AppError::Database)
    }

    pub async fn find_by_account(&self, account_id: Uuid, limit: i64) -> Result<Vec<AuditLog>> {
        sqlx::query_as::<_, AuditLog>(
            r#"
            SELECT id, transaction_id, account_id, action, old_balance, new_balance,
                   user_id, ip_address, user_agent, extra_data, created_at
            FROM audit_logs
            WHERE account_id = $1
            ORDER BY created_at DESC
            LIMIT $2
            "#,
        )
        .bind(account_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(AppError::Database)
    }

    pub async fn find_by_transaction(&self, transaction_id: Uuid) -> Result<Vec<AuditLog>> {
        sqlx::query_as::<_, AuditLog>(
            r#"
            SELECT id, transaction_id, account_id, action, old_balance, new_balance,
                   user_id, ip_address, user_agent, extra_data, created_at
            FROM audit_logs
            WHERE transaction_id = $1
            ORDER BY created_at
            "#,
        )
        .bind(transaction_id)
        .fetch_all(&self.pool)
        .await
        .map_err(AppError::Database)
    }
}
