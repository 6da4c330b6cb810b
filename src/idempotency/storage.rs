use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::PgPool;

use crate::error::{AppError, Result};

/// Durable idempotency record. `key` is the caller-chosen idempotency key
/// and is the row's primary key; `response_data` is opaque JSON the engine
/// replays verbatim on a retry.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct IdempotencyRecord {
    pub key: String,
    pub transaction_id: Option<uuid::Uuid>,
    pub request_hash: Option<String>,
    pub response_data: Value,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl IdempotencyRecord {
    pub fn new(
        key: String,
        transaction_id: Option<uuid::Uuid>,
        response_data: Value,
        request_hash: Option<String>,
        ttl_seconds: i64,
    ) -> Self {
        let now = Utc::now();
        Self {
            key,
            transaction_id,
            request_hash,
            response_data,
            created_at: now,
            expires_at: now + Duration::seconds(ttl_seconds),
        }
    }

    pub fn is_expired(&self) -> bool {
        Utc::now() > self.expires_at
    }

    /// Seconds remaining until expiry, floored at zero. Used to repopulate
    /// the cache tier with the record's *remaining* TTL rather than the full
    /// configured window.
    pub fn remaining_ttl_seconds(&self) -> u64 {
        (self.expires_at - Utc::now()).num_seconds().max(0) as u64
    }
}

/// PostgreSQL-backed idempotency store. The authoritative tier: a record
/// here exists independent of whatever the cache tier currently holds.
pub struct PostgresIdempotencyStore {
    pool: PgPool,
}

impl PostgresIdempotencyStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Inserts a record. A unique-key violation means a racing writer stored
    /// this key first; the manager's invariant ("no record, or one stable
    /// record") means the caller should treat that as a duplicate rather
    /// than an error.
    pub async fn insert(&self, record: &IdempotencyRecord) -> Result<()> {
        let result = sqlx::query(
            r#"
            INSERT INTO idempotency_keys
                (key, transaction_id, request_hash, response_data, created_at, expires_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(&record.key)
        .bind(record.transaction_id)
        .bind(&record.request_hash)
        .bind(&record.response_data)
        .bind(record.created_at)
        .bind(record.expires_at)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(sqlx::Error::Database(db_err)) if db_err.code().as_deref() == Some("23505") => Ok(()),
            Err(e) => Err(AppError::Database(e)),
        }
    }

    /// Finds a non-expired record by key. Expiry is enforced lazily by
    /// filtering on `expires_at > now`; a physically expired row is treated
    /// as absent without being deleted on the read path.
    pub async fn find_live(&self, key: &str) -> Result<Option<IdempotencyRecord>> {
        sqlx::query_as::<_, IdempotencyRecord>(
            r#"
            SELECT key, transaction_id, request_hash, response_data, created_at, expires_at
            FROM idempotency_keys
            WHERE key = $1 AND expires_at > NOW()
            "#,
        )
        .bind(key)
        .fetch_optional(&self.pool)
        .await
        .map_err(AppError::Database)
    }

    /// Physical sweep of rows past `expires_at`, for the optional background
    /// cleanup job. The sweep is a housekeeping convenience; its absence
    /// changes nothing about correctness since lookups already filter by
    /// expiry.
    pub async fn delete_expired(&self) -> Result<u64> {
        let result = sqlx::query("DELETE FROM idempotency_keys WHERE expires_at <= NOW()")
            .execute(&self.pool)
            .await
            .map_err(AppError::Database)?;
        Ok(result.rows_affected())
    }
}
