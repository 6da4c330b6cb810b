use std::sync::Arc;

use sqlx::{PgPool, Postgres, Transaction as DbTransaction};
use uuid::Uuid;

use crate::cache::BalanceCache;
use crate::config::CacheSettings;
use crate::error::{AppError, Result};
use crate::models::{Account, AccountStatus, AuditLog, Currency, Money};
use crate::repositories::{AccountRepository, AuditRepository};

/// Account lifecycle and balance mutation. Balance mutation only ever
/// happens through [`Self::update_balance`] inside a unit of work the
/// caller already holds a lock for; this service never opens its own.
#[derive(Clone)]
pub struct AccountService {
    pool: PgPool,
    account_repo: AccountRepository,
    audit_repo: AuditRepository,
    balance_cache: BalanceCache,
}

impl AccountService {
    pub fn new(pool: PgPool, cache_adapter: Arc<dyn crate::cache::CacheAdapter>, cache_settings: CacheSettings) -> Self {
        Self {
            account_repo: AccountRepository::new(pool.clone()),
            audit_repo: AuditRepository::new(pool.clone()),
            balance_cache: BalanceCache::new(cache_adapter, cache_settings),
            pool,
        }
    }

    /// Creates an account with status ACTIVE and the given (or zero)
    /// starting balance; writes an `ACCOUNT_CREATED` audit row.
    pub async fn create(&self, user_id: Uuid, currency: Currency, initial_balance: Option<Money>) -> Result<Account> {
        let account = Account::new(user_id, currency, initial_balance)?;
        let created = self.account_repo.create(&account).await?;

        let mut tx = self.pool.begin().await.map_err(AppError::Database)?;
        let log = AuditLog::new(
            None,
            Some(created.id),
            "ACCOUNT_CREATED",
            None,
            Some(created.balance),
            None,
        );
        self.audit_repo.create(&mut tx, &log).await?;
        tx.commit().await.map_err(AppError::Database)?;

        Ok(created)
    }

    /// Non-locking read. Fails `InvalidAccount` if missing.
    pub async fn get(&self, id: Uuid) -> Result<Account> {
        self.account_repo
            .find_by_id(id)
            .await?
            .ok_or_else(|| AppError::InvalidAccount(format!("account {id} not found")))
    }

    /// Locked read inside the caller's open unit of work. Fails
    /// `InvalidAccount` if missing, `AccountSuspended` if not ACTIVE.
    /// Callers locking two accounts must always call this in ascending
    /// `account_id` order.
    pub async fn get_for_update(&self, tx: &mut DbTransaction<'_, Postgres>, id: Uuid) -> Result<Account> {
        let account = self
            .account_repo
            .find_for_update(tx, id)
            .await?
            .ok_or_else(|| AppError::InvalidAccount(format!("account {id} not found")))?;

        if account.status != AccountStatus::Active {
            return Err(AppError::AccountSuspended(format!(
                "account {id} is {:?}",
                account.status
            )));
        }

        Ok(account)
    }

    pub async fn list_by_user(&self, user_id: Uuid, currency: Option<Currency>) -> Result<Vec<Account>> {
        self.account_repo.list_by_user(user_id, currency).await
    }

    /// Returns the current balance, served from cache when fresh
    /// (TTL ≤ 300s); falls back to the database only on a cache miss.
    pub async fn get_balance(&self, id: Uuid) -> Result<Money> {
        if let Some((cached, _version)) = self.balance_cache.get_any(id).await {
            return Ok(cached);
        }

        let account = self.get(id).await?;
        let balance = account.money_balance();
        self.balance_cache.set(id, balance, account.version).await;
        Ok(balance)
    }

    /// Writes a new balance within the caller's open unit of work,
    /// incrementing `version`; writes a `BALANCE_UPDATED` audit row and
    /// invalidates the cached balance/account entries. The caller must
    /// already hold the row lock via [`Self::get_for_update`].
    pub async fn update_balance(
        &self,
        tx: &mut DbTransaction<'_, Postgres>,
        id: Uuid,
        new_balance: Money,
        old_balance: Money,
        expected_version: i32,
        actor_user_id: Option<Uuid>,
    ) -> Result<Account> {
        let updated = self
            .account_repo
            .update_balance(tx, id, new_balance.to_storage().amount(), expected_version)
            .await?;

        let log = AuditLog::new(
            None,
            Some(id),
            "BALANCE_UPDATED",
            Some(old_balance.to_storage().amount()),
            Some(new_balance.to_storage().amount()),
            actor_user_id,
        );
        self.audit_repo.create(tx, &log).await?;

        self.balance_cache.invalidate(id).await;

        Ok(updated)
    }

    /// Administrative mutator: marks an account SUSPENDED. Not reachable
    /// from the transfer path.
    pub async fn suspend(&self, id: Uuid, actor_user_id: Option<Uuid>) -> Result<Account> {
        self.transition_status(id, AccountStatus::Suspended, "ACCOUNT_SUSPENDED", actor_user_id)
            .await
    }

    /// Administrative mutator: lifts a SUSPENDED account back to ACTIVE.
    pub async fn reactivate(&self, id: Uuid, actor_user_id: Option<Uuid>) -> Result<Account> {
        self.transition_status(id, AccountStatus::Active, "ACCOUNT_REACTIVATED", actor_user_id)
            .await
    }

    /// Administrative mutator: permanently marks an account CLOSED.
    pub async fn close(&self, id: Uuid, actor_user_id: Option<Uuid>) -> Result<Account> {
        self.transition_status(id, AccountStatus::Closed, "ACCOUNT_CLOSED", actor_user_id)
            .await
    }

    async fn transition_status(
        &self,
        id: Uuid,
        status: AccountStatus,
        action: &str,
        actor_user_id: Option<Uuid>,
    ) -> Result<Account> {
        let updated = self
            .account_repo
            .update_status(id, status)
            .await?
            .ok_or_else(|| AppError::InvalidAccount(format!("account {id} not found")))?;

        let mut tx = self.pool.begin().await.map_err(AppError::Database)?;
        let log = AuditLog::new(None, Some(id), action, None, None, actor_user_id);
        self.audit_repo.create(&mut tx, &log).await?;
        tx.commit().await.map_err(AppError::Database)?;

        self.balance_cache.invalidate(id).await;

        Ok(updated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn account_new_defaults_to_active_zero_balance() {
        let account = Account::new(Uuid::new_v4(), Currency::USD, None).unwrap();
        assert_eq!(account.status, AccountStatus::Active);
        assert_eq!(account.balance, dec!(0));
    }
}
