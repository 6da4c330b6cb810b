use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::{AppError, Result};
use crate::models::{Account, LedgerEntry, Money, Transaction};
use crate::repositories::{AuditRepository, LedgerRepository, TransactionRepository};
use crate::services::account_service::AccountService;

/// The two accounts and amount a transfer moves between. Idempotency and
/// amount-sign checks happen one layer up, in the Payment Engine; this
/// struct only carries what the locked unit of work itself needs.
#[derive(Debug, Clone)]
pub struct TransferRequest {
    pub from_id: Uuid,
    pub to_id: Uuid,
    pub amount: Money,
    pub idempotency_key: String,
    pub description: Option<String>,
    pub reference_id: Option<String>,
    pub actor_user_id: Option<Uuid>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    /// Set when this transfer compensates a prior COMPLETED transaction.
    /// The engine guards and flips that transaction to REVERSED in the
    /// same unit of work as the compensating balance move, and records
    /// this transfer itself as type REVERSAL instead of TRANSFER.
    pub reversal_of: Option<Uuid>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferResult {
    pub transaction: Transaction,
    pub debit_entry: LedgerEntry,
    pub credit_entry: LedgerEntry,
    pub from_account: Account,
    pub to_account: Account,
}

/// Executes one double-entry transfer inside a single unit of work: lock
/// acquisition, currency/funds checks, balance mutation, journal, and audit
/// rows. Idempotency is the orchestrating Payment Engine's responsibility;
/// this only ever runs the parts that need the two locked rows in scope at
/// once, and commits atomically with whatever else that unit of work does
/// (e.g. retargeting a reversed transaction's status).
pub struct DoubleEntryEngine {
    pool: PgPool,
    account_service: AccountService,
    ledger_repo: LedgerRepository,
    transaction_repo: TransactionRepository,
    audit_repo: AuditRepository,
}

impl DoubleEntryEngine {
    pub fn new(pool: PgPool, account_service: AccountService) -> Self {
        Self {
            ledger_repo: LedgerRepository::new(pool.clone()),
            transaction_repo: TransactionRepository::new(pool.clone()),
            audit_repo: AuditRepository::new(pool.clone()),
            account_service,
            pool,
        }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Locks both accounts, validates currency and funds, mutates both
    /// balances, writes the journal pair and audit rows, and finalizes a
    /// COMPLETED transaction — all inside one unit of work. When
    /// `request.reversal_of` is set, the same unit of work also guards and
    /// flips that original transaction to REVERSED, so the compensating
    /// move and the original's status change commit or roll back together.
    pub async fn execute_transfer(&self, request: TransferRequest) -> Result<TransferResult> {
        let TransferRequest {
            from_id,
            to_id,
            amount,
            idempotency_key,
            description,
            reference_id,
            actor_user_id,
            ip_address,
            user_agent,
            reversal_of,
        } = request;

        let mut tx = self.pool.begin().await.map_err(AppError::Database)?;

        // If this transfer is a reversal, guard and flip the original to
        // REVERSED first. The `WHERE status = 'COMPLETED'` update takes the
        // row lock, so two concurrent reversals of the same original
        // serialize here: only the first to reach this point proceeds, the
        // second fails before ever touching an account.
        if let Some(original_id) = reversal_of {
            self.transaction_repo.mark_reversed(&mut tx, original_id).await?;
        }

        // Lock both accounts in ascending id order regardless of transfer
        // direction, to prevent deadlock between symmetric A->B and B->A
        // transfers.
        let (first_id, second_id) = if from_id <= to_id { (from_id, to_id) } else { (to_id, from_id) };
        let first = self.account_service.get_for_update(&mut tx, first_id).await?;
        let second = self.account_service.get_for_update(&mut tx, second_id).await?;
        let (from_account, to_account) = if first.id == from_id {
            (first, second)
        } else {
            (second, first)
        };

        // Currency consistency.
        if from_account.currency != to_account.currency || from_account.currency != amount.currency() {
            return Err(AppError::CurrencyMismatch(format!(
                "from={} to={} amount={}",
                from_account.currency,
                to_account.currency,
                amount.currency()
            )));
        }

        // Funds check.
        let from_balance = from_account.money_balance();
        if from_balance.lt(&amount).unwrap_or(true) {
            return Err(AppError::InsufficientFunds(format!(
                "account {from_id} balance {from_balance} is less than {amount}"
            )));
        }

        // Compute new balances.
        let to_balance = to_account.money_balance();
        let new_from_balance = from_balance.sub(&amount)?;
        let new_to_balance = to_balance.add(&amount)?;

        // Create the PENDING transaction row, tagged REVERSAL when
        // compensating a prior transaction and TRANSFER otherwise. A unique
        // violation on idempotency_key converts to DuplicateTransaction.
        let pending = if reversal_of.is_some() {
            Transaction::new_reversal(
                from_id,
                to_id,
                amount.to_storage().amount(),
                amount.currency(),
                idempotency_key,
                reference_id,
                description,
            )
        } else {
            Transaction::new_transfer(
                from_id,
                to_id,
                amount.to_storage().amount(),
                amount.currency(),
                idempotency_key,
                reference_id,
                description,
            )
        };
        self.transaction_repo.create_pending(&mut tx, &pending).await?;

        // Mutate both balances.
        let updated_from = self
            .account_service
            .update_balance(&mut tx, from_id, new_from_balance, from_balance, from_account.version, actor_user_id)
            .await?;
        let updated_to = self
            .account_service
            .update_balance(&mut tx, to_id, new_to_balance, to_balance, to_account.version, actor_user_id)
            .await?;

        // Journal pair.
        let debit = LedgerEntry::debit(pending.id, from_id, amount.to_storage().amount(), amount.currency());
        let credit = LedgerEntry::credit(pending.id, to_id, amount.to_storage().amount(), amount.currency());
        let (debit_entry, credit_entry) = self.ledger_repo.create_pair(&mut tx, &debit, &credit).await?;

        // Audit rows for the transfer, distinct from the BALANCE_UPDATED
        // rows AccountService::update_balance already wrote.
        let debit_log = crate::models::AuditLog::new(
            Some(pending.id),
            Some(from_id),
            "TRANSFER_DEBIT",
            Some(from_balance.to_storage().amount()),
            Some(new_from_balance.to_storage().amount()),
            actor_user_id,
        )
        .with_request_context(ip_address.clone(), user_agent.clone());
        self.audit_repo.create(&mut tx, &debit_log).await?;

        let credit_log = crate::models::AuditLog::new(
            Some(pending.id),
            Some(to_id),
            "TRANSFER_CREDIT",
            Some(to_balance.to_storage().amount()),
            Some(new_to_balance.to_storage().amount()),
            actor_user_id,
        )
        .with_request_context(ip_address, user_agent);
        self.audit_repo.create(&mut tx, &credit_log).await?;

        // Finalize to COMPLETED.
        let completed = self.transaction_repo.complete(&mut tx, pending.id).await?;

        tx.commit().await.map_err(AppError::Database)?;

        Ok(TransferResult {
            transaction: completed,
            debit_entry,
            credit_entry,
            from_account: updated_from,
            to_account: updated_to,
        })
    }
}
