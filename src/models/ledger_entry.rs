use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::Currency;

/// Double-entry bookkeeping side. Every completed transaction produces
/// exactly one DEBIT line and one CREDIT line of equal amount.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "VARCHAR", rename_all = "UPPERCASE")]
#[serde(rename_all = "UPPERCASE")]
pub enum EntryType {
    Debit,
    Credit,
}

impl EntryType {
    pub fn opposite(&self) -> Self {
        match self {
            EntryType::Debit => EntryType::Credit,
            EntryType::Credit => EntryType::Debit,
        }
    }
}

/// A single journal line. Lines reference their transaction and account
/// without owning either, and are never updated once written.
#[derive(Debug, Clone, sqlx::FromRow, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub id: Uuid,
    pub transaction_id: Uuid,
    pub account_id: Uuid,
    pub entry_type: EntryType,
    pub amount: Decimal,
    pub currency: Currency,
    pub created_at: DateTime<Utc>,
}

impl LedgerEntry {
    fn new(
        transaction_id: Uuid,
        account_id: Uuid,
        entry_type: EntryType,
        amount: Decimal,
        currency: Currency,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            transaction_id,
            account_id,
            entry_type,
            amount,
            currency,
            created_at: Utc::now(),
        }
    }

    pub fn debit(transaction_id: Uuid, account_id: Uuid, amount: Decimal, currency: Currency) -> Self {
        Self::new(transaction_id, account_id, EntryType::Debit, amount, currency)
    }

    pub fn credit(transaction_id: Uuid, account_id: Uuid, amount: Decimal, currency: Currency) -> Self {
        Self::new(transaction_id, account_id, EntryType::Credit, amount, currency)
    }
}

/// Sums a set of entries on one side. The caller is expected to have
/// already filtered to a single currency; used to verify the double-entry
/// invariant that summed DEBIT equals summed CREDIT per transaction.
pub fn sum_by_side(entries: &[LedgerEntry], side: EntryType) -> Decimal {
    entries.iter().filter(|e| e.entry_type == side).map(|e| e.amount).sum()
}
