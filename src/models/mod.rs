pub mod account;
pub mod audit_log;
pub mod currency;
pub mod ledger_entry;
pub mod money;
pub mod transaction;

pub use account::{Account, AccountStatus};
pub use audit_log::AuditLog;
pub use currency::Currency;
pub use ledger_entry::{sum_by_side, EntryType, LedgerEntry};
pub use money::Money;
pub use transaction::{Transaction, TransactionStatus, TransactionType};
