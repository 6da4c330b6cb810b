pub mod account_service;
pub mod double_entry_engine;
pub mod payment_engine;

pub use account_service::AccountService;
pub use double_entry_engine::{DoubleEntryEngine, TransferRequest, TransferResult};
pub use payment_engine::{PaymentEngine, ReversalCommand, TransactionPage, TransferCommand};
