//! Ledger engine: accounts, categories, scheduled transactions and the
//! balance-mutating transaction core.
//!
//! Everything that changes an account balance goes through the ledger
//! mutation unit in [`ops`]; occurrence dates come from the pure evaluator
//! in [`recurrence`].

pub use accounts::Account;
pub use categories::Category;
pub use error::EngineError;
pub use ops::{
    Engine, EngineBuilder, Limits, NewScheduleCmd, NewTransactionCmd, ScheduledEntry,
};
pub use recurrence::{Frequency, Occurrences, RecurrenceRule};
pub use scheduled_transactions::ScheduledTransaction;
pub use transactions::Transaction;

pub mod accounts;
pub mod categories;
mod error;
mod ops;
pub mod recurrence;
pub mod scheduled_transactions;
pub mod transactions;
pub mod users;

type ResultEngine<T> = Result<T, EngineError>;
