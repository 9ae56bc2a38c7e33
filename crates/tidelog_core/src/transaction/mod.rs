//! Transactions.
//!
//! A transaction records its changes as intents for undo. Log records are
//! built separately by the worker and submitted through its backend logger;
//! the transaction manager only adds the begin/commit/abort markers.

mod manager;
mod state;

pub use manager::{TransactionManager, TxnIdAllocator};
pub use state::{Intent, IntentKind, Transaction, TransactionState};
