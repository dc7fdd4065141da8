//! Transaction management for the ledger.
//!
//! This module contains everything related to transactions:
//! - The `Transaction` model and `TransactionBuilder` for creating transactions
//! - Database functions for storing, querying, and managing transactions
//! - The writer that stores a transaction and its splits atomically
//! - JSON route handlers for the transaction API

mod core;
mod endpoints;
mod writer;

pub use core::{
    Transaction, TransactionBuilder, TransactionFilter, TransactionPatch, TransactionType,
    TransactionWithSplits, create_transaction, create_transaction_table, delete_transaction,
    get_transaction, get_transaction_by_local_id, get_transaction_details,
    get_transactions_for_user, map_transaction_row, update_transaction,
};
pub use endpoints::{
    TransactionState, create_transaction_endpoint, delete_transaction_endpoint,
    get_transaction_endpoint, list_transactions_endpoint, update_transaction_endpoint,
};
pub use writer::{
    CreateOutcome, NewTransaction, UpdatedTransaction, create_transaction_with_splits,
    get_transaction_for_user, list_transactions, remove_transaction, update_transaction_for_user,
};

#[cfg(test)]
pub use core::count_transactions;
