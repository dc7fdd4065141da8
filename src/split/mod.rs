//! Split allocation for shared family transactions.
//!
//! This module contains:
//! - The split strategies and the pure allocator that turns a total into shares
//! - Database functions for storing and reading the splits of a transaction

mod allocator;
mod db;

pub use allocator::{
    ManualInput, PercentageInput, Share, SplitStrategy, SplitType, allocate,
};
pub use db::{Split, create_split_table, create_splits, get_splits_for_transaction};
