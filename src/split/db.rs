//! Database operations for splits.
//!
//! Splits are only ever written together with their parent transaction, see
//! [crate::transaction::create_transaction_with_splits].

use rusqlite::{Connection, Row};
use rust_decimal::Decimal;
use serde::Serialize;

use crate::{
    Error,
    database_id::{DatabaseId, TransactionId},
    money::{get_decimal, to_sql_text},
    split::Share,
    user::UserID,
};

/// A member's stored share of a transaction.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Split {
    /// The ID of the split.
    pub id: DatabaseId,
    /// The transaction this split belongs to.
    pub transaction_id: TransactionId,
    /// The member that owes this share.
    pub user_id: UserID,
    /// The amount owed.
    pub amount: Decimal,
    /// The share of the transaction's total, between 0 and 100.
    pub percentage: Decimal,
}

/// Create the split table.
///
/// Splits are deleted together with their transaction.
///
/// # Errors
/// Returns an error if the table cannot be created or if there is an SQL error.
pub fn create_split_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute_batch(
        "CREATE TABLE IF NOT EXISTS split (
            id INTEGER PRIMARY KEY,
            transaction_id INTEGER NOT NULL,
            user_id INTEGER NOT NULL,
            amount TEXT NOT NULL,
            percentage TEXT NOT NULL,
            FOREIGN KEY(transaction_id) REFERENCES \"transaction\"(id) ON UPDATE CASCADE ON DELETE CASCADE,
            FOREIGN KEY(user_id) REFERENCES user(id) ON UPDATE CASCADE ON DELETE CASCADE
        );

        CREATE INDEX IF NOT EXISTS idx_split_transaction ON split(transaction_id);",
    )?;

    Ok(())
}

/// Insert `shares` as the splits of `transaction_id`.
///
/// The caller is expected to run this inside the same SQL transaction that
/// created the parent row, so that a failure part way through leaves no splits
/// behind.
///
/// # Errors
/// Returns [Error::SqlError] if any insert fails.
pub fn create_splits(
    transaction_id: TransactionId,
    shares: &[Share],
    connection: &Connection,
) -> Result<Vec<Split>, Error> {
    let mut statement = connection.prepare(
        "INSERT INTO split (transaction_id, user_id, amount, percentage)
         VALUES (?1, ?2, ?3, ?4)
         RETURNING id, transaction_id, user_id, amount, percentage",
    )?;

    shares
        .iter()
        .map(|share| {
            statement
                .query_row(
                    (
                        transaction_id,
                        share.user_id.as_i64(),
                        to_sql_text(share.amount),
                        to_sql_text(share.percentage),
                    ),
                    map_split_row,
                )
                .map_err(|error| error.into())
        })
        .collect()
}

/// Get the splits of a transaction in insertion order.
pub fn get_splits_for_transaction(
    transaction_id: TransactionId,
    connection: &Connection,
) -> Result<Vec<Split>, Error> {
    connection
        .prepare(
            "SELECT id, transaction_id, user_id, amount, percentage
             FROM split WHERE transaction_id = :transaction_id ORDER BY id ASC",
        )?
        .query_map(&[(":transaction_id", &transaction_id)], map_split_row)?
        .map(|maybe_split| maybe_split.map_err(|error| error.into()))
        .collect()
}

fn map_split_row(row: &Row) -> Result<Split, rusqlite::Error> {
    Ok(Split {
        id: row.get(0)?,
        transaction_id: row.get(1)?,
        user_id: UserID::new(row.get(2)?),
        amount: get_decimal(row, 3)?,
        percentage: get_decimal(row, 4)?,
    })
}
