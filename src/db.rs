//! Sets up the application's database schema.

use rusqlite::{Connection, Transaction as SqlTransaction, TransactionBehavior};

use crate::{
    Error, category::create_category_table, family::create_family_tables,
    split::create_split_table, transaction::create_transaction_table, user::create_user_table,
};

/// Create the tables for all the domain models.
///
/// Foreign key enforcement is switched on for `connection`, which splits rely
/// on to be deleted along with their transaction.
///
/// # Errors
/// Returns an error if a table cannot be created or there is some other SQL error.
pub fn initialize(connection: &Connection) -> Result<(), Error> {
    // Has no effect inside a transaction, so it must come first.
    connection.pragma_update(None, "foreign_keys", true)?;

    let transaction = SqlTransaction::new_unchecked(connection, TransactionBehavior::Exclusive)?;

    create_user_table(&transaction)?;
    create_family_tables(&transaction)?;
    create_category_table(&transaction)?;
    create_transaction_table(&transaction)?;
    create_split_table(&transaction)?;

    transaction.commit()?;

    Ok(())
}
