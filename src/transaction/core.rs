//! Defines the core data models and database queries for transactions.

use std::fmt::Display;

use rusqlite::{
    Connection, OptionalExtension, Row, ToSql,
    types::{FromSql, FromSqlError, FromSqlResult, ToSqlOutput, ValueRef},
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use time::Date;

use crate::{
    Error,
    database_id::{CategoryId, FamilyId, TransactionId},
    money::{get_decimal, to_sql_text},
    split::{Split, SplitType, get_splits_for_transaction},
    user::UserID,
};

// ============================================================================
// MODELS
// ============================================================================

/// Whether money was earned or spent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TransactionType {
    /// Money coming in.
    Income,
    /// Money going out.
    Expense,
}

impl TransactionType {
    fn as_str(&self) -> &'static str {
        match self {
            TransactionType::Income => "INCOME",
            TransactionType::Expense => "EXPENSE",
        }
    }
}

impl Display for TransactionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl ToSql for TransactionType {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for TransactionType {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        match value.as_str()? {
            "INCOME" => Ok(TransactionType::Income),
            "EXPENSE" => Ok(TransactionType::Expense),
            _ => Err(FromSqlError::InvalidType),
        }
    }
}

/// An expense or income, i.e. an event where money was either spent or earned.
///
/// To create a new `Transaction`, use [Transaction::build].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    /// The ID of the transaction.
    pub id: TransactionId,
    /// Whether the money was earned or spent.
    #[serde(rename = "type")]
    pub kind: TransactionType,
    /// The amount of money spent or earned, always positive.
    pub amount: Decimal,
    /// A text description of what the transaction was for.
    pub description: String,
    /// When the transaction happened.
    pub date: Date,
    /// The ID of the category the transaction belongs to.
    pub category_id: Option<CategoryId>,
    /// Whether the transaction only concerns its owner.
    pub is_personal: bool,
    /// The user that paid for or created the transaction.
    pub user_id: UserID,
    /// The family the transaction is shared with.
    pub family_id: Option<FamilyId>,
    /// How the amount was divided between family members, if it was.
    pub split_type: Option<SplitType>,
    /// The client-generated idempotency key.
    pub local_id: Option<String>,
}

impl Transaction {
    /// Create a new transaction.
    ///
    /// Shortcut for [TransactionBuilder] for discoverability.
    pub fn build(
        kind: TransactionType,
        amount: Decimal,
        date: Date,
        description: &str,
        user_id: UserID,
    ) -> TransactionBuilder {
        TransactionBuilder {
            kind,
            amount,
            date,
            description: description.to_owned(),
            user_id,
            category_id: None,
            is_personal: true,
            family_id: None,
            split_type: None,
            local_id: None,
        }
    }
}

/// A builder for creating [Transaction] instances.
///
/// # Examples
///
/// ```ignore
/// use rust_decimal_macros::dec;
/// use time::macros::date;
///
/// let builder = Transaction::build(
///         TransactionType::Expense,
///         dec!(45.99),
///         date!(2025 - 01 - 15),
///         "Groceries",
///         user_id,
///     )
///     .family_id(Some(family_id))
///     .is_personal(false);
/// ```
#[derive(Debug, PartialEq, Clone)]
pub struct TransactionBuilder {
    /// Whether the money was earned or spent.
    pub kind: TransactionType,
    /// The monetary amount of the transaction, always positive.
    pub amount: Decimal,
    /// The date when the transaction occurred.
    pub date: Date,
    /// A human-readable description of the transaction.
    pub description: String,
    /// The user that paid for or created the transaction.
    pub user_id: UserID,
    /// The category of the transaction, e.g. "Groceries", "Transport", "Rent".
    pub category_id: Option<CategoryId>,
    /// Whether the transaction only concerns its owner. Defaults to `true`.
    pub is_personal: bool,
    /// The family the transaction is shared with.
    pub family_id: Option<FamilyId>,
    /// The strategy used to split the amount.
    pub split_type: Option<SplitType>,
    /// Optional client-generated key used to deduplicate resubmissions.
    ///
    /// The database enforces uniqueness on this field.
    pub local_id: Option<String>,
}

impl TransactionBuilder {
    /// Set the category ID for the transaction.
    pub fn category_id(mut self, category_id: Option<CategoryId>) -> Self {
        self.category_id = category_id;
        self
    }

    /// Set whether the transaction is personal.
    pub fn is_personal(mut self, is_personal: bool) -> Self {
        self.is_personal = is_personal;
        self
    }

    /// Set the family the transaction is shared with.
    pub fn family_id(mut self, family_id: Option<FamilyId>) -> Self {
        self.family_id = family_id;
        self
    }

    /// Set the split strategy recorded on the transaction.
    pub fn split_type(mut self, split_type: Option<SplitType>) -> Self {
        self.split_type = split_type;
        self
    }

    /// Set the client local ID for the transaction.
    pub fn local_id(mut self, local_id: Option<String>) -> Self {
        self.local_id = local_id;
        self
    }
}

/// A transaction together with its splits and category name.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionWithSplits {
    /// The transaction.
    #[serde(flatten)]
    pub transaction: Transaction,
    /// The name of the transaction's category, if it has one.
    pub category_name: Option<String>,
    /// The member shares, empty for transactions that were not split.
    pub splits: Vec<Split>,
}

/// Field-level changes to an existing transaction. Unset fields are left as they are.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct TransactionPatch {
    /// The new transaction type.
    #[serde(rename = "type")]
    pub kind: Option<TransactionType>,
    /// The new amount.
    pub amount: Option<Decimal>,
    /// The new description.
    pub description: Option<String>,
    /// The new date.
    pub date: Option<Date>,
    /// The new category.
    pub category_id: Option<CategoryId>,
    /// The new personal flag.
    pub is_personal: Option<bool>,
}

/// Which of a user's transactions to list.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionFilter {
    /// Every transaction the user owns.
    #[default]
    All,
    /// Only transactions flagged as personal.
    Personal,
    /// Only transactions shared with a family.
    Family,
}

// ============================================================================
// DATABASE FUNCTIONS
// ============================================================================

const TRANSACTION_COLUMNS: &str = "id, type, amount, description, date, category_id, \
    is_personal, user_id, family_id, split_type, local_id";

/// Create a new transaction in the database from a builder.
///
/// # Errors
/// This function will return a:
/// - [Error::NotFound] if the user, family or category does not exist,
/// - [Error::Conflict] if a transaction with the same local ID already exists,
/// - or [Error::SqlError] if there is some other SQL error.
pub fn create_transaction(
    builder: TransactionBuilder,
    connection: &Connection,
) -> Result<Transaction, Error> {
    let transaction = connection
        .prepare(&format!(
            "INSERT INTO \"transaction\"
                (type, amount, description, date, category_id, is_personal, user_id, family_id, split_type, local_id)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
             RETURNING {TRANSACTION_COLUMNS}"
        ))?
        .query_row(
            (
                builder.kind,
                to_sql_text(builder.amount),
                &builder.description,
                builder.date,
                builder.category_id,
                builder.is_personal,
                builder.user_id.as_i64(),
                builder.family_id,
                builder.split_type,
                &builder.local_id,
            ),
            map_transaction_row,
        )
        .map_err(map_write_error)?;

    Ok(transaction)
}

fn map_write_error(error: rusqlite::Error) -> Error {
    match error {
        rusqlite::Error::SqliteFailure(
            rusqlite::ffi::Error {
                code: _,
                extended_code: rusqlite::ffi::SQLITE_CONSTRAINT_FOREIGNKEY,
            },
            _,
        ) => Error::NotFound,
        rusqlite::Error::SqliteFailure(
            rusqlite::ffi::Error {
                code: _,
                extended_code: rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE,
            },
            _,
        ) => Error::Conflict("a transaction with this local ID already exists".to_owned()),
        error => error.into(),
    }
}

/// Retrieve a transaction from the database by its `id`.
///
/// # Errors
/// This function will return a:
/// - [Error::NotFound] if `id` does not refer to a valid transaction,
/// - or [Error::SqlError] there is some other SQL error.
pub fn get_transaction(id: TransactionId, connection: &Connection) -> Result<Transaction, Error> {
    let transaction = connection
        .prepare(&format!(
            "SELECT {TRANSACTION_COLUMNS} FROM \"transaction\" WHERE id = :id"
        ))?
        .query_row(&[(":id", &id)], map_transaction_row)?;

    Ok(transaction)
}

/// Retrieve the transaction created with the client local ID `local_id`, if any.
pub fn get_transaction_by_local_id(
    local_id: &str,
    connection: &Connection,
) -> Result<Option<Transaction>, Error> {
    connection
        .prepare(&format!(
            "SELECT {TRANSACTION_COLUMNS} FROM \"transaction\" WHERE local_id = :local_id"
        ))?
        .query_row(&[(":local_id", &local_id)], map_transaction_row)
        .optional()
        .map_err(|error| error.into())
}

/// Get the transactions owned by `user_id`, newest first.
pub fn get_transactions_for_user(
    user_id: UserID,
    filter: TransactionFilter,
    connection: &Connection,
) -> Result<Vec<Transaction>, Error> {
    let filter_clause = match filter {
        TransactionFilter::All => "",
        TransactionFilter::Personal => "AND is_personal = 1",
        TransactionFilter::Family => "AND is_personal = 0 AND family_id IS NOT NULL",
    };

    connection
        .prepare(&format!(
            "SELECT {TRANSACTION_COLUMNS} FROM \"transaction\"
             WHERE user_id = :user_id {filter_clause}
             ORDER BY date DESC, id DESC"
        ))?
        .query_map(&[(":user_id", &user_id.as_i64())], map_transaction_row)?
        .map(|maybe_transaction| maybe_transaction.map_err(|error| error.into()))
        .collect()
}

/// Load the splits and category name of `transaction`.
pub fn get_transaction_details(
    transaction: Transaction,
    connection: &Connection,
) -> Result<TransactionWithSplits, Error> {
    let category_name = match transaction.category_id {
        Some(category_id) => connection
            .query_row(
                "SELECT name FROM category WHERE id = ?1",
                [category_id],
                |row| row.get(0),
            )
            .optional()?,
        None => None,
    };
    let splits = get_splits_for_transaction(transaction.id, connection)?;

    Ok(TransactionWithSplits {
        transaction,
        category_name,
        splits,
    })
}

/// Apply `patch` to `existing` and store the result.
///
/// Splits are not touched.
///
/// # Errors
/// This function will return a:
/// - [Error::NotFound] if the transaction or the new category does not exist,
/// - or [Error::SqlError] if there is some other SQL error.
pub fn update_transaction(
    existing: &Transaction,
    patch: TransactionPatch,
    connection: &Connection,
) -> Result<Transaction, Error> {
    connection
        .prepare(&format!(
            "UPDATE \"transaction\"
             SET type = ?1, amount = ?2, description = ?3, date = ?4, category_id = ?5, is_personal = ?6
             WHERE id = ?7
             RETURNING {TRANSACTION_COLUMNS}"
        ))?
        .query_row(
            (
                patch.kind.unwrap_or(existing.kind),
                to_sql_text(patch.amount.unwrap_or(existing.amount)),
                patch.description.as_deref().unwrap_or(&existing.description),
                patch.date.unwrap_or(existing.date),
                patch.category_id.or(existing.category_id),
                patch.is_personal.unwrap_or(existing.is_personal),
                existing.id,
            ),
            map_transaction_row,
        )
        .map_err(map_write_error)
}

/// Delete a transaction and, through the foreign key cascade, its splits.
///
/// # Errors
/// Returns [Error::NotFound] if the transaction does not exist.
pub fn delete_transaction(id: TransactionId, connection: &Connection) -> Result<(), Error> {
    let rows_affected =
        connection.execute("DELETE FROM \"transaction\" WHERE id = :id", &[(":id", &id)])?;

    if rows_affected == 0 {
        return Err(Error::NotFound);
    }

    Ok(())
}

/// Get the total number of transactions in the database.
///
/// # Errors
/// This function will return a [Error::SqlError] there is some SQL error.
#[cfg(test)]
pub fn count_transactions(connection: &Connection) -> Result<u32, Error> {
    connection
        .query_row("SELECT COUNT(id) FROM \"transaction\";", [], |row| {
            row.get(0)
        })
        .map_err(|error| error.into())
}

/// Create the transaction table in the database.
///
/// # Errors
/// Returns an error if the table cannot be created or if there is an SQL error.
pub fn create_transaction_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute(
        "CREATE TABLE IF NOT EXISTS \"transaction\" (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                type TEXT NOT NULL,
                amount TEXT NOT NULL,
                description TEXT NOT NULL,
                date TEXT NOT NULL,
                category_id INTEGER,
                is_personal INTEGER NOT NULL,
                user_id INTEGER NOT NULL,
                family_id INTEGER,
                split_type TEXT,
                local_id TEXT UNIQUE,
                FOREIGN KEY(category_id) REFERENCES category(id) ON UPDATE CASCADE ON DELETE SET NULL,
                FOREIGN KEY(user_id) REFERENCES user(id) ON UPDATE CASCADE ON DELETE CASCADE,
                FOREIGN KEY(family_id) REFERENCES family(id) ON UPDATE CASCADE ON DELETE CASCADE
                )",
        (),
    )?;

    // Indexes used by the personal and family dashboards.
    connection.execute_batch(
        "CREATE INDEX IF NOT EXISTS idx_transaction_user_date ON \"transaction\"(user_id, date);
         CREATE INDEX IF NOT EXISTS idx_transaction_family_date ON \"transaction\"(family_id, date);",
    )?;

    Ok(())
}

/// Map a database row to a Transaction.
///
/// The columns must be in the order of [TRANSACTION_COLUMNS].
pub fn map_transaction_row(row: &Row) -> Result<Transaction, rusqlite::Error> {
    Ok(Transaction {
        id: row.get(0)?,
        kind: row.get(1)?,
        amount: get_decimal(row, 2)?,
        description: row.get(3)?,
        date: row.get(4)?,
        category_id: row.get(5)?,
        is_personal: row.get(6)?,
        user_id: UserID::new(row.get(7)?),
        family_id: row.get(8)?,
        split_type: row.get(9)?,
        local_id: row.get(10)?,
    })
}

// ============================================================================
// TESTS
// ============================================================================
