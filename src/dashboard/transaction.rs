//! Database queries for retrieving dashboard transaction data.
//!
//! This module provides a simplified transaction view optimized for dashboard
//! aggregations, containing only the fields needed for summaries (type,
//! amount, date, category and payer).

use std::ops::RangeInclusive;

use rusqlite::Connection;
use rust_decimal::Decimal;
use serde::Deserialize;
use time::Date;

use crate::{
    Error,
    category::UNCATEGORIZED_LABEL,
    database_id::FamilyId,
    money::get_decimal,
    transaction::TransactionType,
    user::UserID,
};

/// Which transactions an aggregation covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    /// A user's personal transactions.
    Personal(UserID),
    /// The shared transactions of a family.
    Family(FamilyId),
}

/// The scope named in a request, before the family is resolved.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScopeKind {
    /// The acting user's personal transactions.
    #[default]
    Personal,
    /// The shared transactions of the acting user's active family.
    Family,
}

/// A simplified transaction view for dashboard aggregations.
#[derive(Debug, Clone, PartialEq)]
pub(super) struct LedgerEntry {
    pub kind: TransactionType,
    pub amount: Decimal,
    pub date: Date,
    pub category: String,
    pub payer: UserID,
    /// Whether the transaction was divided between family members.
    pub is_split: bool,
}

/// A member's share of one family transaction.
#[derive(Debug, Clone, PartialEq)]
pub(super) struct ShareEntry {
    pub user_id: UserID,
    pub amount: Decimal,
}

/// Gets the transactions of `scope` within a date range, with their category
/// names resolved.
///
/// # Errors
/// Returns [Error::SqlError] if the SQL query fails.
pub(super) fn get_transactions_in_date_range(
    scope: Scope,
    date_range: RangeInclusive<Date>,
    connection: &Connection,
) -> Result<Vec<LedgerEntry>, Error> {
    let (scope_clause, scope_id) = match scope {
        Scope::Personal(user_id) => ("t.user_id = ?3 AND t.is_personal = 1", user_id.as_i64()),
        Scope::Family(family_id) => ("t.family_id = ?3 AND t.is_personal = 0", family_id),
    };

    let query = format!(
        "SELECT
            t.type,
            t.amount,
            t.date,
            COALESCE(category.name, '{UNCATEGORIZED_LABEL}') AS category_name,
            t.user_id,
            t.split_type IS NOT NULL AS is_split
        FROM \"transaction\" t
        LEFT JOIN category ON category.id = t.category_id
        WHERE t.date BETWEEN ?1 AND ?2 AND {scope_clause}
        ORDER BY t.date ASC, t.id ASC"
    );

    let mut stmt = connection.prepare(&query)?;
    stmt.query_map(
        (date_range.start(), date_range.end(), scope_id),
        |row| {
            Ok(LedgerEntry {
                kind: row.get(0)?,
                amount: get_decimal(row, 1)?,
                date: row.get(2)?,
                category: row.get(3)?,
                payer: UserID::new(row.get(4)?),
                is_split: row.get(5)?,
            })
        },
    )?
    .collect::<Result<Vec<LedgerEntry>, rusqlite::Error>>()
    .map_err(|error| error.into())
}

/// Gets the splits of a family's shared transactions within a date range.
///
/// # Errors
/// Returns [Error::SqlError] if the SQL query fails.
pub(super) fn get_family_splits_in_date_range(
    family_id: FamilyId,
    date_range: RangeInclusive<Date>,
    connection: &Connection,
) -> Result<Vec<ShareEntry>, Error> {
    let mut stmt = connection.prepare(
        "SELECT split.user_id, split.amount
        FROM split
        INNER JOIN \"transaction\" t ON t.id = split.transaction_id
        WHERE t.date BETWEEN ?1 AND ?2 AND t.family_id = ?3 AND t.is_personal = 0
        ORDER BY split.id ASC",
    )?;

    stmt.query_map(
        (date_range.start(), date_range.end(), family_id),
        |row| {
            Ok(ShareEntry {
                user_id: UserID::new(row.get(0)?),
                amount: get_decimal(row, 1)?,
            })
        },
    )?
    .collect::<Result<Vec<ShareEntry>, rusqlite::Error>>()
    .map_err(|error| error.into())
}
