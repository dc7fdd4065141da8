//! Families and their memberships.
//!
//! Family and membership management is not routed over HTTP, but the ledger
//! needs memberships to decide who may be charged for a shared transaction
//! and who receives a split.

use std::fmt::Display;

use rusqlite::{
    Connection, Row, ToSql,
    types::{FromSql, FromSqlError, FromSqlResult, ToSqlOutput, ValueRef},
};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::{Error, database_id::FamilyId, user::UserID};

/// The role a user has within a family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum FamilyRole {
    /// The user that created the family.
    Owner,
    /// Any other member.
    Member,
}

impl FamilyRole {
    fn as_str(&self) -> &'static str {
        match self {
            FamilyRole::Owner => "OWNER",
            FamilyRole::Member => "MEMBER",
        }
    }
}

impl Display for FamilyRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl ToSql for FamilyRole {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for FamilyRole {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        match value.as_str()? {
            "OWNER" => Ok(FamilyRole::Owner),
            "MEMBER" => Ok(FamilyRole::Member),
            _ => Err(FromSqlError::InvalidType),
        }
    }
}

/// A group of users that share expenses.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Family {
    /// The ID of the family.
    pub id: FamilyId,
    /// The display name of the family.
    pub name: String,
    /// The user that created the family.
    pub owner_id: UserID,
}

/// A user's membership of a family, as seen from the family.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FamilyMember {
    /// The member's user ID.
    pub user_id: UserID,
    /// The member's full name.
    pub name: String,
    /// The member's role in the family.
    pub role: FamilyRole,
    /// When the user joined the family.
    pub joined_at: OffsetDateTime,
}

/// A user's membership of a family, as seen from the user.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Membership {
    /// The family's ID.
    pub family_id: FamilyId,
    /// The family's name.
    pub family_name: String,
    /// The user's role in the family.
    pub role: FamilyRole,
    /// When the user joined the family.
    pub joined_at: OffsetDateTime,
}

/// Create the family and family member tables.
///
/// # Errors
/// Returns an error if the tables cannot be created or if there is an SQL error.
pub fn create_family_tables(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute_batch(
        "CREATE TABLE IF NOT EXISTS family (
            id INTEGER PRIMARY KEY,
            name TEXT NOT NULL,
            owner_id INTEGER NOT NULL,
            FOREIGN KEY(owner_id) REFERENCES user(id) ON UPDATE CASCADE ON DELETE CASCADE
        );

        CREATE TABLE IF NOT EXISTS family_member (
            id INTEGER PRIMARY KEY,
            family_id INTEGER NOT NULL,
            user_id INTEGER NOT NULL,
            role TEXT NOT NULL,
            joined_at INTEGER NOT NULL,
            UNIQUE(family_id, user_id),
            FOREIGN KEY(family_id) REFERENCES family(id) ON UPDATE CASCADE ON DELETE CASCADE,
            FOREIGN KEY(user_id) REFERENCES user(id) ON UPDATE CASCADE ON DELETE CASCADE
        );

        CREATE INDEX IF NOT EXISTS idx_family_member_user ON family_member(user_id);",
    )?;

    Ok(())
}

/// Create a family owned by `owner_id`, who becomes its first member with the
/// [FamilyRole::Owner] role.
///
/// # Errors
/// Returns a:
/// - [Error::Validation] if `name` is blank,
/// - [Error::NotFound] if `owner_id` does not refer to a user,
/// - [Error::SqlError] if there is some other SQL error.
pub fn create_family(
    name: &str,
    owner_id: UserID,
    created_at: OffsetDateTime,
    connection: &Connection,
) -> Result<Family, Error> {
    let name = name.trim();

    if name.is_empty() {
        return Err(Error::Validation("family name cannot be empty".to_owned()));
    }

    let transaction = connection.unchecked_transaction()?;

    transaction
        .execute(
            "INSERT INTO family (name, owner_id) VALUES (?1, ?2)",
            (name, owner_id.as_i64()),
        )
        .map_err(map_membership_error)?;
    let id = transaction.last_insert_rowid();

    insert_member(id, owner_id, FamilyRole::Owner, created_at, &transaction)?;

    transaction.commit()?;

    tracing::info!("created family {id} owned by user {owner_id}");

    Ok(Family {
        id,
        name: name.to_owned(),
        owner_id,
    })
}

/// Add `user_id` to the family `family_id`.
///
/// # Errors
/// Returns a:
/// - [Error::Conflict] if the user is already a member of the family,
/// - [Error::NotFound] if the family or the user does not exist,
/// - [Error::SqlError] if there is some other SQL error.
pub fn add_family_member(
    family_id: FamilyId,
    user_id: UserID,
    role: FamilyRole,
    joined_at: OffsetDateTime,
    connection: &Connection,
) -> Result<(), Error> {
    insert_member(family_id, user_id, role, joined_at, connection)?;
    tracing::info!("added user {user_id} to family {family_id} as {role}");

    Ok(())
}

fn insert_member(
    family_id: FamilyId,
    user_id: UserID,
    role: FamilyRole,
    joined_at: OffsetDateTime,
    connection: &Connection,
) -> Result<(), Error> {
    connection
        .execute(
            "INSERT INTO family_member (family_id, user_id, role, joined_at)
             VALUES (?1, ?2, ?3, ?4)",
            (family_id, user_id.as_i64(), role, joined_at.unix_timestamp()),
        )
        .map_err(map_membership_error)?;

    Ok(())
}

fn map_membership_error(error: rusqlite::Error) -> Error {
    match error {
        rusqlite::Error::SqliteFailure(
            rusqlite::ffi::Error {
                code: _,
                extended_code: rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE,
            },
            _,
        ) => Error::Conflict("the user is already a member of this family".to_owned()),
        rusqlite::Error::SqliteFailure(
            rusqlite::ffi::Error {
                code: _,
                extended_code: rusqlite::ffi::SQLITE_CONSTRAINT_FOREIGNKEY,
            },
            _,
        ) => Error::NotFound,
        error => error.into(),
    }
}

/// Retrieve a family by its ID.
///
/// # Errors
/// Returns [Error::NotFound] if the family does not exist.
pub fn get_family(family_id: FamilyId, connection: &Connection) -> Result<Family, Error> {
    connection
        .prepare("SELECT id, name, owner_id FROM family WHERE id = :id")?
        .query_row(&[(":id", &family_id)], |row| {
            Ok(Family {
                id: row.get(0)?,
                name: row.get(1)?,
                owner_id: UserID::new(row.get(2)?),
            })
        })
        .map_err(|error| error.into())
}

/// Get the current members of a family, earliest joined first.
///
/// An unknown family has no members.
pub fn get_family_members(
    family_id: FamilyId,
    connection: &Connection,
) -> Result<Vec<FamilyMember>, Error> {
    connection
        .prepare(
            "SELECT fm.user_id, u.full_name, fm.role, fm.joined_at
             FROM family_member fm
             INNER JOIN user u ON u.id = fm.user_id
             WHERE fm.family_id = :family_id
             ORDER BY fm.joined_at ASC, fm.id ASC",
        )?
        .query_map(&[(":family_id", &family_id)], |row| {
            Ok(FamilyMember {
                user_id: UserID::new(row.get(0)?),
                name: row.get(1)?,
                role: row.get(2)?,
                joined_at: get_timestamp(row, 3)?,
            })
        })?
        .map(|maybe_member| maybe_member.map_err(|error| error.into()))
        .collect()
}

/// Whether `user_id` currently belongs to the family `family_id`.
pub fn is_family_member(
    family_id: FamilyId,
    user_id: UserID,
    connection: &Connection,
) -> Result<bool, Error> {
    connection
        .query_row(
            "SELECT EXISTS(SELECT 1 FROM family_member WHERE family_id = ?1 AND user_id = ?2)",
            (family_id, user_id.as_i64()),
            |row| row.get(0),
        )
        .map_err(|error| error.into())
}

/// Get every family `user_id` belongs to, earliest joined first.
pub fn get_memberships(user_id: UserID, connection: &Connection) -> Result<Vec<Membership>, Error> {
    connection
        .prepare(
            "SELECT f.id, f.name, fm.role, fm.joined_at
             FROM family_member fm
             INNER JOIN family f ON f.id = fm.family_id
             WHERE fm.user_id = :user_id
             ORDER BY fm.joined_at ASC, fm.id ASC",
        )?
        .query_map(&[(":user_id", &user_id.as_i64())], map_membership_row)?
        .map(|maybe_membership| maybe_membership.map_err(|error| error.into()))
        .collect()
}

/// Get the family `user_id` joined first, which is treated as their active family.
///
/// # Errors
/// Returns [Error::NotFound] if the user does not belong to any family.
pub fn get_active_membership(user_id: UserID, connection: &Connection) -> Result<Membership, Error> {
    connection
        .prepare(
            "SELECT f.id, f.name, fm.role, fm.joined_at
             FROM family_member fm
             INNER JOIN family f ON f.id = fm.family_id
             WHERE fm.user_id = :user_id
             ORDER BY fm.joined_at ASC, fm.id ASC
             LIMIT 1",
        )?
        .query_row(&[(":user_id", &user_id.as_i64())], map_membership_row)
        .map_err(|error| error.into())
}

fn map_membership_row(row: &Row) -> Result<Membership, rusqlite::Error> {
    Ok(Membership {
        family_id: row.get(0)?,
        family_name: row.get(1)?,
        role: row.get(2)?,
        joined_at: get_timestamp(row, 3)?,
    })
}

fn get_timestamp(row: &Row, index: usize) -> Result<OffsetDateTime, rusqlite::Error> {
    let timestamp: i64 = row.get(index)?;

    OffsetDateTime::from_unix_timestamp(timestamp).map_err(|error| {
        rusqlite::Error::FromSqlConversionFailure(
            index,
            rusqlite::types::Type::Integer,
            Box::new(error),
        )
    })
}
