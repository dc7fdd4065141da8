//! Code for creating the user table, fetching users from the database and
//! assembling a user's profile.

use std::{
    fmt::Display,
    sync::{Arc, Mutex},
};

use axum::{
    Json,
    extract::{FromRef, State},
};
use rusqlite::{Connection, Row};
use serde::{Deserialize, Serialize};

use crate::{
    Actor, AppState, Error,
    family::{Membership, get_memberships},
};

/// A newtype wrapper for integer user IDs.
///
/// This helps disambiguate user IDs from other types of IDs, leading to better compile time
/// errors, and more flexible generics that can have distinct implementations for multiple ID types.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, Hash)]
pub struct UserID(i64);

impl UserID {
    /// Create a new user ID.
    pub fn new(id: i64) -> Self {
        Self(id)
    }

    /// Cast the user ID to a 64 bit integer.
    pub fn as_i64(&self) -> i64 {
        self.0
    }
}

impl Display for UserID {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// A user of the application.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    /// The user's ID in the application database.
    pub id: UserID,
    /// The user's full name.
    pub full_name: String,
    /// The short name shown in the UI.
    pub display_name: String,
    /// The user's email address, unique across all users.
    pub email: String,
}

/// Create the user table.
///
/// # Errors
///
/// This function will return an error if the SQL query failed.
pub fn create_user_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute(
        "CREATE TABLE IF NOT EXISTS user (
                id INTEGER PRIMARY KEY,
                full_name TEXT NOT NULL,
                display_name TEXT NOT NULL,
                email TEXT NOT NULL UNIQUE
                )",
        (),
    )?;

    Ok(())
}

/// Create and insert a new user into the database.
///
/// If `display_name` is `None`, the first word of `full_name` is used.
///
/// # Errors
///
/// Returns a:
/// - [Error::Validation] if `full_name` or `email` is blank,
/// - [Error::Conflict] if a user with `email` already exists,
/// - [Error::SqlError] if some other SQL related error occurred.
pub fn create_user(
    full_name: &str,
    display_name: Option<&str>,
    email: &str,
    connection: &Connection,
) -> Result<User, Error> {
    let full_name = full_name.trim();
    let email = email.trim();

    if full_name.is_empty() {
        return Err(Error::Validation("full name cannot be empty".to_owned()));
    }

    if email.is_empty() {
        return Err(Error::Validation("email cannot be empty".to_owned()));
    }

    let display_name = display_name
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .or_else(|| full_name.split_whitespace().next())
        .unwrap_or(full_name)
        .to_owned();

    connection
        .execute(
            "INSERT INTO user (full_name, display_name, email) VALUES (?1, ?2, ?3)",
            (full_name, &display_name, email),
        )
        .map_err(|error| match error {
            rusqlite::Error::SqliteFailure(
                rusqlite::ffi::Error {
                    code: _,
                    extended_code: rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE,
                },
                _,
            ) => Error::Conflict(format!("a user with the email {email} already exists")),
            error => error.into(),
        })?;

    let id = UserID::new(connection.last_insert_rowid());

    Ok(User {
        id,
        full_name: full_name.to_owned(),
        display_name,
        email: email.to_owned(),
    })
}

/// Get the user from the database with an ID equal to `user_id`.
///
/// # Errors
///
/// This function will return an error if:
/// - `user_id` does not belong to a registered user.
/// - there was an error trying to access the store.
pub fn get_user_by_id(user_id: UserID, connection: &Connection) -> Result<User, Error> {
    connection
        .prepare("SELECT id, full_name, display_name, email FROM user WHERE id = :id")?
        .query_row(&[(":id", &user_id.as_i64())], map_user_row)
        .map_err(|error| error.into())
}

/// Get the user registered with `email`.
///
/// # Errors
///
/// Returns [Error::NotFound] if no user has that email, or [Error::SqlError] on
/// other SQL errors.
pub fn get_user_by_email(email: &str, connection: &Connection) -> Result<User, Error> {
    connection
        .prepare("SELECT id, full_name, display_name, email FROM user WHERE email = :email")?
        .query_row(&[(":email", &email.trim())], map_user_row)
        .map_err(|error| error.into())
}

fn map_user_row(row: &Row) -> Result<User, rusqlite::Error> {
    Ok(User {
        id: UserID::new(row.get(0)?),
        full_name: row.get(1)?,
        display_name: row.get(2)?,
        email: row.get(3)?,
    })
}

/// A user together with the families they belong to.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    /// The user.
    #[serde(flatten)]
    pub user: User,
    /// Whether the user belongs to at least one family.
    pub has_family: bool,
    /// The family the user joined first, which is treated as their active family.
    pub active_family: Option<Membership>,
    /// Every family the user belongs to, earliest joined first.
    pub families: Vec<Membership>,
}

/// Assemble the profile for `user_id`.
///
/// The active family is the earliest-joined membership rather than whatever
/// order the store happens to return rows in.
///
/// # Errors
///
/// Returns [Error::NotFound] if the user does not exist.
pub fn get_user_profile(user_id: UserID, connection: &Connection) -> Result<UserProfile, Error> {
    let user = get_user_by_id(user_id, connection)?;
    let families = get_memberships(user_id, connection)?;

    Ok(UserProfile {
        user,
        has_family: !families.is_empty(),
        active_family: families.first().cloned(),
        families,
    })
}

/// The state needed to display a user's profile.
#[derive(Debug, Clone)]
pub struct ProfileState {
    /// The database connection for reading users and memberships.
    pub db_connection: Arc<Mutex<Connection>>,
}

impl FromRef<AppState> for ProfileState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            db_connection: state.db_connection.clone(),
        }
    }
}

/// Route handler for the acting user's profile.
pub async fn get_profile_endpoint(
    State(state): State<ProfileState>,
    actor: Actor,
) -> Result<Json<UserProfile>, Error> {
    let connection = state
        .db_connection
        .lock()
        .inspect_err(|error| tracing::error!("could not acquire database lock: {error}"))
        .map_err(|_| Error::DatabaseLock)?;

    get_user_profile(actor.user_id(), &connection).map(Json)
}
