//! Categories for classifying transactions (e.g., 'Groceries', 'Salary').
//!
//! A category either belongs to a single user (personal) or to a family. The
//! pair (name, type) is unique within each of those scopes.

use std::fmt::Display;

use rusqlite::{Connection, Row};
use serde::{Deserialize, Serialize};

use crate::{
    Error,
    database_id::{CategoryId, FamilyId},
    family::is_family_member,
    transaction::TransactionType,
    user::UserID,
};

/// The label used for transactions without a category.
pub const UNCATEGORIZED_LABEL: &str = "Uncategorized";

/// A validated, non-empty category name.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, Hash)]
pub struct CategoryName(String);

impl CategoryName {
    /// Create a category name.
    ///
    /// # Errors
    ///
    /// This function will return an [Error::Validation] if `name` is empty or just whitespace.
    pub fn new(name: &str) -> Result<Self, Error> {
        let name = name.trim();

        if name.is_empty() {
            Err(Error::Validation("category name cannot be empty".to_owned()))
        } else {
            Ok(Self(name.to_string()))
        }
    }

    /// Create a category name without validation.
    ///
    /// The caller should ensure that the string is not empty.
    pub fn new_unchecked(name: &str) -> Self {
        Self(name.to_string())
    }
}

impl AsRef<str> for CategoryName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Display for CategoryName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A category that transactions can be filed under.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Category {
    /// The ID of the category.
    pub id: CategoryId,
    /// The category's name.
    pub name: CategoryName,
    /// Whether the category is for income or expenses.
    #[serde(rename = "type")]
    pub kind: TransactionType,
    /// An optional display colour, e.g. "#ff0000".
    pub color: Option<String>,
    /// An optional icon name.
    pub icon: Option<String>,
    /// The owner of a personal category.
    pub user_id: Option<UserID>,
    /// The owner of a family category.
    pub family_id: Option<FamilyId>,
}

/// The data needed to create a category.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewCategory {
    /// The category's name.
    pub name: CategoryName,
    /// Whether the category is for income or expenses.
    #[serde(rename = "type")]
    pub kind: TransactionType,
    /// An optional display colour.
    pub color: Option<String>,
    /// An optional icon name.
    pub icon: Option<String>,
    /// Set to create a family category instead of a personal one.
    pub family_id: Option<FamilyId>,
}

/// Create the category table.
///
/// # Errors
/// Returns an error if the table cannot be created or if there is an SQL error.
pub fn create_category_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute_batch(
        "CREATE TABLE IF NOT EXISTS category (
            id INTEGER PRIMARY KEY,
            name TEXT NOT NULL,
            type TEXT NOT NULL,
            color TEXT,
            icon TEXT,
            user_id INTEGER,
            family_id INTEGER,
            FOREIGN KEY(user_id) REFERENCES user(id) ON UPDATE CASCADE ON DELETE CASCADE,
            FOREIGN KEY(family_id) REFERENCES family(id) ON UPDATE CASCADE ON DELETE CASCADE
        );

        CREATE INDEX IF NOT EXISTS idx_category_scope ON category(user_id, family_id);",
    )?;

    Ok(())
}

/// Create a category for `user_id`, or for `new_category.family_id` if set.
///
/// # Errors
/// Returns a:
/// - [Error::Forbidden] if a family category is requested by a non-member,
/// - [Error::Conflict] if a category with the same name and type already exists in the scope,
/// - [Error::SqlError] if there is some other SQL error.
pub fn create_category(
    new_category: NewCategory,
    user_id: UserID,
    connection: &Connection,
) -> Result<Category, Error> {
    if let Some(family_id) = new_category.family_id {
        if !is_family_member(family_id, user_id, connection)? {
            return Err(Error::Forbidden);
        }
    }

    let owner_id = match new_category.family_id {
        Some(_) => None,
        None => Some(user_id),
    };

    let transaction = connection.unchecked_transaction()?;

    let exists: bool = transaction.query_row(
        "SELECT EXISTS(
            SELECT 1 FROM category
            WHERE name = ?1 AND type = ?2 AND (user_id IS ?3 AND family_id IS ?4)
        )",
        (
            new_category.name.as_ref(),
            new_category.kind,
            owner_id.map(|id| id.as_i64()),
            new_category.family_id,
        ),
        |row| row.get(0),
    )?;

    if exists {
        return Err(Error::Conflict(format!(
            "a {} category named \"{}\" already exists",
            new_category.kind, new_category.name
        )));
    }

    transaction.execute(
        "INSERT INTO category (name, type, color, icon, user_id, family_id)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        (
            new_category.name.as_ref(),
            new_category.kind,
            &new_category.color,
            &new_category.icon,
            owner_id.map(|id| id.as_i64()),
            new_category.family_id,
        ),
    )?;
    let id = transaction.last_insert_rowid();

    transaction.commit()?;

    Ok(Category {
        id,
        name: new_category.name,
        kind: new_category.kind,
        color: new_category.color,
        icon: new_category.icon,
        user_id: owner_id,
        family_id: new_category.family_id,
    })
}

/// Retrieve a single category by ID.
///
/// # Errors
/// Returns [Error::NotFound] if the category does not exist.
pub fn get_category(category_id: CategoryId, connection: &Connection) -> Result<Category, Error> {
    connection
        .prepare(
            "SELECT id, name, type, color, icon, user_id, family_id FROM category WHERE id = :id",
        )?
        .query_row(&[(":id", &category_id)], map_row)
        .map_err(|error| error.into())
}

/// Retrieve a category that `user_id` may file transactions under, i.e. one
/// of their personal categories or a category of a family they belong to.
///
/// # Errors
/// Returns [Error::NotFound] if the category does not exist or is not visible to the user.
pub fn get_visible_category(
    category_id: CategoryId,
    user_id: UserID,
    connection: &Connection,
) -> Result<Category, Error> {
    let category = get_category(category_id, connection)?;

    let is_visible = match (category.user_id, category.family_id) {
        (Some(owner_id), _) => owner_id == user_id,
        (None, Some(family_id)) => is_family_member(family_id, user_id, connection)?,
        (None, None) => false,
    };

    if is_visible {
        Ok(category)
    } else {
        tracing::debug!("category {category_id} is not visible to user {user_id}");
        Err(Error::NotFound)
    }
}

/// Retrieve the personal categories of `user_id` and the categories of their
/// families, ordered alphabetically by name.
pub fn get_categories_for_user(
    user_id: UserID,
    connection: &Connection,
) -> Result<Vec<Category>, Error> {
    connection
        .prepare(
            "SELECT id, name, type, color, icon, user_id, family_id
             FROM category
             WHERE user_id = :user_id
                OR family_id IN (SELECT family_id FROM family_member WHERE user_id = :user_id)
             ORDER BY name ASC, id ASC",
        )?
        .query_map(&[(":user_id", &user_id.as_i64())], map_row)?
        .map(|maybe_category| maybe_category.map_err(|error| error.into()))
        .collect()
}

fn map_row(row: &Row) -> Result<Category, rusqlite::Error> {
    let raw_name: String = row.get(1)?;
    let user_id: Option<i64> = row.get(5)?;

    Ok(Category {
        id: row.get(0)?,
        name: CategoryName::new_unchecked(&raw_name),
        kind: row.get(2)?,
        color: row.get(3)?,
        icon: row.get(4)?,
        user_id: user_id.map(UserID::new),
        family_id: row.get(6)?,
    })
}
