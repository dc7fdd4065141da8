//! Writes transactions and their splits as single atomic units.
//!
//! Every function here checks that the acting user may touch the rows involved
//! before anything is written. A transaction owned by someone else is reported
//! as [Error::NotFound].

use rusqlite::Connection;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use time::Date;

use crate::{
    Error,
    category::get_visible_category,
    database_id::{CategoryId, FamilyId, TransactionId},
    family::{get_family_members, is_family_member},
    money::{MONEY_DECIMAL_PLACES, has_whole_cents},
    split::{SplitStrategy, allocate, create_splits},
    transaction::{
        Transaction, TransactionFilter, TransactionPatch, TransactionType, TransactionWithSplits,
        core::{
            create_transaction, delete_transaction, get_transaction, get_transaction_by_local_id,
            get_transaction_details, get_transactions_for_user, update_transaction,
        },
    },
    user::UserID,
};

/// The request body for recording a new transaction.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct NewTransaction {
    /// Whether the money was earned or spent.
    #[serde(rename = "type")]
    pub kind: TransactionType,
    /// The amount, positive with at most two decimal places.
    pub amount: Decimal,
    /// What the transaction was for.
    pub description: String,
    /// When the transaction happened. Defaults to today.
    pub date: Option<Date>,
    /// The category to file the transaction under.
    pub category_id: Option<CategoryId>,
    /// Defaults to `true` when no family is given and `false` otherwise.
    pub is_personal: Option<bool>,
    /// The family to share the transaction with.
    pub family_id: Option<FamilyId>,
    /// How to divide the amount between the family's members.
    pub split: Option<SplitStrategy>,
    /// A client-generated key that makes resubmitting the same request safe.
    pub local_id: Option<String>,
}

/// The result of [create_transaction_with_splits].
#[derive(Debug, Clone, PartialEq)]
pub enum CreateOutcome {
    /// A new transaction was written.
    Created(TransactionWithSplits),
    /// The local ID had already been used by the same user, nothing was written.
    Replayed(TransactionWithSplits),
}

impl CreateOutcome {
    /// The created or previously stored transaction.
    pub fn into_inner(self) -> TransactionWithSplits {
        match self {
            CreateOutcome::Created(transaction) | CreateOutcome::Replayed(transaction) => {
                transaction
            }
        }
    }
}

/// The result of [update_transaction_for_user].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdatedTransaction {
    /// The transaction after the update.
    #[serde(flatten)]
    pub transaction: TransactionWithSplits,
    /// Set when the amount changed but the stored splits still add up to the old amount.
    pub splits_stale: bool,
}

fn validate_amount(amount: Decimal) -> Result<(), Error> {
    if amount <= Decimal::ZERO {
        return Err(Error::Validation("amount must be positive".to_owned()));
    }

    if !has_whole_cents(amount) {
        return Err(Error::Validation(format!(
            "amount cannot have more than {MONEY_DECIMAL_PLACES} decimal places"
        )));
    }

    Ok(())
}

fn validate_description(description: &str) -> Result<(), Error> {
    if description.trim().is_empty() {
        return Err(Error::Validation("description cannot be empty".to_owned()));
    }

    Ok(())
}

/// Record a transaction for `actor`, splitting it between family members when
/// both a family and a split strategy are given.
///
/// The transaction row and all of its splits are written in one SQL
/// transaction: either everything is stored or nothing is.
///
/// If `input.local_id` was already used by `actor`, the stored transaction is
/// returned as [CreateOutcome::Replayed] and nothing is written.
///
/// # Errors
/// This function will return a:
/// - [Error::Validation] if the amount or description is invalid, or the split does not add up,
/// - [Error::Conflict] if the local ID was already used by another user,
/// - [Error::Forbidden] if `actor` is not a member of the given family,
/// - [Error::InvalidState] if an equal split is requested for an empty family,
/// - [Error::NotFound] if the category does not exist or is not visible to `actor`,
/// - or [Error::SqlError] if there is some other SQL error.
pub fn create_transaction_with_splits(
    actor: UserID,
    input: NewTransaction,
    today: Date,
    connection: &Connection,
) -> Result<CreateOutcome, Error> {
    validate_amount(input.amount)?;
    validate_description(&input.description)?;

    let local_id = input
        .local_id
        .as_deref()
        .map(str::trim)
        .filter(|local_id| !local_id.is_empty())
        .map(str::to_owned);

    if let Some(local_id) = &local_id {
        if let Some(existing) = get_transaction_by_local_id(local_id, connection)? {
            if existing.user_id != actor {
                tracing::warn!(
                    "user {actor} tried to reuse local ID {local_id} owned by user {}",
                    existing.user_id
                );
                return Err(Error::Conflict(
                    "this local ID has already been used".to_owned(),
                ));
            }

            tracing::debug!("replaying transaction {} for local ID {local_id}", existing.id);
            return get_transaction_details(existing, connection).map(CreateOutcome::Replayed);
        }
    }

    if let Some(family_id) = input.family_id {
        if !is_family_member(family_id, actor, connection)? {
            return Err(Error::Forbidden);
        }
    }

    if let Some(category_id) = input.category_id {
        get_visible_category(category_id, actor, connection)?;
    }

    let builder = Transaction::build(
        input.kind,
        input.amount,
        input.date.unwrap_or(today),
        input.description.trim(),
        actor,
    )
    .category_id(input.category_id)
    .family_id(input.family_id)
    .local_id(local_id);

    let sql_transaction = connection.unchecked_transaction()?;

    let transaction = match (input.family_id, input.split) {
        (Some(family_id), Some(strategy)) => {
            let transaction = create_transaction(
                builder
                    .is_personal(false)
                    .split_type(Some(strategy.split_type())),
                &sql_transaction,
            )?;
            let members: Vec<UserID> = get_family_members(family_id, &sql_transaction)?
                .into_iter()
                .map(|member| member.user_id)
                .collect();
            let shares = allocate(transaction.amount, &strategy, actor, &members)?;
            create_splits(transaction.id, &shares, &sql_transaction)?;

            transaction
        }
        (family_id, split) => {
            if split.is_some() {
                tracing::debug!("ignoring split for transaction without a family");
            }

            let is_personal = input.is_personal.unwrap_or(family_id.is_none());
            create_transaction(builder.is_personal(is_personal), &sql_transaction)?
        }
    };

    let details = get_transaction_details(transaction, &sql_transaction)?;
    sql_transaction.commit()?;

    tracing::info!(
        "user {actor} created transaction {} with {} split(s)",
        details.transaction.id,
        details.splits.len()
    );

    Ok(CreateOutcome::Created(details))
}

fn get_owned_transaction(
    actor: UserID,
    id: TransactionId,
    connection: &Connection,
) -> Result<Transaction, Error> {
    let transaction = get_transaction(id, connection)?;

    if transaction.user_id != actor {
        return Err(Error::NotFound);
    }

    Ok(transaction)
}

/// Get a transaction owned by `actor` together with its splits.
///
/// # Errors
/// Returns [Error::NotFound] if the transaction does not exist or belongs to another user.
pub fn get_transaction_for_user(
    actor: UserID,
    id: TransactionId,
    connection: &Connection,
) -> Result<TransactionWithSplits, Error> {
    let transaction = get_owned_transaction(actor, id, connection)?;
    get_transaction_details(transaction, connection)
}

/// List the transactions owned by `actor`, newest first.
pub fn list_transactions(
    actor: UserID,
    filter: TransactionFilter,
    connection: &Connection,
) -> Result<Vec<TransactionWithSplits>, Error> {
    get_transactions_for_user(actor, filter, connection)?
        .into_iter()
        .map(|transaction| get_transaction_details(transaction, connection))
        .collect()
}

/// Apply `patch` to a transaction owned by `actor`.
///
/// Existing splits are left untouched. When the amount of a split transaction
/// changes, [UpdatedTransaction::splits_stale] is set.
///
/// # Errors
/// This function will return a:
/// - [Error::NotFound] if the transaction or new category does not exist, or
///   either belongs to someone `actor` cannot see,
/// - [Error::Validation] if the new amount or description is invalid,
/// - or [Error::SqlError] if there is some other SQL error.
pub fn update_transaction_for_user(
    actor: UserID,
    id: TransactionId,
    patch: TransactionPatch,
    connection: &Connection,
) -> Result<UpdatedTransaction, Error> {
    if let Some(amount) = patch.amount {
        validate_amount(amount)?;
    }

    if let Some(description) = &patch.description {
        validate_description(description)?;
    }

    let patch = TransactionPatch {
        description: patch
            .description
            .map(|description| description.trim().to_owned()),
        ..patch
    };

    let sql_transaction = connection.unchecked_transaction()?;

    let existing = get_owned_transaction(actor, id, &sql_transaction)?;

    if let Some(category_id) = patch.category_id {
        get_visible_category(category_id, actor, &sql_transaction)?;
    }

    let updated = update_transaction(&existing, patch, &sql_transaction)?;
    let details = get_transaction_details(updated, &sql_transaction)?;

    sql_transaction.commit()?;

    let splits_stale =
        !details.splits.is_empty() && details.transaction.amount != existing.amount;

    if splits_stale {
        tracing::warn!(
            "amount of split transaction {id} changed from {} to {}, its splits were not recalculated",
            existing.amount,
            details.transaction.amount
        );
    }

    Ok(UpdatedTransaction {
        transaction: details,
        splits_stale,
    })
}

/// Delete a transaction owned by `actor` along with its splits.
///
/// # Errors
/// Returns [Error::NotFound] if the transaction does not exist or belongs to another user.
pub fn remove_transaction(
    actor: UserID,
    id: TransactionId,
    connection: &Connection,
) -> Result<(), Error> {
    let sql_transaction = connection.unchecked_transaction()?;

    get_owned_transaction(actor, id, &sql_transaction)?;
    delete_transaction(id, &sql_transaction)?;

    sql_transaction.commit()?;
    tracing::info!("user {actor} deleted transaction {id}");

    Ok(())
}
