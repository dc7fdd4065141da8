//! JSON route handlers for creating, reading, updating and deleting transactions.

use std::sync::{Arc, Mutex};

use axum::{
    Json,
    extract::{FromRef, Path, Query, State},
    http::StatusCode,
};
use rusqlite::Connection;
use serde::Deserialize;

use crate::{
    Actor, AppState, Error,
    database_id::TransactionId,
    timezone::get_local_today,
    transaction::{
        TransactionFilter, TransactionPatch, TransactionWithSplits,
        writer::{
            CreateOutcome, NewTransaction, UpdatedTransaction, create_transaction_with_splits,
            get_transaction_for_user, list_transactions, remove_transaction,
            update_transaction_for_user,
        },
    },
};

/// The state needed to manage transactions.
#[derive(Debug, Clone)]
pub struct TransactionState {
    /// The database connection for managing transactions.
    pub db_connection: Arc<Mutex<Connection>>,
    /// The local timezone as a canonical timezone name, e.g. "Pacific/Auckland".
    pub local_timezone: String,
}

impl FromRef<AppState> for TransactionState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            db_connection: state.db_connection.clone(),
            local_timezone: state.local_timezone.clone(),
        }
    }
}

/// The query parameters for listing transactions.
#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    /// Restrict the list to personal or family transactions.
    #[serde(rename = "type")]
    pub filter: Option<TransactionFilter>,
}

/// A route handler for recording a transaction.
///
/// Responds with 201 Created for a new transaction and 200 OK when the local
/// ID was already used by the same user.
pub async fn create_transaction_endpoint(
    State(state): State<TransactionState>,
    actor: Actor,
    Json(input): Json<NewTransaction>,
) -> Result<(StatusCode, Json<TransactionWithSplits>), Error> {
    let today = get_local_today(&state.local_timezone).ok_or_else(|| {
        tracing::error!("Invalid timezone {}", state.local_timezone);
        Error::InvalidTimezone(state.local_timezone.clone())
    })?;

    let connection = state
        .db_connection
        .lock()
        .inspect_err(|error| tracing::error!("could not acquire database lock: {error}"))
        .map_err(|_| Error::DatabaseLock)?;

    match create_transaction_with_splits(actor.user_id(), input, today, &connection)? {
        CreateOutcome::Created(transaction) => Ok((StatusCode::CREATED, Json(transaction))),
        CreateOutcome::Replayed(transaction) => Ok((StatusCode::OK, Json(transaction))),
    }
}

/// A route handler for listing the acting user's transactions.
pub async fn list_transactions_endpoint(
    State(state): State<TransactionState>,
    actor: Actor,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<TransactionWithSplits>>, Error> {
    let connection = state
        .db_connection
        .lock()
        .inspect_err(|error| tracing::error!("could not acquire database lock: {error}"))
        .map_err(|_| Error::DatabaseLock)?;

    list_transactions(
        actor.user_id(),
        query.filter.unwrap_or_default(),
        &connection,
    )
    .map(Json)
}

/// A route handler for getting one of the acting user's transactions.
pub async fn get_transaction_endpoint(
    State(state): State<TransactionState>,
    actor: Actor,
    Path(transaction_id): Path<TransactionId>,
) -> Result<Json<TransactionWithSplits>, Error> {
    let connection = state
        .db_connection
        .lock()
        .inspect_err(|error| tracing::error!("could not acquire database lock: {error}"))
        .map_err(|_| Error::DatabaseLock)?;

    get_transaction_for_user(actor.user_id(), transaction_id, &connection).map(Json)
}

/// A route handler for changing fields of a transaction.
pub async fn update_transaction_endpoint(
    State(state): State<TransactionState>,
    actor: Actor,
    Path(transaction_id): Path<TransactionId>,
    Json(patch): Json<TransactionPatch>,
) -> Result<Json<UpdatedTransaction>, Error> {
    let connection = state
        .db_connection
        .lock()
        .inspect_err(|error| tracing::error!("could not acquire database lock: {error}"))
        .map_err(|_| Error::DatabaseLock)?;

    update_transaction_for_user(actor.user_id(), transaction_id, patch, &connection).map(Json)
}

/// A route handler for deleting a transaction, responds with 204 No Content.
pub async fn delete_transaction_endpoint(
    State(state): State<TransactionState>,
    actor: Actor,
    Path(transaction_id): Path<TransactionId>,
) -> Result<StatusCode, Error> {
    let connection = state
        .db_connection
        .lock()
        .inspect_err(|error| tracing::error!("could not acquire database lock: {error}"))
        .map_err(|_| Error::DatabaseLock)?;

    remove_transaction(actor.user_id(), transaction_id, &connection)?;

    Ok(StatusCode::NO_CONTENT)
}
