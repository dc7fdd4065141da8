//! Household ledger is a JSON API for tracking personal and shared family finances.
//!
//! The heart of the crate is the split allocation and ledger aggregation engine:
//! - [split] turns a shared transaction into validated per-member shares,
//! - [transaction] writes a transaction and its splits as one atomic unit,
//! - [dashboard] folds transactions into monthly summaries, trends, category
//!   breakdowns and per-member balances.

#![warn(missing_docs)]

use std::{net::SocketAddr, time::Duration};

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use axum_server::Handle;
use serde_json::json;
use tokio::signal;

mod actor;
mod app_state;
pub mod category;
pub mod dashboard;
pub mod database_id;
mod db;
pub mod endpoints;
pub mod family;
mod logging;
pub mod money;
mod routing;
pub mod split;
mod timezone;
pub mod transaction;
pub mod user;

pub use actor::{ACTOR_HEADER, Actor};
pub use app_state::AppState;
pub use db::initialize as initialize_db;
pub use logging::{LOG_BODY_LENGTH_LIMIT, logging_middleware};
pub use routing::build_router;
pub use timezone::{get_local_offset, get_local_today};

/// An async task that waits for either the ctrl+c or terminate signal, whichever comes first, and
/// then signals the server to shut down gracefully.
///
/// `handle` is a handle to an Axum `Server`.
pub async fn graceful_shutdown(handle: Handle<SocketAddr>) {
    let ctrl_c = async {
        if let Err(error) = signal::ctrl_c().await {
            tracing::error!("failed to install Ctrl+C handler: {error}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(error) => {
                tracing::error!("failed to install signal handler: {error}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::debug!("Received ctrl+c signal.");
            handle.graceful_shutdown(Some(Duration::from_secs(1)));
        },
        _ = terminate => {
            tracing::debug!("Received terminate signal.");
            handle.graceful_shutdown(Some(Duration::from_secs(1)));
        },
    }
}

/// The errors that may occur in the application.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum Error {
    /// The input was malformed or inconsistent, e.g. split percentages that
    /// do not add up to 100.
    ///
    /// These errors are always shown to the caller and are never retried.
    #[error("{0}")]
    Validation(String),

    /// The request did not identify the acting user.
    #[error("the request is missing a valid user ID")]
    Unauthenticated,

    /// The acting user is not a member of the family they tried to charge.
    #[error("you are not a member of this family")]
    Forbidden,

    /// The requested resource was not found.
    ///
    /// This is also returned for resources that exist but belong to another
    /// user, so that callers cannot probe for other users' data.
    ///
    /// Internally, this error may occur when a query returns no rows.
    #[error("the requested resource could not be found")]
    NotFound,

    /// A unique key clashed with an existing row, e.g. a client local ID that
    /// was already used by another user.
    #[error("{0}")]
    Conflict(String),

    /// The request cannot be applied to the current state of the ledger,
    /// e.g. an equal split across a family with no members.
    #[error("{0}")]
    InvalidState(String),

    /// An error occurred while getting the local timezone from a canonical timezone string.
    #[error("invalid timezone {0}")]
    InvalidTimezone(String),

    /// Could not acquire the database lock
    #[error("could not acquire the database lock")]
    DatabaseLock,

    /// An unhandled/unexpected SQL error.
    #[error("an unexpected SQL error occurred: {0}")]
    SqlError(rusqlite::Error),
}

impl From<rusqlite::Error> for Error {
    fn from(value: rusqlite::Error) -> Self {
        match value {
            rusqlite::Error::QueryReturnedNoRows => Error::NotFound,
            error => {
                tracing::error!("an unhandled SQL error occurred: {}", error);
                Error::SqlError(error)
            }
        }
    }
}

impl Error {
    fn status_code(&self) -> StatusCode {
        match self {
            Error::Validation(_) => StatusCode::BAD_REQUEST,
            Error::Unauthenticated => StatusCode::UNAUTHORIZED,
            Error::Forbidden => StatusCode::FORBIDDEN,
            Error::NotFound => StatusCode::NOT_FOUND,
            Error::Conflict(_) => StatusCode::CONFLICT,
            Error::InvalidState(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Error::InvalidTimezone(_) | Error::DatabaseLock | Error::SqlError(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = self.status_code();

        let message = if status.is_server_error() {
            // Server errors are not intended to be shown to the client.
            tracing::error!("An unexpected error occurred: {}", self);
            "An unexpected error occurred, check the server logs for more details.".to_owned()
        } else {
            self.to_string()
        };

        (status, Json(json!({ "error": message }))).into_response()
    }
}
