//! Identifies the user making a request.
//!
//! Authentication happens in front of this service, which forwards the
//! authenticated user's ID in the [ACTOR_HEADER] header.

use axum::{extract::FromRequestParts, http::request::Parts};

use crate::{Error, user::UserID};

/// The header carrying the ID of the authenticated user.
pub const ACTOR_HEADER: &str = "x-user-id";

/// The user on whose behalf a request is made.
///
/// Extracting an `Actor` fails with [Error::Unauthenticated] if the
/// [ACTOR_HEADER] header is missing or is not an integer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Actor(UserID);

impl Actor {
    /// Create an actor for `user_id`.
    pub fn new(user_id: UserID) -> Self {
        Self(user_id)
    }

    /// The ID of the acting user.
    pub fn user_id(&self) -> UserID {
        self.0
    }
}

impl<S> FromRequestParts<S> for Actor
where
    S: Send + Sync,
{
    type Rejection = Error;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .headers
            .get(ACTOR_HEADER)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.trim().parse::<i64>().ok())
            .map(|id| Actor(UserID::new(id)))
            .ok_or_else(|| {
                tracing::debug!("rejected request without a valid {ACTOR_HEADER} header");
                Error::Unauthenticated
            })
    }
}
