// src/error.rs
use std::fmt;

use axum::{
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, Utc};
use http::StatusCode;
use serde_json::json;
use thiserror::Error;
use tracing::error;
use uuid::Uuid;

/// A rejected field on poll creation or vote input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub field: String,
    pub reason: String,
}

impl ValidationError {
    pub fn new(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.reason)
    }
}

impl std::error::Error for ValidationError {}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Entity {
    Poll,
    Option,
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Entity::Poll => f.write_str("poll"),
            Entity::Option => f.write_str("option"),
        }
    }
}

#[derive(Debug, Error)]
pub enum PollError {
    #[error("{entity} {id} not found")]
    NotFound { entity: Entity, id: Uuid },

    #[error("poll {poll_id} expired at {expires_at}")]
    Expired {
        poll_id: Uuid,
        expires_at: DateTime<Utc>,
    },

    #[error("voter {voter_id:?} already voted for option {option_id}")]
    DuplicateVote { option_id: Uuid, voter_id: String },

    #[error("invalid {0}")]
    Validation(#[from] ValidationError),

    #[error("storage failure: {0}")]
    Storage(#[from] sqlx::Error),
}

impl PollError {
    pub fn poll_not_found(id: Uuid) -> Self {
        PollError::NotFound {
            entity: Entity::Poll,
            id,
        }
    }

    pub fn option_not_found(id: Uuid) -> Self {
        PollError::NotFound {
            entity: Entity::Option,
            id,
        }
    }

    /// Stable machine-readable name of the failure.
    pub fn kind(&self) -> &'static str {
        match self {
            PollError::NotFound { .. } => "not_found",
            PollError::Expired { .. } => "expired",
            PollError::DuplicateVote { .. } => "duplicate_vote",
            PollError::Validation(_) => "validation_error",
            PollError::Storage(_) => "storage_failure",
        }
    }
}

/// Errors surfaced by the HTTP layer.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("missing voter identity")]
    Unauthenticated,

    #[error(transparent)]
    Poll(#[from] PollError),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Unauthenticated => StatusCode::UNAUTHORIZED,
            ApiError::Poll(PollError::NotFound { .. }) => StatusCode::NOT_FOUND,
            ApiError::Poll(
                PollError::Expired { .. } | PollError::DuplicateVote { .. } | PollError::Validation(_),
            ) => StatusCode::BAD_REQUEST,
            ApiError::Poll(PollError::Storage(_)) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();

        let body = match &self {
            ApiError::Unauthenticated => json!({
                "error": "unauthenticated",
                "message": self.to_string(),
            }),
            ApiError::Poll(PollError::Validation(v)) => json!({
                "error": "validation_error",
                "message": v.reason,
                "field": v.field,
            }),
            ApiError::Poll(PollError::Storage(source)) => {
                error!(error = %source, "storage failure");
                json!({
                    "error": "storage_failure",
                    "message": "internal storage error",
                })
            }
            ApiError::Poll(err) => json!({
                "error": err.kind(),
                "message": err.to_string(),
            }),
        };

        (status, Json(body)).into_response()
    }
}
