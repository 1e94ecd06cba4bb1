// handlers.rs
use axum::{
    extract::{FromRequestParts, Path, State},
    response::IntoResponse,
    Json,
};
use chrono::Utc;
use http::{request::Parts, HeaderName, StatusCode};
use serde_json::json;
use uuid::Uuid;

use crate::{
    error::{ApiError, PollError, ValidationError},
    ledger,
    models::{NewPoll, VoteRequest},
    poll,
    state::AppState,
    tally,
};

/// Header carrying the caller's identity, set by the authenticating gateway.
pub const VOTER_HEADER: HeaderName = HeaderName::from_static("x-voter-id");

/// Characters the request layer strips from poll text before it reaches the core.
const DISALLOWED: [char; 4] = ['<', '>', '"', '\''];

/// The resolved identity of the caller.
#[derive(Debug, Clone)]
pub struct Voter(pub String);

impl<S> FromRequestParts<S> for Voter
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let value = parts.headers.get(&VOTER_HEADER).ok_or(ApiError::Unauthenticated)?;

        // Present but unreadable is a bad identifier, not a missing one.
        let value = value
            .to_str()
            .map_err(|_| PollError::from(ValidationError::new("voter_id", "must be visible ASCII")))?
            .trim();
        if value.is_empty() {
            return Err(ApiError::Unauthenticated);
        }

        Ok(Voter(value.to_owned()))
    }
}

pub fn sanitize(text: &str) -> String {
    text.chars().filter(|c| !DISALLOWED.contains(c)).collect()
}

pub async fn health() -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}

/// List all polls with their options
pub async fn list_polls(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let polls = poll::list_polls(&state.pool).await?;
    Ok(Json(polls))
}

/// Create a poll and its options
pub async fn create_poll(
    State(state): State<AppState>,
    Json(request): Json<NewPoll>,
) -> Result<impl IntoResponse, ApiError> {
    let request = NewPoll {
        question: sanitize(&request.question),
        options: request.options.iter().map(|o| sanitize(o)).collect(),
        expires_at: request.expires_at,
    };

    let created = poll::create_poll(&state.pool, &state.limits, request, Utc::now()).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

pub async fn get_poll(
    State(state): State<AppState>,
    Path(poll_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let found = poll::get_poll(&state.pool, poll_id).await?;
    Ok(Json(found))
}

/// Current vote counts for a poll
pub async fn get_results(
    State(state): State<AppState>,
    Path(poll_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let results = tally::get_results(&state.pool, poll_id, Utc::now()).await?;
    Ok(Json(results))
}

/// Vote for an option
pub async fn vote(
    State(state): State<AppState>,
    Path(poll_id): Path<Uuid>,
    Voter(voter_id): Voter,
    Json(request): Json<VoteRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let vote = ledger::cast_vote(
        &state.pool,
        &state.limits,
        poll_id,
        request.option_id,
        &voter_id,
        Utc::now(),
    )
    .await?;

    Ok((StatusCode::CREATED, Json(vote)))
}
