// models.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Poll {
    pub id: Uuid,
    pub question: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    #[sqlx(skip)]
    pub options: Vec<PollOption>,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct PollOption {
    pub id: Uuid,
    pub poll_id: Uuid,
    /// Zero-based creation order within the poll.
    pub position: i64,
    pub text: String,
    pub votes: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Vote {
    pub id: Uuid,
    pub option_id: Uuid,
    pub voter_id: String,
    pub voted_at: DateTime<Utc>,
}

/// Poll creation input, before validation.
#[derive(Debug, Clone, Deserialize)]
pub struct NewPoll {
    pub question: String,
    pub options: Vec<String>,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PollStatus {
    Active,
    Expired,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct OptionTally {
    pub option_id: Uuid,
    pub text: String,
    pub votes: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollResults {
    pub poll_id: Uuid,
    pub question: String,
    pub expires_at: DateTime<Utc>,
    pub status: PollStatus,
    pub options: Vec<OptionTally>,
}

#[derive(Debug, Deserialize)]
pub struct VoteRequest {
    pub option_id: Uuid,
}
