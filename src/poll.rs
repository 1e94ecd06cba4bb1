// src/poll.rs
use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use sqlx::{Sqlite, SqlitePool};
use tracing::{info, instrument};
use uuid::Uuid;

use crate::{
    config::PollLimits,
    error::{PollError, ValidationError},
    models::{NewPoll, Poll, PollOption, PollStatus},
};

/// A poll stops accepting votes at its expiration instant.
pub fn is_expired(poll: &Poll, now: DateTime<Utc>) -> bool {
    now >= poll.expires_at
}

pub fn status(poll: &Poll, now: DateTime<Utc>) -> PollStatus {
    if is_expired(poll, now) {
        PollStatus::Expired
    } else {
        PollStatus::Active
    }
}

/// Checks a creation request and returns it with question and option texts trimmed.
pub fn validate(new_poll: &NewPoll, limits: &PollLimits, now: DateTime<Utc>) -> Result<NewPoll, ValidationError> {
    let question = new_poll.question.trim();
    let question_len = question.chars().count();
    if question_len == 0 {
        return Err(ValidationError::new("question", "must not be empty"));
    }
    if question_len < limits.min_question_len || question_len > limits.max_question_len {
        return Err(ValidationError::new(
            "question",
            format!(
                "must be between {} and {} characters, got {question_len}",
                limits.min_question_len, limits.max_question_len
            ),
        ));
    }

    let count = new_poll.options.len();
    if count < limits.min_options || count > limits.max_options {
        return Err(ValidationError::new(
            "options",
            format!(
                "must have between {} and {} options, got {count}",
                limits.min_options, limits.max_options
            ),
        ));
    }

    let mut seen = HashSet::with_capacity(count);
    let mut options = Vec::with_capacity(count);
    for (index, text) in new_poll.options.iter().enumerate() {
        let field = format!("options[{index}]");
        let text = text.trim();
        let len = text.chars().count();
        if len == 0 {
            return Err(ValidationError::new(field, "must not be empty"));
        }
        if len > limits.max_option_len {
            return Err(ValidationError::new(
                field,
                format!("must be at most {} characters, got {len}", limits.max_option_len),
            ));
        }
        if !seen.insert(text.to_lowercase()) {
            return Err(ValidationError::new(field, format!("duplicates another option: {text:?}")));
        }
        options.push(text.to_owned());
    }

    if new_poll.expires_at <= now {
        return Err(ValidationError::new("expires_at", "must be in the future"));
    }
    let beyond_horizon = now
        .checked_add_signed(limits.max_horizon)
        .is_some_and(|limit| new_poll.expires_at > limit);
    if beyond_horizon {
        return Err(ValidationError::new(
            "expires_at",
            format!("must be at most {} days ahead", limits.max_horizon.num_days()),
        ));
    }

    Ok(NewPoll {
        question: question.to_owned(),
        options,
        expires_at: new_poll.expires_at,
    })
}

/// Validates and stores a poll together with all of its options.
#[instrument(skip_all, fields(options = new_poll.options.len()))]
pub async fn create_poll(
    pool: &SqlitePool,
    limits: &PollLimits,
    new_poll: NewPoll,
    now: DateTime<Utc>,
) -> Result<Poll, PollError> {
    let new_poll = validate(&new_poll, limits, now)?;

    let mut poll = Poll {
        id: Uuid::new_v4(),
        question: new_poll.question,
        created_at: now,
        expires_at: new_poll.expires_at,
        options: Vec::with_capacity(new_poll.options.len()),
    };

    let mut tx = pool.begin().await?;

    sqlx::query("INSERT INTO polls (id, question, created_at, expires_at) VALUES (?, ?, ?, ?)")
        .bind(poll.id)
        .bind(&poll.question)
        .bind(poll.created_at)
        .bind(poll.expires_at)
        .execute(&mut *tx)
        .await?;

    for (position, text) in new_poll.options.into_iter().enumerate() {
        let option = PollOption {
            id: Uuid::new_v4(),
            poll_id: poll.id,
            position: position as i64,
            text,
            votes: 0,
        };

        sqlx::query("INSERT INTO options (id, poll_id, position, text, votes) VALUES (?, ?, ?, ?, 0)")
            .bind(option.id)
            .bind(option.poll_id)
            .bind(option.position)
            .bind(&option.text)
            .execute(&mut *tx)
            .await?;

        poll.options.push(option);
    }

    tx.commit().await?;

    info!(poll_id = %poll.id, expires_at = %poll.expires_at, "poll created");
    Ok(poll)
}

pub async fn get_poll(pool: &SqlitePool, poll_id: Uuid) -> Result<Poll, PollError> {
    let mut tx = pool.begin().await?;

    let mut poll = fetch_poll(&mut *tx, poll_id)
        .await?
        .ok_or_else(|| PollError::poll_not_found(poll_id))?;

    poll.options = sqlx::query_as::<_, PollOption>(
        "SELECT id, poll_id, position, text, votes FROM options WHERE poll_id = ? ORDER BY position",
    )
    .bind(poll_id)
    .fetch_all(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(poll)
}

/// All polls with their options, newest first.
pub async fn list_polls(pool: &SqlitePool) -> Result<Vec<Poll>, PollError> {
    let mut tx = pool.begin().await?;

    let mut polls = sqlx::query_as::<_, Poll>(
        "SELECT id, question, created_at, expires_at FROM polls ORDER BY created_at DESC, rowid DESC",
    )
    .fetch_all(&mut *tx)
    .await?;

    let options = sqlx::query_as::<_, PollOption>(
        "SELECT id, poll_id, position, text, votes FROM options ORDER BY poll_id, position",
    )
    .fetch_all(&mut *tx)
    .await?;

    tx.commit().await?;

    let mut by_poll: HashMap<Uuid, Vec<PollOption>> = HashMap::new();
    for option in options {
        by_poll.entry(option.poll_id).or_default().push(option);
    }
    for poll in &mut polls {
        poll.options = by_poll.remove(&poll.id).unwrap_or_default();
    }

    Ok(polls)
}

pub(crate) async fn fetch_poll<'e, E>(executor: E, poll_id: Uuid) -> Result<Option<Poll>, sqlx::Error>
where
    E: sqlx::Executor<'e, Database = Sqlite>,
{
    sqlx::query_as::<_, Poll>("SELECT id, question, created_at, expires_at FROM polls WHERE id = ?")
        .bind(poll_id)
        .fetch_optional(executor)
        .await
}
