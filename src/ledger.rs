//! Vote recording.
//!
//! A vote and its counter increment are written in one SQLite transaction. The
//! `(option_id, voter_id)` unique index decides duplicates; there is no separate
//! "has this voter voted" read, so two racing requests for the same pair can never
//! both succeed.

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use tracing::{debug, info, instrument};
use uuid::Uuid;

use crate::{
    config::PollLimits,
    error::{PollError, ValidationError},
    models::Vote,
    poll,
};

/// Records one vote for `option_id` in `poll_id` on behalf of `voter_id`.
///
/// Fails with [`PollError::NotFound`] for an unknown poll or an option outside the
/// poll, [`PollError::Expired`] once `now` reaches the poll's expiry, and
/// [`PollError::DuplicateVote`] if the voter already holds a vote for the option.
/// On any failure nothing is written.
#[instrument(skip(pool, limits, now))]
pub async fn cast_vote(
    pool: &SqlitePool,
    limits: &PollLimits,
    poll_id: Uuid,
    option_id: Uuid,
    voter_id: &str,
    now: DateTime<Utc>,
) -> Result<Vote, PollError> {
    let voter_id = validate_voter(voter_id, limits)?;

    let mut tx = pool.begin().await?;

    // Write first so the transaction holds the write lock before it reads anything.
    let bumped = sqlx::query("UPDATE options SET votes = votes + 1 WHERE id = ? AND poll_id = ?")
        .bind(option_id)
        .bind(poll_id)
        .execute(&mut *tx)
        .await?;

    let Some(found) = poll::fetch_poll(&mut *tx, poll_id).await? else {
        tx.rollback().await?;
        return Err(PollError::poll_not_found(poll_id));
    };

    if bumped.rows_affected() == 0 {
        tx.rollback().await?;
        return Err(PollError::option_not_found(option_id));
    }

    if poll::is_expired(&found, now) {
        tx.rollback().await?;
        debug!(expires_at = %found.expires_at, "vote on expired poll rejected");
        return Err(PollError::Expired {
            poll_id,
            expires_at: found.expires_at,
        });
    }

    let vote = Vote {
        id: Uuid::new_v4(),
        option_id,
        voter_id: voter_id.to_owned(),
        voted_at: now,
    };

    let inserted = sqlx::query("INSERT INTO votes (id, option_id, voter_id, voted_at) VALUES (?, ?, ?, ?)")
        .bind(vote.id)
        .bind(vote.option_id)
        .bind(&vote.voter_id)
        .bind(vote.voted_at)
        .execute(&mut *tx)
        .await;

    match inserted {
        Ok(_) => {}
        Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
            tx.rollback().await?;
            debug!("duplicate vote rejected");
            return Err(PollError::DuplicateVote {
                option_id,
                voter_id: vote.voter_id,
            });
        }
        Err(e) => return Err(e.into()),
    }

    tx.commit().await?;

    info!(vote_id = %vote.id, "vote recorded");
    Ok(vote)
}

fn validate_voter<'a>(voter_id: &'a str, limits: &PollLimits) -> Result<&'a str, ValidationError> {
    let voter_id = voter_id.trim();
    if voter_id.is_empty() {
        return Err(ValidationError::new("voter_id", "must not be empty"));
    }
    if voter_id.chars().count() > limits.max_voter_id_len {
        return Err(ValidationError::new(
            "voter_id",
            format!("must be at most {} characters", limits.max_voter_id_len),
        ));
    }
    Ok(voter_id)
}
