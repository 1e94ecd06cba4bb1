// src/tally.rs
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use tracing::instrument;
use uuid::Uuid;

use crate::{
    error::PollError,
    models::{OptionTally, PollResults},
    poll,
};

/// Current counters for every option of a poll, in creation order.
#[instrument(skip(pool, now))]
pub async fn get_results(pool: &SqlitePool, poll_id: Uuid, now: DateTime<Utc>) -> Result<PollResults, PollError> {
    let mut tx = pool.begin().await?;

    let found = poll::fetch_poll(&mut *tx, poll_id)
        .await?
        .ok_or_else(|| PollError::poll_not_found(poll_id))?;

    let options = sqlx::query_as::<_, OptionTally>(
        "SELECT id AS option_id, text, votes FROM options WHERE poll_id = ? ORDER BY position",
    )
    .bind(poll_id)
    .fetch_all(&mut *tx)
    .await?;

    tx.commit().await?;

    Ok(PollResults {
        poll_id,
        status: poll::status(&found, now),
        question: found.question,
        expires_at: found.expires_at,
        options,
    })
}

/// Counts vote rows per option, ignoring the stored counters.
pub async fn recount(pool: &SqlitePool, poll_id: Uuid) -> Result<Vec<OptionTally>, PollError> {
    let mut tx = pool.begin().await?;

    if poll::fetch_poll(&mut *tx, poll_id).await?.is_none() {
        return Err(PollError::poll_not_found(poll_id));
    }

    let counted = sqlx::query_as::<_, OptionTally>(
        r#"
        SELECT o.id AS option_id, o.text AS text, COUNT(v.id) AS votes
        FROM options o
        LEFT JOIN votes v ON v.option_id = o.id
        WHERE o.poll_id = ?
        GROUP BY o.id, o.text, o.position
        ORDER BY o.position
        "#,
    )
    .bind(poll_id)
    .fetch_all(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(counted)
}
