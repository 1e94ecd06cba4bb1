//! Shared fixtures for the database-backed tests.

#![allow(dead_code)]

use chrono::{DateTime, TimeDelta, TimeZone, Utc};
use poll_ledger::{
    config::{DatabaseConfig, PollLimits},
    db,
    models::{NewPoll, Poll},
    poll,
};
use sqlx::SqlitePool;
use tempfile::TempDir;

/// A migrated on-disk database that lives as long as this value.
pub struct TestDb {
    pub pool: SqlitePool,
    _dir: TempDir,
}

pub async fn test_db() -> TestDb {
    let dir = tempfile::tempdir().unwrap();
    let url = format!("sqlite://{}", dir.path().join("polls.db").display());

    let pool = db::create_pool(&DatabaseConfig {
        url,
        max_connections: 8,
    })
    .await
    .unwrap();
    db::migrate(&pool).await.unwrap();

    TestDb { pool, _dir: dir }
}

pub fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 6, 1, 9, 0, 0).unwrap()
}

pub fn limits() -> PollLimits {
    PollLimits::default()
}

pub fn new_poll(question: &str, options: &[&str], expires_in: TimeDelta) -> NewPoll {
    NewPoll {
        question: question.to_string(),
        options: options.iter().map(|o| o.to_string()).collect(),
        expires_at: now() + expires_in,
    }
}

/// "Best language?" with options Go and Rust, expiring in an hour.
pub async fn language_poll(pool: &SqlitePool) -> Poll {
    poll::create_poll(
        pool,
        &limits(),
        new_poll("Best language?", &["Go", "Rust"], TimeDelta::hours(1)),
        now(),
    )
    .await
    .unwrap()
}

pub async fn vote_rows(pool: &SqlitePool) -> i64 {
    sqlx::query_scalar("SELECT COUNT(*) FROM votes")
        .fetch_one(pool)
        .await
        .unwrap()
}
