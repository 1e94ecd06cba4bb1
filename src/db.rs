// src/db.rs
use std::{str::FromStr, time::Duration};

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use tracing::info;

use crate::config::DatabaseConfig;

const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS polls (
        id BLOB PRIMARY KEY NOT NULL,
        question TEXT NOT NULL,
        created_at TEXT NOT NULL,
        expires_at TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS options (
        id BLOB PRIMARY KEY NOT NULL,
        poll_id BLOB NOT NULL REFERENCES polls (id) ON DELETE CASCADE,
        position INTEGER NOT NULL,
        text TEXT NOT NULL,
        votes INTEGER NOT NULL DEFAULT 0 CHECK (votes >= 0),
        UNIQUE (poll_id, position)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS votes (
        id BLOB PRIMARY KEY NOT NULL,
        option_id BLOB NOT NULL REFERENCES options (id) ON DELETE CASCADE,
        voter_id TEXT NOT NULL,
        voted_at TEXT NOT NULL,
        UNIQUE (option_id, voter_id)
    )
    "#,
    "CREATE INDEX IF NOT EXISTS votes_voter_option_idx ON votes (voter_id, option_id)",
];

pub async fn create_pool(config: &DatabaseConfig) -> Result<SqlitePool, sqlx::Error> {
    let in_memory = is_in_memory(&config.url);

    let options = SqliteConnectOptions::from_str(&config.url)?
        .create_if_missing(true)
        .foreign_keys(true)
        .busy_timeout(Duration::from_secs(5));

    // Every connection to an in-memory URL opens its own database, so keep exactly one alive.
    let pool = if in_memory {
        SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?
    } else {
        SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .connect_with(options.journal_mode(SqliteJournalMode::Wal))
            .await?
    };

    info!(url = %config.url, in_memory, "database pool ready");
    Ok(pool)
}

fn is_in_memory(url: &str) -> bool {
    url.contains(":memory:") || url.contains("mode=memory")
}

pub async fn migrate(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    let mut tx = pool.begin().await?;
    for statement in SCHEMA {
        sqlx::query(*statement).execute(&mut *tx).await?;
    }
    tx.commit().await
}
