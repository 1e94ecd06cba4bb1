use std::sync::Arc;

use sqlx::SqlitePool;

use crate::config::PollLimits;

#[derive(Clone)]
pub struct AppState {
    pub pool: SqlitePool,
    pub limits: Arc<PollLimits>,
}

impl AppState {
    pub fn new(pool: SqlitePool, limits: PollLimits) -> Self {
        Self {
            pool,
            limits: Arc::new(limits),
        }
    }
}
