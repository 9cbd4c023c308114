//! Postgres persistence for pipeline entities.
//!
//! One [`Store`] handle wraps the pool; per-table operations live in their
//! own modules as `impl Store` blocks. Every status write goes through the
//! source state machine's transition predicate.

pub mod events;
pub mod incidents;
pub mod sources;

use anyhow::{Context, Result};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing::info;

pub use events::{ExtractedEventRow, InsertEvent};
pub use incidents::{IncidentRow, InsertIncident};
pub use sources::{InsertSource, SourceRow};

#[derive(Clone)]
pub struct Store {
    pool: PgPool,
}

impl Store {
    /// Connect and apply any pending migrations.
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(20)
            .connect(database_url)
            .await
            .context("Failed to connect to Postgres")?;

        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .context("Failed to run migrations")?;

        info!("Store connected, migrations applied");
        Ok(Self { pool })
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}
