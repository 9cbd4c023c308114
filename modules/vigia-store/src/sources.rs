//! Source rows: discovered article candidates and their lifecycle state.

use anyhow::{anyhow, Result};
use chrono::NaiveDateTime;

use vigia_common::SourceStatus;

use crate::Store;

/// A row from the sources table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct SourceRow {
    pub id: i64,
    pub url: String,
    pub resolved_url: Option<String>,
    pub title: String,
    pub source_type: String,
    pub status: String,
    pub content: Option<String>,
    pub published_at: Option<NaiveDateTime>,
    pub fetched_at: NaiveDateTime,
}

impl SourceRow {
    pub fn status(&self) -> SourceStatus {
        SourceStatus::parse(&self.status).unwrap_or(SourceStatus::Pending)
    }

    /// The URL downloads should hit: resolved when available.
    pub fn effective_url(&self) -> &str {
        self.resolved_url.as_deref().unwrap_or(&self.url)
    }
}

/// Parameters for inserting a newly discovered source.
pub struct InsertSource {
    pub url: String,
    pub title: String,
    pub source_type: String,
    pub published_at: Option<NaiveDateTime>,
}

impl Store {
    pub async fn insert_source(&self, source: InsertSource) -> Result<i64> {
        let (id,): (i64,) = sqlx::query_as(
            r#"
            INSERT INTO sources (url, title, source_type, status, published_at, fetched_at)
            VALUES ($1, $2, $3, 'pending', $4, now() AT TIME ZONE 'utc')
            RETURNING id
            "#,
        )
        .bind(&source.url)
        .bind(&source.title)
        .bind(&source.source_type)
        .bind(source.published_at)
        .fetch_one(&self.pool)
        .await?;
        Ok(id)
    }

    pub async fn find_source_by_url(&self, url: &str) -> Result<Option<SourceRow>> {
        let row = sqlx::query_as::<_, SourceRow>("SELECT * FROM sources WHERE url = $1")
            .bind(url)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }

    pub async fn get_source(&self, id: i64) -> Result<Option<SourceRow>> {
        let row = sqlx::query_as::<_, SourceRow>("SELECT * FROM sources WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }

    pub async fn set_source_published_at(&self, id: i64, date: NaiveDateTime) -> Result<()> {
        sqlx::query("UPDATE sources SET published_at = $2 WHERE id = $1")
            .bind(id)
            .bind(date)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn set_source_resolved_url(&self, id: i64, resolved_url: &str) -> Result<()> {
        sqlx::query("UPDATE sources SET resolved_url = $2 WHERE id = $1")
            .bind(id)
            .bind(resolved_url)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Move a source's status, enforcing the state machine. Illegal moves
    /// (backward without `force`, leaving `failed` without `force`) error.
    pub async fn set_source_status(
        &self,
        id: i64,
        to: SourceStatus,
        force: bool,
    ) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        let (current,): (String,) =
            sqlx::query_as("SELECT status FROM sources WHERE id = $1 FOR UPDATE")
                .bind(id)
                .fetch_one(&mut *tx)
                .await?;
        let current = SourceStatus::parse(&current)
            .ok_or_else(|| anyhow!("source {id} has unknown status {current}"))?;

        if !current.can_transition(to, force) {
            return Err(anyhow!(
                "illegal status transition for source {id}: {current} -> {to} (force={force})"
            ));
        }

        sqlx::query("UPDATE sources SET status = $2 WHERE id = $1")
            .bind(id)
            .bind(to.as_str())
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(())
    }

    /// Persist downloaded content, the new status, and (when present) a
    /// reconciled publication date, atomically.
    pub async fn store_source_content(
        &self,
        id: i64,
        content: &str,
        published_at: Option<NaiveDateTime>,
        force: bool,
    ) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        let (current,): (String,) =
            sqlx::query_as("SELECT status FROM sources WHERE id = $1 FOR UPDATE")
                .bind(id)
                .fetch_one(&mut *tx)
                .await?;
        let current = SourceStatus::parse(&current)
            .ok_or_else(|| anyhow!("source {id} has unknown status {current}"))?;
        if !current.can_transition(SourceStatus::Downloaded, force) {
            return Err(anyhow!(
                "illegal status transition for source {id}: {current} -> downloaded"
            ));
        }

        sqlx::query("UPDATE sources SET content = $2, status = 'downloaded' WHERE id = $1")
            .bind(id)
            .bind(content)
            .execute(&mut *tx)
            .await?;
        if let Some(date) = published_at {
            sqlx::query("UPDATE sources SET published_at = $2 WHERE id = $1")
                .bind(id)
                .bind(date)
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    /// IDs of sources awaiting extraction: everything not yet `processed`,
    /// or every source under `force`.
    pub async fn list_extractable_source_ids(
        &self,
        force: bool,
        limit: Option<i64>,
    ) -> Result<Vec<i64>> {
        let sql = if force {
            "SELECT id FROM sources ORDER BY id LIMIT $1"
        } else {
            "SELECT id FROM sources WHERE status != 'processed' ORDER BY id LIMIT $1"
        };
        let rows: Vec<(i64,)> = sqlx::query_as(sql)
            .bind(limit.unwrap_or(i64::MAX))
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(|(id,)| id).collect())
    }

    /// IDs of sources with a given status, oldest first.
    pub async fn list_source_ids_by_status(
        &self,
        status: SourceStatus,
        limit: i64,
    ) -> Result<Vec<i64>> {
        let rows: Vec<(i64,)> =
            sqlx::query_as("SELECT id FROM sources WHERE status = $1 ORDER BY id LIMIT $2")
                .bind(status.as_str())
                .bind(limit)
                .fetch_all(&self.pool)
                .await?;
        Ok(rows.into_iter().map(|(id,)| id).collect())
    }
}
