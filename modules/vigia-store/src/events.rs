//! Extracted-event rows: one structured event per source, at most.

use anyhow::Result;
use chrono::NaiveDateTime;

use crate::Store;

/// A row from the extracted_events table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ExtractedEventRow {
    pub id: i64,
    pub source_id: i64,
    pub summary: String,
    pub extracted_victim_name: Option<String>,
    pub extracted_location: Option<String>,
    pub extracted_date: Option<NaiveDateTime>,
    pub confidence_score: f64,
    pub incident_id: Option<i64>,
    pub created_at: NaiveDateTime,
}

/// Parameters for upserting an extraction.
pub struct InsertEvent {
    pub source_id: i64,
    pub summary: String,
    pub extracted_victim_name: Option<String>,
    pub extracted_location: Option<String>,
    pub extracted_date: Option<NaiveDateTime>,
    pub confidence_score: f64,
}

impl Store {
    /// Insert the extraction for a source, or update it in place when one
    /// already exists (the force re-extract path). The row id is stable
    /// across updates; the 1:1 source_id unique constraint carries the
    /// at-most-one invariant.
    pub async fn upsert_event(&self, event: InsertEvent) -> Result<i64> {
        let (id,): (i64,) = sqlx::query_as(
            r#"
            INSERT INTO extracted_events
                (source_id, summary, extracted_victim_name, extracted_location,
                 extracted_date, confidence_score, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, now() AT TIME ZONE 'utc')
            ON CONFLICT (source_id) DO UPDATE SET
                summary = EXCLUDED.summary,
                extracted_victim_name = EXCLUDED.extracted_victim_name,
                extracted_location = EXCLUDED.extracted_location,
                extracted_date = EXCLUDED.extracted_date,
                confidence_score = EXCLUDED.confidence_score
            RETURNING id
            "#,
        )
        .bind(event.source_id)
        .bind(&event.summary)
        .bind(&event.extracted_victim_name)
        .bind(&event.extracted_location)
        .bind(event.extracted_date)
        .bind(event.confidence_score)
        .fetch_one(&self.pool)
        .await?;
        Ok(id)
    }

    pub async fn get_event(&self, id: i64) -> Result<Option<ExtractedEventRow>> {
        let row =
            sqlx::query_as::<_, ExtractedEventRow>("SELECT * FROM extracted_events WHERE id = $1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(row)
    }

    pub async fn find_event_by_source(&self, source_id: i64) -> Result<Option<ExtractedEventRow>> {
        let row = sqlx::query_as::<_, ExtractedEventRow>(
            "SELECT * FROM extracted_events WHERE source_id = $1",
        )
        .bind(source_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    /// Extractions that can be resolved: unlinked, with a usable date.
    pub async fn list_unlinked_events_with_date(&self) -> Result<Vec<ExtractedEventRow>> {
        let rows = sqlx::query_as::<_, ExtractedEventRow>(
            r#"
            SELECT * FROM extracted_events
            WHERE incident_id IS NULL AND extracted_date IS NOT NULL
            ORDER BY id
            "#,
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    pub async fn link_event_to_incident(&self, event_id: i64, incident_id: i64) -> Result<()> {
        sqlx::query("UPDATE extracted_events SET incident_id = $2 WHERE id = $1")
            .bind(event_id)
            .bind(incident_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Re-point every extraction on one incident to another (merge support).
    pub async fn relink_events(&self, from_incident: i64, to_incident: i64) -> Result<u64> {
        let result =
            sqlx::query("UPDATE extracted_events SET incident_id = $2 WHERE incident_id = $1")
                .bind(from_incident)
                .bind(to_incident)
                .execute(&self.pool)
                .await?;
        Ok(result.rows_affected())
    }
}
