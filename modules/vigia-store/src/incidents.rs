//! Incident rows: canonical real-world events.

use anyhow::Result;
use chrono::NaiveDateTime;

use crate::Store;

/// A row from the incidents table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct IncidentRow {
    pub id: i64,
    pub title: String,
    pub date: Option<NaiveDateTime>,
    pub location: Option<String>,
    pub city: String,
    pub neighborhood: Option<String>,
    pub description: Option<String>,
    pub confirmed: bool,
    pub created_at: NaiveDateTime,
}

/// Parameters for creating an incident. Auto-created incidents always start
/// unconfirmed.
pub struct InsertIncident {
    pub title: String,
    pub date: Option<NaiveDateTime>,
    pub location: Option<String>,
    pub city: String,
    pub neighborhood: Option<String>,
    pub description: Option<String>,
}

impl Store {
    pub async fn insert_incident(&self, incident: InsertIncident) -> Result<i64> {
        let (id,): (i64,) = sqlx::query_as(
            r#"
            INSERT INTO incidents
                (title, date, location, city, neighborhood, description, confirmed, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, FALSE, now() AT TIME ZONE 'utc')
            RETURNING id
            "#,
        )
        .bind(&incident.title)
        .bind(incident.date)
        .bind(&incident.location)
        .bind(&incident.city)
        .bind(&incident.neighborhood)
        .bind(&incident.description)
        .fetch_one(&self.pool)
        .await?;
        Ok(id)
    }

    pub async fn get_incident(&self, id: i64) -> Result<Option<IncidentRow>> {
        let row = sqlx::query_as::<_, IncidentRow>("SELECT * FROM incidents WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }

    /// Blocking query: incidents whose date falls inside the ±window around
    /// the anchor. Insertion order (id) so the resolver's tie-break is
    /// deterministic.
    pub async fn find_incidents_in_window(
        &self,
        anchor: NaiveDateTime,
        tolerance_days: i64,
    ) -> Result<Vec<IncidentRow>> {
        let min = anchor - chrono::Duration::days(tolerance_days);
        let max = anchor + chrono::Duration::days(tolerance_days);
        let rows = sqlx::query_as::<_, IncidentRow>(
            r#"
            SELECT * FROM incidents
            WHERE date IS NOT NULL AND date >= $1 AND date <= $2
            ORDER BY id
            "#,
        )
        .bind(min)
        .bind(max)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    /// All dated incidents, oldest id first (merge sweep input).
    pub async fn list_dated_incidents(&self) -> Result<Vec<IncidentRow>> {
        let rows = sqlx::query_as::<_, IncidentRow>(
            "SELECT * FROM incidents WHERE date IS NOT NULL ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    /// Remove a merged-away duplicate. Only the merge sweep calls this,
    /// after relinking the loser's extractions to the survivor.
    pub async fn delete_incident(&self, id: i64) -> Result<()> {
        sqlx::query("DELETE FROM incidents WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
