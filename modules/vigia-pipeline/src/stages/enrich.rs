//! Enrich stage: attach each extraction to a canonical incident, minting
//! one when nothing in the ±1-day block scores high enough.

use anyhow::Result;
use chrono::NaiveDateTime;
use sqlx::PgConnection;
use tracing::info;

use vigia_common::{LcsSimilarity, Similarity};
use vigia_store::{ExtractedEventRow, IncidentRow, InsertIncident, Store};

use crate::dedup::{self, extract_neighborhood, find_best_match, DedupResolver};

#[derive(Debug, Clone)]
pub struct EnrichOptions {
    pub auto_create: bool,
    pub dry_run: bool,
}

impl Default for EnrichOptions {
    fn default() -> Self {
        Self {
            auto_create: true,
            dry_run: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnrichOutcome {
    Linked { incident_id: i64 },
    Created { incident_id: i64 },
    Skipped,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct EnrichReport {
    pub linked: u32,
    pub created: u32,
    pub skipped: u32,
}

impl std::fmt::Display for EnrichReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} linked, {} created, {} skipped",
            self.linked, self.created, self.skipped
        )
    }
}

/// Title for an auto-created incident: the victim when known, the date
/// otherwise, a fixed fallback when neither exists.
pub fn incident_title(victim: Option<&str>, date: Option<NaiveDateTime>) -> String {
    match (victim, date) {
        (Some(victim), _) if !victim.trim().is_empty() => format!("Morte de {}", victim.trim()),
        (_, Some(date)) => format!("Homicídio - {}", date.format("%d/%m/%Y")),
        _ => "Homicídio - Data desconhecida".to_string(),
    }
}

fn incident_from_extraction(extraction: &ExtractedEventRow, city: &str) -> InsertIncident {
    InsertIncident {
        title: incident_title(
            extraction.extracted_victim_name.as_deref(),
            extraction.extracted_date,
        ),
        date: extraction.extracted_date,
        location: extraction.extracted_location.clone(),
        city: city.to_string(),
        neighborhood: extraction
            .extracted_location
            .as_deref()
            .and_then(extract_neighborhood),
        description: Some(extraction.summary.clone()),
    }
}

/// Batch enrichment over every unlinked, dated extraction.
///
/// The whole sweep runs inside one transaction: an incident minted for the
/// first report of a killing is already a candidate for the second report
/// three iterations later, and dry-run is a rollback instead of a commit.
pub async fn run_enrich(store: &Store, city: &str, opts: &EnrichOptions) -> Result<EnrichReport> {
    let unlinked = store.list_unlinked_events_with_date().await?;
    info!(unlinked = unlinked.len(), dry_run = opts.dry_run, "Starting enrichment");

    let sim = LcsSimilarity;
    let mut report = EnrichReport::default();
    let mut tx = store.pool().begin().await?;

    for extraction in &unlinked {
        match enrich_in_tx(&mut tx, &sim, extraction, city, opts.auto_create).await? {
            EnrichOutcome::Linked { incident_id } => {
                info!(
                    extraction_id = extraction.id,
                    incident_id, "Matched extraction to incident"
                );
                report.linked += 1;
            }
            EnrichOutcome::Created { incident_id } => {
                info!(
                    extraction_id = extraction.id,
                    incident_id, "Created incident for extraction"
                );
                report.created += 1;
            }
            EnrichOutcome::Skipped => {
                report.skipped += 1;
            }
        }
    }

    if opts.dry_run {
        tx.rollback().await?;
        info!(%report, "Enrichment dry run rolled back");
    } else {
        tx.commit().await?;
        info!(%report, "Enrichment committed");
    }
    Ok(report)
}

async fn enrich_in_tx(
    tx: &mut PgConnection,
    sim: &dyn Similarity,
    extraction: &ExtractedEventRow,
    city: &str,
    auto_create: bool,
) -> Result<EnrichOutcome> {
    let Some(date) = extraction.extracted_date else {
        return Ok(EnrichOutcome::Skipped);
    };

    let min = date - chrono::Duration::days(dedup::DATE_TOLERANCE_DAYS);
    let max = date + chrono::Duration::days(dedup::DATE_TOLERANCE_DAYS);
    let candidates = sqlx::query_as::<_, IncidentRow>(
        "SELECT * FROM incidents WHERE date IS NOT NULL AND date >= $1 AND date <= $2 ORDER BY id",
    )
    .bind(min)
    .bind(max)
    .fetch_all(&mut *tx)
    .await?;

    let (matched, _score) = find_best_match(sim, extraction, &candidates);

    if let Some(incident) = matched {
        sqlx::query("UPDATE extracted_events SET incident_id = $2 WHERE id = $1")
            .bind(extraction.id)
            .bind(incident.id)
            .execute(&mut *tx)
            .await?;
        return Ok(EnrichOutcome::Linked {
            incident_id: incident.id,
        });
    }

    if !auto_create {
        return Ok(EnrichOutcome::Skipped);
    }

    let insert = incident_from_extraction(extraction, city);
    let (incident_id,): (i64,) = sqlx::query_as(
        r#"
        INSERT INTO incidents
            (title, date, location, city, neighborhood, description, confirmed, created_at)
        VALUES ($1, $2, $3, $4, $5, $6, FALSE, now() AT TIME ZONE 'utc')
        RETURNING id
        "#,
    )
    .bind(&insert.title)
    .bind(insert.date)
    .bind(&insert.location)
    .bind(&insert.city)
    .bind(&insert.neighborhood)
    .bind(&insert.description)
    .fetch_one(&mut *tx)
    .await?;

    sqlx::query("UPDATE extracted_events SET incident_id = $2 WHERE id = $1")
        .bind(extraction.id)
        .bind(incident_id)
        .execute(&mut *tx)
        .await?;

    Ok(EnrichOutcome::Created { incident_id })
}

/// Per-record enrichment for queue-chained jobs. Commits immediately.
pub async fn enrich_one(
    store: &Store,
    resolver: &DedupResolver,
    city: &str,
    event_id: i64,
    opts: &EnrichOptions,
) -> Result<EnrichOutcome> {
    let Some(extraction) = store.get_event(event_id).await? else {
        return Ok(EnrichOutcome::Skipped);
    };
    if extraction.incident_id.is_some() || extraction.extracted_date.is_none() {
        return Ok(EnrichOutcome::Skipped);
    }

    let (matched, score) = resolver.resolve(&extraction).await?;

    if let Some(incident) = matched {
        info!(event_id, incident_id = incident.id, score, "Matched extraction to incident");
        if !opts.dry_run {
            store.link_event_to_incident(event_id, incident.id).await?;
        }
        return Ok(EnrichOutcome::Linked {
            incident_id: incident.id,
        });
    }

    if !opts.auto_create {
        return Ok(EnrichOutcome::Skipped);
    }

    let insert = incident_from_extraction(&extraction, city);
    if opts.dry_run {
        info!(event_id, title = %insert.title, "Would create incident (dry run)");
        return Ok(EnrichOutcome::Skipped);
    }
    let incident_id = store.insert_incident(insert).await?;
    store.link_event_to_incident(event_id, incident_id).await?;
    info!(event_id, incident_id, "Created incident for extraction");
    Ok(EnrichOutcome::Created { incident_id })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn naive(y: i32, m: u32, d: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
    }

    #[test]
    fn title_prefers_victim_name() {
        assert_eq!(
            incident_title(Some("João da Silva"), Some(naive(2024, 5, 9))),
            "Morte de João da Silva"
        );
    }

    #[test]
    fn title_falls_back_to_date() {
        assert_eq!(
            incident_title(None, Some(naive(2024, 5, 9))),
            "Homicídio - 09/05/2024"
        );
        assert_eq!(
            incident_title(Some("   "), Some(naive(2024, 5, 9))),
            "Homicídio - 09/05/2024"
        );
    }

    #[test]
    fn title_handles_total_unknown() {
        assert_eq!(incident_title(None, None), "Homicídio - Data desconhecida");
    }

    #[test]
    fn incident_derives_neighborhood_from_location() {
        let extraction = ExtractedEventRow {
            id: 1,
            source_id: 1,
            summary: "Homem morto na Penha.".to_string(),
            extracted_victim_name: None,
            extracted_location: Some("Rua A, Bairro Penha, Rio".to_string()),
            extracted_date: Some(naive(2024, 5, 9)),
            confidence_score: 0.8,
            incident_id: None,
            created_at: naive(2024, 5, 10),
        };
        let insert = incident_from_extraction(&extraction, "Rio de Janeiro");
        assert_eq!(insert.neighborhood.as_deref(), Some("penha"));
        assert_eq!(insert.city, "Rio de Janeiro");
        assert!(!insert.title.is_empty());
    }
}
