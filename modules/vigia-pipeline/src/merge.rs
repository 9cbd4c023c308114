//! Operator-invoked incident merge sweep.
//!
//! Auto-created incidents can still double up when reports disagree enough
//! to defeat the resolver. This pass re-scores incident pairs inside the
//! same date block and folds the newer row into the older one, re-pointing
//! its extractions. Merging is the one sanctioned way an incident dies.

use std::collections::HashSet;

use anyhow::Result;
use tracing::info;

use vigia_common::{LcsSimilarity, Similarity};
use vigia_store::{IncidentRow, Store};

use crate::dedup::{extract_neighborhood, DATE_TOLERANCE_DAYS, MATCH_THRESHOLD};

#[derive(Debug, Clone, Copy, Default)]
pub struct MergeReport {
    pub examined: u32,
    pub merged: u32,
}

impl std::fmt::Display for MergeReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} examined, {} merged", self.examined, self.merged)
    }
}

/// Score two incidents with the resolver's weights: titles carry the
/// victim signal, then location, then description.
pub fn incident_pair_score(sim: &dyn Similarity, a: &IncidentRow, b: &IncidentRow) -> f64 {
    let mut score = 0.5 * sim.ratio(&a.title, &b.title);

    if let (Some(loc_a), Some(loc_b)) = (a.location.as_deref(), b.location.as_deref()) {
        let mut loc_score = sim.ratio(loc_a, loc_b);
        let na = a
            .neighborhood
            .clone()
            .or_else(|| extract_neighborhood(loc_a));
        let nb = b
            .neighborhood
            .clone()
            .or_else(|| extract_neighborhood(loc_b));
        if let (Some(na), Some(nb)) = (na, nb) {
            loc_score = loc_score.max(sim.ratio(&na, &nb));
        }
        score += 0.3 * loc_score;
    }

    if let (Some(da), Some(db)) = (a.description.as_deref(), b.description.as_deref()) {
        score += 0.2 * sim.ratio(da, db);
    }

    score
}

/// Run the merge sweep. Pairs are blocked by date (±1 day); the older row
/// survives. Dry-run only reports.
pub async fn run_merge(store: &Store, dry_run: bool) -> Result<MergeReport> {
    let incidents = store.list_dated_incidents().await?;
    let sim = LcsSimilarity;

    let mut report = MergeReport::default();
    let mut consumed: HashSet<i64> = HashSet::new();

    for (j, newer) in incidents.iter().enumerate() {
        if consumed.contains(&newer.id) {
            continue;
        }
        for older in &incidents[..j] {
            if consumed.contains(&older.id) {
                continue;
            }
            let (Some(date_a), Some(date_b)) = (older.date, newer.date) else {
                continue;
            };
            if (date_a - date_b).num_days().abs() > DATE_TOLERANCE_DAYS {
                continue;
            }

            report.examined += 1;
            let score = incident_pair_score(&sim, older, newer);
            if score < MATCH_THRESHOLD {
                continue;
            }

            info!(
                survivor = older.id,
                duplicate = newer.id,
                score,
                dry_run,
                "Merging duplicate incident"
            );
            if !dry_run {
                let relinked = store.relink_events(newer.id, older.id).await?;
                store.delete_incident(newer.id).await?;
                info!(survivor = older.id, relinked, "Merge applied");
            }
            consumed.insert(newer.id);
            report.merged += 1;
            break;
        }
    }

    info!(%report, dry_run, "Incident merge sweep complete");
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, NaiveDateTime};

    fn naive(y: i32, m: u32, d: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
    }

    fn incident(id: i64, title: &str, location: Option<&str>, description: Option<&str>) -> IncidentRow {
        IncidentRow {
            id,
            title: title.to_string(),
            date: Some(naive(2024, 5, 9)),
            location: location.map(str::to_string),
            city: "Rio de Janeiro".to_string(),
            neighborhood: None,
            description: description.map(str::to_string),
            confirmed: false,
            created_at: naive(2024, 5, 9),
        }
    }

    #[test]
    fn identical_incidents_score_high() {
        let a = incident(1, "Morte de João da Silva", Some("Penha"), Some("Morto a tiros."));
        let b = incident(2, "Morte de João da Silva", Some("Penha"), Some("Morto a tiros."));
        let score = incident_pair_score(&LcsSimilarity, &a, &b);
        assert!(score > 0.99, "got {score}");
    }

    #[test]
    fn unrelated_incidents_score_low() {
        let a = incident(1, "Morte de João da Silva", Some("Penha"), None);
        let b = incident(2, "Corpo de mulher achado em Bangu", Some("Bangu"), None);
        let score = incident_pair_score(&LcsSimilarity, &a, &b);
        assert!(score < MATCH_THRESHOLD, "got {score}");
    }

    #[test]
    fn missing_fields_contribute_zero() {
        let a = incident(1, "Morte de João", None, None);
        let b = incident(2, "Morte de João", None, None);
        let score = incident_pair_score(&LcsSimilarity, &a, &b);
        assert!((score - 0.5).abs() < 1e-9);
    }
}
