//! Incident resolution: blocking by date, scoring by weighted fuzzy
//! features.
//!
//! An extraction without a date has an empty candidate set and is never
//! matched (nor auto-created) here. Weights and threshold follow the
//! archive's tuning: the victim name dominates, location corroborates,
//! summary breaks near-ties.

use anyhow::Result;
use chrono::NaiveDateTime;

use vigia_common::{LcsSimilarity, Similarity};
use vigia_store::{ExtractedEventRow, IncidentRow, Store};

pub const DATE_TOLERANCE_DAYS: i64 = 1;
pub const MATCH_THRESHOLD: f64 = 0.60;

const VICTIM_NAME_WEIGHT: f64 = 0.5;
const LOCATION_WEIGHT: f64 = 0.3;
const SUMMARY_WEIGHT: f64 = 0.2;

/// Portuguese locality indicators that introduce a neighborhood name.
const NEIGHBORHOOD_INDICATORS: &[&str] = &["bairro", "comunidade", "morro", "favela", "complexo"];

/// Extract the neighborhood from a location string.
///
/// "Rua X, Bairro da Penha, Rio de Janeiro" → "da penha". Without any
/// indicator the whole trimmed string comes back: a bare "Rocinha" is
/// usually already a neighborhood name.
pub fn extract_neighborhood(location: &str) -> Option<String> {
    let loc_lower = location.to_lowercase();
    for indicator in NEIGHBORHOOD_INDICATORS {
        if let Some(idx) = loc_lower.find(indicator) {
            let after = &loc_lower[idx + indicator.len()..];
            let neighborhood = after.split(',').next().unwrap_or("").trim();
            return if neighborhood.is_empty() {
                None
            } else {
                Some(neighborhood.to_string())
            };
        }
    }
    let trimmed = location.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// Weighted match score between an extraction and a candidate incident,
/// in `[0, 1]`. A component with a missing operand contributes 0.
pub fn match_score(
    sim: &dyn Similarity,
    extraction: &ExtractedEventRow,
    incident: &IncidentRow,
) -> f64 {
    let mut score = 0.0;

    if let Some(victim) = non_empty(extraction.extracted_victim_name.as_deref()) {
        let mut name_score = sim.ratio(victim, &incident.title);
        if let Some(description) = non_empty(incident.description.as_deref()) {
            name_score = name_score.max(sim.ratio(victim, description));
        }
        score += name_score * VICTIM_NAME_WEIGHT;
    }

    if let (Some(ext_loc), Some(inc_loc)) = (
        non_empty(extraction.extracted_location.as_deref()),
        non_empty(incident.location.as_deref()),
    ) {
        let mut loc_score = sim.ratio(ext_loc, inc_loc);
        let ext_neighborhood = extract_neighborhood(ext_loc);
        let inc_neighborhood = incident
            .neighborhood
            .clone()
            .or_else(|| extract_neighborhood(inc_loc));
        if let (Some(en), Some(inn)) = (ext_neighborhood, inc_neighborhood) {
            loc_score = loc_score.max(sim.ratio(&en, &inn));
        }
        score += loc_score * LOCATION_WEIGHT;
    }

    if let Some(description) = non_empty(incident.description.as_deref()) {
        if !extraction.summary.trim().is_empty() {
            score += sim.ratio(&extraction.summary, description) * SUMMARY_WEIGHT;
        }
    }

    score
}

/// Pick the best-scoring candidate. Returns the match only when it clears
/// [`MATCH_THRESHOLD`]; the best score seen comes back either way. Ties go
/// to the earlier candidate (insertion order).
pub fn find_best_match<'a>(
    sim: &dyn Similarity,
    extraction: &ExtractedEventRow,
    candidates: &'a [IncidentRow],
) -> (Option<&'a IncidentRow>, f64) {
    let mut best: Option<&IncidentRow> = None;
    let mut best_score = 0.0;

    for incident in candidates {
        let score = match_score(sim, extraction, incident);
        if score > best_score {
            best_score = score;
            best = Some(incident);
        }
    }

    if best_score >= MATCH_THRESHOLD {
        (best, best_score)
    } else {
        (None, best_score)
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// Store-backed resolver: blocking query then in-memory scoring.
pub struct DedupResolver {
    store: Store,
    sim: Box<dyn Similarity>,
}

impl DedupResolver {
    pub fn new(store: Store) -> Self {
        Self {
            store,
            sim: Box::new(LcsSimilarity),
        }
    }

    pub fn with_similarity(store: Store, sim: Box<dyn Similarity>) -> Self {
        Self { store, sim }
    }

    /// Resolve an extraction against existing incidents. No date → no
    /// candidates → `(None, 0.0)`.
    pub async fn resolve(
        &self,
        extraction: &ExtractedEventRow,
    ) -> Result<(Option<IncidentRow>, f64)> {
        let Some(date) = extraction.extracted_date else {
            return Ok((None, 0.0));
        };
        let candidates = self.candidates(date).await?;
        let (best, score) = find_best_match(self.sim.as_ref(), extraction, &candidates);
        Ok((best.cloned(), score))
    }

    pub async fn candidates(&self, date: NaiveDateTime) -> Result<Vec<IncidentRow>> {
        self.store
            .find_incidents_in_window(date, DATE_TOLERANCE_DAYS)
            .await
    }

    pub fn similarity(&self) -> &dyn Similarity {
        self.sim.as_ref()
    }
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

    fn extraction(
        victim: Option<&str>,
        location: Option<&str>,
        summary: &str,
        date: Option<NaiveDateTime>,
    ) -> ExtractedEventRow {
        ExtractedEventRow {
            id: 1,
            source_id: 1,
            summary: summary.to_string(),
            extracted_victim_name: victim.map(str::to_string),
            extracted_location: location.map(str::to_string),
            extracted_date: date,
            confidence_score: 0.9,
            incident_id: None,
            created_at: naive(2024, 5, 10),
        }
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
    fn neighborhood_after_indicator_up_to_comma() {
        assert_eq!(
            extract_neighborhood("Rua X, Bairro Penha, Rio de Janeiro").as_deref(),
            Some("penha")
        );
        assert_eq!(
            extract_neighborhood("Comunidade da Rocinha, Zona Sul").as_deref(),
            Some("da rocinha")
        );
    }

    #[test]
    fn neighborhood_without_indicator_passes_through() {
        assert_eq!(extract_neighborhood("Copacabana").as_deref(), Some("Copacabana"));
        assert_eq!(extract_neighborhood("  "), None);
    }

    #[test]
    fn neighborhood_with_trailing_indicator_is_none() {
        assert_eq!(extract_neighborhood("perto do morro"), None);
    }

    #[test]
    fn matching_victim_name_dominates() {
        let ext = extraction(Some("João da Silva"), None, "", Some(naive(2024, 5, 9)));
        let inc = incident(1, "Morte de João da Silva", None, None);
        let score = match_score(&LcsSimilarity, &ext, &inc);
        assert!(score > 0.3, "got {score}");
        assert!(score <= 0.5 + 1e-9);
    }

    #[test]
    fn missing_operands_contribute_zero() {
        let ext = extraction(None, None, "", Some(naive(2024, 5, 9)));
        let inc = incident(1, "Morte de João", None, None);
        assert_eq!(match_score(&LcsSimilarity, &ext, &inc), 0.0);
    }

    #[test]
    fn score_is_bounded() {
        let ext = extraction(
            Some("João da Silva"),
            Some("Bairro Penha, Rio"),
            "Homem morto a tiros na Penha.",
            Some(naive(2024, 5, 9)),
        );
        let inc = incident(
            1,
            "João da Silva",
            Some("Bairro Penha, Rio"),
            Some("Homem morto a tiros na Penha."),
        );
        let score = match_score(&LcsSimilarity, &ext, &inc);
        assert!(score > 0.99 && score <= 1.0 + 1e-9, "got {score}");
    }

    #[test]
    fn victim_score_takes_max_of_title_and_description() {
        let ext = extraction(Some("Carlos Souza"), None, "", Some(naive(2024, 5, 9)));
        let title_only = incident(1, "Homicídio - 09/05/2024", None, None);
        let with_description = incident(
            2,
            "Homicídio - 09/05/2024",
            None,
            Some("Carlos Souza"),
        );
        let a = match_score(&LcsSimilarity, &ext, &title_only);
        let b = match_score(&LcsSimilarity, &ext, &with_description);
        assert!(b > a);
    }

    #[test]
    fn best_match_requires_threshold() {
        let ext = extraction(Some("João da Silva"), None, "", Some(naive(2024, 5, 9)));
        let weak = vec![incident(1, "Caso sem relação alguma", None, None)];
        let (matched, score) = find_best_match(&LcsSimilarity, &ext, &weak);
        assert!(matched.is_none());
        assert!(score < MATCH_THRESHOLD);
    }

    #[test]
    fn best_match_links_identical_records() {
        let ext = extraction(
            Some("João da Silva"),
            Some("Copacabana"),
            "João da Silva foi morto em Copacabana.",
            Some(naive(2024, 5, 9)),
        );
        let candidates = vec![
            incident(1, "Caso antigo", None, None),
            incident(
                2,
                "Morte de João da Silva",
                Some("Copacabana"),
                Some("João da Silva foi morto em Copacabana."),
            ),
        ];
        let (matched, score) = find_best_match(&LcsSimilarity, &ext, &candidates);
        assert_eq!(matched.map(|i| i.id), Some(2));
        assert!(score >= MATCH_THRESHOLD);
    }

    #[test]
    fn ties_break_by_insertion_order() {
        let ext = extraction(
            Some("João da Silva"),
            Some("Copacabana"),
            "João da Silva foi morto em Copacabana.",
            Some(naive(2024, 5, 9)),
        );
        let twin = |id| {
            incident(
                id,
                "Morte de João da Silva",
                Some("Copacabana"),
                Some("João da Silva foi morto em Copacabana."),
            )
        };
        let candidates = vec![twin(7), twin(8)];
        let (matched, _) = find_best_match(&LcsSimilarity, &ext, &candidates);
        assert_eq!(matched.map(|i| i.id), Some(7));
    }
}
