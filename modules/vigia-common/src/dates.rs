//! Publication-date parsing and reconciliation.
//!
//! All stored timestamps are naive UTC. Aware inputs are converted; naive
//! inputs are taken as already-UTC. A date is only valid inside
//! `[min_year-01-01, now]`.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use tracing::warn;

/// Datetime layouts seen in publisher meta tags and feed payloads, tried
/// after RFC 3339 / RFC 2822.
const NAIVE_DATETIME_LAYOUTS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
];

const NAIVE_DATE_LAYOUTS: &[&str] = &["%Y-%m-%d", "%d/%m/%Y", "%Y/%m/%d"];

/// Parse a raw date string and validate it against `[min_year-01-01, now]`.
/// Returns `None` for anything unparseable, in the future, or too old.
pub fn parse_and_validate(raw: &str, min_year: i32) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    let parsed = parse_any(raw)?;
    validate(parsed, min_year)
}

/// Clamp-check an already-parsed naive-UTC datetime.
pub fn validate(date: NaiveDateTime, min_year: i32) -> Option<NaiveDateTime> {
    let now = Utc::now().naive_utc();
    let min_date = NaiveDate::from_ymd_opt(min_year, 1, 1)?.and_hms_opt(0, 0, 0)?;
    if date > now || date < min_date {
        return None;
    }
    Some(date)
}

fn parse_any(raw: &str) -> Option<NaiveDateTime> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc).naive_utc());
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(raw) {
        return Some(dt.with_timezone(&Utc).naive_utc());
    }
    // Offset-bearing layout without the rfc3339 "T", e.g. "2024-05-10 14:00:00 +0300"
    if let Ok(dt) = DateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S %z") {
        return Some(dt.with_timezone(&Utc).naive_utc());
    }
    for layout in NAIVE_DATETIME_LAYOUTS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(raw, layout) {
            return Some(dt);
        }
    }
    for layout in NAIVE_DATE_LAYOUTS {
        if let Ok(d) = NaiveDate::parse_from_str(raw, layout) {
            return d.and_hms_opt(0, 0, 0);
        }
    }
    None
}

/// Pick the best publication date: extractor metadata first, feed second.
/// `fetched_at` is deliberately not an input here; it is never a
/// publication date. Callers that fall back to it for LLM context must log
/// that themselves; see [`warn_fetched_at_context`].
pub fn best_publication_date(
    metadata_date: Option<NaiveDateTime>,
    feed_date: Option<NaiveDateTime>,
) -> Option<NaiveDateTime> {
    metadata_date.or(feed_date)
}

/// Log the one sanctioned use of `fetched_at`: as LLM date context when no
/// publication date exists at all.
pub fn warn_fetched_at_context(source_id: i64) {
    warn!(
        source_id,
        "No publication date found, using fetched_at for LLM context only"
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, NaiveDate};

    fn naive(y: i32, m: u32, d: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
    }

    #[test]
    fn parses_rfc3339_and_converts_to_utc() {
        let parsed = parse_and_validate("2024-05-10T12:00:00-03:00", 2000).unwrap();
        assert_eq!(
            parsed,
            NaiveDate::from_ymd_opt(2024, 5, 10)
                .unwrap()
                .and_hms_opt(15, 0, 0)
                .unwrap()
        );
    }

    #[test]
    fn parses_rfc2822() {
        let parsed = parse_and_validate("Fri, 10 May 2024 09:30:00 +0000", 2000).unwrap();
        assert_eq!(
            parsed,
            NaiveDate::from_ymd_opt(2024, 5, 10)
                .unwrap()
                .and_hms_opt(9, 30, 0)
                .unwrap()
        );
    }

    #[test]
    fn naive_input_taken_as_utc() {
        let parsed = parse_and_validate("2024-05-10 08:00:00", 2000).unwrap();
        assert_eq!(
            parsed,
            NaiveDate::from_ymd_opt(2024, 5, 10)
                .unwrap()
                .and_hms_opt(8, 0, 0)
                .unwrap()
        );
    }

    #[test]
    fn parses_bare_date() {
        assert_eq!(parse_and_validate("2024-05-10", 2000), Some(naive(2024, 5, 10)));
        assert_eq!(parse_and_validate("10/05/2024", 2000), Some(naive(2024, 5, 10)));
    }

    #[test]
    fn rejects_future_dates() {
        let future = Utc::now().naive_utc() + Duration::days(2);
        let raw = future.format("%Y-%m-%d %H:%M:%S").to_string();
        assert_eq!(parse_and_validate(&raw, 2000), None);
    }

    #[test]
    fn rejects_dates_before_min_year() {
        assert_eq!(parse_and_validate("1999-12-31", 2000), None);
        assert!(parse_and_validate("2000-01-01", 2000).is_some());
    }

    #[test]
    fn rejects_garbage() {
        assert_eq!(parse_and_validate("ontem à noite", 2000), None);
        assert_eq!(parse_and_validate("", 2000), None);
    }

    #[test]
    fn best_date_prefers_metadata() {
        let meta = Some(naive(2024, 5, 9));
        let feed = Some(naive(2024, 5, 10));
        assert_eq!(best_publication_date(meta, feed), meta);
    }

    #[test]
    fn best_date_falls_back_to_feed() {
        let feed = Some(naive(2024, 5, 10));
        assert_eq!(best_publication_date(None, feed), feed);
    }

    #[test]
    fn best_date_never_invents_one() {
        assert_eq!(best_publication_date(None, None), None);
    }
}
