//! Meta-tag scraping over raw HTML, no DOM required.

use std::sync::LazyLock;

use regex::Regex;

static META_TAG_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)<meta\s[^>]*>").expect("valid meta tag regex"));
static ATTR_NAME_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)(?:name|property|itemprop)\s*=\s*["']([^"']+)["']"#)
        .expect("valid name attr regex")
});
static ATTR_CONTENT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)content\s*=\s*["']([^"']+)["']"#).expect("valid content attr regex")
});

const DESCRIPTION_KEYS: &[&str] = &["description", "og:description", "twitter:description"];
const DATE_KEYS: &[&str] = &[
    "article:published_time",
    "datepublished",
    "publishdate",
    "date",
];

fn meta_value(html: &str, keys: &[&str]) -> Vec<String> {
    let mut values = Vec::new();
    for tag in META_TAG_RE.find_iter(html) {
        let tag = tag.as_str();
        let Some(name) = ATTR_NAME_RE.captures(tag).map(|c| c[1].to_lowercase()) else {
            continue;
        };
        if !keys.contains(&name.as_str()) {
            continue;
        }
        if let Some(content) = ATTR_CONTENT_RE.captures(tag) {
            let content = content[1].trim().to_string();
            if !content.is_empty() && !values.contains(&content) {
                values.push(content);
            }
        }
    }
    values
}

/// Description-bearing meta contents, deduplicated, in document order.
/// Length gating (the ≥10-token rule) belongs to the splice step, not here.
pub fn descriptions(html: &str) -> Vec<String> {
    meta_value(html, DESCRIPTION_KEYS)
}

/// First publication-date meta content found, raw (the caller parses and
/// validates it).
pub fn publication_date(html: &str) -> Option<String> {
    meta_value(html, DATE_KEYS).into_iter().next()
}

#[cfg(test)]
mod tests {
    use super::*;

    const HTML: &str = r#"<html><head>
        <meta name="description" content="Jovem de 19 anos foi morto a tiros durante operação policial no Complexo do Alemão.">
        <meta property="og:description" content="Jovem de 19 anos foi morto a tiros durante operação policial no Complexo do Alemão.">
        <meta content="Policiais apreenderam dois fuzis na mesma ação, segundo a corporação informou." name="twitter:description">
        <meta property="article:published_time" content="2024-05-10T09:00:00-03:00">
    </head></html>"#;

    #[test]
    fn extracts_and_dedups_descriptions() {
        let descs = descriptions(HTML);
        assert_eq!(descs.len(), 2);
        assert!(descs[0].starts_with("Jovem de 19 anos"));
        assert!(descs[1].starts_with("Policiais apreenderam"));
    }

    #[test]
    fn handles_reversed_attribute_order() {
        let descs = descriptions(HTML);
        assert!(descs.iter().any(|d| d.contains("dois fuzis")));
    }

    #[test]
    fn keeps_short_descriptions_for_the_splice_gate() {
        let html = r#"<meta name="description" content="curta demais">"#;
        assert_eq!(descriptions(html), vec!["curta demais"]);
    }

    #[test]
    fn extracts_publication_date() {
        assert_eq!(
            publication_date(HTML).as_deref(),
            Some("2024-05-10T09:00:00-03:00")
        );
    }

    #[test]
    fn missing_date_is_none() {
        assert_eq!(publication_date("<html></html>"), None);
    }
}
