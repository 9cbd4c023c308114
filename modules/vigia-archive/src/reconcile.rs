//! Content reconciliation: raw HTML in, one clean article body out.
//!
//! Two extraction passes (a precision pass and an inclusive pass) are merged
//! paragraph-by-paragraph, then meta-tag summaries missing from the body are
//! spliced in front. Failure never propagates: the ladder degrades from the
//! full reconcile to the precision pass alone, then a plain extraction, then
//! nothing.

use std::collections::HashSet;

use chrono::NaiveDateTime;
use tracing::{debug, warn};

use crate::meta;
use vigia_common::dates;

/// Paragraph-level Jaccard above this marks a secondary paragraph as a
/// duplicate of a primary one.
const PARAGRAPH_DUP_THRESHOLD: f64 = 0.70;
/// Sentence-level Jaccard above this marks a meta description as already
/// present in the body.
const META_DUP_THRESHOLD: f64 = 0.60;
/// Only primary paragraphs with at least this many words join the Jaccard
/// comparison.
const MIN_COMPARE_WORDS: usize = 5;
/// Meta descriptions shorter than this many tokens are ignored.
const MIN_META_TOKENS: usize = 10;
/// Single-line splitting keeps only lines at least this long.
const MIN_LINE_LEN: usize = 20;

/// Extraction pass selector for [`BodyExtractor`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractionMode {
    /// Main article content only, comments excluded.
    Precision,
    /// Recall-favored: comments and secondary sections kept.
    Inclusive,
    /// Last-resort single pass.
    Plain,
}

/// Opaque body-extraction capability over raw HTML.
pub trait BodyExtractor: Send + Sync {
    /// Extracted text for the given mode, or `None` when the pass yields
    /// nothing usable.
    fn extract(&self, html: &str, mode: ExtractionMode) -> Option<String>;
}

/// Readability-based extractor.
pub struct ReadabilityExtractor;

impl BodyExtractor for ReadabilityExtractor {
    fn extract(&self, html: &str, mode: ExtractionMode) -> Option<String> {
        use spider_transformations::transformation::content::{
            transform_content_input, ReturnFormat, TransformConfig, TransformInput,
        };

        let config = match mode {
            ExtractionMode::Precision => TransformConfig {
                readability: true,
                main_content: true,
                return_format: ReturnFormat::Markdown,
                filter_images: true,
                filter_svg: true,
                clean_html: true,
            },
            ExtractionMode::Inclusive => TransformConfig {
                readability: false,
                main_content: false,
                return_format: ReturnFormat::Markdown,
                filter_images: true,
                filter_svg: true,
                clean_html: true,
            },
            ExtractionMode::Plain => TransformConfig {
                readability: true,
                main_content: false,
                return_format: ReturnFormat::Markdown,
                filter_images: true,
                filter_svg: true,
                clean_html: false,
            },
        };
        let input = TransformInput {
            url: None,
            content: html.as_bytes(),
            screenshot_bytes: None,
            encoding: None,
            selector_config: None,
            ignore_tags: None,
        };

        let text = transform_content_input(input, &config);
        let trimmed = text.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    }
}

/// The reconciler's output. Everything optional: a page that defeats every
/// strategy yields all-`None`.
#[derive(Debug, Clone, Default)]
pub struct Reconciled {
    pub body: Option<String>,
    pub published_at: Option<NaiveDateTime>,
}

/// Run the full reconcile over raw HTML. Never fails.
pub fn reconcile(extractor: &dyn BodyExtractor, html: &str, min_year: i32) -> Reconciled {
    let published_at = meta::publication_date(html)
        .and_then(|raw| dates::parse_and_validate(&raw, min_year));

    let primary = extractor.extract(html, ExtractionMode::Precision);

    let Some(primary) = primary else {
        // Precision pass produced nothing. Plain extraction is the last rung.
        let body = extractor.extract(html, ExtractionMode::Plain);
        if body.is_none() {
            warn!("All extraction strategies failed");
        }
        return Reconciled { body, published_at };
    };

    let merged = match extractor.extract(html, ExtractionMode::Inclusive) {
        Some(secondary) if secondary != primary => merge_bodies(&primary, &secondary),
        _ => primary,
    };

    let descriptions = meta::descriptions(html);
    let body = splice_meta(merged, &descriptions);

    Reconciled {
        body: Some(body),
        published_at,
    }
}

/// Merge the inclusive pass into the precision pass: primary paragraphs in
/// order, then secondary paragraphs that match no primary paragraph by
/// signature or Jaccard.
pub fn merge_bodies(primary: &str, secondary: &str) -> String {
    let primary_paragraphs = split_paragraphs(primary);
    let secondary_paragraphs = split_paragraphs(secondary);

    let signatures: HashSet<String> = primary_paragraphs.iter().map(|p| signature(p)).collect();
    let primary_word_sets: Vec<HashSet<String>> = primary_paragraphs
        .iter()
        .map(|p| word_set(p))
        .collect();

    let mut merged = primary_paragraphs.clone();
    for para in &secondary_paragraphs {
        if signatures.contains(&signature(para)) {
            continue;
        }
        let para_words = word_set(para);
        let duplicate = primary_word_sets.iter().any(|existing| {
            existing.len() >= MIN_COMPARE_WORDS
                && jaccard(existing, &para_words) > PARAGRAPH_DUP_THRESHOLD
        });
        if duplicate || merged.contains(para) {
            continue;
        }
        merged.push(para.clone());
    }

    if merged.len() > primary_paragraphs.len() {
        debug!(
            added = merged.len() - primary_paragraphs.len(),
            "Inclusive pass contributed paragraphs"
        );
    }
    merged.join("\n\n")
}

/// Prepend meta descriptions that the body does not already cover. Meta
/// content is assumed to summarize the article, so it leads.
pub fn splice_meta(body: String, meta_descriptions: &[String]) -> String {
    let mut body = body;
    for meta_text in meta_descriptions {
        let meta_words = word_set(meta_text);
        if meta_words.len() < MIN_META_TOKENS {
            continue;
        }
        let covered = body
            .split('.')
            .filter(|s| s.trim().len() >= MIN_LINE_LEN)
            .any(|sentence| jaccard(&word_set(sentence), &meta_words) > META_DUP_THRESHOLD);
        if !covered && !body.contains(meta_text.as_str()) {
            body = format!("{meta_text}\n\n{body}");
        }
    }
    body
}

/// Split into paragraphs on blank lines; without any blank line, fall back
/// to single lines of at least [`MIN_LINE_LEN`] chars.
pub fn split_paragraphs(text: &str) -> Vec<String> {
    if text.contains("\n\n") {
        text.split("\n\n")
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .map(str::to_string)
            .collect()
    } else {
        text.lines()
            .map(str::trim)
            .filter(|l| l.len() >= MIN_LINE_LEN)
            .map(str::to_string)
            .collect()
    }
}

/// Paragraph identity for exact-duplicate detection: lowercased first 100
/// characters.
fn signature(paragraph: &str) -> String {
    paragraph
        .trim()
        .to_lowercase()
        .chars()
        .take(100)
        .collect()
}

fn word_set(text: &str) -> HashSet<String> {
    text.split_whitespace().map(str::to_lowercase).collect()
}

fn jaccard(a: &HashSet<String>, b: &HashSet<String>) -> f64 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    let intersection = a.intersection(b).count();
    let union = a.union(b).count();
    intersection as f64 / union as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FakeExtractor {
        precision: Option<&'static str>,
        inclusive: Option<&'static str>,
        plain: Option<&'static str>,
    }

    impl BodyExtractor for FakeExtractor {
        fn extract(&self, _html: &str, mode: ExtractionMode) -> Option<String> {
            match mode {
                ExtractionMode::Precision => self.precision.map(str::to_string),
                ExtractionMode::Inclusive => self.inclusive.map(str::to_string),
                ExtractionMode::Plain => self.plain.map(str::to_string),
            }
        }
    }

    #[test]
    fn merges_unique_secondary_paragraphs_at_the_end() {
        let merged = merge_bodies("A.\n\nB.", "A.\n\nB.\n\nC.");
        assert_eq!(merged, "A.\n\nB.\n\nC.");
    }

    #[test]
    fn drops_exact_signature_duplicates() {
        let merged = merge_bodies("Primeiro parágrafo.\n\nSegundo.", "Primeiro parágrafo.");
        assert_eq!(merged, "Primeiro parágrafo.\n\nSegundo.");
    }

    #[test]
    fn five_word_paragraphs_join_the_dup_check() {
        let primary = "Tiros na Penha deixam morto";
        // Same five words reordered: different signature, full word overlap.
        let secondary = "Na Penha tiros deixam morto";
        assert_eq!(merge_bodies(primary, secondary), primary);
    }

    #[test]
    fn drops_near_duplicate_by_jaccard() {
        let primary = "O corpo da vítima foi encontrado pela polícia na manhã desta terça-feira.";
        // Same words, one swap, well above the 0.70 overlap bar.
        let secondary =
            "O corpo da vítima foi encontrado pela polícia na madrugada desta terça-feira.";
        let merged = merge_bodies(primary, secondary);
        assert_eq!(merged, primary);
    }

    #[test]
    fn merge_never_shrinks_primary() {
        let primary = "Um.\n\nDois.\n\nTrês.";
        let secondary = "Quatro.\n\nCinco.";
        let merged = merge_bodies(primary, secondary);
        let count = split_paragraphs(&merged).len();
        assert!(count >= 3);
        assert!(count <= 5);
    }

    #[test]
    fn single_line_fallback_filters_short_lines() {
        let paragraphs = split_paragraphs("curta\nEsta linha tem mais de vinte caracteres.\nx");
        assert_eq!(
            paragraphs,
            vec!["Esta linha tem mais de vinte caracteres."]
        );
    }

    #[test]
    fn splice_prepends_uncovered_meta() {
        let meta =
            vec!["Jovem foi morto a tiros durante operação policial no Complexo do Alemão hoje"
                .to_string()];
        let body = "O trânsito na região ficou interrompido durante toda a manhã.".to_string();
        let spliced = splice_meta(body, &meta);
        assert!(spliced.starts_with("Jovem foi morto a tiros"));
        assert!(spliced.contains("\n\nO trânsito"));
    }

    #[test]
    fn splice_skips_meta_already_in_body() {
        let text = "Jovem foi morto a tiros durante operação policial no Complexo do Alemão";
        let body = format!("{text}. A perícia esteve no local durante a manhã.");
        let spliced = splice_meta(body.clone(), &[text.to_string()]);
        assert_eq!(spliced, body);
    }

    #[test]
    fn splice_skips_short_meta() {
        let body = "Corpo foi encontrado na madrugada de ontem pela equipe.".to_string();
        let spliced = splice_meta(body.clone(), &["poucas palavras aqui".to_string()]);
        assert_eq!(spliced, body);
    }

    #[test]
    fn reconcile_is_idempotent_on_same_html() {
        let extractor = FakeExtractor {
            precision: Some("A primeira frase do artigo.\n\nA segunda frase do artigo."),
            inclusive: Some("A primeira frase do artigo.\n\nUm comentário extenso de leitor sobre o caso."),
            plain: None,
        };
        let first = reconcile(&extractor, "<html></html>", 2000);
        let second = reconcile(&extractor, "<html></html>", 2000);
        assert_eq!(first.body, second.body);
        assert!(first.body.unwrap().contains("comentário extenso"));
    }

    #[test]
    fn reconcile_falls_back_to_plain_extraction() {
        let extractor = FakeExtractor {
            precision: None,
            inclusive: None,
            plain: Some("Texto recuperado pela extração simples."),
        };
        let result = reconcile(&extractor, "<html></html>", 2000);
        assert_eq!(
            result.body.as_deref(),
            Some("Texto recuperado pela extração simples.")
        );
    }

    #[test]
    fn reconcile_survives_total_failure() {
        let extractor = FakeExtractor {
            precision: None,
            inclusive: None,
            plain: None,
        };
        let result = reconcile(&extractor, "<html></html>", 2000);
        assert!(result.body.is_none());
        assert!(result.published_at.is_none());
    }

    #[test]
    fn reconcile_parses_publication_date_from_meta() {
        let extractor = FakeExtractor {
            precision: Some("Corpo do artigo com conteúdo suficiente."),
            inclusive: None,
            plain: None,
        };
        let html = r#"<html><head>
            <meta property="article:published_time" content="2024-05-10T12:00:00-03:00">
        </head><body></body></html>"#;
        let result = reconcile(&extractor, html, 2000);
        let date = result.published_at.unwrap();
        assert_eq!(date.format("%Y-%m-%d %H:%M").to_string(), "2024-05-10 15:00");
    }
}
