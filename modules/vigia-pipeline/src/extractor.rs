//! LLM-backed structured event extraction.
//!
//! The model receives the article body (head-truncated), the matched
//! keywords, and the publication date as an anchor for relative expressions
//! ("ontem", "esta sexta-feira (28)"). The reply is one JSON object,
//! possibly fenced. Every failure path degrades to a stub so the pipeline
//! keeps moving with reduced confidence.

use async_trait::async_trait;
use chrono::NaiveDateTime;
use llm_client::Claude;
use serde::Deserialize;
use tracing::{info, warn};

/// Article text beyond this many bytes never reaches the prompt.
const PROMPT_CONTENT_LIMIT: usize = 3000;

const FALLBACK_SUMMARY: &str = "Extração indisponível (fallback)";
const FALLBACK_CONFIDENCE: f64 = 0.5;

/// What the LLM returns for one article.
#[derive(Debug, Clone, Deserialize)]
pub struct LlmEvent {
    #[serde(default)]
    pub is_valid: bool,
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub victim_name: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    /// Event date, YYYY-MM-DD.
    #[serde(default)]
    pub date: Option<String>,
    #[serde(default = "default_confidence")]
    pub confidence: f64,
}

fn default_confidence() -> f64 {
    FALLBACK_CONFIDENCE
}

impl LlmEvent {
    /// The degraded-mode stub: valid so downstream flows continue, at
    /// half confidence.
    pub fn fallback() -> Self {
        Self {
            is_valid: true,
            summary: Some(FALLBACK_SUMMARY.to_string()),
            victim_name: None,
            location: None,
            date: None,
            confidence: FALLBACK_CONFIDENCE,
        }
    }

    pub fn clamped_confidence(&self) -> f64 {
        self.confidence.clamp(0.0, 1.0)
    }
}

/// Opaque classification capability: article text + context in, structured
/// event out. Implementations never error; they degrade.
#[async_trait]
pub trait EventClassifier: Send + Sync {
    async fn classify(
        &self,
        text: &str,
        keywords: &[&str],
        publication_date: Option<NaiveDateTime>,
    ) -> LlmEvent;
}

/// Claude-backed extractor.
pub struct LlmExtractor {
    claude: Claude,
}

impl LlmExtractor {
    pub fn new(api_key: &str, model: &str) -> Self {
        Self {
            claude: Claude::new(api_key, model),
        }
    }

    fn build_prompt(text: &str, keywords: &[&str], publication_date: Option<NaiveDateTime>) -> String {
        let date_context = match publication_date {
            Some(date) => format!(
                "Data de publicação do artigo: {} ({})\n\
                 Use esta data como referência para interpretar datas relativas \
                 como \"hoje\", \"ontem\", \"esta sexta-feira (28)\", \"na última semana\".\n\n",
                date.format("%Y-%m-%d"),
                date.format("%A, %d %B %Y"),
            ),
            None => String::new(),
        };

        format!(
            "Analise o texto de notícia abaixo e extraia informações sobre uma \
             morte violenta ESPECÍFICA.\n\n\
             {date_context}\
             Responda com um único objeto JSON com os campos:\n\
             - \"is_valid\": boolean (true se descreve um homicídio/assassinato/corpo \
             encontrado específico, false caso contrário)\n\
             - \"summary\": string (resumo conciso do evento, 1-2 frases, em português)\n\
             - \"victim_name\": string ou null (nome(s) de TODAS as vítimas, se citados. \
             Vítimas múltiplas separadas por vírgula e \"e\". Exemplo: \"João Silva e \
             Maria Santos\")\n\
             - \"location\": string ou null (local específico: rua, bairro ou cidade, \
             se citado)\n\
             - \"date\": string ou null (data do EVENTO no formato YYYY-MM-DD. Use a data \
             de publicação acima para converter datas relativas. Retorne null apenas se \
             for impossível inferir.)\n\
             - \"confidence\": número de 0.0 a 1.0 (quão certo você está de que é um \
             registro de crime violento)\n\n\
             Trecho:\n\"{text}\"\n\n\
             Palavras-chave encontradas: {keywords:?}\n\n\
             Responda apenas com o JSON."
        )
    }
}

#[async_trait]
impl EventClassifier for LlmExtractor {
    async fn classify(
        &self,
        text: &str,
        keywords: &[&str],
        publication_date: Option<NaiveDateTime>,
    ) -> LlmEvent {
        let text = truncate_on_boundary(text, PROMPT_CONTENT_LIMIT);
        let prompt = Self::build_prompt(text, keywords, publication_date);

        match self
            .claude
            .extract_json::<LlmEvent>(
                "Você extrai registros estruturados de mortes violentas a partir de notícias.",
                prompt,
            )
            .await
        {
            Ok(event) => {
                info!(
                    is_valid = event.is_valid,
                    victim = event.victim_name.as_deref().unwrap_or("-"),
                    "LLM extraction complete"
                );
                event
            }
            Err(e) => {
                warn!(error = %e, "LLM extraction failed, emitting fallback");
                LlmEvent::fallback()
            }
        }
    }
}

/// No-credentials cold-start classifier: everything is a fallback stub.
pub struct StubClassifier;

#[async_trait]
impl EventClassifier for StubClassifier {
    async fn classify(
        &self,
        _text: &str,
        _keywords: &[&str],
        _publication_date: Option<NaiveDateTime>,
    ) -> LlmEvent {
        LlmEvent::fallback()
    }
}

/// Truncate to at most `limit` bytes without splitting a UTF-8 char.
fn truncate_on_boundary(text: &str, limit: usize) -> &str {
    if text.len() <= limit {
        return text;
    }
    let mut end = limit;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    &text[..end]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncation_respects_char_boundaries() {
        let text = "homicídio ".repeat(400);
        let truncated = truncate_on_boundary(&text, PROMPT_CONTENT_LIMIT);
        assert!(truncated.len() <= PROMPT_CONTENT_LIMIT);
        assert!(text.starts_with(truncated));
    }

    #[test]
    fn short_text_passes_untouched() {
        assert_eq!(truncate_on_boundary("curto", 3000), "curto");
    }

    #[test]
    fn parses_bare_reply() {
        let raw = r#"{"is_valid": true, "summary": "Homem morto.", "victim_name": "João",
                      "location": "Penha", "date": "2024-05-09", "confidence": 0.9}"#;
        let event: LlmEvent = serde_json::from_str(raw).unwrap();
        assert!(event.is_valid);
        assert_eq!(event.victim_name.as_deref(), Some("João"));
        assert_eq!(event.date.as_deref(), Some("2024-05-09"));
    }

    #[test]
    fn missing_confidence_defaults_to_half() {
        let event: LlmEvent = serde_json::from_str(r#"{"is_valid": true}"#).unwrap();
        assert_eq!(event.confidence, 0.5);
    }

    #[test]
    fn fallback_is_valid_at_half_confidence() {
        let stub = LlmEvent::fallback();
        assert!(stub.is_valid);
        assert_eq!(stub.confidence, 0.5);
        assert!(stub.date.is_none());
    }

    #[test]
    fn confidence_is_clamped() {
        let event: LlmEvent =
            serde_json::from_str(r#"{"is_valid": true, "confidence": 3.5}"#).unwrap();
        assert_eq!(event.clamped_confidence(), 1.0);
    }

    #[tokio::test]
    async fn stub_classifier_always_falls_back() {
        let event = StubClassifier.classify("qualquer texto", &["morto"], None).await;
        assert!(event.is_valid);
        assert_eq!(event.summary.as_deref(), Some(FALLBACK_SUMMARY));
    }

    #[test]
    fn prompt_carries_date_anchor() {
        let date = chrono::NaiveDate::from_ymd_opt(2024, 5, 10)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        let prompt = LlmExtractor::build_prompt("texto", &["morto"], Some(date));
        assert!(prompt.contains("2024-05-10"));
        assert!(prompt.contains("ontem"));
    }
}
