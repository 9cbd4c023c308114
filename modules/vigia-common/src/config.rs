use std::env;

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    // Postgres
    pub database_url: String,

    // LLM. Empty = no credentials, the extractor degrades to a stub.
    pub anthropic_api_key: String,
    pub llm_model: String,

    // Pipeline
    pub workers: usize,
    pub interval_minutes: u64,

    // Region
    pub city: String,
    pub base_query: String,

    // Dates earlier than Jan 1 of this year are rejected as invalid.
    pub min_year: i32,
}

impl Config {
    /// Load configuration from environment variables.
    /// Panics with a clear message if required vars are missing.
    pub fn from_env() -> Self {
        Self {
            database_url: required_env("DATABASE_URL"),
            anthropic_api_key: env::var("ANTHROPIC_API_KEY").unwrap_or_default(),
            llm_model: env::var("LLM_MODEL")
                .unwrap_or_else(|_| "claude-haiku-4-5-20251001".to_string()),
            workers: env::var("PIPELINE_WORKERS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(10),
            interval_minutes: env::var("PIPELINE_INTERVAL_MINUTES")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(30),
            city: env::var("CITY").unwrap_or_else(|_| "Rio de Janeiro".to_string()),
            base_query: env::var("BASE_QUERY").unwrap_or_else(|_| "Rio de Janeiro".to_string()),
            min_year: env::var("MIN_YEAR")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(2000),
        }
    }

    pub fn has_llm_credentials(&self) -> bool {
        !self.anthropic_api_key.is_empty()
    }

    /// Log each sensitive var's length, never its value.
    pub fn log_redacted(&self) {
        let vars = [
            ("DATABASE_URL", &self.database_url),
            ("ANTHROPIC_API_KEY", &self.anthropic_api_key),
        ];
        for (name, value) in vars {
            if value.is_empty() {
                tracing::info!("{name} = (empty)");
            } else {
                tracing::info!("{name} = ({} chars)", value.len());
            }
        }
    }
}

fn required_env(key: &str) -> String {
    env::var(key).unwrap_or_else(|_| panic!("{key} environment variable is required"))
}
