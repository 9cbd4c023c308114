use thiserror::Error;

#[derive(Error, Debug)]
pub enum VigiaError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Feed error: {0}")]
    Feed(String),

    #[error("Resolver error: {0}")]
    Resolver(String),

    #[error("Content reconcile error: {0}")]
    Reconcile(String),

    #[error("LLM error: {0}")]
    Llm(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}
