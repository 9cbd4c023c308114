//! Shared types, configuration, and pure helpers for the vigia pipeline.

pub mod config;
pub mod dates;
pub mod error;
pub mod keywords;
pub mod similarity;
pub mod terms;
pub mod types;

pub use config::Config;
pub use error::VigiaError;
pub use similarity::{LcsSimilarity, Similarity};
pub use types::{FeedEntry, SourceStatus};
