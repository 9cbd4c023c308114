use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle state of a discovered source.
///
/// Forward order is `Pending → Downloaded → Processed`. `Failed` is terminal
/// for the run. Moving backward requires `force`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceStatus {
    Pending,
    Downloaded,
    Processed,
    Failed,
}

impl SourceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceStatus::Pending => "pending",
            SourceStatus::Downloaded => "downloaded",
            SourceStatus::Processed => "processed",
            SourceStatus::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(SourceStatus::Pending),
            "downloaded" => Some(SourceStatus::Downloaded),
            "processed" => Some(SourceStatus::Processed),
            "failed" => Some(SourceStatus::Failed),
            _ => None,
        }
    }

    fn rank(&self) -> u8 {
        match self {
            SourceStatus::Pending => 0,
            SourceStatus::Downloaded => 1,
            SourceStatus::Processed => 2,
            SourceStatus::Failed => 3,
        }
    }

    /// Whether a status write `self → to` is legal.
    ///
    /// Forward moves and same-state writes are always legal, as is marking
    /// any state `Failed`. Backward moves (including leaving `Failed`) are
    /// legal only under `force`.
    pub fn can_transition(&self, to: SourceStatus, force: bool) -> bool {
        if force {
            return true;
        }
        if to == SourceStatus::Failed {
            return true;
        }
        if *self == SourceStatus::Failed {
            return false;
        }
        to.rank() >= self.rank()
    }
}

impl std::fmt::Display for SourceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One entry pulled from an aggregator feed. Minimal on purpose: a link,
/// a headline, and whatever publication time the feed carried.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedEntry {
    pub url: String,
    pub title: String,
    pub published: Option<DateTime<Utc>>,
}
