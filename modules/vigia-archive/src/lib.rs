//! Networked acquisition for the vigia pipeline: aggregator feeds, URL
//! resolution, page fetching, and content reconciliation.

pub mod feed;
pub mod fetch;
pub mod meta;
pub mod reconcile;
pub mod resolver;

pub use feed::{feed_url, window_queries, FeedFetcher};
pub use fetch::{FetchError, HttpFetcher, PageFetcher};
pub use reconcile::{
    reconcile, BodyExtractor, ExtractionMode, ReadabilityExtractor, Reconciled,
};
pub use resolver::{is_aggregator_url, RedirectDecoder, UrlDecoder, UrlResolver};
