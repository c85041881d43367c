//! Source Reader: fetch a feed document and map it into structured items.
//!
//! The reader is stateless. [`FeedSource`] is the seam the engine talks to;
//! [`HttpFeedSource`] is the production implementation, and tests plug in
//! in-memory sources. Parsing lives in [`parse`] and is a pure function of the
//! document bytes (RSS 2.0 with the iTunes extension, falling back to Atom).

pub mod parse;

pub use parse::{parse_duration, parse_feed};

use crate::config::Config;
use crate::error::{Error, Result};
use crate::types::Item;
use async_trait::async_trait;
use tracing::debug;

/// A feed document mapped into channel metadata and an item list
///
/// Items keep the order the document lists them in (most feeds publish
/// newest first). Entries without a retrieval URL are not included.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FeedDocument {
    /// Channel title (becomes the display name)
    pub title: String,
    /// Website link
    pub link: String,
    /// Language tag
    pub language: String,
    /// Copyright notice
    pub copyright: String,
    /// Subtitle
    pub subtitle: String,
    /// Description
    pub description: String,
    /// Summary
    pub summary: String,
    /// Artwork URL
    pub image: String,
    /// Categories, nested ones flattened as "Parent/Child"
    pub categories: Vec<String>,
    /// Entries in document order
    pub items: Vec<Item>,
}

/// Something that can turn a feed endpoint into a [`FeedDocument`]
///
/// Implementations must be stateless with respect to the engine: every call
/// is an independent fetch, and a failure says nothing about later calls.
#[async_trait]
pub trait FeedSource: Send + Sync {
    /// Fetch and parse the document at `endpoint`
    ///
    /// # Errors
    /// Network failures, non-success statuses and unparsable documents.
    async fn fetch(&self, endpoint: &str) -> Result<FeedDocument>;
}

/// Fetches feed documents over HTTP(S)
#[derive(Clone, Debug)]
pub struct HttpFeedSource {
    /// HTTP client for fetching feeds
    http_client: reqwest::Client,
}

impl HttpFeedSource {
    /// Create a source using the timeout and user agent from `config`
    ///
    /// # Errors
    /// Returns error if the HTTP client cannot be created
    pub fn new(config: &Config) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(config.fetch_timeout)
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| Error::Other(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { http_client })
    }

    /// Create a source around an existing client
    pub fn with_client(http_client: reqwest::Client) -> Self {
        Self { http_client }
    }
}

#[async_trait]
impl FeedSource for HttpFeedSource {
    async fn fetch(&self, endpoint: &str) -> Result<FeedDocument> {
        debug!(endpoint, "Fetching feed document");

        let response = self.http_client.get(endpoint).send().await?;

        // Check HTTP status before trying to parse the response body
        let status = response.status();
        if !status.is_success() {
            return Err(Error::HttpStatus {
                status: status.as_u16(),
                url: endpoint.to_string(),
            });
        }

        let content = response.bytes().await?;
        let document = parse_feed(&content)?;

        debug!(
            endpoint,
            title = %document.title,
            item_count = document.items.len(),
            "Parsed feed document"
        );
        Ok(document)
    }
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;
