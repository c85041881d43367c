//! Retrieval Dispatcher: fire-and-forget payload transfer to local storage.
//!
//! Every payload lands at `<storage root>/<final URL path segment>`. The
//! dispatcher never waits on a transfer and never retries one; whether a
//! retrieval succeeded is observable only through the presence of that file.
//! Every transfer reports back to the engine loop with a [`RetrievalReport`]
//! once it ends, so the loop knows which dispatches are still unconfirmed and
//! can make a failed item eligible again on a later cycle.

use crate::config::Config;
use crate::error::{Error, Result};
use crate::types::Event;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, info, warn};
use url::Url;

/// File name a payload is stored under: the final path segment of `url`
///
/// The query string and fragment are not part of the name. Returns `None`
/// for unparsable URLs and for URLs whose path ends in `/` (or `.`/`..`),
/// since those name no file.
pub fn filename_for_url(url: &str) -> Option<String> {
    let parsed = Url::parse(url).ok()?;
    let segment = parsed.path_segments()?.last()?;

    if segment.is_empty() || segment == "." || segment == ".." {
        return None;
    }
    Some(segment.to_string())
}

/// Deterministic local path of the payload for `url` under `storage_root`
pub fn local_path(storage_root: &Path, url: &str) -> Option<PathBuf> {
    filename_for_url(url).map(|name| storage_root.join(name))
}

/// Transfers a payload to a local file
#[async_trait]
pub trait Retriever: Send + Sync {
    /// Copy the payload at `url` into `destination`, returning bytes written
    ///
    /// # Errors
    /// Any transfer or filesystem failure. Implementations should not create
    /// `destination` before the transfer is known to have started.
    async fn retrieve(&self, url: &str, destination: &Path) -> Result<u64>;
}

/// Streams payloads over HTTP(S) straight to disk
#[derive(Clone, Debug)]
pub struct HttpRetriever {
    http_client: reqwest::Client,
}

impl HttpRetriever {
    /// Create a retriever from `config`
    ///
    /// Only connection establishment is bounded by `fetch_timeout`; payload
    /// transfers may take as long as they need.
    ///
    /// # Errors
    /// Returns error if the HTTP client cannot be created
    pub fn new(config: &Config) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .connect_timeout(config.fetch_timeout)
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| Error::Other(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { http_client })
    }
}

#[async_trait]
impl Retriever for HttpRetriever {
    async fn retrieve(&self, url: &str, destination: &Path) -> Result<u64> {
        let mut response = self.http_client.get(url).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::HttpStatus {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        // Partial files are left behind if the stream breaks from here on
        let mut file = tokio::fs::File::create(destination).await?;
        let mut written = 0u64;
        while let Some(chunk) = response.chunk().await? {
            file.write_all(&chunk).await?;
            written += chunk.len() as u64;
        }
        file.flush().await?;

        Ok(written)
    }
}

/// Outcome of a dispatched transfer
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RetrievalReport {
    /// Retrieval URL of the item
    pub url: String,
    /// Where the payload was to be written
    pub destination: PathBuf,
    /// Whether the whole payload was written
    pub completed: bool,
}

/// Launches retrievals under a fixed storage root
#[derive(Clone)]
pub struct Dispatcher {
    storage_root: PathBuf,
    retriever: Arc<dyn Retriever>,
    reports: mpsc::UnboundedSender<RetrievalReport>,
    event_tx: broadcast::Sender<Event>,
}

impl Dispatcher {
    /// Create a dispatcher writing below `storage_root`
    ///
    /// Finished transfers are reported on `reports`; a closed receiver is not
    /// an error (the engine may already have stopped).
    pub fn new(
        storage_root: PathBuf,
        retriever: Arc<dyn Retriever>,
        reports: mpsc::UnboundedSender<RetrievalReport>,
        event_tx: broadcast::Sender<Event>,
    ) -> Self {
        Self {
            storage_root,
            retriever,
            reports,
            event_tx,
        }
    }

    /// Root directory payloads are stored under
    pub fn storage_root(&self) -> &Path {
        &self.storage_root
    }

    /// Local path of the payload for `url`
    pub fn local_path(&self, url: &str) -> Option<PathBuf> {
        local_path(&self.storage_root, url)
    }

    /// Whether the payload for `url` is already on local storage
    ///
    /// URLs that name no file are reported as absent.
    pub async fn is_present(&self, url: &str) -> bool {
        match self.local_path(url) {
            Some(path) => tokio::fs::try_exists(&path).await.unwrap_or(false),
            None => false,
        }
    }

    /// Start retrieving `url` into `destination` and return immediately
    pub fn dispatch(&self, url: &str, destination: PathBuf) {
        info!(url, path = %destination.display(), "Dispatching retrieval");
        self.event_tx
            .send(Event::RetrievalDispatched {
                url: url.to_string(),
                path: destination.clone(),
            })
            .ok();

        let retriever = Arc::clone(&self.retriever);
        let reports = self.reports.clone();
        let url = url.to_string();

        tokio::spawn(async move {
            let completed = match retriever.retrieve(&url, &destination).await {
                Ok(bytes) => {
                    debug!(url = %url, path = %destination.display(), bytes, "Retrieval complete");
                    true
                }
                Err(e) => {
                    warn!(url = %url, path = %destination.display(), error = %e, "Retrieval failed");
                    false
                }
            };
            reports
                .send(RetrievalReport {
                    url,
                    destination,
                    completed,
                })
                .ok();
        });
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("storage_root", &self.storage_root)
            .finish_non_exhaustive()
    }
}
