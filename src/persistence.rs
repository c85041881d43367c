//! Persistence Sink: durable JSON copy of the subscription set.
//!
//! [`StateStore`] reads and writes the state file. [`spawn_persistence`] runs
//! the background writer: it follows a `watch` channel of published sets and
//! always writes the newest one, so bursts of publications collapse into a
//! single write and the engine loop never waits on the disk.

use crate::error::Result;
use crate::types::{Subscription, SubscriptionSet};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error};

/// On-disk layout of the state file
#[derive(Debug, Default, Deserialize)]
struct StateFile {
    #[serde(default)]
    subscriptions: Vec<Subscription>,
}

#[derive(Serialize)]
struct StateFileRef<'a> {
    subscriptions: &'a [Subscription],
}

/// Reads and writes the durable subscription state
#[derive(Clone, Debug)]
pub struct StateStore {
    path: PathBuf,
}

impl StateStore {
    /// Store backed by the file at `path`
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Location of the state file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the persisted subscriptions
    ///
    /// Returns `Ok(None)` when the file does not exist. A file that is
    /// present but blank counts as an empty set.
    ///
    /// # Errors
    /// I/O failures other than "not found", and documents that do not
    /// deserialize.
    pub async fn load(&self) -> Result<Option<Vec<Subscription>>> {
        let content = match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        if content.trim().is_empty() {
            return Ok(Some(Vec::new()));
        }

        let state: StateFile = serde_json::from_str(&content)?;
        Ok(Some(state.subscriptions))
    }

    /// Overwrite the state file with `subscriptions`
    ///
    /// The document is written next to the target and renamed over it, so a
    /// crash mid-write leaves the previous copy intact.
    ///
    /// # Errors
    /// Serialization or I/O failures.
    pub async fn save(&self, subscriptions: &[Subscription]) -> Result<()> {
        let json = serde_json::to_vec_pretty(&StateFileRef { subscriptions })?;

        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent).await?;
        }

        let temp_path = self.temp_path();
        tokio::fs::write(&temp_path, &json).await?;
        tokio::fs::rename(&temp_path, &self.path).await?;
        Ok(())
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

/// Spawn the background writer
///
/// Each time a new set is sent on the channel the writer saves the latest
/// value. Failures are logged and the writer keeps going. Once the sender is
/// dropped the writer saves any value it has not seen yet and exits, so
/// awaiting the returned handle flushes the final state.
pub fn spawn_persistence(
    store: StateStore,
    mut published: watch::Receiver<Arc<SubscriptionSet>>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while published.changed().await.is_ok() {
            let set = published.borrow_and_update().clone();

            match store.save(&set.subscriptions).await {
                Ok(()) => debug!(
                    path = %store.path().display(),
                    generation = set.generation,
                    subscriptions = set.len(),
                    "Saved subscription state"
                ),
                Err(e) => error!(
                    path = %store.path().display(),
                    generation = set.generation,
                    error = %e,
                    "Failed to save subscription state"
                ),
            }
        }
        debug!("Persistence writer stopped");
    })
}
