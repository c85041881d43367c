//! Cloneable control surface for a running engine.

use super::Command;
use crate::error::{Error, Result};
use crate::snapshot::SnapshotCell;
use crate::types::{Event, SubscriptionSet};
use std::sync::Arc;
use tokio::sync::{Mutex, broadcast, mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Handle to a running refresh engine
///
/// Cheap to clone; every clone talks to the same loop. The loop keeps
/// running until [`shutdown`](Self::shutdown) is called or every handle has
/// been dropped.
#[derive(Clone)]
pub struct EngineHandle {
    commands: mpsc::Sender<Command>,
    snapshot: Arc<SnapshotCell>,
    event_tx: broadcast::Sender<Event>,
    cancel_token: CancellationToken,
    /// Loop task, taken by whichever shutdown call gets there first
    task: Arc<Mutex<Option<JoinHandle<()>>>>,
}

impl EngineHandle {
    pub(super) fn new(
        commands: mpsc::Sender<Command>,
        snapshot: Arc<SnapshotCell>,
        event_tx: broadcast::Sender<Event>,
        cancel_token: CancellationToken,
        task: JoinHandle<()>,
    ) -> Self {
        Self {
            commands,
            snapshot,
            event_tx,
            cancel_token,
            task: Arc::new(Mutex::new(Some(task))),
        }
    }

    /// Ask the engine to add the feed at `endpoint`
    ///
    /// Returns once the request is queued. Subscribing is idempotent by
    /// endpoint, and a feed that cannot be fetched is simply not added; both
    /// outcomes are only visible in logs, events and later snapshots.
    ///
    /// # Errors
    /// [`Error::ShuttingDown`] if the engine has stopped.
    pub async fn subscribe(&self, endpoint: impl Into<String>) -> Result<()> {
        self.send(Command::Subscribe {
            endpoint: endpoint.into(),
        })
        .await
    }

    /// Run a full refresh cycle without waiting for the next timer tick
    ///
    /// # Errors
    /// [`Error::ShuttingDown`] if the engine has stopped.
    pub async fn refresh_now(&self) -> Result<()> {
        self.send(Command::Refresh).await
    }

    /// Wait until every request queued before this call has been processed
    ///
    /// # Errors
    /// [`Error::ShuttingDown`] if the engine stops first.
    pub async fn sync(&self) -> Result<()> {
        let (ack, done) = oneshot::channel();
        self.send(Command::Sync { ack }).await?;
        done.await.map_err(|_| Error::ShuttingDown)
    }

    /// Most recently published subscription set
    ///
    /// Never blocks, even while a refresh is in progress. Still answers after
    /// shutdown with the final snapshot.
    pub fn snapshot(&self) -> Arc<SubscriptionSet> {
        self.snapshot.load()
    }

    /// Receive engine events from now on
    pub fn events(&self) -> broadcast::Receiver<Event> {
        self.event_tx.subscribe()
    }

    /// Whether the engine loop is still accepting requests
    pub fn is_running(&self) -> bool {
        !self.cancel_token.is_cancelled() && !self.commands.is_closed()
    }

    /// Resolves once shutdown has been requested through any clone
    pub(crate) async fn stop_requested(&self) {
        self.cancel_token.cancelled().await;
    }

    /// Stop the engine
    ///
    /// Publishes and persists a final snapshot and waits for the state file
    /// to be flushed. Safe to call more than once and from several clones;
    /// later calls return after the first one has completed.
    ///
    /// # Errors
    /// Returns an error if the engine task panicked.
    pub async fn shutdown(&self) -> Result<()> {
        tracing::info!("Initiating engine shutdown");
        self.cancel_token.cancel();

        let mut task = self.task.lock().await;
        if let Some(handle) = task.take() {
            handle
                .await
                .map_err(|e| Error::Other(format!("engine task failed: {}", e)))?;
        }
        Ok(())
    }

    async fn send(&self, command: Command) -> Result<()> {
        if self.cancel_token.is_cancelled() {
            return Err(Error::ShuttingDown);
        }
        self.commands
            .send(command)
            .await
            .map_err(|_| Error::ShuttingDown)
    }
}

impl std::fmt::Debug for EngineHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngineHandle")
            .field("running", &self.is_running())
            .field("generation", &self.snapshot.generation())
            .finish_non_exhaustive()
    }
}
