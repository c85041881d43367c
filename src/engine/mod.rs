//! Refresh Engine: the single owner of the subscription set.
//!
//! One background task holds the live `Vec<Subscription>` and is the only
//! code that ever mutates it. It reacts to three event sources, one at a
//! time: the periodic refresh timer, requests arriving from
//! [`EngineHandle`]s, and transfer outcomes reported by the dispatcher.
//! Readers only ever see immutable copies published through the
//! [`SnapshotCell`].
//!
//! The engine is split across submodules by concern:
//! - `handle`: the cloneable control surface
//! - `refresh`: full refresh cycle and the dispatch pass
//! - `subscribe`: registering new feeds

mod commands;
mod handle;
mod refresh;
mod subscribe;

pub use handle::EngineHandle;

pub(crate) use commands::Command;

use crate::config::Config;
use crate::dispatcher::{Dispatcher, HttpRetriever, RetrievalReport, Retriever};
use crate::error::Result;
use crate::persistence::{StateStore, spawn_persistence};
use crate::snapshot::SnapshotCell;
use crate::source_reader::{FeedSource, HttpFeedSource};
use crate::types::{Event, Subscription, SubscriptionSet};
use chrono::Utc;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// How long shutdown waits for the persistence writer to flush
const PERSIST_FLUSH_TIMEOUT: Duration = Duration::from_secs(30);

/// Capacity of the event broadcast channel
const EVENT_CHANNEL_CAPACITY: usize = 1000;

/// State owned by the engine loop
///
/// Constructed only through [`Engine::start`] and friends, which move it
/// into its background task and hand back an [`EngineHandle`].
pub struct Engine {
    config: Config,
    /// Live subscription set, registration order
    subscriptions: Vec<Subscription>,
    source: Arc<dyn FeedSource>,
    dispatcher: Dispatcher,
    /// Dispatched transfers that have not reported back, destination to URL
    in_flight: HashMap<PathBuf, String>,
    snapshot: Arc<SnapshotCell>,
    /// Latest published set, consumed by the persistence writer
    persist_tx: watch::Sender<Arc<SubscriptionSet>>,
    event_tx: broadcast::Sender<Event>,
}

impl Engine {
    /// Start an engine with HTTP feed fetching and HTTP payload retrieval
    ///
    /// Loads the state file (writing an empty one when none exists), then
    /// spawns the loop, which performs one full refresh before settling into
    /// the periodic schedule. Returns once the state is loaded.
    ///
    /// # Errors
    /// Invalid configuration, an unreadable or corrupt state file, or a
    /// storage root that cannot be created.
    pub async fn start(config: Config) -> Result<EngineHandle> {
        config.validate()?;
        let source = Arc::new(HttpFeedSource::new(&config)?);
        let retriever = Arc::new(HttpRetriever::new(&config)?);
        Self::start_with(config, source, retriever).await
    }

    /// Start with the given state file and refresh interval, defaults elsewhere
    ///
    /// # Errors
    /// Same as [`Engine::start`].
    pub async fn start_at(
        state_path: impl Into<PathBuf>,
        refresh_interval: Duration,
    ) -> Result<EngineHandle> {
        Self::start(Config::new(state_path, refresh_interval)).await
    }

    /// Start with caller-provided feed source and retriever
    ///
    /// # Errors
    /// Same as [`Engine::start`].
    pub async fn start_with(
        config: Config,
        source: Arc<dyn FeedSource>,
        retriever: Arc<dyn Retriever>,
    ) -> Result<EngineHandle> {
        config.validate()?;
        tokio::fs::create_dir_all(&config.download_dir).await?;

        let store = StateStore::new(&config.state_path);
        let mut subscriptions = match store.load().await? {
            Some(subscriptions) => {
                info!(
                    path = %store.path().display(),
                    subscriptions = subscriptions.len(),
                    "Loaded subscription state"
                );
                subscriptions
            }
            None => {
                info!(path = %store.path().display(), "No state file found, starting empty");
                if let Err(e) = store.save(&[]).await {
                    warn!(path = %store.path().display(), error = %e, "Failed to create state file");
                }
                Vec::new()
            }
        };
        normalize_feed_urls(&mut subscriptions);

        let (event_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let snapshot = Arc::new(SnapshotCell::new(SubscriptionSet {
            generation: 0,
            published_at: Utc::now(),
            subscriptions: subscriptions.clone(),
        }));

        let (persist_tx, persist_rx) = watch::channel(snapshot.load());
        let writer = spawn_persistence(store, persist_rx);

        let (report_tx, report_rx) = mpsc::unbounded_channel();
        let dispatcher = Dispatcher::new(
            config.download_dir.clone(),
            retriever,
            report_tx,
            event_tx.clone(),
        );

        let (command_tx, command_rx) = mpsc::channel(config.command_buffer);
        let cancel_token = CancellationToken::new();

        let engine = Engine {
            config,
            subscriptions,
            source,
            dispatcher,
            in_flight: HashMap::new(),
            snapshot: Arc::clone(&snapshot),
            persist_tx,
            event_tx: event_tx.clone(),
        };

        let task = tokio::spawn(engine.run(command_rx, report_rx, cancel_token.clone(), writer));

        Ok(EngineHandle::new(
            command_tx,
            snapshot,
            event_tx,
            cancel_token,
            task,
        ))
    }

    /// The owning loop
    async fn run(
        mut self,
        mut commands: mpsc::Receiver<Command>,
        mut reports: mpsc::UnboundedReceiver<RetrievalReport>,
        cancel_token: CancellationToken,
        writer: JoinHandle<()>,
    ) {
        info!(
            subscriptions = self.subscriptions.len(),
            refresh_interval_secs = self.config.refresh_interval.as_secs(),
            download_dir = %self.config.download_dir.display(),
            "Refresh engine started"
        );

        self.refresh_all().await;

        let period = self.config.refresh_interval;
        let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                biased;

                _ = cancel_token.cancelled() => {
                    debug!("Refresh engine cancelled");
                    break;
                }

                Some(report) = reports.recv() => {
                    self.handle_retrieval_report(report).await;
                }

                command = commands.recv() => match command {
                    Some(command) => self.handle_command(command).await,
                    None => {
                        debug!("All engine handles dropped");
                        break;
                    }
                },

                _ = ticker.tick() => {
                    self.refresh_all().await;
                }
            }
        }

        self.finish(writer).await;
    }

    async fn handle_command(&mut self, command: Command) {
        match command {
            Command::Subscribe { endpoint } => self.subscribe(&endpoint).await,
            Command::Refresh => self.refresh_all().await,
            Command::Sync { ack } => {
                ack.send(()).ok();
            }
        }
    }

    /// Settle a finished transfer
    ///
    /// A failed transfer whose payload is still absent re-arms every item
    /// stored at that destination.
    async fn handle_retrieval_report(&mut self, report: RetrievalReport) {
        self.in_flight.remove(&report.destination);
        if report.completed {
            return;
        }

        if tokio::fs::try_exists(&report.destination)
            .await
            .unwrap_or(false)
        {
            debug!(
                url = %report.url,
                path = %report.destination.display(),
                "Failed retrieval left a file behind, not re-arming"
            );
            return;
        }

        let dispatcher = &self.dispatcher;
        let mut rearmed = 0usize;
        for item in self
            .subscriptions
            .iter_mut()
            .flat_map(|subscription| subscription.items.iter_mut())
            .filter(|item| dispatcher.local_path(&item.url).as_ref() == Some(&report.destination))
        {
            item.needs_retrieval = true;
            rearmed += 1;
        }

        debug!(url = %report.url, rearmed, "Item eligible for retrieval on next refresh");
    }

    /// Make the live set visible to readers and hand it to the writer
    fn publish(&self) {
        let published = self.snapshot.publish(&self.subscriptions);
        let generation = published.generation;

        self.persist_tx.send_replace(self.durable_copy(&published));
        self.event_tx
            .send(Event::SnapshotPublished { generation })
            .ok();
        debug!(generation, subscriptions = self.subscriptions.len(), "Published snapshot");
    }

    /// The set as it should be written to disk
    ///
    /// Items whose transfer has not reported back keep their retrieval flag,
    /// so a restart dispatches them again when the payload never arrived.
    fn durable_copy(&self, published: &Arc<SubscriptionSet>) -> Arc<SubscriptionSet> {
        if self.in_flight.is_empty() {
            return Arc::clone(published);
        }

        let mut durable = SubscriptionSet::clone(published);
        for item in durable
            .subscriptions
            .iter_mut()
            .flat_map(|subscription| subscription.items.iter_mut())
            .filter(|item| self.in_flight.values().any(|url| *url == item.url))
        {
            item.needs_retrieval = true;
        }
        Arc::new(durable)
    }

    /// Final publication, persistence flush and shutdown notification
    async fn finish(self, writer: JoinHandle<()>) {
        info!("Stopping refresh engine");

        self.publish();

        let Engine {
            persist_tx,
            event_tx,
            ..
        } = self;

        // Closing the channel lets the writer drain the final set and exit
        drop(persist_tx);
        match tokio::time::timeout(PERSIST_FLUSH_TIMEOUT, writer).await {
            Ok(Ok(())) => info!("Final state persisted"),
            Ok(Err(e)) => error!(error = %e, "Persistence writer panicked"),
            Err(_) => warn!("Timeout waiting for persistence writer, proceeding with shutdown"),
        }

        event_tx.send(Event::Shutdown).ok();
        info!("Refresh engine stopped");
    }
}

/// Bring stored endpoints into the form incoming requests are compared in
///
/// Endpoints that do not parse are kept verbatim; refreshing them will fail
/// and be logged every cycle.
fn normalize_feed_urls(subscriptions: &mut [Subscription]) {
    for subscription in subscriptions {
        match subscribe::normalize_endpoint(&subscription.feed_url) {
            Ok(feed_url) => subscription.feed_url = feed_url,
            Err(e) => {
                warn!(id = %subscription.id, error = %e, "Stored feed endpoint is not a valid URL")
            }
        }
    }
}
