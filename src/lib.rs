//! # podcatcher
//!
//! Polling and refresh engine for podcast-style syndication feeds.
//!
//! ## Design Philosophy
//!
//! podcatcher is designed to be:
//! - **Single-writer** - One background loop owns every subscription; nothing else mutates state
//! - **Lock-free for readers** - Snapshots are immutable copies swapped in atomically
//! - **Library-first** - No CLI or UI, purely a Rust crate for embedding
//! - **Event-driven** - Consumers subscribe to events, no polling required
//!
//! ## Quick Start
//!
//! ```no_run
//! use podcatcher::{Config, Engine};
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config {
//!         download_dir: "/srv/podcasts".into(),
//!         ..Config::new("/srv/podcasts/state.json", Duration::from_secs(15 * 60))
//!     };
//!
//!     let engine = Engine::start(config).await?;
//!
//!     // Subscribe to events
//!     let mut events = engine.events();
//!     tokio::spawn(async move {
//!         while let Ok(event) = events.recv().await {
//!             println!("Event: {:?}", event);
//!         }
//!     });
//!
//!     engine.subscribe("https://example.com/feed.xml").await?;
//!     engine.sync().await?;
//!
//!     for subscription in engine.snapshot().sorted_by_name() {
//!         println!("{} ({} items)", subscription.name, subscription.items.len());
//!     }
//!
//!     engine.shutdown().await?;
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// Configuration types
pub mod config;
/// Retrieval dispatcher
pub mod dispatcher;
/// Refresh engine and its handle
pub mod engine;
/// Error types
pub mod error;
/// Dedup & merge, identifier derivation
pub mod merge;
/// Durable subscription state
pub mod persistence;
/// Latest-snapshot cell
pub mod snapshot;
/// Feed fetching and parsing
pub mod source_reader;
/// Core types and events
pub mod types;

// Re-export commonly used types
pub use config::Config;
pub use dispatcher::{HttpRetriever, Retriever};
pub use engine::{Engine, EngineHandle};
pub use error::{Error, Result};
pub use source_reader::{FeedDocument, FeedSource, HttpFeedSource};
pub use types::{Event, Item, Subscription, SubscriptionSet};

/// Helper function to run the engine until a termination signal arrives.
///
/// Waits for SIGTERM or Ctrl+C (Ctrl+C only outside Unix), or for another
/// clone of the handle to request shutdown, then shuts the engine down.
///
/// # Example
///
/// ```no_run
/// use podcatcher::{Engine, run_with_shutdown};
/// use std::time::Duration;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let engine = Engine::start_at("podcatcher.json", Duration::from_secs(1800)).await?;
///
///     // Run with automatic signal handling
///     run_with_shutdown(engine).await?;
///
///     Ok(())
/// }
/// ```
pub async fn run_with_shutdown(engine: EngineHandle) -> Result<()> {
    run_until(engine, termination_signal()).await
}

/// Run the engine until `stop` resolves, then shut it down
///
/// Also returns once shutdown was requested through another clone of the
/// handle. The final state is flushed before this returns.
///
/// # Errors
/// Returns an error if the engine task panicked.
pub async fn run_until<F>(engine: EngineHandle, stop: F) -> Result<()>
where
    F: std::future::Future<Output = ()>,
{
    tokio::select! {
        _ = stop => tracing::info!("Stop requested, shutting down engine"),
        _ = engine.stop_requested() => tracing::debug!("Engine shutdown already requested"),
    }
    engine.shutdown().await
}

/// Resolves on the first SIGTERM or Ctrl+C
///
/// A signal that cannot be listened for is logged and never fires.
#[cfg(unix)]
async fn termination_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    match signal(SignalKind::terminate()) {
        Ok(mut sigterm) => tokio::select! {
            _ = sigterm.recv() => tracing::info!("Received SIGTERM"),
            _ = interrupt() => {}
        },
        Err(e) => {
            tracing::warn!(error = %e, "Cannot listen for SIGTERM");
            interrupt().await;
        }
    }
}

#[cfg(not(unix))]
async fn termination_signal() {
    interrupt().await;
}

async fn interrupt() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "Cannot listen for Ctrl+C");
        std::future::pending::<()>().await;
    }
    tracing::info!("Received Ctrl+C");
}
