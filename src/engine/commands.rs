//! Requests delivered to the engine loop.

use tokio::sync::oneshot;

/// A request processed by the owning loop, strictly one at a time
#[derive(Debug)]
pub(crate) enum Command {
    /// Register a new feed endpoint
    Subscribe {
        /// Endpoint as given by the caller
        endpoint: String,
    },

    /// Run a full refresh cycle now
    Refresh,

    /// Acknowledge once every earlier request has been processed
    Sync {
        /// Completed when the loop reaches this request
        ack: oneshot::Sender<()>,
    },
}
