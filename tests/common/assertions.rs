//! Waiting helpers for asynchronous outcomes

use podcatcher::Event;
use std::path::Path;
use std::time::Duration;

/// Poll until `path` exists with exactly `expected` as content
pub async fn wait_for_file(path: &Path, expected: &[u8], timeout: Duration) -> bool {
    let result = tokio::time::timeout(timeout, async {
        loop {
            if let Ok(content) = tokio::fs::read(path).await
                && content == expected
            {
                return;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    })
    .await;

    result.is_ok()
}

/// Wait for the engine to report that it stopped
pub async fn wait_for_shutdown_event(
    events: &mut tokio::sync::broadcast::Receiver<Event>,
    timeout: Duration,
) -> bool {
    let result = tokio::time::timeout(timeout, async {
        loop {
            match events.recv().await {
                Ok(Event::Shutdown) => return true,
                Ok(_) => continue,
                Err(_) => return false,
            }
        }
    })
    .await;

    matches!(result, Ok(true))
}
