//! Bounded waiting helpers. Every wait resolves to a negative result at its bound.

use std::future::Future;
use std::time::Duration;

use tracing::debug;

use promptcast_protocols::PageSurface;

/// Probe up to `attempts` times, `interval` apart, until the probe yields a value.
pub async fn poll_until<T, F, Fut>(attempts: u32, interval: Duration, mut probe: F) -> Option<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Option<T>>,
{
    for attempt in 0..attempts {
        if let Some(value) = probe().await {
            return Some(value);
        }
        if attempt + 1 < attempts {
            tokio::time::sleep(interval).await;
        }
    }
    None
}

/// Wait for `document.readyState == "complete"`. Returns `false` at `timeout`.
pub async fn wait_for_document_complete(
    page: &dyn PageSurface,
    timeout: Duration,
    interval: Duration,
) -> bool {
    let wait = async {
        loop {
            match page.ready_state().await {
                Ok(state) if state == "complete" => return,
                Ok(_) => {}
                Err(e) => debug!("readyState probe failed: {}", e),
            }
            tokio::time::sleep(interval).await;
        }
    };
    tokio::time::timeout(timeout, wait).await.is_ok()
}
