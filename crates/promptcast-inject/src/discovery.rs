//! Element discovery: find the text-entry widget, waiting for it to appear.

use std::time::Duration;

use tokio::time::Instant;
use tracing::debug;

use promptcast_protocols::{MutationFeed, PageSurface, Widget};

/// Re-probe interval used when the page cannot deliver mutation notifications.
const FALLBACK_POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Waits for the first element matching an ordered selector list.
#[derive(Debug, Clone)]
pub struct ElementDiscovery {
    timeout: Duration,
}

impl ElementDiscovery {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Probe once, immediately; if nothing matches, re-probe on every DOM
    /// mutation until a match or the timeout. Returns `None` at the timeout.
    pub async fn find(
        &self,
        page: &dyn PageSurface,
        selectors: &[String],
        require_visible: bool,
    ) -> Option<Box<dyn Widget>> {
        let deadline = Instant::now() + self.timeout;

        if let Some(widget) = self.probe(page, selectors, require_visible).await {
            return Some(widget);
        }

        let feed = match page.watch_mutations().await {
            Ok(feed) => Some(feed),
            Err(e) => {
                debug!("Mutation observer unavailable ({}), polling instead", e);
                None
            }
        };

        let found = tokio::time::timeout_at(
            deadline,
            self.wait_for_match(page, selectors, require_visible, feed),
        )
        .await
        .ok()
        .flatten();

        if found.is_none() {
            debug!(
                "No element matched {:?} within {:?}",
                selectors, self.timeout
            );
        }
        found
    }

    /// One pass over the selector list, in order.
    pub async fn probe(
        &self,
        page: &dyn PageSurface,
        selectors: &[String],
        require_visible: bool,
    ) -> Option<Box<dyn Widget>> {
        for selector in selectors {
            match page.find_widget(selector, require_visible).await {
                Ok(Some(widget)) => {
                    debug!("Found {} via {}", widget.describe(), selector);
                    return Some(widget);
                }
                Ok(None) => {}
                Err(e) => debug!("Probe of {} failed: {}", selector, e),
            }
        }
        None
    }

    async fn wait_for_match(
        &self,
        page: &dyn PageSurface,
        selectors: &[String],
        require_visible: bool,
        mut feed: Option<MutationFeed>,
    ) -> Option<Box<dyn Widget>> {
        loop {
            match feed.as_mut() {
                Some(rx) => match rx.recv().await {
                    Some(()) => {
                        // Coalesce a burst of mutations into one probe.
                        while rx.try_recv().is_ok() {}
                    }
                    None => {
                        debug!("Mutation feed closed, polling instead");
                        feed = None;
                        continue;
                    }
                },
                None => tokio::time::sleep(FALLBACK_POLL_INTERVAL).await,
            }

            if let Some(widget) = self.probe(page, selectors, require_visible).await {
                return Some(widget);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::testing::{FakePage, FakeWidget};

    fn selectors(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn test_immediate_match_in_selector_order() {
        let page = FakePage::new("chatgpt.com");
        page.insert_widget("textarea", FakeWidget::plain_textarea(), true);
        let discovery = ElementDiscovery::new(Duration::from_secs(15));

        let found = discovery
            .find(&page, &selectors(&["#prompt-textarea", "textarea"]), false)
            .await;

        assert!(found.is_some());
        assert_eq!(*page.probes.lock(), selectors(&["#prompt-textarea", "textarea"]));
        assert_eq!(page.observer_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_not_found_at_timeout() {
        let page = FakePage::new("claude.ai");
        let discovery = ElementDiscovery::new(Duration::from_secs(15));
        let start = Instant::now();

        let found = discovery
            .find(&page, &selectors(&["div.ProseMirror"]), true)
            .await;

        assert!(found.is_none());
        assert_eq!(start.elapsed(), Duration::from_secs(15));
        assert_eq!(page.observer_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_resolves_on_later_mutation() {
        let page = Arc::new(FakePage::new("gemini.google.com"));
        let discovery = ElementDiscovery::new(Duration::from_secs(15));

        let later = page.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(2)).await;
            later.mutate();
            tokio::time::sleep(Duration::from_secs(1)).await;
            later.insert_widget("div.ql-editor", FakeWidget::editable(), true);
        });

        let start = Instant::now();
        let found = discovery
            .find(page.as_ref(), &selectors(&["div.ql-editor"]), false)
            .await;

        assert!(found.is_some());
        assert_eq!(start.elapsed(), Duration::from_secs(3));
    }

    #[tokio::test(start_paused = true)]
    async fn test_invisible_match_is_rejected_when_visibility_required() {
        let page = FakePage::new("claude.ai");
        page.insert_widget("div.ProseMirror", FakeWidget::editable(), false);
        let discovery = ElementDiscovery::new(Duration::from_secs(10));

        let strict = discovery
            .find(&page, &selectors(&["div.ProseMirror"]), true)
            .await;
        assert!(strict.is_none());

        let lax = discovery
            .find(&page, &selectors(&["div.ProseMirror"]), false)
            .await;
        assert!(lax.is_some());
    }
}
