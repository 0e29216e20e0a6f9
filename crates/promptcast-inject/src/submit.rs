//! Submission trigger.
//!
//! After a fill attempt with auto-send set: wait for the page to enable its
//! send affordance, activate the first enabled match, or fall back to an
//! Enter key press plus a form submit event. Reported optimistically.

use std::time::Duration;

use tracing::{debug, info};

use promptcast_config::TimingConfig;
use promptcast_protocols::{Control, PageSurface, SyntheticEvent, Widget};

use crate::profile::ProviderProfile;
use crate::wait::poll_until;

/// Generic send-button heuristics, tried after the provider's own selectors.
pub const GENERIC_SEND_SELECTORS: &[&str] = &[
    "button[data-testid='send-button']",
    "button[data-testid*='send' i]",
    "button[data-test-id*='send' i]",
    "button[aria-label*='send' i]",
    "button[aria-label*='submit' i]",
    "button svg[class*='send' i]",
    "button[class*='send' i]",
    "button[type='submit']",
];

/// Gap between the synthetic Enter keydown and keyup.
const KEY_PRESS_GAP: Duration = Duration::from_millis(50);

#[derive(Debug, Clone)]
pub struct SubmissionTrigger {
    initial_delay: Duration,
    poll_interval: Duration,
    poll_attempts: u32,
}

impl SubmissionTrigger {
    pub fn new(initial_delay: Duration, poll_interval: Duration, poll_attempts: u32) -> Self {
        Self {
            initial_delay,
            poll_interval,
            poll_attempts,
        }
    }

    pub fn from_timing(timing: &TimingConfig) -> Self {
        Self::new(
            timing.submit_initial_delay(),
            timing.submit_poll_interval(),
            timing.submit_poll_attempts,
        )
    }

    /// Returns `true` once a send was attempted, by button or by keyboard.
    pub async fn try_submit(
        &self,
        page: &dyn PageSurface,
        widget: &dyn Widget,
        profile: &ProviderProfile,
    ) -> bool {
        tokio::time::sleep(self.initial_delay).await;

        let control = poll_until(self.poll_attempts, self.poll_interval, || {
            self.locate(page, widget, profile)
        })
        .await;

        if let Some(control) = control {
            match control.activate().await {
                Ok(()) => {
                    info!("Activated send control {}", control.describe());
                    return true;
                }
                Err(e) => debug!("Activating {} failed: {}", control.describe(), e),
            }
        }

        debug!("No usable send control, falling back to Enter");
        self.press_enter(widget).await
    }

    /// First enabled control: provider selectors, generic heuristics, then
    /// any enabled button in the widget's form.
    async fn locate(
        &self,
        page: &dyn PageSurface,
        widget: &dyn Widget,
        profile: &ProviderProfile,
    ) -> Option<Box<dyn Control>> {
        let selectors = profile
            .send_selectors
            .iter()
            .map(String::as_str)
            .chain(GENERIC_SEND_SELECTORS.iter().copied());
        for selector in selectors {
            match page.find_enabled_control(selector).await {
                Ok(Some(control)) => return Some(control),
                Ok(None) => {}
                Err(e) => debug!("Send probe {} failed: {}", selector, e),
            }
        }
        match widget.enabled_form_button().await {
            Ok(found) => found,
            Err(e) => {
                debug!("Form button probe failed: {}", e);
                None
            }
        }
    }

    async fn press_enter(&self, widget: &dyn Widget) -> bool {
        let down = widget.dispatch(&SyntheticEvent::enter_down()).await;
        tokio::time::sleep(KEY_PRESS_GAP).await;
        let up = widget.dispatch(&SyntheticEvent::enter_up()).await;
        let form = widget.submit_enclosing_form().await;

        if let Ok(true) = form {
            debug!("Dispatched submit on enclosing form");
        }
        down.is_ok() || up.is_ok() || form.is_ok()
    }
}

impl Default for SubmissionTrigger {
    fn default() -> Self {
        Self::from_timing(&TimingConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::profile::ProfileBook;
    use crate::testing::{FakeControl, FakePage, FakeWidget};
    use std::sync::Arc;
    use tokio::time::Instant;

    fn trigger() -> SubmissionTrigger {
        SubmissionTrigger::new(
            Duration::from_millis(400),
            Duration::from_millis(100),
            10,
        )
    }

    #[tokio::test(start_paused = true)]
    async fn test_profile_selector_wins() {
        let book = ProfileBook::builtin();
        let page = FakePage::new("chatgpt.com");
        let send = FakeControl::new("send");
        let generic = FakeControl::new("generic");
        page.insert_control("button[data-testid='send-button']", send.clone());
        page.insert_control("button[aria-label*='send' i]", generic.clone());
        let widget = FakeWidget::plain_textarea();

        let sent = trigger()
            .try_submit(&page, &widget, book.for_host("chatgpt.com"))
            .await;

        assert!(sent);
        assert_eq!(send.clicks(), 1);
        assert_eq!(generic.clicks(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_generic_heuristic_after_delay() {
        let book = ProfileBook::builtin();
        let page = Arc::new(FakePage::new("chat.example.org"));
        let widget = FakeWidget::editable();
        let send = FakeControl::new("aria send");

        let later = page.clone();
        let button = send.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(650)).await;
            later.insert_control("button[aria-label*='send' i]", button);
        });

        let start = Instant::now();
        let sent = trigger()
            .try_submit(page.as_ref(), &widget, book.for_host("chat.example.org"))
            .await;

        assert!(sent);
        assert_eq!(send.clicks(), 1);
        assert_eq!(start.elapsed(), Duration::from_millis(700));
        assert!(widget.event_names().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_form_button_heuristic() {
        let book = ProfileBook::builtin();
        let page = FakePage::new("chat.example.org");
        let button = FakeControl::new("form button");
        let widget = FakeWidget::plain_textarea().configure(|s| {
            s.form_button = Some(button.clone());
        });

        assert!(trigger().try_submit(&page, &widget, book.for_host("x")).await);
        assert_eq!(button.clicks(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_enter_fallback_when_nothing_enabled() {
        let book = ProfileBook::builtin();
        let page = FakePage::new("claude.ai");
        let widget = FakeWidget::editable().configure(|s| s.has_form = true);

        let start = Instant::now();
        let sent = trigger()
            .try_submit(&page, &widget, book.for_host("claude.ai"))
            .await;

        assert!(sent);
        assert_eq!(widget.event_names(), vec!["keydown", "keyup"]);
        assert!(widget.calls().contains(&"submit_enclosing_form"));
        // 400 ms initial delay, 9 gaps of 100 ms, 50 ms key press.
        assert_eq!(start.elapsed(), Duration::from_millis(1350));
    }
}
