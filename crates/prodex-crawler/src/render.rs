//! Headless-browser rendering contract.
//!
//! The core never talks to a browser directly; it drives a [`PageRenderer`]
//! implementation through this contract. Implementations must open a fresh
//! browser context per request, honour the wait conditions in order, and
//! close the context on every exit path — success, error, or cancellation.

use std::time::Duration;

use async_trait::async_trait;

use crate::error::CrawlerError;

/// Interval at which a `wait_for_function` predicate is polled.
pub const PREDICATE_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Browser load states, tried in order until one succeeds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadState {
    NetworkIdle,
    DomContentLoaded,
    Load,
}

impl LoadState {
    /// The default ordered set: network idle first, plain load last.
    #[must_use]
    pub fn default_order() -> Vec<LoadState> {
        vec![
            LoadState::NetworkIdle,
            LoadState::DomContentLoaded,
            LoadState::Load,
        ]
    }
}

/// Page-readiness conditions, applied in declaration order. Every condition
/// that is present must eventually be satisfied or time out.
#[derive(Debug, Clone)]
pub struct RenderWait {
    /// Load states to try in order; the first that succeeds is accepted.
    pub load_states: Vec<LoadState>,
    /// CSS selector that must become present.
    pub selector: Option<String>,
    /// JavaScript expression polled at [`PREDICATE_POLL_INTERVAL`] until it
    /// evaluates truthy or the overall timeout expires.
    pub predicate: Option<String>,
    /// Fixed additional settle delay after the other conditions.
    pub settle_delay: Option<Duration>,
}

impl Default for RenderWait {
    fn default() -> Self {
        Self {
            load_states: LoadState::default_order(),
            selector: None,
            predicate: None,
            settle_delay: None,
        }
    }
}

/// Per-request renderer configuration.
#[derive(Debug, Clone)]
pub struct RenderOptions {
    pub user_agent: String,
    pub timeout: Duration,
    pub headless: bool,
    pub wait: RenderWait,
}

/// A rendered page as returned by the browser.
#[derive(Debug, Clone)]
pub struct RenderedPage {
    pub html: String,
    /// Markdown rendition, when the renderer produces one.
    pub markdown: Option<String>,
    pub status: Option<u16>,
    pub final_url: String,
}

/// Headless-browser collaborator executing JavaScript before capture.
#[async_trait]
pub trait PageRenderer: Send + Sync {
    /// Navigates to `url`, waits per `options.wait`, and returns the
    /// rendered HTML. The browser context is closed unconditionally.
    ///
    /// # Errors
    ///
    /// Returns [`CrawlerError::Render`] for navigation or wait-condition
    /// failures; these are retriable.
    async fn render(&self, url: &str, options: &RenderOptions) -> Result<RenderedPage, CrawlerError>;
}
