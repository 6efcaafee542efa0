//! External stop requests.
//!
//! A [`StopHandle`] can be cloned into any task (a signal listener, a timer,
//! a UI) and turns a stop request into the crawler's two-phase halt: intake
//! closes immediately, in-flight jobs finish, then the item stream drains.

use crate::state::CrawlerState;
use std::sync::Arc;
use tracing::info;

/// Cloneable handle used to request a graceful stop of a running crawl.
#[derive(Debug, Clone)]
pub struct StopHandle {
    state: Arc<CrawlerState>,
}

impl StopHandle {
    pub(crate) fn new(state: Arc<CrawlerState>) -> Self {
        Self { state }
    }

    /// Requests a stop. Calling it more than once has no further effect.
    pub fn stop(&self) {
        if !self.state.is_stopping() {
            info!("Stop requested, draining in-flight work.");
        }
        self.state.request_stop();
    }

    pub fn is_stopped(&self) -> bool {
        self.state.is_stopping()
    }

    /// Resolves once a stop has been requested.
    pub async fn stopped(&self) {
        let token = self.state.stop_token();
        token.cancelled().await
    }
}
