//! Timer-driven selection polling.
//!
//! The host's "currently inspected node" can only be observed by polling.
//! [`SelectionPoller`] calls [`Backend::check_selection`] on an interval and
//! backs off while the backend cannot poll (no host injected yet).
//!
//! # Example
//!
//! ```no_run
//! use treelens_core::backend::Backend;
//! use treelens_core::config::TreelensConfig;
//! use treelens_core::poller::{PollerConfig, SelectionPoller};
//!
//! #[tokio::main]
//! async fn main() {
//!     let backend = Backend::new(TreelensConfig::default());
//!     let handle = SelectionPoller::spawn(backend, PollerConfig::default());
//!
//!     // Later, stop the poller
//!     handle.stop().await;
//! }
//! ```

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use crate::backend::Backend;
use crate::config::TreelensConfig;

/// Upper bound for the backoff between failing polls.
const MAX_BACKOFF: Duration = Duration::from_secs(30);

/// Configuration for the selection poller.
#[derive(Debug, Clone)]
pub struct PollerConfig {
    /// Polling interval in milliseconds (default: 250).
    pub interval_ms: u64,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self { interval_ms: 250 }
    }
}

impl From<&TreelensConfig> for PollerConfig {
    fn from(config: &TreelensConfig) -> Self {
        Self {
            interval_ms: config.selection_poll_ms,
        }
    }
}

/// Handle for controlling a running poller.
///
/// The poller runs until `stop()` or `cancel()` is called.
pub struct PollerHandle {
    cancel_token: CancellationToken,
    join_handle: JoinHandle<()>,
}

impl PollerHandle {
    /// Stops the poller and waits for it to finish.
    pub async fn stop(self) {
        self.cancel_token.cancel();
        let _ = self.join_handle.await;
    }

    /// Cancels the poller without waiting.
    pub fn cancel(&self) {
        self.cancel_token.cancel();
    }

    pub fn is_running(&self) -> bool {
        !self.join_handle.is_finished()
    }
}

/// Polls the backend's selection on a timer.
pub struct SelectionPoller;

impl SelectionPoller {
    /// Spawns the polling task on the current tokio runtime.
    pub fn spawn(backend: Arc<Backend>, config: PollerConfig) -> PollerHandle {
        let cancel_token = CancellationToken::new();
        let token = cancel_token.clone();
        let join_handle = tokio::spawn(async move {
            Self::run_loop(backend, config, token).await;
        });
        PollerHandle {
            cancel_token,
            join_handle,
        }
    }

    async fn run_loop(backend: Arc<Backend>, config: PollerConfig, cancel_token: CancellationToken) {
        let base_interval = Duration::from_millis(config.interval_ms.max(1));
        let mut consecutive_errors: u32 = 0;

        loop {
            let sleep_duration = Self::backoff_interval(base_interval, consecutive_errors);

            tokio::select! {
                _ = cancel_token.cancelled() => break,
                _ = tokio::time::sleep(sleep_duration) => {
                    match backend.check_selection() {
                        Ok(selected) => {
                            if consecutive_errors > 0 {
                                debug!("selection poller recovered");
                            }
                            consecutive_errors = 0;
                            if let Some(id) = selected {
                                trace!(%id, "poll selected component");
                            }
                        }
                        Err(e) => {
                            if consecutive_errors == 0 {
                                debug!(error = %e, "selection poller backing off");
                            }
                            consecutive_errors = consecutive_errors.saturating_add(1);
                        }
                    }
                }
            }
        }
    }

    /// Doubles the interval per consecutive error, capped at 30 seconds.
    fn backoff_interval(base: Duration, consecutive_errors: u32) -> Duration {
        let multiplier = 1u32.checked_shl(consecutive_errors).unwrap_or(u32::MAX);
        std::cmp::min(base.saturating_mul(multiplier), MAX_BACKOFF)
    }
}
