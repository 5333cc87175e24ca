//! Reconnection attempt loop.
//!
//! Kept free of sockets and real timers: the caller supplies the dial step,
//! the clock and the cancellation token, so the policy can be exercised with
//! a fake clock.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use super::config::ConnectionConfig;
use crate::runtime::Clock;

/// Fixed-interval retry policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectPolicy {
    /// Delay before every attempt.
    pub interval: Duration,
    /// Attempt cap. Zero means unlimited.
    pub max_attempts: u32,
}

impl ReconnectPolicy {
    /// Returns true if attempt number `attempt` (1-based) may run.
    #[must_use]
    pub fn allows(&self, attempt: u32) -> bool {
        self.max_attempts == 0 || attempt <= self.max_attempts
    }
}

impl From<&ConnectionConfig> for ReconnectPolicy {
    fn from(config: &ConnectionConfig) -> Self {
        Self {
            interval: config.reconnect_interval,
            max_attempts: config.max_reconnect_attempts,
        }
    }
}

/// How a reconnection sequence ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconnectOutcome {
    /// An attempt succeeded.
    Connected { attempts: u32 },
    /// The attempt cap was reached without success.
    Exhausted { attempts: u32 },
    /// The token was cancelled before or during an attempt's delay.
    Cancelled { attempts: u32 },
}

/// Runs attempts until one succeeds, the cap is reached, or `cancel` fires.
///
/// Each attempt waits `policy.interval` on `clock` first. The token is
/// checked before the delay, raced against the delay, and checked again
/// before dialing. `on_failure` receives the attempt number and error of
/// each failed attempt.
pub async fn run<F, Fut, E, L>(
    policy: ReconnectPolicy,
    clock: &dyn Clock,
    cancel: &CancellationToken,
    mut attempt: F,
    mut on_failure: L,
) -> ReconnectOutcome
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<(), E>>,
    E: Display,
    L: FnMut(u32, &E),
{
    let mut made = 0u32;
    while policy.allows(made + 1) {
        if cancel.is_cancelled() {
            return ReconnectOutcome::Cancelled { attempts: made };
        }

        tokio::select! {
            _ = cancel.cancelled() => return ReconnectOutcome::Cancelled { attempts: made },
            _ = clock.sleep(policy.interval) => {}
        }

        if cancel.is_cancelled() {
            return ReconnectOutcome::Cancelled { attempts: made };
        }

        made += 1;
        match attempt(made).await {
            Ok(()) => return ReconnectOutcome::Connected { attempts: made },
            Err(e) => on_failure(made, &e),
        }
    }
    ReconnectOutcome::Exhausted { attempts: made }
}
