//! Timer abstraction for deterministic testing.
//!
//! The reconnection policy waits through a [`Clock`] instead of calling
//! `tokio::time::sleep` directly, so tests can substitute a clock that
//! returns immediately and records every requested delay.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

/// Abstraction for suspending a task for a duration.
///
/// # Example
///
/// ```ignore
/// let clock: Arc<dyn Clock> = TokioClock::arc();
/// clock.sleep(Duration::from_secs(5)).await;
/// ```
#[async_trait]
pub trait Clock: Send + Sync {
    /// Completes after `duration` has elapsed on this clock.
    async fn sleep(&self, duration: Duration);
}

/// Tokio timer backed clock used outside of tests.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioClock;

impl TokioClock {
    /// Creates a shareable instance.
    #[must_use]
    pub fn arc() -> Arc<dyn Clock> {
        Arc::new(Self)
    }
}

#[async_trait]
impl Clock for TokioClock {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}
