//! Logger sink abstraction for the WebSocket connection manager.
//!
//! The read-loop and keep-alive loop run detached from any caller, so the
//! only way they can report transport errors is through a sink. Connections
//! depend on the [`LogSink`] trait rather than on a concrete logger, which
//! lets applications route messages into their own logging setup and lets
//! tests capture them.

use std::fmt;
use std::sync::Arc;

use log::Level;

/// `log` target used by [`LogCrateSink`].
pub const LOG_TARGET: &str = "soundtouch";

/// Destination for messages produced by background connection tasks.
///
/// # Example
///
/// ```ignore
/// struct Stdout;
///
/// impl LogSink for Stdout {
///     fn log(&self, level: Level, message: fmt::Arguments<'_>) {
///         println!("{level}: {message}");
///     }
/// }
/// ```
pub trait LogSink: Send + Sync {
    /// Records one formatted message at `level`.
    fn log(&self, level: Level, message: fmt::Arguments<'_>);
}

/// Default sink: forwards to the `log` facade with a `[SoundTouch]` prefix.
///
/// Output appears wherever the embedding application's logger (for example
/// `env_logger`) sends the `soundtouch` target.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogCrateSink;

impl LogCrateSink {
    /// Creates a shareable instance.
    #[must_use]
    pub fn arc() -> Arc<dyn LogSink> {
        Arc::new(Self)
    }
}

impl LogSink for LogCrateSink {
    fn log(&self, level: Level, message: fmt::Arguments<'_>) {
        log::log!(target: LOG_TARGET, level, "[SoundTouch] {}", message);
    }
}

/// Sink that discards every message.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopSink;

impl NoopSink {
    /// Creates a shareable instance.
    #[must_use]
    pub fn arc() -> Arc<dyn LogSink> {
        Arc::new(Self)
    }
}

impl LogSink for NoopSink {
    fn log(&self, _level: Level, _message: fmt::Arguments<'_>) {}
}

/// Writes a `format!`-style message to a [`LogSink`].
///
/// ```ignore
/// sink_log!(config.logger, Warn, "read failed: {}", err);
/// ```
macro_rules! sink_log {
    ($sink:expr, $level:ident, $($arg:tt)+) => {
        $sink.log(::log::Level::$level, format_args!($($arg)+))
    };
}

pub(crate) use sink_log;
