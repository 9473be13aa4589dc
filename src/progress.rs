// src/progress.rs

//! Status reporting for long-running library operations
//!
//! The resolver and the upgrade scan report human-readable status strings
//! at each major step. Callers choose where they go:
//! - `SilentProgress`: discards everything
//! - `LogProgress`: forwards to tracing at info level
//! - `CallbackProgress`: hands each message to a closure (UI integration)
//!
//! Reporting never affects the outcome of the operation being reported on.

use std::sync::atomic::{AtomicU64, Ordering};
use tracing::info;

/// Receiver for status messages
pub trait ProgressSink: Send + Sync {
    /// Report the current step
    fn status(&self, message: &str);
}

/// No-op sink
#[derive(Debug, Default)]
pub struct SilentProgress;

impl SilentProgress {
    pub fn new() -> Self {
        Self
    }
}

impl ProgressSink for SilentProgress {
    fn status(&self, _message: &str) {}
}

/// Sink that logs each message, prefixed with an operation name
#[derive(Debug)]
pub struct LogProgress {
    name: String,
    messages: AtomicU64,
}

impl LogProgress {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            messages: AtomicU64::new(0),
        }
    }

    /// Number of messages reported so far
    pub fn count(&self) -> u64 {
        self.messages.load(Ordering::Relaxed)
    }
}

impl ProgressSink for LogProgress {
    fn status(&self, message: &str) {
        self.messages.fetch_add(1, Ordering::Relaxed);
        info!("{}: {}", self.name, message);
    }
}

/// Sink that calls a user-provided function
pub struct CallbackProgress<F>
where
    F: Fn(&str) + Send + Sync,
{
    callback: F,
}

impl<F> CallbackProgress<F>
where
    F: Fn(&str) + Send + Sync,
{
    pub fn new(callback: F) -> Self {
        Self { callback }
    }
}

impl<F> ProgressSink for CallbackProgress<F>
where
    F: Fn(&str) + Send + Sync,
{
    fn status(&self, message: &str) {
        (self.callback)(message);
    }
}
