//! Injected diagnostics.
//!
//! Components receive a [`Logger`] at construction instead of reaching for a
//! process-wide logger, so each can be tested with its own sink.

use std::sync::Arc;

/// Leveled logging interface handed to every component.
pub trait Logger: Send + Sync {
    fn debug(&self, message: &str);
    fn info(&self, message: &str);
    fn warn(&self, message: &str);
    fn error(&self, message: &str);
}

/// Forwards to the `log` crate, so the host application's logger decides what
/// is printed.
#[derive(Debug, Clone, Copy)]
pub struct LogFacade {
    target: &'static str,
}

impl LogFacade {
    pub const fn new(target: &'static str) -> Self {
        Self { target }
    }
}

impl Default for LogFacade {
    fn default() -> Self {
        Self::new("math_roundtrip")
    }
}

impl Logger for LogFacade {
    fn debug(&self, message: &str) {
        log::debug!(target: self.target, "{}", message);
    }

    fn info(&self, message: &str) {
        log::info!(target: self.target, "{}", message);
    }

    fn warn(&self, message: &str) {
        log::warn!(target: self.target, "{}", message);
    }

    fn error(&self, message: &str) {
        log::error!(target: self.target, "{}", message);
    }
}

/// Discards everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullLogger;

impl Logger for NullLogger {
    fn debug(&self, _message: &str) {}
    fn info(&self, _message: &str) {}
    fn warn(&self, _message: &str) {}
    fn error(&self, _message: &str) {}
}

/// The logger used when the caller does not inject one.
pub fn default_logger() -> Arc<dyn Logger> {
    Arc::new(LogFacade::default())
}

#[cfg(test)]
pub(crate) use self::testing::MemoryLogger;
