//! Logger capability used by the invocation pipeline
//!
//! Contracts log through a `Logger` obtained per service name from a
//! `LoggerFactory`. Two implementations ship with the crate:
//!
//! - `TracingLogger` - emits `tracing` events with `service` and `id` fields
//! - `MemoryLogger` - records lines in memory, for tests and inspection

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};

/// Leveled sink for contract lines. Every line carries the invocation id.
#[cfg_attr(test, mockall::automock)]
pub trait Logger: Send + Sync {
    fn debug(&self, id: u64, message: &str, detail: &str);
    fn error(&self, id: u64, message: &str, detail: &str);
}

/// Hands out the logger for a service name.
pub trait LoggerFactory: Send + Sync {
    /// `debug` is the configuration's debug flag; when false only error
    /// lines are expected to be emitted.
    fn logger(&self, service: &str, debug: bool) -> Arc<dyn Logger>;
}

/// Logger backed by `tracing`
#[derive(Debug, Clone)]
pub struct TracingLogger {
    service: String,
    debug: bool,
}

impl TracingLogger {
    pub fn new(service: impl Into<String>, debug: bool) -> Self {
        Self {
            service: service.into(),
            debug,
        }
    }
}

impl Logger for TracingLogger {
    fn debug(&self, id: u64, message: &str, detail: &str) {
        if !self.debug {
            return;
        }
        tracing::debug!(service = %self.service, id, "{} {}", message, detail);
    }

    fn error(&self, id: u64, message: &str, detail: &str) {
        tracing::error!(service = %self.service, id, "{} {}", message, detail);
    }
}

/// Factory caching one `TracingLogger` per service name
#[derive(Default)]
pub struct TracingLoggerFactory {
    loggers: Mutex<HashMap<(String, bool), Arc<dyn Logger>>>,
}

impl TracingLoggerFactory {
    pub fn new() -> Self {
        Self::default()
    }
}

impl LoggerFactory for TracingLoggerFactory {
    fn logger(&self, service: &str, debug: bool) -> Arc<dyn Logger> {
        let mut loggers = self
            .loggers
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        loggers
            .entry((service.to_string(), debug))
            .or_insert_with(|| Arc::new(TracingLogger::new(service, debug)))
            .clone()
    }
}

/// Level of a recorded line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Debug,
    Error,
}

/// One line recorded by a `MemoryLogger`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogLine {
    pub level: LogLevel,
    pub service: String,
    pub id: u64,
    pub message: String,
    pub detail: String,
}

/// Logger that records every line, shared by all services of one factory
#[derive(Debug, Clone, Default)]
pub struct MemoryLogger {
    service: String,
    debug: bool,
    lines: Arc<Mutex<Vec<LogLine>>>,
}

impl MemoryLogger {
    fn push(&self, level: LogLevel, id: u64, message: &str, detail: &str) {
        let mut lines = self.lines.lock().unwrap_or_else(|p| p.into_inner());
        lines.push(LogLine {
            level,
            service: self.service.clone(),
            id,
            message: message.to_string(),
            detail: detail.to_string(),
        });
    }
}

impl Logger for MemoryLogger {
    fn debug(&self, id: u64, message: &str, detail: &str) {
        if self.debug {
            self.push(LogLevel::Debug, id, message, detail);
        }
    }

    fn error(&self, id: u64, message: &str, detail: &str) {
        self.push(LogLevel::Error, id, message, detail);
    }
}

/// Factory whose loggers all write into one shared buffer
#[derive(Debug, Clone, Default)]
pub struct MemoryLoggerFactory {
    lines: Arc<Mutex<Vec<LogLine>>>,
}

impl MemoryLoggerFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of all recorded lines in emission order.
    pub fn lines(&self) -> Vec<LogLine> {
        self.lines.lock().unwrap_or_else(|p| p.into_inner()).clone()
    }

    pub fn lines_at(&self, level: LogLevel) -> Vec<LogLine> {
        self.lines()
            .into_iter()
            .filter(|line| line.level == level)
            .collect()
    }

    pub fn clear(&self) {
        self.lines.lock().unwrap_or_else(|p| p.into_inner()).clear();
    }
}

impl LoggerFactory for MemoryLoggerFactory {
    fn logger(&self, service: &str, debug: bool) -> Arc<dyn Logger> {
        Arc::new(MemoryLogger {
            service: service.to_string(),
            debug,
            lines: Arc::clone(&self.lines),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_logger_records_in_order() {
        let factory = MemoryLoggerFactory::new();
        let logger = factory.logger("svc", true);
        logger.debug(1, "ENTER m:", "{ a: 1 }");
        logger.error(1, "ERROR m: { a: 1 }", "boom");

        let lines = factory.lines();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].level, LogLevel::Debug);
        assert_eq!(lines[0].service, "svc");
        assert_eq!(lines[1].detail, "boom");
    }

    #[test]
    fn test_debug_disabled_drops_debug_lines() {
        let factory = MemoryLoggerFactory::new();
        let logger = factory.logger("svc", false);
        logger.debug(1, "ENTER m:", "{ }");
        logger.error(1, "ERROR m: { }", "boom");

        assert!(factory.lines_at(LogLevel::Debug).is_empty());
        assert_eq!(factory.lines_at(LogLevel::Error).len(), 1);
    }

    #[test]
    fn test_tracing_factory_caches_per_service() {
        let factory = TracingLoggerFactory::new();
        let a = factory.logger("svc", true);
        let b = factory.logger("svc", true);
        let c = factory.logger("other", true);

        assert!(Arc::ptr_eq(&a, &b));
        assert!(!Arc::ptr_eq(&a, &c));
    }
}
