//! # Diagnostic Sinks
//!
//! The engine never writes output itself. Every finding is handed to a
//! [`DiagnosticSink`], which must accept appends from several worker
//! threads at once.
//!
//! - [`MemorySink`]: collects in memory (tests, sequential runs)
//! - [`ChannelSink`]: forwards to a writer thread over a crossbeam channel

use crossbeam_channel::{Receiver, Sender};
use parking_lot::Mutex;
use tracing::warn;
use types::{Diagnostic, Severity};

/// Append-only receiver of diagnostics
pub trait DiagnosticSink: Send + Sync {
    fn record(&self, diagnostic: Diagnostic);

    /// Called by the driver at blast boundaries
    fn flush(&self) {}
}

#[derive(Debug, Default)]
pub struct MemorySink {
    entries: Mutex<Vec<Diagnostic>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Remove and return everything recorded so far
    pub fn take(&self) -> Vec<Diagnostic> {
        std::mem::take(&mut *self.entries.lock())
    }

    pub fn snapshot(&self) -> Vec<Diagnostic> {
        self.entries.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    pub fn count(&self, severity: Severity) -> usize {
        self.entries
            .lock()
            .iter()
            .filter(|d| d.severity == severity)
            .count()
    }
}

impl DiagnosticSink for MemorySink {
    fn record(&self, diagnostic: Diagnostic) {
        self.entries.lock().push(diagnostic);
    }
}

/// Sends every diagnostic to a single consumer
#[derive(Debug, Clone)]
pub struct ChannelSink {
    sender: Sender<Diagnostic>,
}

impl ChannelSink {
    pub fn new(sender: Sender<Diagnostic>) -> Self {
        Self { sender }
    }

    /// Sink plus the receiving end for the writer thread
    pub fn unbounded() -> (Self, Receiver<Diagnostic>) {
        let (sender, receiver) = crossbeam_channel::unbounded();
        (Self::new(sender), receiver)
    }
}

impl DiagnosticSink for ChannelSink {
    fn record(&self, diagnostic: Diagnostic) {
        if let Err(e) = self.sender.send(diagnostic) {
            warn!("Diagnostic dropped, writer has gone away: {}", e.0);
        }
    }
}

/// Binds a sink to the top-level message being validated
pub struct Reporter<'s> {
    sink: &'s dyn DiagnosticSink,
    timestamp_index: usize,
    timestamp_ns: Option<u64>,
    errors: usize,
    warnings: usize,
}

impl<'s> Reporter<'s> {
    pub fn new(sink: &'s dyn DiagnosticSink, timestamp_index: usize, timestamp_ns: Option<u64>) -> Self {
        Self {
            sink,
            timestamp_index,
            timestamp_ns,
            errors: 0,
            warnings: 0,
        }
    }

    pub fn report(&mut self, severity: Severity, text: impl Into<String>) {
        match severity {
            Severity::Error => self.errors += 1,
            Severity::Warn => self.warnings += 1,
            Severity::Info => {}
        }
        self.sink.record(Diagnostic::new(
            self.timestamp_index,
            self.timestamp_ns,
            severity,
            text,
        ));
    }

    pub fn info(&mut self, text: impl Into<String>) {
        self.report(Severity::Info, text);
    }

    pub fn warn(&mut self, text: impl Into<String>) {
        self.report(Severity::Warn, text);
    }

    pub fn error(&mut self, text: impl Into<String>) {
        self.report(Severity::Error, text);
    }

    pub fn timestamp_index(&self) -> usize {
        self.timestamp_index
    }

    pub fn error_count(&self) -> usize {
        self.errors
    }

    pub fn warning_count(&self) -> usize {
        self.warnings
    }
}
