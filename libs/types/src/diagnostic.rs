//! Diagnostic records produced while validating a trace.
//!
//! A diagnostic is the only externally visible outcome of validation: one
//! `(timestamp_index, timestamp_ns, severity, text)` tuple per event.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Severity of a diagnostic, ordered from least to most severe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warn,
    Error,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Info => "info",
            Severity::Warn => "warn",
            Severity::Error => "error",
        }
    }
}

impl Default for Severity {
    /// Rules without an explicit severity report errors.
    fn default() -> Self {
        Severity::Error
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Severity string outside `{info, warn, warning, error}`
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("Invalid severity '{input}': expected one of info, warn, error")]
pub struct ParseSeverityError {
    pub input: String,
}

impl FromStr for Severity {
    type Err = ParseSeverityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "info" => Ok(Severity::Info),
            "warn" | "warning" => Ok(Severity::Warn),
            "error" => Ok(Severity::Error),
            _ => Err(ParseSeverityError {
                input: s.to_string(),
            }),
        }
    }
}

/// A single validation finding attached to one top-level message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    /// Position of the top-level message in the trace
    pub timestamp_index: usize,
    /// In-message simulation time, when the message carries one
    pub timestamp_ns: Option<u64>,
    pub severity: Severity,
    pub text: String,
}

impl Diagnostic {
    pub fn new(
        timestamp_index: usize,
        timestamp_ns: Option<u64>,
        severity: Severity,
        text: impl Into<String>,
    ) -> Self {
        Self {
            timestamp_index,
            timestamp_ns,
            severity,
            text: text.into(),
        }
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}][ts={}]", self.severity, self.timestamp_index)?;
        if let Some(ns) = self.timestamp_ns {
            write!(f, "[ns={}]", ns)?;
        }
        write!(f, " {}", self.text)
    }
}
