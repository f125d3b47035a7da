//! Rule loading errors

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RuleLoadError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid YAML in {path}: {source}")]
    Yaml {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("Invalid Doxygen XML in {path}: {reason}")]
    Xml { path: PathBuf, reason: String },

    /// Same verb declared twice for one field
    #[error("Duplicate rule '{verb}' for {field_path} ({path})")]
    DuplicateVerb {
        verb: String,
        field_path: String,
        path: PathBuf,
    },

    #[error("Malformed rule entry at {field_path} ({path}): {reason}")]
    MalformedEntry {
        field_path: String,
        path: PathBuf,
        reason: String,
    },

    #[error("Invalid severity '{value}' at {field_path}: expected info, warn or error")]
    InvalidSeverity { value: String, field_path: String },
}

impl RuleLoadError {
    pub fn malformed(field_path: impl Into<String>, path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::MalformedEntry {
            field_path: field_path.into(),
            path: path.into(),
            reason: reason.into(),
        }
    }
}

pub type RuleLoadResult<T> = Result<T, RuleLoadError>;
