//! # OSI Validator Configuration
//!
//! Run settings shared by the validator binary and its tests.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use validator_config::ValidatorConfig;
//!
//! let config = ValidatorConfig::load(Some(std::path::Path::new("validator.toml")))?;
//! assert!(config.blast_size > 0);
//! # Ok::<(), validator_config::ConfigError>(())
//! ```

pub mod validator_config;

pub use validator_config::{
    ConfigError, ConfigResult, ValidatorConfig, DEFAULT_BLAST_SIZE, DEFAULT_BUFFER_SIZE,
};
