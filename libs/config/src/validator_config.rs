//! Validator Run Configuration
//!
//! Defaults are layered under an optional TOML file; command-line flags are
//! applied on top by the binary. Paths may start with `~`.

use config_crate::{Config, File, FileFormat};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

/// Default number of messages cached and validated per blast
pub const DEFAULT_BLAST_SIZE: usize = 500;

/// Default read buffer for separator scanning (bytes)
pub const DEFAULT_BUFFER_SIZE: usize = 1_000_000;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    Load(#[from] config_crate::ConfigError),

    #[error("Invalid value for '{field}': {reason}")]
    Invalid { field: &'static str, reason: String },

    #[error("Failed to expand path '{path}': {reason}")]
    Expand { path: String, reason: String },

    #[error("Failed to render configuration: {0}")]
    Render(#[from] toml::ser::Error),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

/// Settings of one validation run
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(default)]
pub struct ValidatorConfig {
    /// Messages per blast; must be positive
    pub blast_size: usize,
    /// Separator scan buffer; 0 reads the whole trace at once
    pub buffer_size: usize,
    /// Number of top-level messages to validate, -1 for all
    pub timesteps: i64,
    pub parallel: bool,
    /// Worker threads in parallel mode, 0 = available parallelism
    pub workers: usize,
    pub proto_package: String,
    pub output_dir: PathBuf,
    pub rules_dir: Option<PathBuf>,
    pub doxygen_xml: Option<PathBuf>,
    pub descriptor_set: Option<PathBuf>,
    /// `length` or `separator`; detected from the extension when unset
    pub framing: Option<String>,
    /// Top-level type; inferred from the trace name when unset
    pub message_type: Option<String>,
    pub verbose: bool,
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        Self {
            blast_size: DEFAULT_BLAST_SIZE,
            buffer_size: DEFAULT_BUFFER_SIZE,
            timesteps: -1,
            parallel: false,
            workers: 0,
            proto_package: "osi3".to_string(),
            output_dir: PathBuf::from("output"),
            rules_dir: None,
            doxygen_xml: None,
            descriptor_set: None,
            framing: None,
            message_type: None,
            verbose: false,
        }
    }
}

impl ValidatorConfig {
    /// Load defaults, overlaid with `path` when given.
    pub fn load(path: Option<&Path>) -> ConfigResult<Self> {
        let mut builder = Config::builder().add_source(Config::try_from(&Self::default())?);

        if let Some(path) = path {
            info!("Loading validator config: {:?}", path);
            builder = builder.add_source(File::from(path).format(FileFormat::Toml).required(true));
        }

        let mut config: Self = builder.build()?.try_deserialize()?;
        config.expand_paths()?;
        config.validate()?;
        debug!("Effective config: {:?}", config);
        Ok(config)
    }

    /// Reject settings the driver cannot run with.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.blast_size == 0 {
            return Err(ConfigError::Invalid {
                field: "blast_size",
                reason: "must be a positive integer".to_string(),
            });
        }
        if self.timesteps < -1 {
            return Err(ConfigError::Invalid {
                field: "timesteps",
                reason: format!("{} is neither -1 (all) nor a message count", self.timesteps),
            });
        }
        if self.proto_package.contains(char::is_whitespace) {
            return Err(ConfigError::Invalid {
                field: "proto_package",
                reason: format!("'{}' is not a protobuf package name", self.proto_package),
            });
        }
        Ok(())
    }

    /// Message limit, `None` meaning the whole trace
    pub fn timestep_limit(&self) -> Option<usize> {
        usize::try_from(self.timesteps).ok()
    }

    /// Worker threads to use in parallel mode
    pub fn worker_count(&self) -> usize {
        if self.workers > 0 {
            self.workers
        } else {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1)
        }
    }

    /// Render as TOML, e.g. to record the settings next to the output logs
    pub fn to_toml(&self) -> ConfigResult<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    fn expand_paths(&mut self) -> ConfigResult<()> {
        self.output_dir = expand(&self.output_dir)?;
        for path in [&mut self.rules_dir, &mut self.doxygen_xml, &mut self.descriptor_set]
            .into_iter()
            .flatten()
        {
            *path = expand(path)?;
        }
        Ok(())
    }
}

fn expand(path: &Path) -> ConfigResult<PathBuf> {
    let raw = path.to_string_lossy();
    let expanded = shellexpand::tilde(&raw);
    if expanded.is_empty() {
        return Err(ConfigError::Expand {
            path: raw.to_string(),
            reason: "expands to an empty path".to_string(),
        });
    }
    Ok(PathBuf::from(expanded.as_ref()))
}
