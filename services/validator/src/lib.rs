//! # OSI Validator Service
//!
//! Drives a validation run over one recorded OSI trace.
//!
//! ## Architecture
//!
//! ```text
//! trace file ─► TraceIndex ─► blast cache ─► Engine (per message) ─► DiagnosticSink
//!                                  │              ▲                        │
//!                             cache_range     RuleTree                TextLogSink
//!                                          (YAML / Doxygen)        (.log + .summary.txt)
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! use osi_validator::Validator;
//! use validator_config::ValidatorConfig;
//!
//! let config = ValidatorConfig {
//!     rules_dir: Some("rules".into()),
//!     descriptor_set: Some("osi.desc".into()),
//!     ..ValidatorConfig::default()
//! };
//! let report = Validator::open("run_gt_001.osi", config)?.run()?;
//! println!("{}", report.summary);
//! ```

pub mod driver;
pub mod output;

pub use driver::{build_rule_tree, select_message_type, RunReport, Validator};
pub use output::{trace_stem, TextLogSink};
