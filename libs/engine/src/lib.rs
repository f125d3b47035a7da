//! # OSI Rule Engine
//!
//! Applies a [`rules::RuleTree`] to decoded top-level messages.
//!
//! ## Components
//!
//! - [`Registry`]: verb → predicate table, also the loader's verb catalog
//! - [`Engine`] / [`Checker`]: depth-first traversal and rule dispatch
//! - [`IdManager`]: identifier unicity and reference resolution per message
//! - [`expr`]: condition language of `is_set_if` and `refers_to`
//! - [`DiagnosticSink`]: where findings go ([`MemorySink`], [`ChannelSink`])
//! - [`summary`]: aggregation of the diagnostic stream
//!
//! ## Example
//!
//! ```rust,ignore
//! let tree = rules::load_rules_dir("rules/", Registry::global())?;
//! let engine = Engine::new(tree);
//! let sink = MemorySink::new();
//! let clean = engine.validate_message(&message, 0, &sink);
//! ```

pub mod engine;
pub mod error;
pub mod expr;
pub mod id_manager;
pub mod iso3166;
pub mod logger;
mod predicates;
pub mod projection;
pub mod registry;
pub mod summary;

pub use engine::{message_timestamp_ns, Checker, Engine, Verdict};
pub use error::{ExprError, ExprResult};
pub use expr::{evaluate, Expr};
pub use id_manager::{IdManager, Reference};
pub use logger::{ChannelSink, DiagnosticSink, MemorySink, Reporter};
pub use projection::{ProjValue, Projection, Scope};
pub use registry::{Predicate, Registry, VerbSpec};
pub use summary::{format_ranges, synthesize, Summary, SummaryEntry};
