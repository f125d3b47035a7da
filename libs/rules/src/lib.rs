//! # OSI Rule Model
//!
//! Declarative validation rules keyed by protobuf type path.
//!
//! ## Sources
//! - `osi_*.yml` files in a rules directory ([`RuleLoader::load_dir`])
//! - Rule blocks embedded in Doxygen XML ([`load_doxygen`])
//!
//! ## Architecture Role
//!
//! ```text
//! YAML / XML ──► RuleLoader ──► RuleTree (immutable, shared)
//!                    │                 │
//!               VerbCatalog       engine::Engine
//!            (engine registry)
//! ```
//!
//! The loader only checks verb names through [`VerbCatalog`]; it never calls
//! predicates.

pub mod doxygen;
pub mod error;
pub mod loader;
pub mod tree;
pub mod verbs;

pub use doxygen::{extract_rule_blocks, load_doxygen, RuleBlock};
pub use error::{RuleLoadError, RuleLoadResult};
pub use loader::{load_rules_dir, RuleLoader, WELL_KNOWN_NESTED};
pub use tree::{FieldRules, Rule, RuleTree, TypeId, TypeRules};
pub use verbs::{StaticCatalog, VerbCatalog, ELEMENT_VERBS, GUARD_VERB};

pub use serde_yaml::Value as YamlValue;
