//! # OSI Trace Codec
//!
//! ## Purpose
//!
//! Everything between a trace file on disk and a navigable message tree:
//! - Record framing (length-prefixed and legacy separator-delimited)
//! - Transparent XZ/LZMA decompression
//! - One-pass trace indexing with a bounded, blast-sized message cache
//! - Descriptor-pool loading for reflective decoding
//! - [`Navigator`], the parent-linked view rules are evaluated against
//!
//! ## Architecture Role
//!
//! ```text
//! libs/types → [codec] → libs/engine → services/validator
//!     ↑           ↓           ↓
//! Severity    TraceIndex   Rule dispatch
//! TopLevel    Navigator    ID resolution
//! ```
//!
//! ## What This Crate Does NOT Contain
//! - Rule definitions or loading (libs/rules)
//! - Predicate evaluation (libs/engine)
//! - Diagnostic output (services/validator)

pub mod descriptors;
pub mod error;
pub mod framing;
pub mod index;
pub mod navigator;
pub mod scanner;
pub mod source;
pub mod test_utils;

pub use descriptors::{load_descriptor_pool, message_descriptor, type_path};
pub use error::{NavigatorError, TraceError, TraceResult};
pub use framing::{Compression, Framing, DEFAULT_SCAN_BUFFER, LENGTH_PREFIX_SIZE, SEPARATOR};
pub use index::{CachedMessage, MessageCache, TraceIndex};
pub use navigator::Navigator;
pub use scanner::RecordSpan;
pub use source::TraceSource;

// Protobuf runtime re-exports so downstream crates agree on versions
pub use prost_reflect::{DescriptorPool, DynamicMessage, MessageDescriptor, Value};
