//! # OSI Validation Types
//!
//! Plain data shared by every layer of the validator.
//!
//! ## Contents
//!
//! - **Severity / Diagnostic**: the record emitted for every rule violation,
//!   missing rule, unresolved reference or decode failure
//! - **TopLevelType**: the root message kinds a trace may carry, with the
//!   filename-suffix convention used to infer them
//! - **Timestamp helpers**: conversion of the in-message `seconds`/`nanos`
//!   pair to nanoseconds
//!
//! ## Architecture Role
//!
//! ```text
//! libs/types → codec (trace index, navigator) → rules → engine → services/validator
//!     ↑
//! Pure data, no I/O, no protobuf runtime
//! ```

pub mod diagnostic;
pub mod message_type;
pub mod timestamp;

pub use diagnostic::{Diagnostic, ParseSeverityError, Severity};
pub use message_type::{TopLevelType, UnknownMessageType};
pub use timestamp::{timestamp_ns, NANOS_PER_SECOND};
