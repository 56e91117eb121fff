//! Record model for hostinfo.
//!
//! This crate defines the `key='value'` token format, the records built
//! from it, and the attempt log kept for every probe.

pub mod attempt;
pub mod record;
pub mod token;
pub mod validation;

pub use attempt::{Attempt, AttemptLog, Outcome};
pub use record::{marker_overhead, Record, Sequence};
pub use token::{sanitize_key, sanitize_value, Token, TokenSeq, SEPARATOR};
pub use validation::{validate_records, ValidationError, ValidationResult};
