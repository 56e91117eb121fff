//! Canonicalization of raw probe output into `key='value'` tokens.
//!
//! This crate provides the declarative rule engine shared by every probe,
//! the regex patterns those rules use, and the assembler that packs tokens
//! into size-bounded records.

pub mod assembler;
pub mod patterns;
pub mod rules;

pub use assembler::{split_token, truncate_token, Assembler, Sequencing, DEFAULT_CEILING, MIN_CEILING};
pub use rules::{normalize, KeyStyle, LineRule, Matcher, RuleSet, Shape};

/// Suffix appended to a value cut down to fit the ceiling.
pub const TRUNCATION_MARKER: &str = "...[TRUNCATED]";
