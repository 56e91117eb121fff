//! Record validation run before anything is emitted.

use crate::record::Record;
use crate::token::TokenSeq;
use thiserror::Error;

/// Validation error type.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Record for {field} is {size} bytes, ceiling is {ceiling}")]
    Oversized {
        field: String,
        size: usize,
        ceiling: usize,
    },

    #[error("Record for {0} is not a well-formed token sequence")]
    Malformed(String),

    #[error("Record for {field} has sequence {ordinal}/{total}, expected {expected}/{total}")]
    BadSequence {
        field: String,
        ordinal: usize,
        expected: usize,
        total: usize,
    },

    #[error("Record has an empty field name")]
    EmptyField,
}

/// Result of record validation.
#[derive(Debug)]
pub struct ValidationResult {
    pub valid: bool,
    pub errors: Vec<ValidationError>,
    pub warnings: Vec<String>,
}

impl ValidationResult {
    pub fn new() -> Self {
        Self {
            valid: true,
            errors: Vec::new(),
            warnings: Vec::new(),
        }
    }

    pub fn add_error(&mut self, error: ValidationError) {
        self.valid = false;
        self.errors.push(error);
    }

    pub fn add_warning(&mut self, warning: String) {
        self.warnings.push(warning);
    }
}

impl Default for ValidationResult {
    fn default() -> Self {
        Self::new()
    }
}

/// Validate the records of one attribute group, in emission order.
pub fn validate_records(records: &[Record], ceiling: usize) -> ValidationResult {
    let mut result = ValidationResult::new();

    for (i, record) in records.iter().enumerate() {
        if record.field.is_empty() {
            result.add_error(ValidationError::EmptyField);
            continue;
        }

        let line = record.render();
        if line.len() > ceiling {
            result.add_error(ValidationError::Oversized {
                field: record.field.clone(),
                size: line.len(),
                ceiling,
            });
        }

        if line.is_empty() {
            result.add_warning(format!("Record for {} is empty", record.field));
        } else if TokenSeq::parse(&line).is_none() {
            result.add_error(ValidationError::Malformed(record.field.clone()));
        }

        if let Some(seq) = record.sequence {
            let expected = i + 1;
            if seq.ordinal != expected || seq.total != records.len() {
                result.add_error(ValidationError::BadSequence {
                    field: record.field.clone(),
                    ordinal: seq.ordinal,
                    expected,
                    total: records.len(),
                });
            }
        }
    }

    result
}
