//! Normalized records, the unit handed to the emitter.

use crate::token::{Token, TokenSeq, SEPARATOR};
use serde::{Deserialize, Serialize};

/// Position of a record within a split attribute group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sequence {
    /// 1-based ordinal.
    pub ordinal: usize,
    pub total: usize,
}

impl Sequence {
    /// Marker token, e.g. `Installed_Packages2='2/3'`.
    pub fn marker(&self, field: &str) -> Token {
        Token::new(
            format!("{}{}", field, self.ordinal),
            format!("{}/{}", self.ordinal, self.total),
        )
    }
}

/// One emitted syslog line worth of tokens.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    /// Wire field name of the attribute group this record belongs to.
    pub field: String,
    /// Present when the group carries sequence markers.
    pub sequence: Option<Sequence>,
    /// Payload tokens, marker excluded.
    pub tokens: TokenSeq,
}

impl Record {
    /// A record that carries no sequence marker.
    pub fn single(field: impl Into<String>, tokens: TokenSeq) -> Self {
        Self {
            field: field.into(),
            sequence: None,
            tokens,
        }
    }

    /// A record that starts with a sequence marker.
    pub fn sequenced(field: impl Into<String>, sequence: Sequence, tokens: TokenSeq) -> Self {
        Self {
            field: field.into(),
            sequence: Some(sequence),
            tokens,
        }
    }

    /// Marker token, if any.
    pub fn marker(&self) -> Option<Token> {
        self.sequence.map(|s| s.marker(&self.field))
    }

    /// The wire line.
    pub fn render(&self) -> String {
        match self.marker() {
            Some(marker) if self.tokens.is_empty() => marker.to_string(),
            Some(marker) => format!("{}{}{}", marker, SEPARATOR, self.tokens),
            None => self.tokens.render(),
        }
    }

    /// Length of the wire line in bytes.
    pub fn byte_len(&self) -> usize {
        let marker = self.marker().map(|m| m.byte_len()).unwrap_or(0);
        let gap = if marker > 0 && !self.tokens.is_empty() {
            SEPARATOR.len()
        } else {
            0
        };
        marker + gap + self.tokens.byte_len()
    }
}

/// Rendered size of a marker plus its trailing separator.
pub fn marker_overhead(field: &str, sequence: Sequence) -> usize {
    sequence.marker(field).byte_len() + SEPARATOR.len()
}
