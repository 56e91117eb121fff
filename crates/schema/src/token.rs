//! `key='value'` tokens and token sequences.
//!
//! A token renders as `key='value'`; a sequence renders as tokens joined by
//! [`SEPARATOR`]. Keys never contain whitespace, `=`, `;` or quotes. Values
//! never contain single quotes or control characters and carry no leading,
//! trailing or repeated whitespace, so every rendered sequence can be parsed
//! back without ambiguity.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Separator placed between tokens of one record.
pub const SEPARATOR: &str = "; ";

/// A single `key='value'` pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Token {
    key: String,
    value: String,
}

impl Token {
    /// Build a token, sanitizing both halves.
    pub fn new(key: impl AsRef<str>, value: impl AsRef<str>) -> Self {
        Self {
            key: sanitize_key(key.as_ref()),
            value: sanitize_value(value.as_ref()),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn value(&self) -> &str {
        &self.value
    }

    /// Rendered length in bytes.
    pub fn byte_len(&self) -> usize {
        // key + "='" + value + "'"
        self.key.len() + self.value.len() + 3
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}='{}'", self.key, self.value)
    }
}

/// Ordered tokens of one attribute group.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TokenSeq(Vec<Token>);

impl TokenSeq {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, token: Token) {
        self.0.push(token);
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Token> {
        self.0.iter()
    }

    pub fn tokens(&self) -> &[Token] {
        &self.0
    }

    pub fn into_inner(self) -> Vec<Token> {
        self.0
    }

    /// First token with the given key.
    pub fn get(&self, key: &str) -> Option<&Token> {
        self.0.iter().find(|t| t.key == key)
    }

    /// Rendered length in bytes, separators included.
    pub fn byte_len(&self) -> usize {
        let tokens: usize = self.0.iter().map(Token::byte_len).sum();
        tokens + SEPARATOR.len() * self.0.len().saturating_sub(1)
    }

    /// Render as `k='v'; k2='v2'`.
    pub fn render(&self) -> String {
        self.to_string()
    }

    /// Parse canonical text back into tokens.
    ///
    /// Returns `None` unless the whole input is a non-empty, already
    /// sanitized token sequence.
    pub fn parse(text: &str) -> Option<TokenSeq> {
        let mut tokens = Vec::new();
        let mut rest = text;

        loop {
            let eq = rest.find("='")?;
            let key = &rest[..eq];
            if !is_valid_key(key) {
                return None;
            }

            let after = &rest[eq + 2..];
            let close = after.find('\'')?;
            let value = &after[..close];
            if sanitize_value(value) != value {
                return None;
            }

            tokens.push(Token {
                key: key.to_string(),
                value: value.to_string(),
            });

            rest = &after[close + 1..];
            if rest.is_empty() {
                break;
            }
            rest = rest.strip_prefix(SEPARATOR)?;
        }

        Some(TokenSeq(tokens))
    }
}

impl fmt::Display for TokenSeq {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, token) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(SEPARATOR)?;
            }
            write!(f, "{}", token)?;
        }
        Ok(())
    }
}

impl From<Vec<Token>> for TokenSeq {
    fn from(tokens: Vec<Token>) -> Self {
        TokenSeq(tokens)
    }
}

impl FromIterator<Token> for TokenSeq {
    fn from_iter<I: IntoIterator<Item = Token>>(iter: I) -> Self {
        TokenSeq(iter.into_iter().collect())
    }
}

impl Extend<Token> for TokenSeq {
    fn extend<I: IntoIterator<Item = Token>>(&mut self, iter: I) {
        self.0.extend(iter);
    }
}

impl IntoIterator for TokenSeq {
    type Item = Token;
    type IntoIter = std::vec::IntoIter<Token>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a TokenSeq {
    type Item = &'a Token;
    type IntoIter = std::slice::Iter<'a, Token>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

fn is_forbidden_key_char(c: char) -> bool {
    c.is_whitespace() || c.is_control() || matches!(c, '=' | '\'' | '"' | ';')
}

fn is_valid_key(key: &str) -> bool {
    !key.is_empty() && !key.chars().any(is_forbidden_key_char)
}

/// Whitespace runs become `_`; quotes, `=` and `;` are dropped.
pub fn sanitize_key(raw: &str) -> String {
    let mut key = String::with_capacity(raw.len());
    let mut pending_gap = false;

    for c in raw.trim().chars() {
        if c.is_whitespace() {
            pending_gap = true;
            continue;
        }
        if is_forbidden_key_char(c) {
            continue;
        }
        if pending_gap && !key.is_empty() {
            key.push('_');
        }
        pending_gap = false;
        key.push(c);
    }

    key
}

/// Single quotes become double quotes; whitespace and control characters
/// collapse to single spaces; ends are trimmed.
pub fn sanitize_value(raw: &str) -> String {
    let mut value = String::with_capacity(raw.len());
    let mut pending_gap = false;

    for c in raw.chars() {
        if c.is_whitespace() || c.is_control() {
            pending_gap = true;
            continue;
        }
        if pending_gap && !value.is_empty() {
            value.push(' ');
        }
        pending_gap = false;
        value.push(if c == '\'' { '"' } else { c });
    }

    value
}
