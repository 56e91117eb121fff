//! Size-bounded record assembly.
//!
//! Tokens are packed greedily, in order, into records no larger than the
//! ceiling. A token that fits is never split across records. A token too
//! large for one record whose value is a `; ` joined listing is cut at
//! listing boundaries into consecutive tokens with the same key; anything
//! else that cannot fit is truncated. When a group needs sequence markers,
//! room for the largest possible marker is reserved before packing starts
//! so the marker can never push a record over the ceiling.

use crate::TRUNCATION_MARKER;
use hostinfo_common::{Error, Result};
use hostinfo_schema::{marker_overhead, Record, Sequence, Token, TokenSeq, SEPARATOR};
use tracing::{debug, warn};

/// Smallest accepted ceiling.
pub const MIN_CEILING: usize = 256;

/// Default ceiling, matching a 500k syslog message limit.
pub const DEFAULT_CEILING: usize = 512_000;

/// When a group carries sequence markers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sequencing {
    /// Marker on every record, even when the group fits in one.
    Always,
    /// Marker only when the group needs two or more records.
    WhenSplit,
}

/// Packs token sequences into records under a byte ceiling.
#[derive(Debug, Clone, Copy)]
pub struct Assembler {
    ceiling: usize,
}

impl Assembler {
    pub fn new(ceiling: usize) -> Result<Self> {
        if ceiling < MIN_CEILING {
            return Err(Error::Config(format!(
                "Record ceiling of {} bytes is below the minimum of {}",
                ceiling, MIN_CEILING
            )));
        }
        Ok(Self { ceiling })
    }

    pub fn ceiling(&self) -> usize {
        self.ceiling
    }

    /// Split one attribute group into records.
    pub fn split(&self, field: &str, tokens: TokenSeq, sequencing: Sequencing) -> Vec<Record> {
        let one = Sequence {
            ordinal: 1,
            total: 1,
        };

        match sequencing {
            Sequencing::WhenSplit if tokens.byte_len() <= self.ceiling => {
                return vec![Record::single(field, tokens)];
            }
            Sequencing::Always if tokens.byte_len() + marker_overhead(field, one) <= self.ceiling => {
                return vec![Record::sequenced(field, one, tokens)];
            }
            _ => {}
        }

        // A record holds at least one piece and a token splits into at most
        // one piece per listing entry.
        let bound = tokens.iter().map(entry_count).sum::<usize>().max(1);
        let reserve = marker_overhead(
            field,
            Sequence {
                ordinal: bound,
                total: bound,
            },
        );
        let budget = self.ceiling.saturating_sub(reserve);

        let chunks = pack(tokens, budget);
        let total = chunks.len();
        debug!("Split {} into {} records (budget {} bytes)", field, total, budget);

        if total == 1 && sequencing == Sequencing::WhenSplit {
            return chunks
                .into_iter()
                .map(|chunk| Record::single(field, chunk))
                .collect();
        }

        chunks
            .into_iter()
            .enumerate()
            .map(|(i, chunk)| {
                Record::sequenced(
                    field,
                    Sequence {
                        ordinal: i + 1,
                        total,
                    },
                    chunk,
                )
            })
            .collect()
    }
}

fn pack(tokens: TokenSeq, budget: usize) -> Vec<TokenSeq> {
    let mut chunks = Vec::new();
    let mut current = TokenSeq::new();
    let mut current_len = 0usize;

    for token in tokens.into_iter().flat_map(|t| split_token(t, budget)) {
        let gap = if current.is_empty() { 0 } else { SEPARATOR.len() };

        if !current.is_empty() && current_len + gap + token.byte_len() > budget {
            chunks.push(std::mem::take(&mut current));
            current_len = 0;
        }

        current_len += if current.is_empty() { 0 } else { SEPARATOR.len() };
        current_len += token.byte_len();
        current.push(token);
    }

    if !current.is_empty() || chunks.is_empty() {
        chunks.push(current);
    }
    chunks
}

fn entry_count(token: &Token) -> usize {
    token.value().matches(SEPARATOR).count() + 1
}

/// Break an oversized listing token into same-key pieces of at most
/// `budget` bytes. Joining the piece values with `; ` gives back the
/// original value. An entry too large on its own is truncated.
pub fn split_token(token: Token, budget: usize) -> Vec<Token> {
    // key + "='" + value + "'"
    let overhead = token.key().len() + 3;
    if token.byte_len() <= budget || !token.value().contains(SEPARATOR) || overhead >= budget {
        return vec![truncate_token(token, budget)];
    }

    let room = budget - overhead;
    let mut pieces = Vec::new();
    let mut current: Option<String> = None;

    for entry in token.value().split(SEPARATOR) {
        if entry.len() > room {
            if let Some(open) = current.take() {
                pieces.push(Token::new(token.key(), open));
            }
            pieces.push(truncate_token(Token::new(token.key(), entry), budget));
            continue;
        }
        current = match current.take() {
            Some(mut open) if open.len() + SEPARATOR.len() + entry.len() <= room => {
                open.push_str(SEPARATOR);
                open.push_str(entry);
                Some(open)
            }
            Some(open) => {
                pieces.push(Token::new(token.key(), open));
                Some(entry.to_string())
            }
            None => Some(entry.to_string()),
        };
    }
    if let Some(open) = current {
        pieces.push(Token::new(token.key(), open));
    }

    debug!(
        "Split {} ({} bytes) into {} pieces",
        token.key(),
        token.byte_len(),
        pieces.len()
    );
    pieces
}

/// Cut a token down to `budget` bytes, marking the value as truncated.
pub fn truncate_token(token: Token, budget: usize) -> Token {
    if token.byte_len() <= budget {
        return token;
    }

    // key + "='" + value + "'"
    let room = budget.saturating_sub(3 + TRUNCATION_MARKER.len());
    let key = if token.key().len() > room / 2 {
        &token.key()[..floor_boundary(token.key(), room / 2)]
    } else {
        token.key()
    };

    let value_room = room.saturating_sub(key.len());
    let value = &token.value()[..floor_boundary(token.value(), value_room)];

    warn!(
        "Truncating {} ({} bytes) to fit {} bytes",
        token.key(),
        token.byte_len(),
        budget
    );
    Token::new(key, format!("{}{}", value, TRUNCATION_MARKER))
}

fn floor_boundary(s: &str, max: usize) -> usize {
    let mut i = max.min(s.len());
    while !s.is_char_boundary(i) {
        i -= 1;
    }
    i
}
