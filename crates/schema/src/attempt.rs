//! Attempt log types for tracking every strategy tried during a probe.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Classified outcome of one strategy attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Success,
    /// The tool or file is absent.
    SourceUnavailable,
    /// The tool is present but failed.
    ExecutionError,
}

impl Outcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Success)
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Success => write!(f, "success"),
            Outcome::SourceUnavailable => write!(f, "source_unavailable"),
            Outcome::ExecutionError => write!(f, "execution_error"),
        }
    }
}

/// A single attempt log entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Attempt {
    /// Sequence number within the probe.
    pub seq: u64,
    /// Index of the strategy in its chain.
    pub strategy_index: usize,
    /// Strategy label, e.g. `netstat -noplv --inet`.
    pub strategy: String,
    pub started_at: DateTime<Utc>,
    pub duration_ms: u64,
    pub outcome: Outcome,
    /// Exit code of the last command run, if any.
    pub exit_code: Option<i32>,
    /// Bytes of raw output captured.
    pub output_bytes: u64,
    /// Why the attempt failed.
    pub error: Option<String>,
}

impl Attempt {
    /// Create a new attempt entry.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        strategy_index: usize,
        strategy: String,
        started_at: DateTime<Utc>,
        completed_at: DateTime<Utc>,
        outcome: Outcome,
        exit_code: Option<i32>,
        output_bytes: u64,
        error: Option<String>,
    ) -> Self {
        let duration_ms = (completed_at - started_at).num_milliseconds().max(0) as u64;

        Self {
            seq: 0,
            strategy_index,
            strategy,
            started_at,
            duration_ms,
            outcome,
            exit_code,
            output_bytes,
            error,
        }
    }
}

/// Ordered attempts made by one probe.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AttemptLog {
    entries: Vec<Attempt>,
    next_seq: u64,
}

impl AttemptLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an entry, assigning its sequence number.
    pub fn add(&mut self, mut entry: Attempt) {
        entry.seq = self.next_seq;
        self.next_seq += 1;
        self.entries.push(entry);
    }

    pub fn entries(&self) -> &[Attempt] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
