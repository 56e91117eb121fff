//! Fallback chain execution.

use crate::executor::Executor;
use crate::probe::{Part, RawResult, Strategy};
use chrono::Utc;
use hostinfo_schema::{Attempt, AttemptLog, Outcome};
use tracing::{debug, warn};

/// Sentinel text for an exhausted chain.
pub fn sentinel(label: &str, reason: &str) -> String {
    format!("Error with \"{}\" command ({})", label, reason)
}

/// Runs strategies strictly in order until one succeeds.
pub struct ChainExecutor<'a> {
    executor: &'a dyn Executor,
}

impl<'a> ChainExecutor<'a> {
    pub fn new(executor: &'a dyn Executor) -> Self {
        Self { executor }
    }

    /// Run the chain, returning the raw result and the index of the strategy
    /// that produced it. Each strategy is tried once.
    pub async fn run(&self, strategies: &[Strategy]) -> (RawResult, Option<usize>) {
        let mut attempts = AttemptLog::new();
        let mut last_label = "none".to_string();
        let mut last_error = "no strategies defined".to_string();

        for (index, strategy) in strategies.iter().enumerate() {
            let started_at = Utc::now();
            let (outcome, parts, exit_code, error) = self.try_strategy(strategy).await;
            let output_bytes = parts.iter().map(|p| p.text.len() as u64).sum();

            attempts.add(Attempt::new(
                index,
                strategy.label.clone(),
                started_at,
                Utc::now(),
                outcome,
                exit_code,
                output_bytes,
                error.clone(),
            ));

            if outcome.is_success() {
                debug!("Strategy {} ({}) succeeded", index, strategy.label);
                return (
                    RawResult {
                        outcome,
                        parts,
                        strategy: strategy.label.clone(),
                        diagnostic: None,
                        attempts,
                    },
                    Some(index),
                );
            }

            debug!(
                "Strategy {} ({}) failed: {} ({})",
                index,
                strategy.label,
                outcome,
                error.as_deref().unwrap_or("")
            );
            last_label = strategy.label.clone();
            last_error = error.unwrap_or_else(|| outcome.to_string());
        }

        let diagnostic = sentinel(&last_label, &last_error);
        warn!("All strategies failed: {}", diagnostic);
        (
            RawResult {
                outcome: Outcome::SourceUnavailable,
                parts: Vec::new(),
                strategy: last_label,
                diagnostic: Some(diagnostic),
                attempts,
            },
            None,
        )
    }

    async fn try_strategy(
        &self,
        strategy: &Strategy,
    ) -> (Outcome, Vec<Part>, Option<i32>, Option<String>) {
        let mut parts = Vec::with_capacity(strategy.steps.len());
        let mut exit_code = None;

        for step in &strategy.steps {
            let result = step.execute(self.executor).await;
            exit_code = result.exit_code.or(exit_code);

            if result.outcome.is_success() {
                parts.push(Part {
                    tag: step.tag.clone(),
                    text: result.text,
                });
                continue;
            }

            if step.optional {
                debug!(
                    "Optional step {} failed: {}",
                    step.source.describe(),
                    result.error.as_deref().unwrap_or("")
                );
                if let Some(default) = &step.default {
                    parts.push(Part {
                        tag: step.tag.clone(),
                        text: default.clone(),
                    });
                }
                continue;
            }

            return (result.outcome, Vec::new(), exit_code, result.error);
        }

        (Outcome::Success, parts, exit_code, None)
    }
}
