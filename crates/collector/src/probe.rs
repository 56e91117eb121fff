//! Probe definitions: strategies, steps and their raw results.

use crate::executor::{Executor, InterfaceAddress};
use crate::policy::Assessment;
use hostinfo_canon::{RuleSet, Sequencing};
use hostinfo_common::Error;
use hostinfo_schema::{AttemptLog, Outcome, Token, TokenSeq};
use std::path::PathBuf;
use tracing::debug;

/// Where a step gets its text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Source {
    /// Program and arguments, run without a shell.
    Command(Vec<String>),
    /// Pipeline run through `sh -c`.
    Shell(String),
    File(PathBuf),
    /// Sorted names of the subdirectories and symlinks, one per line.
    Dir(PathBuf),
    /// Interface names from getifaddrs(3), first-seen order, one per line.
    InterfaceNames,
    /// `name family address/prefix` lines from getifaddrs(3).
    InterfaceAddresses,
    /// Every drop-in file in `dir` (sorted), then `main`, concatenated.
    DropIns { dir: PathBuf, main: PathBuf },
}

impl Source {
    pub fn command(argv: &[&str]) -> Self {
        Source::Command(argv.iter().map(|s| s.to_string()).collect())
    }

    pub fn shell(script: &str) -> Self {
        Source::Shell(script.to_string())
    }

    pub fn file(path: impl Into<PathBuf>) -> Self {
        Source::File(path.into())
    }

    pub fn dir(path: impl Into<PathBuf>) -> Self {
        Source::Dir(path.into())
    }

    pub fn drop_ins(dir: impl Into<PathBuf>, main: impl Into<PathBuf>) -> Self {
        Source::DropIns {
            dir: dir.into(),
            main: main.into(),
        }
    }

    /// Human-readable form used in labels and diagnostics.
    pub fn describe(&self) -> String {
        match self {
            Source::Command(argv) => argv.join(" "),
            Source::Shell(script) => script.clone(),
            Source::File(path) | Source::Dir(path) => path.display().to_string(),
            Source::DropIns { dir, main } => format!("{} + {}", dir.display(), main.display()),
            Source::InterfaceNames => "getifaddrs".to_string(),
            Source::InterfaceAddresses => "getifaddrs addresses".to_string(),
        }
    }
}

/// Success predicate for a step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Accept {
    /// Exit status zero; for files and directories, readable.
    ExitZero,
    /// As `ExitZero`, and the output is not blank.
    NonEmpty,
    /// Output is not blank, whatever the exit status.
    AnyOutput,
}

/// One source plus how to judge and label its output.
#[derive(Debug, Clone)]
pub struct Step {
    pub source: Source,
    pub accept: Accept,
    /// A failing optional step never fails its strategy.
    pub optional: bool,
    /// Output becomes a single `tag='value'` token.
    pub tag: Option<String>,
    /// Used in place of a failed optional step's output.
    pub default: Option<String>,
}

impl Step {
    pub fn new(source: Source, accept: Accept) -> Self {
        Self {
            source,
            accept,
            optional: false,
            tag: None,
            default: None,
        }
    }

    pub fn tagged(mut self, tag: &str) -> Self {
        self.tag = Some(tag.to_string());
        self
    }

    pub fn optional(mut self, default: Option<&str>) -> Self {
        self.optional = true;
        self.default = default.map(str::to_string);
        self
    }

    /// Run the step and judge its output.
    pub async fn execute(&self, executor: &dyn Executor) -> StepResult {
        match &self.source {
            Source::Command(argv) => self.judge_command(executor, argv).await,
            Source::Shell(script) => {
                let argv = vec!["sh".to_string(), "-c".to_string(), script.clone()];
                self.judge_command(executor, &argv).await
            }
            Source::File(path) => self.judge_text(executor.read_file(path).await),
            Source::Dir(path) => {
                self.judge_text(executor.list_subdirs(path).await.map(|names| names.join("\n")))
            }
            Source::InterfaceNames => {
                self.judge_text(executor.interfaces().await.map(|a| interface_names(&a)))
            }
            Source::InterfaceAddresses => {
                self.judge_text(executor.interfaces().await.map(|a| address_lines(&a)))
            }
            Source::DropIns { dir, main } => {
                self.judge_text(read_drop_ins(executor, dir, main).await)
            }
        }
    }

    async fn judge_command(&self, executor: &dyn Executor, argv: &[String]) -> StepResult {
        let output = match executor.run(argv).await {
            Ok(output) => output,
            Err(e) => return StepResult::from_error(&e, None),
        };

        let blank = output.stdout.trim().is_empty();
        let accepted = match self.accept {
            Accept::ExitZero => output.success(),
            Accept::NonEmpty => output.success() && !blank,
            Accept::AnyOutput => !blank,
        };

        if accepted {
            return StepResult::ok(output.stdout, output.exit_code);
        }

        // Shells report a missing program as 127.
        let (outcome, reason) = if output.exit_code == Some(127) {
            (Outcome::SourceUnavailable, "command not found".to_string())
        } else if output.success() {
            (Outcome::SourceUnavailable, "no output".to_string())
        } else {
            let stderr = output.stderr.trim();
            let reason = match (output.exit_code, stderr.is_empty()) {
                (Some(code), true) => format!("exit status {}", code),
                (Some(code), false) => format!("exit status {}: {}", code, stderr),
                (None, _) => "terminated by signal".to_string(),
            };
            (Outcome::ExecutionError, reason)
        };

        StepResult {
            outcome,
            text: output.stdout,
            exit_code: output.exit_code,
            error: Some(reason),
        }
    }

    fn judge_text(&self, read: hostinfo_common::Result<String>) -> StepResult {
        match read {
            Ok(text) => {
                let needs_content = matches!(self.accept, Accept::NonEmpty | Accept::AnyOutput);
                if needs_content && text.trim().is_empty() {
                    StepResult {
                        outcome: Outcome::SourceUnavailable,
                        text,
                        exit_code: None,
                        error: Some("empty".to_string()),
                    }
                } else {
                    StepResult::ok(text, None)
                }
            }
            Err(e) => StepResult::from_error(&e, None),
        }
    }
}

fn interface_names(addresses: &[InterfaceAddress]) -> String {
    let mut names: Vec<&str> = Vec::new();
    for address in addresses {
        if !names.contains(&address.name.as_str()) {
            names.push(&address.name);
        }
    }
    names.join("\n")
}

fn address_lines(addresses: &[InterfaceAddress]) -> String {
    addresses
        .iter()
        .filter_map(|a| Some(format!("{} {} {}", a.name, a.family()?, a.cidr()?)))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Concatenate drop-in files, sorted, followed by the main file.
///
/// Entries that are hidden, end in `~` or contain a `.` are skipped, the
/// same as sudo's `#includedir`.
async fn read_drop_ins(
    executor: &dyn Executor,
    dir: &std::path::Path,
    main: &std::path::Path,
) -> hostinfo_common::Result<String> {
    let names = executor.list_dir(dir).await?;
    let mut fragments = Vec::with_capacity(names.len() + 1);

    for name in names {
        if name.ends_with('~') || name.contains('.') {
            debug!("Skipping drop-in {}", name);
            continue;
        }
        match executor.read_file(&dir.join(&name)).await {
            Ok(text) => fragments.push(text),
            Err(e) => debug!("Cannot read drop-in {}: {}", name, e),
        }
    }

    fragments.push(executor.read_file(main).await?);
    Ok(fragments.join("\n"))
}

/// Judged output of one step.
#[derive(Debug, Clone)]
pub struct StepResult {
    pub outcome: Outcome,
    pub text: String,
    pub exit_code: Option<i32>,
    pub error: Option<String>,
}

impl StepResult {
    fn ok(text: String, exit_code: Option<i32>) -> Self {
        Self {
            outcome: Outcome::Success,
            text,
            exit_code,
            error: None,
        }
    }

    fn from_error(e: &Error, exit_code: Option<i32>) -> Self {
        let (outcome, reason) = match e {
            Error::SourceUnavailable { reason, .. } => (Outcome::SourceUnavailable, reason.clone()),
            Error::Io(io) if e.is_unavailable() => (Outcome::SourceUnavailable, io.to_string()),
            Error::CommandTimeout { .. } => (Outcome::ExecutionError, "timed out".to_string()),
            Error::CommandExecution { reason, .. } => (Outcome::ExecutionError, reason.clone()),
            other => (Outcome::ExecutionError, other.to_string()),
        };
        Self {
            outcome,
            text: String::new(),
            exit_code,
            error: Some(reason),
        }
    }
}

/// One way of collecting an attribute group.
#[derive(Debug, Clone)]
pub struct Strategy {
    /// Names the strategy in attempt logs and sentinels.
    pub label: String,
    pub steps: Vec<Step>,
    pub rules: RuleSet,
}

impl Strategy {
    pub fn new(label: impl Into<String>, rules: RuleSet) -> Self {
        Self {
            label: label.into(),
            steps: Vec::new(),
            rules,
        }
    }

    /// A strategy made of one step, labelled after its source.
    pub fn single(step: Step, rules: RuleSet) -> Self {
        Self::new(step.source.describe(), rules).step(step)
    }

    pub fn step(mut self, step: Step) -> Self {
        self.steps.push(step);
        self
    }

    /// Turn captured parts into tokens, in step order.
    pub fn normalize(&self, parts: &[Part]) -> TokenSeq {
        let mut tokens = TokenSeq::new();
        for part in parts {
            match &part.tag {
                Some(tag) => tokens.push(Token::new(tag, &part.text)),
                None => tokens.extend(self.rules.normalize(&part.text)),
            }
        }
        tokens
    }
}

/// Captured text of one successful step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Part {
    pub tag: Option<String>,
    pub text: String,
}

/// Captured output of a chain run. Never modified after capture.
#[derive(Debug, Clone)]
pub struct RawResult {
    pub outcome: Outcome,
    pub parts: Vec<Part>,
    /// Label of the strategy that produced this result.
    pub strategy: String,
    /// Set when every strategy failed.
    pub diagnostic: Option<String>,
    pub attempts: AttemptLog,
}

/// One named attribute group.
#[derive(Debug, Clone)]
pub struct Probe {
    pub name: String,
    /// Wire field name, e.g. `Installed_Packages`.
    pub field: String,
    pub strategies: Vec<Strategy>,
    pub sequencing: Sequencing,
    pub assessment: Option<Assessment>,
}

impl Probe {
    pub fn new(name: &str, field: &str) -> Self {
        Self {
            name: name.to_string(),
            field: field.to_string(),
            strategies: Vec::new(),
            sequencing: Sequencing::WhenSplit,
            assessment: None,
        }
    }

    pub fn strategy(mut self, strategy: Strategy) -> Self {
        self.strategies.push(strategy);
        self
    }

    pub fn sequencing(mut self, sequencing: Sequencing) -> Self {
        self.sequencing = sequencing;
        self
    }

    pub fn assessment(mut self, assessment: Assessment) -> Self {
        self.assessment = Some(assessment);
        self
    }
}
