//! In-memory executor with canned command output and files.

use crate::emitter::{Envelope, Sink};
use crate::executor::{CommandOutput, Executor, InterfaceAddress};
use async_trait::async_trait;
use hostinfo_common::{Error, Result};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Executor that answers from a script and records what was asked.
#[derive(Default)]
pub struct ScriptedExecutor {
    commands: HashMap<String, CommandOutput>,
    timeouts: BTreeSet<String>,
    files: BTreeMap<PathBuf, String>,
    dirs: BTreeMap<PathBuf, Vec<String>>,
    interfaces: Option<Vec<InterfaceAddress>>,
    calls: Mutex<Vec<String>>,
}

impl ScriptedExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Canned result for an argv joined with spaces.
    pub fn command(mut self, cmd: &str, exit_code: i32, stdout: &str, stderr: &str) -> Self {
        self.commands.insert(
            cmd.to_string(),
            CommandOutput {
                exit_code: Some(exit_code),
                stdout: stdout.to_string(),
                stderr: stderr.to_string(),
            },
        );
        self
    }

    /// Canned result for a `sh -c` pipeline.
    pub fn shell(self, script: &str, exit_code: i32, stdout: &str) -> Self {
        self.command(&format!("sh -c {}", script), exit_code, stdout, "")
    }

    pub fn timeout(mut self, cmd: &str) -> Self {
        self.timeouts.insert(cmd.to_string());
        self
    }

    pub fn file(mut self, path: &str, content: &str) -> Self {
        self.files.insert(PathBuf::from(path), content.to_string());
        self
    }

    pub fn dir(mut self, path: &str, entries: &[&str]) -> Self {
        self.dirs.insert(
            PathBuf::from(path),
            entries.iter().map(|e| e.to_string()).collect(),
        );
        self
    }

    pub fn interfaces(mut self, addresses: Vec<InterfaceAddress>) -> Self {
        self.interfaces = Some(addresses);
        self
    }

    /// Every command, read and listing requested so far, in order.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    fn record(&self, call: String) {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(call);
        }
    }
}

fn missing(source_name: String) -> Error {
    Error::SourceUnavailable {
        source_name,
        reason: "No such file or directory (os error 2)".to_string(),
    }
}

#[async_trait]
impl Executor for ScriptedExecutor {
    async fn run(&self, argv: &[String]) -> Result<CommandOutput> {
        let cmd = argv.join(" ");
        self.record(cmd.clone());

        if self.timeouts.contains(&cmd) {
            return Err(Error::CommandTimeout { cmd });
        }
        self.commands
            .get(&cmd)
            .cloned()
            .ok_or_else(|| missing(argv.first().cloned().unwrap_or_default()))
    }

    async fn read_file(&self, path: &Path) -> Result<String> {
        self.record(format!("read {}", path.display()));
        self.files
            .get(path)
            .cloned()
            .ok_or_else(|| missing(path.display().to_string()))
    }

    async fn list_dir(&self, path: &Path) -> Result<Vec<String>> {
        self.record(format!("list {}", path.display()));
        if let Some(entries) = self.dirs.get(path) {
            let mut entries = entries.clone();
            entries.sort();
            return Ok(entries);
        }

        let names: Vec<String> = self
            .files
            .keys()
            .filter(|p| p.parent() == Some(path))
            .filter_map(|p| p.file_name())
            .map(|n| n.to_string_lossy().to_string())
            .collect();

        if names.is_empty() {
            Err(missing(path.display().to_string()))
        } else {
            Ok(names)
        }
    }

    /// Only directories registered with [`ScriptedExecutor::dir`] have
    /// subdirectories.
    async fn list_subdirs(&self, path: &Path) -> Result<Vec<String>> {
        self.record(format!("subdirs {}", path.display()));
        let mut entries = self
            .dirs
            .get(path)
            .cloned()
            .ok_or_else(|| missing(path.display().to_string()))?;
        entries.sort();
        Ok(entries)
    }

    async fn interfaces(&self) -> Result<Vec<InterfaceAddress>> {
        self.record("getifaddrs".to_string());
        self.interfaces
            .clone()
            .ok_or_else(|| missing("getifaddrs".to_string()))
    }
}

/// Sink that keeps lines in memory, optionally failing after a number of
/// records.
#[derive(Debug, Default)]
pub struct MemorySink {
    pub lines: Vec<String>,
    pub notices: Vec<String>,
    fail_after: Option<usize>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Accept `n` records, then fail every emit.
    pub fn failing_after(n: usize) -> Self {
        Self {
            fail_after: Some(n),
            ..Self::default()
        }
    }
}

impl Sink for MemorySink {
    fn emit(&mut self, envelope: &Envelope<'_>) -> Result<()> {
        if self.fail_after.is_some_and(|n| self.lines.len() >= n) {
            return Err(Error::Emission("sink unavailable".to_string()));
        }
        self.lines.push(envelope.line.clone());
        Ok(())
    }

    fn notify_failure(&mut self, notice: &str) -> Result<()> {
        self.notices.push(notice.to_string());
        Ok(())
    }
}

mod tests {
    use super::*;

    fn envelope(line: &str) -> Envelope<'static> {
        Envelope {
            probe: "selinux",
            field: "SELinuxstatus",
            sequence: None,
            line: line.to_string(),
            attempts: &[],
        }
    }

    #[test]
    fn test_memory_sink_failure() {
        let mut sink = MemorySink::failing_after(1);
        assert!(sink.emit(&envelope("a='1'")).is_ok());
        assert!(matches!(sink.emit(&envelope("b='2'")), Err(Error::Emission(_))));
        assert_eq!(sink.lines, vec!["a='1'"]);
    }
}
