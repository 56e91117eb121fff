//! Command and file executors.
//!
//! Probes never touch the host directly; every command run, file read and
//! directory listing goes through an [`Executor`] so tests can substitute
//! canned output.

use async_trait::async_trait;
use hostinfo_common::{Error, Result};
use nix::sys::socket::SockaddrStorage;
use std::io::ErrorKind;
use std::net::IpAddr;
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::debug;

/// Default per-command timeout.
pub const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(60);

/// Captured result of one command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }
}

/// One entry of the interface address list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterfaceAddress {
    pub name: String,
    /// Unset for link-level entries.
    pub ip: Option<IpAddr>,
    pub prefix: Option<u8>,
}

impl InterfaceAddress {
    pub fn new(name: &str, ip: Option<IpAddr>, prefix: Option<u8>) -> Self {
        Self {
            name: name.to_string(),
            ip,
            prefix,
        }
    }

    /// `inet` or `inet6`.
    pub fn family(&self) -> Option<&'static str> {
        match self.ip? {
            IpAddr::V4(_) => Some("inet"),
            IpAddr::V6(_) => Some("inet6"),
        }
    }

    /// Address in `ip/prefix` form.
    pub fn cidr(&self) -> Option<String> {
        let ip = self.ip?;
        Some(match self.prefix {
            Some(prefix) => format!("{}/{}", ip, prefix),
            None => ip.to_string(),
        })
    }
}

/// Trait for host access.
///
/// `run` returns `Err(Error::SourceUnavailable)` when the program cannot be
/// found and `Err(Error::CommandTimeout)` when it runs too long. A program
/// that runs and exits non-zero is `Ok`. File operations report a missing
/// path as `Error::SourceUnavailable`.
#[async_trait]
pub trait Executor: Send + Sync {
    /// Run `argv[0]` with the remaining arguments.
    async fn run(&self, argv: &[String]) -> Result<CommandOutput>;

    /// Read a whole file as text.
    async fn read_file(&self, path: &Path) -> Result<String>;

    /// Entry names of a directory, sorted.
    async fn list_dir(&self, path: &Path) -> Result<Vec<String>>;

    /// Names of the directories and symlinks in a directory, sorted.
    async fn list_subdirs(&self, path: &Path) -> Result<Vec<String>>;

    /// Interface addresses as getifaddrs(3) reports them, in kernel order.
    async fn interfaces(&self) -> Result<Vec<InterfaceAddress>>;
}

/// Executor for the local host.
pub struct LocalExecutor {
    timeout: Duration,
}

impl LocalExecutor {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

impl Default for LocalExecutor {
    fn default() -> Self {
        Self::new(DEFAULT_COMMAND_TIMEOUT)
    }
}

fn unavailable(source_name: impl Into<String>, e: &std::io::Error) -> Error {
    Error::SourceUnavailable {
        source_name: source_name.into(),
        reason: e.to_string(),
    }
}

fn io_error(path: &Path, e: std::io::Error) -> Error {
    if e.kind() == ErrorKind::NotFound {
        unavailable(path.display().to_string(), &e)
    } else {
        Error::Io(e)
    }
}

fn ip_and_prefix(
    address: Option<&SockaddrStorage>,
    netmask: Option<&SockaddrStorage>,
) -> (Option<IpAddr>, Option<u8>) {
    let Some(address) = address else {
        return (None, None);
    };
    if let Some(v4) = address.as_sockaddr_in() {
        let prefix = netmask
            .and_then(|m| m.as_sockaddr_in())
            .map(|m| u32::from(m.ip()).count_ones() as u8);
        return (Some(IpAddr::V4(v4.ip())), prefix);
    }
    if let Some(v6) = address.as_sockaddr_in6() {
        let prefix = netmask
            .and_then(|m| m.as_sockaddr_in6())
            .map(|m| u128::from(m.ip()).count_ones() as u8);
        return (Some(IpAddr::V6(v6.ip())), prefix);
    }
    (None, None)
}

#[async_trait]
impl Executor for LocalExecutor {
    async fn run(&self, argv: &[String]) -> Result<CommandOutput> {
        let (program, args) = argv.split_first().ok_or_else(|| Error::CommandExecution {
            cmd: String::new(),
            reason: "empty command".to_string(),
        })?;
        let cmd = argv.join(" ");
        debug!("Local exec: {}", cmd);

        let child = Command::new(program)
            .args(args)
            .env("LC_ALL", "C")
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| match e.kind() {
                ErrorKind::NotFound => unavailable(program.clone(), &e),
                _ => Error::CommandExecution {
                    cmd: cmd.clone(),
                    reason: e.to_string(),
                },
            })?;

        let output = tokio::time::timeout(self.timeout, child.wait_with_output())
            .await
            .map_err(|_| Error::CommandTimeout { cmd: cmd.clone() })?
            .map_err(|e| Error::CommandExecution {
                cmd: cmd.clone(),
                reason: e.to_string(),
            })?;

        let result = CommandOutput {
            exit_code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        };
        debug!(
            "{} exited with {:?} ({} bytes)",
            cmd,
            result.exit_code,
            result.stdout.len()
        );
        Ok(result)
    }

    async fn read_file(&self, path: &Path) -> Result<String> {
        debug!("Reading {:?}", path);
        let bytes = tokio::fs::read(path).await.map_err(|e| io_error(path, e))?;
        Ok(String::from_utf8_lossy(&bytes).to_string())
    }

    async fn list_dir(&self, path: &Path) -> Result<Vec<String>> {
        debug!("Listing {:?}", path);
        let mut entries = tokio::fs::read_dir(path)
            .await
            .map_err(|e| io_error(path, e))?;

        let mut names = Vec::new();
        while let Some(entry) = entries.next_entry().await.map_err(|e| io_error(path, e))? {
            names.push(entry.file_name().to_string_lossy().to_string());
        }
        names.sort();
        Ok(names)
    }

    async fn list_subdirs(&self, path: &Path) -> Result<Vec<String>> {
        debug!("Listing subdirectories of {:?}", path);
        let mut entries = tokio::fs::read_dir(path)
            .await
            .map_err(|e| io_error(path, e))?;

        let mut names = Vec::new();
        while let Some(entry) = entries.next_entry().await.map_err(|e| io_error(path, e))? {
            let kind = entry.file_type().await.map_err(|e| io_error(path, e))?;
            if kind.is_dir() || kind.is_symlink() {
                names.push(entry.file_name().to_string_lossy().to_string());
            } else {
                debug!("Skipping {:?}", entry.file_name());
            }
        }
        names.sort();
        Ok(names)
    }

    async fn interfaces(&self) -> Result<Vec<InterfaceAddress>> {
        debug!("Enumerating interfaces");
        let addrs = nix::ifaddrs::getifaddrs().map_err(|e| Error::SourceUnavailable {
            source_name: "getifaddrs".to_string(),
            reason: e.to_string(),
        })?;

        Ok(addrs
            .map(|ifa| {
                let (ip, prefix) = ip_and_prefix(ifa.address.as_ref(), ifa.netmask.as_ref());
                InterfaceAddress {
                    name: ifa.interface_name,
                    ip,
                    prefix,
                }
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn argv(parts: &[&str]) -> Vec<String> {
        parts.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn test_missing_program_is_unavailable() {
        let executor = LocalExecutor::default();
        let err = executor
            .run(&argv(&["hostinfo-no-such-program-xyz"]))
            .await
            .unwrap_err();
        assert!(err.is_unavailable());
    }

    #[tokio::test]
    async fn test_runs_with_c_locale() {
        let executor = LocalExecutor::default();
        let output = executor
            .run(&argv(&["sh", "-c", "echo $LC_ALL; exit 3"]))
            .await
            .unwrap();
        assert_eq!(output.stdout.trim(), "C");
        assert_eq!(output.exit_code, Some(3));
        assert!(!output.success());
    }

    #[tokio::test]
    async fn test_timeout() {
        let executor = LocalExecutor::new(Duration::from_millis(100));
        let err = executor.run(&argv(&["sleep", "5"])).await.unwrap_err();
        assert!(matches!(err, Error::CommandTimeout { .. }));
    }

    #[tokio::test]
    async fn test_files_and_dirs() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("b"), "second").unwrap();
        std::fs::write(dir.path().join("a"), "first").unwrap();

        let executor = LocalExecutor::default();
        assert_eq!(
            executor.list_dir(dir.path()).await.unwrap(),
            vec!["a".to_string(), "b".to_string()]
        );
        assert_eq!(
            executor.read_file(&dir.path().join("a")).await.unwrap(),
            "first"
        );
        assert!(executor
            .read_file(&dir.path().join("missing"))
            .await
            .unwrap_err()
            .is_unavailable());
    }

    #[tokio::test]
    async fn test_subdirs_skip_plain_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("eth0")).unwrap();
        std::os::unix::fs::symlink(dir.path().join("eth0"), dir.path().join("lo")).unwrap();
        std::fs::write(dir.path().join("bonding_masters"), "bond0\n").unwrap();

        let executor = LocalExecutor::default();
        assert_eq!(
            executor.list_subdirs(dir.path()).await.unwrap(),
            vec!["eth0".to_string(), "lo".to_string()]
        );
        assert!(executor
            .list_subdirs(&dir.path().join("missing"))
            .await
            .unwrap_err()
            .is_unavailable());
    }

    #[tokio::test]
    async fn test_interfaces_include_loopback() {
        let addresses = LocalExecutor::default().interfaces().await.unwrap();
        assert!(addresses.iter().any(|a| a.name == "lo"));
        for address in addresses.iter().filter(|a| a.ip.is_some()) {
            assert!(address.family().is_some());
            assert!(address.cidr().is_some());
        }
    }

    #[test]
    fn test_interface_address_rendering() {
        let v4 = InterfaceAddress::new("eth0", Some("10.0.0.5".parse().unwrap()), Some(24));
        assert_eq!(v4.family(), Some("inet"));
        assert_eq!(v4.cidr().as_deref(), Some("10.0.0.5/24"));

        let v6 = InterfaceAddress::new("eth0", Some("fe80::1".parse().unwrap()), None);
        assert_eq!(v6.family(), Some("inet6"));
        assert_eq!(v6.cidr().as_deref(), Some("fe80::1"));

        let link = InterfaceAddress::new("eth0", None, None);
        assert_eq!(link.family(), None);
        assert_eq!(link.cidr(), None);
    }
}
