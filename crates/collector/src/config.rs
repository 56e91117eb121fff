//! Run configuration.

use hostinfo_canon::{DEFAULT_CEILING, MIN_CEILING};
use hostinfo_common::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use syslog::Facility;

use crate::emitter::header_len;
use crate::policy::ROOT_PASSWORD_MAX_AGE_DAYS;

/// Collector configuration, loadable from YAML.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HostinfoConfig {
    /// Largest syslog message, framing included, in bytes.
    #[serde(default = "default_max_record_bytes")]
    pub max_record_bytes: usize,
    /// Probes allowed to run at once.
    #[serde(default = "default_max_concurrent_probes")]
    pub max_concurrent_probes: usize,
    #[serde(default = "default_command_timeout_secs")]
    pub command_timeout_secs: u64,
    #[serde(default = "default_root_password_max_age_days")]
    pub root_password_max_age_days: i64,
    #[serde(default)]
    pub syslog: SyslogConfig,
    #[serde(default)]
    pub paths: SourcePaths,
}

/// Where records go.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyslogConfig {
    /// Facility name, e.g. `authpriv` or `local3`.
    #[serde(default = "default_facility")]
    pub facility: String,
    /// Process name in the syslog header.
    #[serde(default = "default_process")]
    pub process: String,
}

/// File inputs, overridable for non-standard hosts and tests.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SourcePaths {
    pub os_release: PathBuf,
    pub redhat_release: PathBuf,
    pub passwd: PathBuf,
    pub sudoers: PathBuf,
    pub sudoers_dir: PathBuf,
    pub dmidump: PathBuf,
    pub sys_class_net: PathBuf,
    pub proc_net_dev: PathBuf,
}

fn default_max_record_bytes() -> usize {
    DEFAULT_CEILING
}
fn default_max_concurrent_probes() -> usize {
    1
}
fn default_command_timeout_secs() -> u64 {
    60
}
fn default_root_password_max_age_days() -> i64 {
    ROOT_PASSWORD_MAX_AGE_DAYS
}
fn default_facility() -> String {
    "authpriv".to_string()
}
fn default_process() -> String {
    "hostinfo".to_string()
}

impl Default for HostinfoConfig {
    fn default() -> Self {
        Self {
            max_record_bytes: default_max_record_bytes(),
            max_concurrent_probes: default_max_concurrent_probes(),
            command_timeout_secs: default_command_timeout_secs(),
            root_password_max_age_days: default_root_password_max_age_days(),
            syslog: SyslogConfig::default(),
            paths: SourcePaths::default(),
        }
    }
}

impl Default for SyslogConfig {
    fn default() -> Self {
        Self {
            facility: default_facility(),
            process: default_process(),
        }
    }
}

impl Default for SourcePaths {
    fn default() -> Self {
        Self {
            os_release: "/etc/os-release".into(),
            redhat_release: "/etc/redhat-release".into(),
            passwd: "/etc/passwd".into(),
            sudoers: "/etc/sudoers".into(),
            sudoers_dir: "/etc/sudoers.d".into(),
            dmidump: "/etc/dmidump".into(),
            sys_class_net: "/sys/class/net".into(),
            proc_net_dev: "/proc/net/dev".into(),
        }
    }
}

impl HostinfoConfig {
    /// Load from a YAML file. Missing keys take their defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("Cannot read {}: {}", path.display(), e)))?;
        let config: HostinfoConfig = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Reject settings the run cannot honour.
    pub fn validate(&self) -> Result<()> {
        let minimum = MIN_CEILING + header_len(&self.syslog.process);
        if self.max_record_bytes < minimum {
            return Err(Error::Config(format!(
                "max_record_bytes must be at least {}, got {}",
                minimum, self.max_record_bytes
            )));
        }
        if self.max_concurrent_probes == 0 {
            return Err(Error::Config(
                "max_concurrent_probes must be at least 1".to_string(),
            ));
        }
        if self.command_timeout_secs == 0 {
            return Err(Error::Config(
                "command_timeout_secs must be at least 1".to_string(),
            ));
        }
        if self.root_password_max_age_days < 0 {
            return Err(Error::Config(
                "root_password_max_age_days cannot be negative".to_string(),
            ));
        }
        self.facility()?;
        Ok(())
    }

    /// Room left for the record itself once syslog framing is taken out.
    pub fn record_ceiling(&self) -> usize {
        self.max_record_bytes
            .saturating_sub(header_len(&self.syslog.process))
    }

    pub fn command_timeout(&self) -> Duration {
        Duration::from_secs(self.command_timeout_secs)
    }

    /// Configured syslog facility.
    pub fn facility(&self) -> Result<Facility> {
        parse_facility(&self.syslog.facility)
    }
}

/// Facility by name, with or without a `log_` prefix.
pub fn parse_facility(name: &str) -> Result<Facility> {
    let lower = name.trim().to_lowercase();
    let facility = match lower.strip_prefix("log_").unwrap_or(&lower) {
        "kern" => Facility::LOG_KERN,
        "user" => Facility::LOG_USER,
        "mail" => Facility::LOG_MAIL,
        "daemon" => Facility::LOG_DAEMON,
        "auth" => Facility::LOG_AUTH,
        "syslog" => Facility::LOG_SYSLOG,
        "lpr" => Facility::LOG_LPR,
        "news" => Facility::LOG_NEWS,
        "uucp" => Facility::LOG_UUCP,
        "cron" => Facility::LOG_CRON,
        "authpriv" => Facility::LOG_AUTHPRIV,
        "ftp" => Facility::LOG_FTP,
        "local0" => Facility::LOG_LOCAL0,
        "local1" => Facility::LOG_LOCAL1,
        "local2" => Facility::LOG_LOCAL2,
        "local3" => Facility::LOG_LOCAL3,
        "local4" => Facility::LOG_LOCAL4,
        "local5" => Facility::LOG_LOCAL5,
        "local6" => Facility::LOG_LOCAL6,
        "local7" => Facility::LOG_LOCAL7,
        other => {
            return Err(Error::Config(format!("Unknown syslog facility: {}", other)));
        }
    };
    Ok(facility)
}
