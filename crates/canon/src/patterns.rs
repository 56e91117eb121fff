//! Regex patterns shared by the probe rule-sets.

use regex::Regex;
use std::sync::LazyLock;

/// Any run of whitespace.
pub static WHITESPACE_RUN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());

/// First whitespace-separated field of a line.
pub static FIRST_FIELD: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\s*(\S+).*$").unwrap());

/// Comment line in sudoers-style files.
pub static COMMENT_LINE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\s*#").unwrap());

/// `PRETTY_NAME=` prefix in os-release.
pub static OS_PRETTY_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^PRETTY_NAME=").unwrap());

/// Double quotes around os-release values.
pub static DOUBLE_QUOTE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r#"""#).unwrap());

/// Trailing `@repository` column of `yum list installed`.
pub static PACKAGE_REPO_SUFFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+@\S+$").unwrap());

/// Interface name at the start of a `/proc/net/dev` row.
pub static PROC_NET_DEV_ROW: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*([^:\s]+):.*$").unwrap());

/// One `ip -o addr show` row: index, interface, family, address.
pub static IP_ADDR_ROW: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d+:\s+(\S+)\s+(inet6?)\s+(\S+).*$").unwrap());

/// An `inet`/`inet6` line from `ifconfig`, either layout.
pub static IFCONFIG_INET_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*(inet6?)\s+(?:addr:\s*)?(\S+).*$").unwrap());

/// Hardware identity fields kept from dmidecode output.
pub static HARDWARE_FIELD: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^\s*(Vendor|Version|Release Date|BIOS Revision|Firmware Revision|Manufacturer|Product Name|Serial Number|UUID|Asset Tag):",
    )
    .unwrap()
});

/// Everything after the user name of a passwd entry.
pub static PASSWD_USERNAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([^:]*):.*$").unwrap());

/// `Defaults` lines in sudoers, any spacing or casing of the keyword.
pub static SUDOERS_DEFAULTS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^\s*defaults\b").unwrap());

/// `@include`/`#include` directives in sudoers.
pub static SUDOERS_INCLUDE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*[@#]include(dir)?\s").unwrap());

/// Date as printed by `chage -l`, e.g. `Apr 06, 2020`.
pub static CHAGE_DATE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[A-Z][a-z]{2} \d{1,2}, \d{4}").unwrap());

/// Collapse whitespace runs to single spaces and trim.
pub fn collapse_whitespace(line: &str) -> String {
    WHITESPACE_RUN.replace_all(line.trim(), " ").into_owned()
}
