//! Local host identity.

use tracing::debug;

/// Name used when the host name cannot be read.
pub const UNKNOWN_HOST: &str = "unknown-host";

/// Name of this host, for diagnostics and failure notices.
pub fn local_hostname() -> String {
    match hostname::get() {
        Ok(name) => {
            let name = name.to_string_lossy().trim().to_string();
            if name.is_empty() {
                debug!("Empty host name");
                UNKNOWN_HOST.to_string()
            } else {
                name
            }
        }
        Err(e) => {
            debug!("Cannot read host name: {}", e);
            UNKNOWN_HOST.to_string()
        }
    }
}
