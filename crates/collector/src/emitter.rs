//! Record sinks.
//!
//! Records go to syslog, one warning-level event each. Diagnostics never go
//! through a sink; they are `tracing` output on stderr.

use hostinfo_common::{local_hostname, Error, Result};
use hostinfo_schema::{Attempt, Sequence};
use serde::Serialize;
use std::io::Write;
use std::str::FromStr;
use syslog::{Facility, Formatter3164, Logger, LoggerBackend};
use tracing::{debug, error};

/// One record on its way out, with the context a dry run reports.
#[derive(Debug, Serialize)]
pub struct Envelope<'a> {
    pub probe: &'a str,
    pub field: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sequence: Option<Sequence>,
    pub line: String,
    pub attempts: &'a [Attempt],
}

/// Destination for rendered records.
pub trait Sink: Send {
    /// Deliver one record.
    fn emit(&mut self, envelope: &Envelope<'_>) -> Result<()>;

    /// Best-effort notice that the run failed to deliver a record.
    fn notify_failure(&mut self, notice: &str) -> Result<()>;
}

/// Syslog over the local Unix socket, RFC 3164 framing.
pub struct SyslogSink {
    logger: Logger<LoggerBackend, Formatter3164>,
    process: String,
}

fn formatter(facility: Facility, process: &str) -> Formatter3164 {
    Formatter3164 {
        facility,
        hostname: None,
        process: process.to_string(),
        pid: std::process::id(),
    }
}

/// Bytes of RFC 3164 framing in front of each record: `<PRI>`, the
/// timestamp, and `process[pid]: ` with the widest pid.
pub fn header_len(process: &str) -> usize {
    "<191>".len() + "Oct 19 12:00:00 ".len() + process.len() + "[4294967295]".len() + ": ".len()
}

/// Notice sent when a record could not be emitted.
pub fn failure_notice(host: &str) -> String {
    format!(
        "At least one log message failed on {} while running hostinfo",
        host
    )
}

/// Send `notice` over a fresh connection with the `user` facility.
pub fn send_notice(process: &str, notice: &str) -> Result<()> {
    let mut logger = syslog::unix(formatter(Facility::LOG_USER, process))
        .map_err(|e| Error::Emission(e.to_string()))?;
    logger
        .warning(notice)
        .map_err(|e| Error::Emission(e.to_string()))
}

/// Open a sink with `connect`. When that fails, `notify` gets one failure
/// notice naming this host and the connect error is returned.
pub fn open_or_notify<S, C, N>(connect: C, notify: N) -> Result<S>
where
    C: FnOnce() -> Result<S>,
    N: FnOnce(&str) -> Result<()>,
{
    connect().map_err(|e| {
        error!("Cannot open record sink: {}", e);
        if let Err(notice_err) = notify(&failure_notice(&local_hostname())) {
            error!("Failure notice not delivered: {}", notice_err);
        }
        e
    })
}

impl SyslogSink {
    pub fn connect(facility: Facility, process: &str) -> Result<Self> {
        let logger = syslog::unix(formatter(facility, process))
            .map_err(|e| Error::Emission(format!("Cannot connect to syslog: {}", e)))?;
        debug!("Connected to syslog as {} ({:?})", process, facility);
        Ok(Self {
            logger,
            process: process.to_string(),
        })
    }
}

impl Sink for SyslogSink {
    fn emit(&mut self, envelope: &Envelope<'_>) -> Result<()> {
        self.logger
            .warning(&envelope.line)
            .map_err(|e| Error::Emission(format!("{}: {}", envelope.field, e)))
    }

    fn notify_failure(&mut self, notice: &str) -> Result<()> {
        // The original connection may be the broken part.
        send_notice(&self.process, notice)
    }
}

/// Output format for dry runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

impl FromStr for OutputFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "text" => Ok(OutputFormat::Text),
            "json" => Ok(OutputFormat::Json),
            _ => Err(Error::Config(format!("Invalid output format: {}", s))),
        }
    }
}

/// Writes records to stdout (or any writer) instead of syslog.
pub struct StdoutSink<W: Write + Send> {
    out: W,
    format: OutputFormat,
}

impl StdoutSink<std::io::Stdout> {
    pub fn stdout(format: OutputFormat) -> Self {
        Self::new(std::io::stdout(), format)
    }
}

impl<W: Write + Send> StdoutSink<W> {
    pub fn new(out: W, format: OutputFormat) -> Self {
        Self { out, format }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write + Send> Sink for StdoutSink<W> {
    fn emit(&mut self, envelope: &Envelope<'_>) -> Result<()> {
        match self.format {
            OutputFormat::Text => writeln!(self.out, "{}", envelope.line)?,
            OutputFormat::Json => {
                let json = serde_json::to_string(envelope)?;
                writeln!(self.out, "{}", json)?;
            }
        }
        Ok(())
    }

    fn notify_failure(&mut self, notice: &str) -> Result<()> {
        writeln!(self.out, "{}", notice)?;
        Ok(())
    }
}
