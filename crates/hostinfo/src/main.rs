//! Hostinfo - Host security inventory collector.

use anyhow::Context;
use clap::Parser;
use hostinfo_collector::emitter::{open_or_notify, send_notice};
use hostinfo_collector::{
    Collector, HostinfoConfig, LocalExecutor, OutputFormat, Sink, StdoutSink, SyslogSink,
};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "hostinfo")]
#[command(
    author,
    version,
    about = "Collect host security inventory and send it to syslog"
)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Diagnostic level (WARNING, INFO, DEBUG, ... or a tracing directive)
    #[arg(long, env = "LOGLEVEL", default_value = "WARNING")]
    log_level: String,

    /// YAML configuration file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Largest record in bytes
    #[arg(long)]
    max_record_bytes: Option<usize>,

    /// Number of probes run at once
    #[arg(long)]
    concurrency: Option<usize>,

    /// Print records to stdout instead of sending them to syslog
    #[arg(long)]
    stdout: bool,

    /// Dry-run output format (text, json)
    #[arg(long, default_value = "text")]
    format: String,
}

/// Map a log level name onto a tracing filter directive.
fn filter_directive(level: &str) -> String {
    match level.trim().to_uppercase().as_str() {
        "CRITICAL" | "FATAL" | "ERROR" => "error".to_string(),
        "WARNING" | "WARN" => "warn".to_string(),
        "INFO" => "info".to_string(),
        "DEBUG" => "debug".to_string(),
        "NOTSET" | "TRACE" => "trace".to_string(),
        _ => level.to_string(),
    }
}

fn load_config(cli: &Cli) -> anyhow::Result<HostinfoConfig> {
    let mut config = match &cli.config {
        Some(path) => HostinfoConfig::load(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => HostinfoConfig::default(),
    };
    if let Some(bytes) = cli.max_record_bytes {
        config.max_record_bytes = bytes;
    }
    if let Some(concurrency) = cli.concurrency {
        config.max_concurrent_probes = concurrency;
    }
    config.validate().context("Invalid configuration")?;
    Ok(config)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_new(filter_directive(&cli.log_level))
            .unwrap_or_else(|_| EnvFilter::new("warn"))
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .with(filter)
        .init();

    let config = load_config(&cli)?;
    let executor = Arc::new(LocalExecutor::new(config.command_timeout()));

    let mut sink: Box<dyn Sink> = if cli.stdout {
        let format: OutputFormat = cli.format.parse()?;
        Box::new(StdoutSink::stdout(format))
    } else {
        let facility = config.facility()?;
        let process = config.syslog.process.as_str();
        Box::new(
            open_or_notify(
                || SyslogSink::connect(facility, process),
                |notice| send_notice(process, notice),
            )
            .context("Failed to open syslog")?,
        )
    };

    info!("Collecting on {}", hostinfo_common::local_hostname());
    let collector = Collector::new(config, executor)?;
    let summary = collector.run(sink.as_mut()).await?;

    if !summary.degraded.is_empty() {
        warn!("Degraded probes: {}", summary.degraded.join(", "));
    }
    info!(
        "Collection complete: {} records from {} probes",
        summary.records, summary.probes
    );

    Ok(())
}
