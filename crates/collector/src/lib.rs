//! Hostinfo collector: probes, fallback chains and record emission.

pub mod catalogue;
pub mod chain;
pub mod collector;
pub mod config;
pub mod emitter;
pub mod executor;
pub mod policy;
pub mod probe;

#[cfg(test)]
mod testing;

pub use collector::{run_probe, Collector, ProbeReport, RunSummary};
pub use config::HostinfoConfig;
pub use emitter::{Envelope, OutputFormat, Sink, StdoutSink, SyslogSink};
pub use executor::{CommandOutput, Executor, LocalExecutor};
