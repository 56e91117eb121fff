//! Host information collector: runs every probe and emits its records.

use crate::catalogue::{catalogue, fields};
use crate::chain::ChainExecutor;
use crate::config::HostinfoConfig;
use crate::emitter::{failure_notice, Envelope, Sink};
use crate::executor::Executor;
use crate::probe::{Probe, RawResult};
use chrono::NaiveDate;
use hostinfo_canon::Assembler;
use hostinfo_common::timestamp::record_date;
use hostinfo_common::{local_hostname, Error, Result, Timestamp};
use hostinfo_schema::{validate_records, AttemptLog, Outcome, Record, Token, TokenSeq};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::{debug, error, info, warn};

/// Key of the run date token leading the OS record.
pub const LAST_SENT_KEY: &str = "HostInfo_LastSent";

/// Outcome of one probe.
#[derive(Debug, Clone)]
pub struct ProbeReport {
    pub name: String,
    pub field: String,
    pub tokens: TokenSeq,
    /// Index of the strategy that succeeded.
    pub used: Option<usize>,
    pub outcome: Outcome,
    pub attempts: AttemptLog,
}

impl ProbeReport {
    /// Report for a probe whose task never finished.
    fn lost(probe: &Probe, reason: &str) -> Self {
        Self {
            name: probe.name.clone(),
            field: probe.field.clone(),
            tokens: vec![Token::new(&probe.field, format!("Error with probe ({})", reason))].into(),
            used: None,
            outcome: Outcome::ExecutionError,
            attempts: AttemptLog::new(),
        }
    }

    pub fn degraded(&self) -> bool {
        self.used.is_none()
    }
}

/// Summary of a completed run.
#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    pub probes: usize,
    pub records: usize,
    /// Probes that fell through every strategy.
    pub degraded: Vec<String>,
}

/// Run one probe through its fallback chain and normalize the result.
pub async fn run_probe(probe: &Probe, executor: &dyn Executor, today: NaiveDate) -> ProbeReport {
    info!("Running probe {}", probe.name);
    let (raw, used) = ChainExecutor::new(executor).run(&probe.strategies).await;

    let mut tokens = match used {
        Some(index) => {
            let tokens = probe.strategies[index].normalize(&raw.parts);
            match &probe.assessment {
                Some(assessment) => assessment.apply(&probe.field, tokens, today),
                None => tokens,
            }
        }
        None => sentinel_tokens(probe, &raw),
    };
    if tokens.is_empty() {
        debug!("Probe {} produced no tokens", probe.name);
        tokens.push(Token::new(&probe.field, ""));
    }

    for attempt in raw.attempts.entries() {
        debug!(
            "{} attempt {}: {} -> {} in {}ms",
            probe.name, attempt.seq, attempt.strategy, attempt.outcome, attempt.duration_ms
        );
    }

    ProbeReport {
        name: probe.name.clone(),
        field: probe.field.clone(),
        tokens,
        used,
        outcome: raw.outcome,
        attempts: raw.attempts,
    }
}

fn sentinel_tokens(probe: &Probe, raw: &RawResult) -> TokenSeq {
    let diagnostic = raw.diagnostic.as_deref().unwrap_or("Error with probe");
    warn!("Probe {} unavailable: {}", probe.name, diagnostic);
    vec![Token::new(&probe.field, diagnostic)].into()
}

/// The collector.
pub struct Collector {
    config: HostinfoConfig,
    executor: Arc<dyn Executor>,
    probes: Vec<Arc<Probe>>,
    assembler: Assembler,
}

impl Collector {
    /// Create a collector running the full catalogue.
    pub fn new(config: HostinfoConfig, executor: Arc<dyn Executor>) -> Result<Self> {
        let probes = catalogue(&config);
        Self::with_probes(config, executor, probes)
    }

    /// Create a collector running `probes`, in the given order.
    pub fn with_probes(
        config: HostinfoConfig,
        executor: Arc<dyn Executor>,
        probes: Vec<Probe>,
    ) -> Result<Self> {
        config.validate()?;
        let assembler = Assembler::new(config.record_ceiling())?;
        Ok(Self {
            config,
            executor,
            probes: probes.into_iter().map(Arc::new).collect(),
            assembler,
        })
    }

    /// Run every probe once. Reports come back in declared order whatever
    /// order the probes finish in.
    pub async fn collect(&self, today: NaiveDate) -> Vec<ProbeReport> {
        let semaphore = Arc::new(Semaphore::new(self.config.max_concurrent_probes));

        let handles: Vec<_> = self
            .probes
            .iter()
            .map(|probe| {
                let probe = Arc::clone(probe);
                let executor = Arc::clone(&self.executor);
                let semaphore = Arc::clone(&semaphore);
                tokio::spawn(async move {
                    let _permit = semaphore.acquire_owned().await.ok();
                    run_probe(&probe, executor.as_ref(), today).await
                })
            })
            .collect();

        let mut reports = Vec::with_capacity(handles.len());
        for (handle, probe) in handles.into_iter().zip(&self.probes) {
            match handle.await {
                Ok(report) => reports.push(report),
                Err(e) => {
                    error!("Probe task {} failed: {}", probe.name, e);
                    reports.push(ProbeReport::lost(probe, "task failed"));
                }
            }
        }
        reports
    }

    /// Split one report into records.
    pub fn assemble(&self, report: &ProbeReport, today: NaiveDate) -> Vec<Record> {
        let mut tokens = report.tokens.clone();
        if report.field == fields::OS {
            let mut stamped = TokenSeq::new();
            stamped.push(Token::new(LAST_SENT_KEY, record_date(today)));
            stamped.extend(tokens);
            tokens = stamped;
        }

        let sequencing = self
            .probes
            .iter()
            .find(|p| p.name == report.name)
            .map(|p| p.sequencing)
            .unwrap_or(hostinfo_canon::Sequencing::WhenSplit);

        self.assembler.split(&report.field, tokens, sequencing)
    }

    /// Collect, assemble and emit, dated today.
    pub async fn run(&self, sink: &mut dyn Sink) -> Result<RunSummary> {
        self.run_at(sink, Timestamp::now().local_date()).await
    }

    /// Collect, assemble and emit.
    ///
    /// Stops at the first record the sink refuses, after one best-effort
    /// failure notice.
    pub async fn run_at(&self, sink: &mut dyn Sink, today: NaiveDate) -> Result<RunSummary> {
        let started = Timestamp::now();
        let reports = self.collect(today).await;
        let mut summary = RunSummary {
            probes: reports.len(),
            ..Default::default()
        };

        for report in &reports {
            if report.degraded() {
                summary.degraded.push(report.name.clone());
            }

            let records = self.assemble(report, today);
            let validation = validate_records(&records, self.assembler.ceiling());
            if !validation.valid {
                let reason = validation
                    .errors
                    .iter()
                    .map(|e| e.to_string())
                    .collect::<Vec<_>>()
                    .join("; ");
                return Err(self.fail(sink, format!("Refusing {}: {}", report.field, reason)));
            }
            for warning in &validation.warnings {
                debug!("{}", warning);
            }

            for record in &records {
                let envelope = Envelope {
                    probe: &report.name,
                    field: &report.field,
                    sequence: record.sequence,
                    line: record.render(),
                    attempts: report.attempts.entries(),
                };
                if let Err(e) = sink.emit(&envelope) {
                    return Err(self.fail(sink, e.to_string()));
                }
                summary.records += 1;
            }
        }

        info!(
            "Emitted {} records from {} probes in {}ms ({} degraded)",
            summary.records,
            summary.probes,
            started.elapsed_ms(),
            summary.degraded.len()
        );
        Ok(summary)
    }

    fn fail(&self, sink: &mut dyn Sink, reason: String) -> Error {
        error!("Emission failed: {}", reason);
        let notice = failure_notice(&local_hostname());
        if let Err(e) = sink.notify_failure(&notice) {
            error!("Failure notice not delivered: {}", e);
        }
        Error::Emission(reason)
    }
}
