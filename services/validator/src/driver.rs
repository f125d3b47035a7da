//! Validation driver
//!
//! ```text
//! Init ─► IndexReady ─► Blast(k) ─► Validating(k) ─► Flushed(k) ─┐
//!                          ▲                                      │
//!                          └──────────── k + 1 < blasts ──────────┘
//!                                              │
//!                                              ▼
//!                                         Summarized
//! ```
//!
//! Each blast caches `[k*B, min((k+1)*B, limit))` and validates every cached
//! message, either in order on the calling thread or on a rayon pool. In
//! parallel mode workers hand diagnostics to a [`ChannelSink`] and a single
//! writer thread appends them to the log, so the log is the only shared
//! mutable state.

use crate::output::{drain, trace_stem, write_summary, TextLogSink};
use anyhow::{anyhow, Context, Result};
use codec::{load_descriptor_pool, message_descriptor, CachedMessage, Framing, MessageCache, TraceIndex};
use engine::{ChannelSink, DiagnosticSink, Engine, Registry, Summary};
use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};
use rules::{load_doxygen, RuleLoader, RuleTree};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, info, warn};
use types::{Diagnostic, Severity, TopLevelType};
use validator_config::ValidatorConfig;

/// Outcome of one validation run
#[derive(Debug)]
pub struct RunReport {
    pub message_type: TopLevelType,
    /// Messages in the trace
    pub total_messages: usize,
    /// Messages validated, fewer than `total_messages` on early termination
    pub validated: usize,
    /// Validated messages with at least one error diagnostic
    pub failed: usize,
    pub blasts: usize,
    pub summary: Summary,
    pub log_path: PathBuf,
    pub summary_path: PathBuf,
}

impl RunReport {
    pub fn has_errors(&self) -> bool {
        self.summary.has_errors()
    }

    /// 0 when no error diagnostic was recorded, 1 otherwise
    pub fn exit_code(&self) -> u8 {
        u8::from(self.has_errors())
    }
}

/// A trace opened and indexed against its schema and rules
pub struct Validator {
    trace: PathBuf,
    config: ValidatorConfig,
    message_type: TopLevelType,
    engine: Engine,
    index: TraceIndex,
}

impl Validator {
    /// Resolve the message type, load the schema and rules, index the trace.
    pub fn open(trace: impl AsRef<Path>, config: ValidatorConfig) -> Result<Self> {
        let trace = trace.as_ref().to_path_buf();
        config.validate().context("Invalid validator configuration")?;

        let message_type = select_message_type(&trace, &config)?;

        let descriptors = config
            .descriptor_set
            .as_deref()
            .context("No descriptor set configured (pass --descriptors <osi.desc>)")?;
        let pool = load_descriptor_pool(descriptors)
            .with_context(|| format!("Failed to load descriptor set {}", descriptors.display()))?;
        let descriptor = message_descriptor(&pool, &config.proto_package, message_type)
            .context("Top-level message type is not part of the descriptor set")?;

        let engine = Engine::new(build_rule_tree(&config)?);

        let framing = config
            .framing
            .as_deref()
            .map(str::parse::<Framing>)
            .transpose()
            .context("Invalid framing override")?;
        let index = TraceIndex::open(&trace, framing, descriptor, config.buffer_size)
            .with_context(|| format!("Failed to index trace {}", trace.display()))?;

        Ok(Self {
            trace,
            config,
            message_type,
            engine,
            index,
        })
    }

    pub fn message_type(&self) -> TopLevelType {
        self.message_type
    }

    pub fn message_count(&self) -> usize {
        self.index.len()
    }

    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    /// Validate blast after blast, then write the summary.
    pub fn run(mut self) -> Result<RunReport> {
        let started = Instant::now();
        let total = self.index.len();
        let limit = self.config.timestep_limit().map_or(total, |n| n.min(total));
        if limit < total {
            info!("Stopping after {} of {} messages", limit, total);
        }

        let stem = trace_stem(&self.trace);
        let log_path = self.config.output_dir.join(format!("{}.log", stem));
        let summary_path = self.config.output_dir.join(format!("{}.summary.txt", stem));
        let log = TextLogSink::create(&log_path)
            .with_context(|| format!("Failed to create log file {}", log_path.display()))?;

        let pool = if self.config.parallel {
            let workers = self.config.worker_count();
            info!("Validating with {} worker threads", workers);
            Some(
                ThreadPoolBuilder::new()
                    .num_threads(workers)
                    .thread_name(|i| format!("osi-worker-{}", i))
                    .build()
                    .context("Failed to start worker pool")?,
            )
        } else {
            None
        };

        let blast_size = self.config.blast_size;
        let mut begin = 0;
        let mut blasts = 0;
        let mut failed = 0;

        while begin < limit {
            let end = begin.saturating_add(blast_size).min(limit);
            self.index
                .cache_range(begin, end)
                .with_context(|| format!("Failed to cache messages [{}, {})", begin, end))?;
            debug!("Blast {}: messages [{}, {})", blasts, begin, end);

            let cache = self.index.cache();
            failed += match &pool {
                Some(pool) => validate_parallel(&self.engine, pool, cache, &log)?,
                None => validate_sequential(&self.engine, cache, &log),
            };
            log.flush();

            blasts += 1;
            begin = end;
        }

        info!(
            "✅ Validated {} messages in {} blasts ({:.2?}), {} with errors",
            limit,
            blasts,
            started.elapsed(),
            failed
        );

        let summary = log
            .finish()
            .with_context(|| format!("Failed to flush log file {}", log_path.display()))?;
        write_summary(&summary_path, &summary)
            .with_context(|| format!("Failed to write summary {}", summary_path.display()))?;
        info!("📄 Log: {}", log_path.display());
        info!("📄 Summary: {}", summary_path.display());

        Ok(RunReport {
            message_type: self.message_type,
            total_messages: total,
            validated: limit,
            failed,
            blasts,
            summary,
            log_path,
            summary_path,
        })
    }
}

/// Explicit override, else the trace-name suffix, else the default type.
pub fn select_message_type(trace: &Path, config: &ValidatorConfig) -> Result<TopLevelType> {
    if let Some(name) = &config.message_type {
        let kind = name
            .parse::<TopLevelType>()
            .context("Invalid message type override")?;
        info!("Message type: {} (explicit)", kind);
        return Ok(kind);
    }

    let file_name = trace
        .file_name()
        .map(|n| n.to_string_lossy())
        .unwrap_or_default();
    match TopLevelType::from_trace_name(&file_name) {
        Some(kind) => {
            info!("Message type: {} (from trace name)", kind);
            Ok(kind)
        }
        None => {
            let kind = TopLevelType::default();
            warn!(
                "Cannot infer the message type of '{}', assuming {}",
                file_name, kind
            );
            Ok(kind)
        }
    }
}

/// Load the YAML rule directory and the Doxygen XML source, when configured.
pub fn build_rule_tree(config: &ValidatorConfig) -> Result<RuleTree> {
    let mut loader = RuleLoader::new(Registry::global());

    if let Some(dir) = &config.rules_dir {
        let files = loader
            .load_dir(dir)
            .with_context(|| format!("Failed to load rules from {}", dir.display()))?;
        info!("📚 Loaded {} rule files from {}", files, dir.display());
    }
    if let Some(xml) = &config.doxygen_xml {
        let blocks = load_doxygen(&mut loader, xml)
            .with_context(|| format!("Failed to load Doxygen rules from {}", xml.display()))?;
        info!("📚 Loaded {} rule blocks from {}", blocks, xml.display());
    }
    if config.rules_dir.is_none() && config.doxygen_xml.is_none() {
        warn!("No rule source configured, messages are only checked for identifiers");
    }

    Ok(loader.finish())
}

/// Validate one cached record; a decode failure is an error at its index.
fn validate_entry(engine: &Engine, index: usize, entry: &CachedMessage, sink: &dyn DiagnosticSink) -> bool {
    match entry {
        Ok(message) => engine.validate_message(message, index, sink),
        Err(e) => {
            sink.record(Diagnostic::new(
                index,
                None,
                Severity::Error,
                format!("Failed to decode message {}: {}", index, e),
            ));
            false
        }
    }
}

fn validate_sequential(engine: &Engine, cache: &MessageCache, sink: &dyn DiagnosticSink) -> usize {
    cache
        .iter()
        .filter(|(index, entry)| !validate_entry(engine, *index, entry, sink))
        .count()
}

fn validate_parallel(
    engine: &Engine,
    pool: &ThreadPool,
    cache: &MessageCache,
    log: &TextLogSink,
) -> Result<usize> {
    let entries: Vec<(usize, &CachedMessage)> = cache.iter().collect();
    let (sink, receiver) = ChannelSink::unbounded();

    std::thread::scope(|scope| {
        let writer = scope.spawn(move || drain(receiver, log));

        let failed = pool.install(|| {
            entries
                .par_iter()
                .filter(|(index, entry)| !validate_entry(engine, *index, entry, &sink))
                .count()
        });
        drop(sink);

        let forwarded = writer
            .join()
            .map_err(|_| anyhow!("Diagnostic writer thread panicked"))?;
        debug!("Writer forwarded {} diagnostics", forwarded);
        Ok(failed)
    })
}
