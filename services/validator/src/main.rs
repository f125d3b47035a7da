//! osivalidator - validate a recorded OSI trace against YAML rules
//!
//! Usage:
//!   osivalidator run_gt_001.osi --rules rules/ --descriptors osi.desc
//!   osivalidator legacy_sv.txt.xz --rules rules/ --descriptors osi.desc --parallel --timesteps 100
//!
//! Exit codes: 0 = no error diagnostics, 1 = error diagnostics recorded,
//! 2 = fatal (configuration, framing or I/O).

use anyhow::{Context, Result};
use clap::Parser;
use osi_validator::{RunReport, Validator};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;
use validator_config::ValidatorConfig;

#[derive(Parser, Debug)]
#[clap(name = "osivalidator", version, about = "Validate OSI trace files against rule sets")]
struct Args {
    /// Trace file (.osi, legacy .txt, optionally .xz/.lzma compressed)
    trace: PathBuf,

    /// Directory holding osi_*.yml rule files
    #[clap(long, short = 'r')]
    rules: Option<PathBuf>,

    /// Doxygen XML directory or file with embedded rule blocks
    #[clap(long)]
    doxygen_xml: Option<PathBuf>,

    /// Serialized FileDescriptorSet of the OSI schema
    #[clap(long, short = 'd')]
    descriptors: Option<PathBuf>,

    /// Top-level message type; inferred from the trace name when omitted
    #[clap(long = "type", short = 't')]
    message_type: Option<String>,

    /// Directory for the log and summary files
    #[clap(long, short = 'o')]
    output: Option<PathBuf>,

    /// Number of messages to validate, -1 for all
    #[clap(long, allow_hyphen_values = true)]
    timesteps: Option<i64>,

    /// Messages cached and validated per blast
    #[clap(long)]
    blast: Option<usize>,

    /// Separator scan buffer in bytes, 0 reads the whole trace
    #[clap(long)]
    buffer: Option<usize>,

    /// Framing override: length or separator
    #[clap(long)]
    framing: Option<String>,

    /// Protobuf package of the schema
    #[clap(long)]
    proto_package: Option<String>,

    /// Validate messages of a blast in parallel
    #[clap(long, short = 'p')]
    parallel: bool,

    /// Worker threads in parallel mode (default: available parallelism)
    #[clap(long)]
    workers: Option<usize>,

    /// TOML configuration file; flags override its values
    #[clap(long, short = 'c')]
    config: Option<PathBuf>,

    /// Debug-level logging
    #[clap(long, short = 'v')]
    verbose: bool,
}

impl Args {
    fn apply(self, config: &mut ValidatorConfig) {
        if let Some(rules) = self.rules {
            config.rules_dir = Some(rules);
        }
        if let Some(xml) = self.doxygen_xml {
            config.doxygen_xml = Some(xml);
        }
        if let Some(descriptors) = self.descriptors {
            config.descriptor_set = Some(descriptors);
        }
        if let Some(kind) = self.message_type {
            config.message_type = Some(kind);
        }
        if let Some(output) = self.output {
            config.output_dir = output;
        }
        if let Some(timesteps) = self.timesteps {
            config.timesteps = timesteps;
        }
        if let Some(blast) = self.blast {
            config.blast_size = blast;
        }
        if let Some(buffer) = self.buffer {
            config.buffer_size = buffer;
        }
        if let Some(framing) = self.framing {
            config.framing = Some(framing);
        }
        if let Some(package) = self.proto_package {
            config.proto_package = package;
        }
        if let Some(workers) = self.workers {
            config.workers = workers;
        }
        config.parallel |= self.parallel;
        config.verbose |= self.verbose;
    }
}

fn init_tracing(verbose: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(if verbose { "debug" } else { "info" }));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn run(args: Args) -> Result<RunReport> {
    let mut config = ValidatorConfig::load(args.config.as_deref()).context("Failed to load configuration")?;
    let trace = args.trace.clone();
    args.apply(&mut config);

    info!("🔍 OSI Validator starting");
    info!("📂 Trace: {}", trace.display());

    let validator = Validator::open(&trace, config)?;
    info!(
        "Trace holds {} {} messages",
        validator.message_count(),
        validator.message_type()
    );
    validator.run()
}

fn main() -> ExitCode {
    let args = Args::parse();
    init_tracing(args.verbose);

    match run(args) {
        Ok(report) => {
            println!("{}", report.summary);
            if report.has_errors() {
                error!("❌ {} of {} messages failed validation", report.failed, report.validated);
            } else {
                info!("✅ No errors in {} messages", report.validated);
            }
            ExitCode::from(report.exit_code())
        }
        Err(e) => {
            error!("❌ {:#}", e);
            ExitCode::from(2)
        }
    }
}
