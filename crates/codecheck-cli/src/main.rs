//! Codecheck - building-code compliance evaluation CLI
//!
//! The `codecheck` command judges tool execution traces from a building
//! model against natural-language regulation text.
//!
//! ## Commands
//!
//! - `evaluate`: Validated compliance result as JSON
//! - `report`: Full compliance report (JSON or Markdown), optionally persisted
//! - `show-report`: Load a persisted report and verify its digest
//! - `requirements`: Requirements mapped from regulation text
//! - `evidence`: Normalized per-component evidence from a trace

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use serde::Serialize;
use serde_json::Value;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn, Level};

use codecheck_core::metrics::METRICS;
use codecheck_core::{
    read_report_artifact, render_markdown, write_report_artifact, ComplianceReport, Engine,
    EngineConfig, EngineError, HeuristicReasoner, Reasoner,
};
use codecheck_llm::{ChatCompletionsReasoner, LlmConfig};

#[derive(Parser)]
#[command(name = "codecheck")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Building-code compliance evaluation", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json: bool,

    /// Use the built-in heuristic reasoner instead of a model endpoint
    #[arg(long, global = true)]
    offline: bool,

    /// Model name (overrides CODECHECK_MODEL / OPENAI_MODEL_NAME)
    #[arg(long, global = true)]
    model: Option<String>,

    #[command(flatten)]
    engine: EngineArgs,

    #[command(subcommand)]
    command: Commands,
}

/// Engine limits; unset flags keep the engine defaults.
#[derive(Args, Debug, Default)]
struct EngineArgs {
    /// Judgments allowed in flight at once
    #[arg(long, global = true)]
    max_concurrent: Option<usize>,

    /// Timeout for a single judgment, in milliseconds
    #[arg(long, global = true)]
    pair_timeout_ms: Option<u64>,

    /// Budget for the whole judgment phase, in milliseconds (0 disables)
    #[arg(long, global = true)]
    call_budget_ms: Option<u64>,

    /// Nesting depth the evidence normalizer descends into
    #[arg(long, global = true)]
    max_trace_depth: Option<usize>,
}

impl EngineArgs {
    fn to_config(&self) -> EngineConfig {
        let mut config = EngineConfig::default();
        if let Some(n) = self.max_concurrent {
            config = config.with_max_concurrent(n);
        }
        if let Some(ms) = self.pair_timeout_ms {
            config = config.with_pair_timeout_ms(ms);
        }
        if let Some(ms) = self.call_budget_ms {
            config = config.with_call_budget_ms((ms > 0).then_some(ms));
        }
        if let Some(depth) = self.max_trace_depth {
            config = config.with_max_trace_depth(depth);
        }
        config
    }
}

#[derive(Args, Debug)]
struct RegulationArgs {
    /// Regulation text
    #[arg(short, long, conflicts_with = "regulation_file")]
    regulation: Option<String>,

    /// File containing the regulation text
    #[arg(long)]
    regulation_file: Option<PathBuf>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum ReportFormat {
    Json,
    Markdown,
}

#[derive(Subcommand)]
enum Commands {
    /// Evaluate a trace against a regulation and print the validated result
    Evaluate {
        #[command(flatten)]
        regulation: RegulationArgs,

        /// Execution trace JSON file (`-` reads stdin)
        #[arg(short, long)]
        trace: PathBuf,

        /// Also include the mapped requirements and normalized evidence
        #[arg(long)]
        detailed: bool,

        /// Write the result here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Evaluate and produce a full compliance report
    Report {
        #[command(flatten)]
        regulation: RegulationArgs,

        /// Execution trace JSON file (`-` reads stdin)
        #[arg(short, long)]
        trace: PathBuf,

        /// Output format
        #[arg(short, long, value_enum, default_value = "json")]
        format: ReportFormat,

        /// Persist `<dir>/<report_id>/report.json` with a digest sidecar
        #[arg(long)]
        out_dir: Option<PathBuf>,
    },

    /// Load a persisted report and verify its digest
    ShowReport {
        /// Report ID (RPT-YYYYMMDD-HHMMSS, with a -N suffix on clashes)
        report_id: String,

        /// Directory the report was persisted to
        #[arg(long, default_value = ".codecheck/reports")]
        dir: PathBuf,

        /// Output format
        #[arg(short, long, value_enum, default_value = "markdown")]
        format: ReportFormat,
    },

    /// Print the requirements mapped from a regulation
    Requirements {
        #[command(flatten)]
        regulation: RegulationArgs,
    },

    /// Print the normalized evidence of a trace
    Evidence {
        /// Execution trace JSON file (`-` reads stdin)
        #[arg(short, long)]
        trace: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    codecheck_core::init_tracing(cli.json, level);

    let outcome = run(&cli).await;
    METRICS.flush();
    outcome
}

async fn run(cli: &Cli) -> Result<()> {
    match &cli.command {
        Commands::Evaluate {
            regulation,
            trace,
            detailed,
            output,
        } => {
            let engine = build_engine(cli)?;
            let text = read_regulation(regulation)?;
            let trace = load_trace(trace)?;
            cmd_evaluate(&engine, &text, &trace, *detailed, output.as_deref()).await
        }
        Commands::Report {
            regulation,
            trace,
            format,
            out_dir,
        } => {
            let engine = build_engine(cli)?;
            let text = read_regulation(regulation)?;
            let trace = load_trace(trace)?;
            cmd_report(&engine, &text, &trace, *format, out_dir.as_deref()).await
        }
        Commands::ShowReport {
            report_id,
            dir,
            format,
        } => cmd_show_report(report_id, dir, *format),
        Commands::Requirements { regulation } => {
            let engine = build_engine(cli)?;
            let text = read_regulation(regulation)?;
            cmd_requirements(&engine, &text).await
        }
        Commands::Evidence { trace } => {
            let engine = offline_engine(cli.engine.to_config());
            let trace = load_trace(trace)?;
            cmd_evidence(&engine, &trace)
        }
    }
}

fn offline_engine(config: EngineConfig) -> Engine {
    Engine::new(Arc::new(HeuristicReasoner::new())).with_config(config)
}

fn build_engine(cli: &Cli) -> Result<Engine> {
    let config = cli.engine.to_config();
    if cli.offline {
        return Ok(offline_engine(config));
    }

    let mut llm = LlmConfig::from_env();
    if let Some(model) = &cli.model {
        llm = llm.with_model(model);
    }
    if llm.api_key.is_none() {
        warn!(
            api_base = %llm.api_base,
            "no API key set (CODECHECK_API_KEY / OPENAI_API_KEY); use --offline to skip the model"
        );
    }
    let reasoner: Arc<dyn Reasoner> =
        Arc::new(ChatCompletionsReasoner::new(llm).context("Failed to build model client")?);
    info!(reasoner = reasoner.name(), "using model backend");
    Ok(Engine::new(reasoner).with_config(config))
}

// ---------------------------------------------------------------------------
// Inputs
// ---------------------------------------------------------------------------

fn read_regulation(args: &RegulationArgs) -> Result<String> {
    match (&args.regulation, &args.regulation_file) {
        (Some(text), _) => Ok(text.clone()),
        (None, Some(path)) => std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read regulation file: {:?}", path)),
        (None, None) => anyhow::bail!("Provide the regulation with --regulation or --regulation-file"),
    }
}

/// Load a trace file: a JSON list of records, or an object carrying the
/// list under `execution_trace`.
fn load_trace(path: &Path) -> Result<Vec<Value>> {
    let raw = if path == Path::new("-") {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .context("Failed to read trace from stdin")?;
        buf
    } else {
        std::fs::read_to_string(path).with_context(|| format!("Failed to read trace file: {:?}", path))?
    };
    parse_trace(&raw).with_context(|| format!("Invalid trace in {:?}", path))
}

fn parse_trace(raw: &str) -> Result<Vec<Value>> {
    match serde_json::from_str::<Value>(raw).context("Trace is not valid JSON")? {
        Value::Array(records) => Ok(records),
        Value::Object(mut obj) => match obj.remove("execution_trace") {
            Some(Value::Array(records)) => Ok(records),
            _ => anyhow::bail!("Trace object has no `execution_trace` list"),
        },
        _ => anyhow::bail!("Trace must be a JSON list of records"),
    }
}

fn emit_json<T: Serialize>(value: &T, output: Option<&Path>) -> Result<()> {
    let json = serde_json::to_string_pretty(value)?;
    match output {
        Some(path) => {
            std::fs::write(path, json).with_context(|| format!("Failed to write output to {:?}", path))?;
            println!("Wrote {:?}", path);
        }
        None => println!("{}", json),
    }
    Ok(())
}

fn stage_context(err: EngineError) -> anyhow::Error {
    let stage = err.stage();
    anyhow::Error::new(err).context(format!("Evaluation failed during {}", stage))
}

// ---------------------------------------------------------------------------
// Commands
// ---------------------------------------------------------------------------

async fn cmd_evaluate(
    engine: &Engine,
    regulation: &str,
    trace: &[Value],
    detailed: bool,
    output: Option<&Path>,
) -> Result<()> {
    if detailed {
        let evaluation = engine
            .evaluate_detailed(regulation, trace)
            .await
            .map_err(stage_context)?;
        emit_json(&evaluation, output)
    } else {
        let result = engine.evaluate(regulation, trace).await.map_err(stage_context)?;
        emit_json(&result, output)
    }
}

async fn cmd_report(
    engine: &Engine,
    regulation: &str,
    trace: &[Value],
    format: ReportFormat,
    out_dir: Option<&Path>,
) -> Result<()> {
    let result = engine.evaluate(regulation, trace).await.map_err(stage_context)?;
    let mut report = ComplianceReport::build(&result, trace, regulation);

    if let Some(dir) = out_dir {
        let path = persist_report(&mut report, dir)
            .with_context(|| format!("Failed to persist report under {:?}", dir))?;
        eprintln!("Report {} written to {:?}", report.report_id, path);
    }

    match format {
        ReportFormat::Json => println!("{}", report.to_json_pretty()?),
        ReportFormat::Markdown => print!("{}", render_markdown(&report)),
    }
    Ok(())
}

/// Report ids have one-second resolution; a clash gets a `-2`, `-3` ...
/// suffix instead of replacing the earlier artifact.
fn persist_report(report: &mut ComplianceReport, dir: &Path) -> Result<PathBuf> {
    const MAX_SUFFIX: usize = 100;
    let base = report.report_id.clone();
    for n in 1..=MAX_SUFFIX {
        if n > 1 {
            report.report_id = format!("{base}-{n}");
        }
        match write_report_artifact(report, dir) {
            Ok(path) => return Ok(path),
            Err(EngineError::ReportExists(id)) => {
                info!(report_id = %id, "report id taken; trying next suffix");
            }
            Err(e) => return Err(e.into()),
        }
    }
    anyhow::bail!("no free report id for {base} after {MAX_SUFFIX} attempts")
}

fn cmd_show_report(report_id: &str, dir: &Path, format: ReportFormat) -> Result<()> {
    let report = read_report_artifact(report_id, dir)
        .with_context(|| format!("Failed to load report {} from {:?}", report_id, dir))?;
    match format {
        ReportFormat::Json => println!("{}", report.to_json_pretty()?),
        ReportFormat::Markdown => print!("{}", render_markdown(&report)),
    }
    eprintln!("Report digest verified: {}", report.report_id);
    Ok(())
}

async fn cmd_requirements(engine: &Engine, regulation: &str) -> Result<()> {
    let requirements = engine
        .map_requirements(regulation)
        .await
        .map_err(stage_context)?;
    emit_json(&requirements, None)
}

fn cmd_evidence(engine: &Engine, trace: &[Value]) -> Result<()> {
    emit_json(&engine.normalize(trace), None)
}
