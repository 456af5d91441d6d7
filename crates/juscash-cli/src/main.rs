//! `juscash` command-line interface.
//!
//! Service wrapper around the decision pipeline: serves decisions over
//! HTTP, validates case records, runs one-off decisions, and probes the
//! generation server.

mod server;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use std::io::Read;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::debug;
use tracing_subscriber::EnvFilter;

use juscash_core::{
    normalize_with_path, summarize, CaseError, CaseRecord, DecisionResult, PolicyCorpus,
};
use juscash_runtime::{bootstrap, configured_generator, RuntimeConfig};

#[derive(Parser, Debug)]
#[command(
    name = "juscash",
    about = "Validate legal case records against the credit purchase policy",
    version
)]
struct Cli {
    /// Log at debug level (RUST_LOG overrides)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Check a case record against the schema
    Validate {
        /// Case record JSON, or - for stdin
        case: PathBuf,
    },
    /// Print the case summary used for retrieval and prompting
    Summarize {
        /// Case record JSON, or - for stdin
        case: PathBuf,
    },
    /// List the policy corpus
    Policies,
    /// Decide a case against the configured inference servers
    Decide {
        /// Case record JSON, or - for stdin
        case: PathBuf,

        #[arg(long, value_enum, default_value_t = OutputFormat::Json)]
        format: OutputFormat,
    },
    /// Normalize captured model output into a verdict
    Normalize {
        /// Raw model output, or - for stdin
        input: PathBuf,
    },
    /// Serve decisions over HTTP
    Serve {
        /// Listen address
        #[arg(long, default_value = "0.0.0.0:8000")]
        addr: SocketAddr,
    },
    /// Probe the generation server (exit 0 when up, 1 when down)
    Health,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
enum OutputFormat {
    Json,
    Text,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match run(cli.command).await {
        Ok(code) => code,
        Err(err) => {
            eprintln!("error: {:#}", err);
            ExitCode::FAILURE
        }
    }
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    // Logs go to stderr so stdout stays machine-readable.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .try_init();
}

async fn run(command: Command) -> Result<ExitCode> {
    match command {
        Command::Validate { case } => validate(&case),
        Command::Summarize { case } => {
            let record = load_case(&case)?;
            println!("{}", summarize(&record));
            Ok(ExitCode::SUCCESS)
        }
        Command::Policies => policies(),
        Command::Decide { case, format } => decide(&case, format).await,
        Command::Normalize { input } => {
            let raw = read_input(&input)?;
            let (verdict, path) = normalize_with_path(&raw);
            debug!(path = %path, "Normalized");
            println!("{}", serde_json::to_string_pretty(&verdict)?);
            Ok(ExitCode::SUCCESS)
        }
        Command::Serve { addr } => {
            let config = RuntimeConfig::from_env()?;
            let pipeline = bootstrap(&config, |k| std::env::var(k).ok())
                .await
                .context("starting decision runtime")?;
            server::serve(addr, pipeline).await?;
            Ok(ExitCode::SUCCESS)
        }
        Command::Health => health().await,
    }
}

fn validate(path: &Path) -> Result<ExitCode> {
    let content = read_input(path)?;
    match CaseRecord::from_json(&content) {
        Ok(record) => {
            println!("OK {}", record.case_number);
            Ok(ExitCode::SUCCESS)
        }
        Err(CaseError::SchemaError(violations)) => {
            for violation in &violations {
                println!("INVALID {}", violation);
            }
            Ok(ExitCode::FAILURE)
        }
        Err(err) => {
            println!("INVALID {}", err);
            Ok(ExitCode::FAILURE)
        }
    }
}

fn policies() -> Result<ExitCode> {
    let corpus = PolicyCorpus::reference()?;
    println!("Policy corpus version {}", corpus.version);
    for rule in &corpus.rules {
        println!();
        println!("{} - {}", rule.id, rule.title);
        println!("  {}", rule.text);
    }
    Ok(ExitCode::SUCCESS)
}

async fn decide(path: &Path, format: OutputFormat) -> Result<ExitCode> {
    let record = load_case(path)?;
    let config = RuntimeConfig::from_env()?;
    let pipeline = bootstrap(&config, |k| std::env::var(k).ok())
        .await
        .context("starting decision runtime")?;

    let result = pipeline
        .decide(&record)
        .await
        .with_context(|| format!("deciding case {}", record.case_number))?;

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&result)?),
        OutputFormat::Text => print!("{}", render_text(&result)),
    }
    Ok(ExitCode::SUCCESS)
}

async fn health() -> Result<ExitCode> {
    let config = RuntimeConfig::from_env()?;
    let generator = configured_generator(&config, |k| std::env::var(k).ok())?;

    if generator.health_check().await {
        println!("up");
        Ok(ExitCode::SUCCESS)
    } else {
        println!("down");
        Ok(ExitCode::FAILURE)
    }
}

fn render_text(result: &DecisionResult) -> String {
    let citations = if result.citations.is_empty() {
        "-".to_string()
    } else {
        result.citations.join(", ")
    };
    format!(
        "Decision:  {}\nRationale: {}\nCitations: {}\nModel:     {} (prompt {}, policies {})\n",
        result.decision,
        result.rationale,
        citations,
        result.metadata.model_name,
        result.metadata.prompt_version,
        result.metadata.policy_version,
    )
}

fn load_case(path: &Path) -> Result<CaseRecord> {
    let content = read_input(path)?;
    CaseRecord::from_json(&content)
        .with_context(|| format!("invalid case record {}", path.display()))
}

/// Read a file, or stdin when the path is `-`.
fn read_input(path: &Path) -> Result<String> {
    if path.as_os_str() == "-" {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .context("reading stdin")?;
        Ok(buf)
    } else {
        std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))
    }
}
