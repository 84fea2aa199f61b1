use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use qapipe_local::agent::{Agent, AgentConfig, Toolbox};
use qapipe_local::bench::BenchClient;
use qapipe_local::llm::ChatClient;
use qapipe_local::search::TavilySearchProvider;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "qapipe")]
#[command(version)]
#[command(about = "Benchmark question-answering pipeline (search + file context + LLM)", long_about = None)]
struct Cli {
    /// Increase verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Answer one random benchmark question (prints answer + reasoning trace).
    Ask(AskCmd),
    /// Answer every benchmark question and write a JSONL answers artifact.
    Batch(BatchCmd),
    /// Answer every question, write the artifact, and submit for scoring.
    Submit(SubmitCmd),
    /// Evaluate an arithmetic expression with the calculator tool.
    Calc(CalcCmd),
    /// Diagnose configuration issues (no secret values printed).
    Doctor(DoctorCmd),
    /// Print version info.
    Version(VersionCmd),
}

#[derive(clap::Args, Debug)]
struct AskCmd {}

#[derive(clap::Args, Debug)]
struct BatchCmd {
    /// Output JSONL path (default: .generated/qapipe-answers-<epoch>.jsonl)
    #[arg(long)]
    out: Option<PathBuf>,
    /// Override "now" for deterministic artifact paths.
    #[arg(long)]
    now_epoch_s: Option<u64>,
    /// Process at most this many questions (smoke runs).
    #[arg(long)]
    max_questions: Option<usize>,
}

#[derive(clap::Args, Debug)]
struct SubmitCmd {
    /// Requester identity expected by the scoring endpoint.
    #[arg(long)]
    username: String,
    /// Code-location reference (URL) recorded with the submission.
    #[arg(long)]
    agent_code: String,
    /// Output JSONL path (default: .generated/qapipe-answers-<epoch>.jsonl)
    #[arg(long)]
    out: Option<PathBuf>,
    /// Override "now" for deterministic artifact paths.
    #[arg(long)]
    now_epoch_s: Option<u64>,
}

#[derive(clap::Args, Debug)]
struct CalcCmd {
    /// Expression over + - * / ( ) and decimal literals.
    expression: String,
}

#[derive(clap::Args, Debug)]
struct DoctorCmd {
    /// Output format: json|text
    #[arg(long = "output", alias = "format", default_value = "json")]
    output: String,
}

#[derive(clap::Args, Debug)]
struct VersionCmd {
    /// Output format: json|text
    #[arg(long = "output", alias = "format", default_value = "json")]
    output: String,
}

fn init_tracing(verbose: u8) {
    let filter = match verbose {
        0 => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        1 => EnvFilter::new("info"),
        2 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Opt-in env-file loader.
///
/// Sets variables only when not already present in the process environment,
/// and never logs values.
fn load_env_file() {
    let Ok(path) = std::env::var("QAPIPE_ENV_FILE") else {
        return;
    };
    let path = path.trim();
    if path.is_empty() {
        return;
    }
    let Ok(text) = std::fs::read_to_string(path) else {
        return;
    };
    for raw in text.lines() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let Some((k, v)) = line.split_once('=') else {
            continue;
        };
        let (k, v) = (k.trim(), v.trim());
        if k.is_empty() {
            continue;
        }
        if std::env::var_os(k).is_none() {
            std::env::set_var(k, v);
        }
    }
}

fn now_epoch_s() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

fn default_artifact_path(now: u64) -> PathBuf {
    PathBuf::from(format!(".generated/qapipe-answers-{now}.jsonl"))
}

fn write_jsonl(path: &Path, records: &[qapipe_core::SubmissionRecord]) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("creating {}", parent.display()))?;
    }
    let mut out = String::new();
    for record in records {
        out.push_str(&serde_json::to_string(record)?);
        out.push('\n');
    }
    std::fs::write(path, out).with_context(|| format!("writing {}", path.display()))?;
    Ok(())
}

fn http_client() -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .user_agent(concat!("qapipe/", env!("CARGO_PKG_VERSION")))
        .build()
        .context("building http client")
}

/// Wire env-derived configuration into the pipeline.
///
/// The model client is required; the search tool degrades to an absent
/// capability slot when its key is missing.
fn build_agent(client: &reqwest::Client, bench: &BenchClient) -> Result<Agent> {
    let model = ChatClient::from_env(client.clone())?;
    info!(model = model.model(), "model client ready");

    let search = match TavilySearchProvider::from_env(client.clone()) {
        Ok(provider) => Some(Arc::new(provider) as Arc<dyn qapipe_core::SearchProvider>),
        Err(e) => {
            warn!(error = %e, "search tool disabled");
            None
        }
    };

    let tools = Toolbox {
        search,
        files: Some(Arc::new(bench.clone())),
    };
    Ok(Agent::new(Arc::new(model), tools, AgentConfig::default()))
}

fn build_bench(client: &reqwest::Client) -> Result<BenchClient> {
    Ok(BenchClient::from_env(client.clone())?)
}

async fn run_batch_to_artifact(
    out: Option<PathBuf>,
    now_epoch_s_override: Option<u64>,
    max_questions: Option<usize>,
) -> Result<(Vec<qapipe_core::SubmissionRecord>, PathBuf, usize)> {
    let client = http_client()?;
    let bench = build_bench(&client)?;
    let agent = build_agent(&client, &bench)?;

    let mut questions = bench.questions().await?;
    let total = questions.len();
    if let Some(cap) = max_questions {
        questions.truncate(cap);
    }
    info!(total, processing = questions.len(), "questions fetched");

    let records = agent.run_batch(&questions).await;

    let now = now_epoch_s_override.unwrap_or_else(now_epoch_s);
    let path = out.unwrap_or_else(|| default_artifact_path(now));
    write_jsonl(&path, &records)?;
    Ok((records, path, questions.len()))
}

#[tokio::main]
async fn main() -> Result<()> {
    load_env_file();
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::Ask(_) => {
            let client = http_client()?;
            let bench = build_bench(&client)?;
            let agent = build_agent(&client, &bench)?;

            let question = bench.random_question().await?;
            println!("TASK ID: {}", question.task_id);
            println!("QUESTION:\n{}\n", question.text);
            if let Some(file_name) = &question.file_name {
                println!("FILE: {file_name}\n");
            }

            let answered = agent.answer(&question).await?;
            println!("ANSWER:\n{}\n", answered.answer);
            println!("REASONING TRACE:\n{}", answered.reasoning_trace);
        }
        Commands::Batch(args) => {
            let (records, path, asked) =
                run_batch_to_artifact(args.out, args.now_epoch_s, args.max_questions).await?;
            println!("{}", path.display());
            eprintln!(
                "answered {} of {} questions -> {}",
                records.len(),
                asked,
                path.display()
            );
        }
        Commands::Submit(args) => {
            let (records, path, _) =
                run_batch_to_artifact(args.out, args.now_epoch_s, None).await?;
            eprintln!("artifact: {}", path.display());

            let client = http_client()?;
            let bench = build_bench(&client)?;
            let outcome = bench
                .submit(&args.username, &args.agent_code, &records)
                .await?;
            println!(
                "{}",
                serde_json::json!({
                    "submitted": records.len(),
                    "score": outcome.score,
                    "correct_count": outcome.correct_count,
                    "total_attempted": outcome.total_attempted,
                    "message": outcome.message,
                })
            );
        }
        Commands::Calc(args) => {
            println!("{}", qapipe_local::calculator::evaluate(&args.expression)?);
        }
        Commands::Doctor(args) => {
            let report = DoctorReport {
                schema_version: 1,
                llm_key: env_present(&["QAPIPE_LLM_API_KEY", "HF_API_TOKEN"]),
                tavily_key: env_present(&["QAPIPE_TAVILY_API_KEY", "TAVILY_API_KEY"]),
                bench_api_url: env_present(&["QAPIPE_BENCH_API_URL"]),
            };
            if args.output == "text" {
                let flag = |ok: bool| if ok { "configured" } else { "NOT FOUND" };
                println!("llm key: {}", flag(report.llm_key));
                println!("tavily key: {}", flag(report.tavily_key));
                println!("bench api url: {}", flag(report.bench_api_url));
            } else {
                println!("{}", serde_json::to_string(&report)?);
            }
        }
        Commands::Version(args) => {
            if args.output == "text" {
                println!("qapipe {}", env!("CARGO_PKG_VERSION"));
            } else {
                println!(
                    "{}",
                    serde_json::json!({
                        "name": "qapipe",
                        "version": env!("CARGO_PKG_VERSION"),
                    })
                );
            }
        }
    }

    Ok(())
}

/// Configuration presence only; values never leave the process.
#[derive(Debug, serde::Serialize)]
struct DoctorReport {
    schema_version: u32,
    llm_key: bool,
    tavily_key: bool,
    bench_api_url: bool,
}

fn env_present(keys: &[&str]) -> bool {
    keys.iter().any(|k| {
        std::env::var(k)
            .map(|v| !v.trim().is_empty())
            .unwrap_or(false)
    })
}
