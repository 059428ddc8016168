use anyhow::Context;
use batchboard::clock::SystemClock;
use batchboard::config::{Config, DEFAULT_DAYS};
use batchboard::context::{ExecutionContext, ExecutionContextDecoder};
use batchboard::db;
use batchboard::jobs::model::{JobExecutionsParams, JobInstancesParams};
use batchboard::jobs::{BatchRepo, JobStatus, QueryEngine, StatisticsEngine};
use batchboard::logging::init_logging;
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::io::Read;
use std::sync::Arc;

/// Read-only inspection of Spring Batch metadata tables.
///
/// Uses DATABASE_URL (and the other BATCHBOARD_* settings) like the server.
#[derive(Debug, Parser)]
#[command(name = "batchctl", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(flatten)]
    Report(Report),
    /// Decode a base64 execution context offline; `-` reads stdin.
    Decode { blob: String },
}

/// Commands that read from the database.
#[derive(Debug, Subcommand)]
enum Report {
    /// List job instances, newest first.
    Instances {
        #[arg(long)]
        job_name: Option<String>,
        #[arg(long)]
        page: Option<i64>,
        #[arg(long)]
        size: Option<i64>,
    },
    /// Show one job instance with its executions.
    Instance { id: i64 },
    /// List job executions.
    Executions {
        #[arg(long)]
        job_name: Option<String>,
        /// COMPLETED, FAILED, STARTED, ...
        #[arg(long)]
        status: Option<String>,
        /// Lower bound on start time, e.g. 2024-01-15T00:00
        #[arg(long)]
        from: Option<String>,
        #[arg(long)]
        to: Option<String>,
        #[arg(long)]
        page: Option<i64>,
        #[arg(long)]
        size: Option<i64>,
    },
    /// Show one job execution with parameters and steps.
    Execution { id: i64 },
    /// Show one step execution with its decoded context.
    Step { id: i64 },
    /// Dashboard-wide statistics.
    Stats {
        #[arg(long, default_value_t = DEFAULT_DAYS)]
        days: i64,
    },
    /// Statistics for a single job name.
    JobStats { name: String },
    /// Executions per job over the last N days.
    Recent {
        #[arg(long, default_value_t = DEFAULT_DAYS)]
        days: i64,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logging();
    match Cli::parse().command {
        Command::Decode { blob } => decode(&blob),
        Command::Report(report) => run(report).await,
    }
}

async fn run(report: Report) -> anyhow::Result<()> {
    let cfg = Config::from_env()?;
    let pool = db::make_pool(&cfg).await?;
    let repo = BatchRepo::new(pool);
    let queries = QueryEngine::new(repo.clone());
    let statistics = StatisticsEngine::new(repo, Arc::new(SystemClock));

    match report {
        Report::Instances {
            job_name,
            page,
            size,
        } => {
            let params = JobInstancesParams {
                job_name,
                page,
                size,
                sort: None,
            };
            print_json(&queries.find_job_instances(&params).await?)
        }
        Report::Instance { id } => print_found(
            queries.get_job_instance_detail(id).await?,
            format!("Job instance not found (jobInstanceId: {id})"),
        ),
        Report::Executions {
            job_name,
            status,
            from,
            to,
            page,
            size,
        } => {
            let status = status
                .map(|s| s.trim().to_ascii_uppercase().parse::<JobStatus>())
                .transpose()?;
            let params = JobExecutionsParams {
                job_name,
                status,
                start_date_from: from.as_deref().map(date_time).transpose()?,
                start_date_to: to.as_deref().map(date_time).transpose()?,
                page,
                size,
                sort: None,
            };
            print_json(&queries.find_job_executions(&params).await?)
        }
        Report::Execution { id } => print_found(
            queries.get_job_execution_detail(id).await?,
            format!("Job execution not found (jobExecutionId: {id})"),
        ),
        Report::Step { id } => print_found(
            queries.get_step_execution_detail(id).await?,
            format!("Step execution not found (stepExecutionId: {id})"),
        ),
        Report::Stats { days } => print_json(&statistics.get_job_statistics(days).await?),
        Report::JobStats { name } => print_found(
            statistics.get_job_statistics_by_job_name(&name).await?,
            format!("Job statistics not found (jobName: {name})"),
        ),
        Report::Recent { days } => print_json(&statistics.get_job_execution_stats(days).await?),
    }
}

fn date_time(raw: &str) -> anyhow::Result<chrono::NaiveDateTime> {
    batchboard::jobs::model::parse_local_date_time(raw)
        .with_context(|| format!("invalid date-time {raw:?}"))
}

fn decode(blob: &str) -> anyhow::Result<()> {
    let text = if blob == "-" {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .context("read context from stdin")?;
        buf
    } else {
        blob.to_string()
    };

    let context = ExecutionContext {
        short_context: String::new(),
        serialized_context: Some(text),
    };
    let items = ExecutionContextDecoder::new()
        .decode(&context)
        .context("decode execution context")?;
    print_json(&items)
}

fn print_found<T: Serialize>(value: Option<T>, missing: String) -> anyhow::Result<()> {
    match value {
        Some(v) => print_json(&v),
        None => anyhow::bail!(missing),
    }
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
