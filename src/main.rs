use anyhow::Result;
use clap::{Parser, Subcommand};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use epg_merge::{
    config::Config,
    errors::AppError,
    job_scheduling::{JobController, JobScheduler, JobTrigger},
    models::JobStatus,
};

#[derive(Parser)]
#[command(name = "epg-merge")]
#[command(version)]
#[command(about = "Scheduled merging of XMLTV guide feeds into a single filtered file")]
#[command(long_about = None)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, default_value = "config.toml")]
    config: String,

    /// Log level (overrides config file)
    #[arg(short = 'v', long)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the scheduler until interrupted (default)
    Run,
    /// Run one merge now and exit
    Merge,
    /// Delete archived outputs past the retention window
    Sweep,
    /// Print recent merge jobs
    History {
        #[arg(short, long)]
        limit: Option<u64>,
    },
    /// Delete merged files left in the temp directory
    ClearTemp,
}

fn init_logging(level: &str, format: &str) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| format!("epg_merge={level}").into());

    let registry = tracing_subscriber::registry().with(filter);
    if format.eq_ignore_ascii_case("json") {
        registry
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = Config::load_from_file(&cli.config)?;
    let level = cli.log_level.as_deref().unwrap_or(&config.logging.level);
    init_logging(level, &config.logging.format);

    info!("Starting EPG Merge v{}", env!("CARGO_PKG_VERSION"));
    info!("Configuration loaded from: {}", cli.config);

    let controller = JobController::open(&config).await?;

    match cli.command.unwrap_or(Command::Run) {
        Command::Run => run_scheduler(controller).await?,
        Command::Merge => {
            let record = controller
                .run_attempt(JobTrigger::Manual)
                .await
                .map_err(AppError::from)?;
            println!("{}", serde_json::to_string_pretty(&record)?);
            if record.status != JobStatus::Success {
                std::process::exit(1);
            }
        }
        Command::Sweep => {
            let deleted = controller.sweep_archives().await?;
            println!("Deleted {deleted} archived files");
        }
        Command::History { limit } => {
            let jobs = controller.history(limit).await?;
            println!("{}", serde_json::to_string_pretty(&jobs)?);
        }
        Command::ClearTemp => {
            let cleanup = controller.clear_temp_files()?;
            println!(
                "Deleted {} temp files, freed {:.2}MB",
                cleanup.deleted, cleanup.freed_mb
            );
        }
    }

    Ok(())
}

async fn run_scheduler(controller: Arc<JobController>) -> Result<()> {
    let cancellation_token = CancellationToken::new();
    let scheduler = JobScheduler::new(controller.clone());
    let scheduler_task = tokio::spawn({
        let token = cancellation_token.clone();
        async move { scheduler.run(token).await }
    });

    tokio::signal::ctrl_c().await?;
    info!("Shutdown requested");
    controller.cancel();
    cancellation_token.cancel();

    if let Err(e) = scheduler_task.await {
        error!("Scheduler task ended abnormally: {}", e);
    }
    info!("EPG Merge stopped");
    Ok(())
}
