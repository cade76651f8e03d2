/*
dailybrief - main.rs
Runs one daily brief: collect feeds, summarize with the model fallback list, write the
markdown report and deliver it to the chat. Meant to be triggered by cron or CI.
*/

use anyhow::Context;
use chrono::Local;
use clap::Parser;
use common::{Config, Credentials};
use std::path::PathBuf;
use tracing::{error, info};
use tracing_subscriber::{fmt, EnvFilter};

use dailybrief::pipeline::{Pipeline, RunOutcome};

#[derive(Parser, Debug)]
#[command(name = "dailybrief", about = "Daily economy news brief")]
struct Args {
    /// Path to config.toml (defaults to ./config.toml when present)
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Override log level (info, debug, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Write the report but do not send anything (Telegram credentials not required)
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let filter = EnvFilter::try_new(&args.log_level).unwrap_or_else(|_| EnvFilter::new("info"));
    fmt().with_env_filter(filter).init();

    if let Err(e) = run(args).await {
        error!("run failed: {:#}", e);
        return Err(e);
    }
    Ok(())
}

async fn run(args: Args) -> anyhow::Result<()> {
    // A missing .env is fine; variables may come from the environment directly
    if let Ok(path) = dotenv::dotenv() {
        info!(path = %path.display(), "loaded .env");
    }

    let default_path = PathBuf::from("config.default.toml");
    let override_path = match args.config {
        Some(p) if !p.exists() => {
            anyhow::bail!("Config file not found: {}", p.display());
        }
        Some(p) => Some(p),
        None => Some(PathBuf::from("config.toml")).filter(|p| p.exists()),
    };

    let config = Config::load_with_defaults(
        Some(&default_path).filter(|p| p.exists()).map(|p| p.as_path()),
        override_path.as_deref(),
    )
    .await
    .context("failed to load configuration")?;
    info!(default = ?default_path, override = ?override_path, channel = ?config.notify.channel, "configuration loaded");

    let credentials = Credentials::from_env(&config, !args.dry_run)?;

    let pipeline = Pipeline::new(config, &credentials).dry_run(args.dry_run);
    match pipeline.run(Local::now().date_naive()).await? {
        RunOutcome::NoNews => info!("no news today, nothing delivered"),
        RunOutcome::Completed(summary) => info!(
            path = %summary.report_path.display(),
            items = summary.items,
            model = summary.model.as_deref().unwrap_or("none"),
            delivered = summary.delivered,
            "daily brief complete"
        ),
    }
    Ok(())
}
