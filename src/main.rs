use std::path::PathBuf;

use anyhow::Result;
use chrono::Utc;
use clap::{Parser, Subcommand};
use keepalive::config::{KeepaliveConfig, LogFormat, LoggingConfig};
use keepalive::runner::{run_and_record, Runner};
use keepalive::scheduler::KeepaliveSchedule;
use keepalive::storage::history::{RunSource, RunStatus};

#[derive(Parser)]
#[command(
    name = "keepalive",
    about = "Scheduled keep-alive checks for a cloud platform account",
    version,
    long_about = None
)]
struct Cli {
    /// Path to a TOML config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the daemon (API server + dashboard + scheduler)
    Serve {
        /// Bind address (overrides server.bind)
        #[arg(long)]
        bind: Option<String>,
    },

    /// Run one keep-alive check now
    Run {
        /// Don't record the result in the history
        #[arg(long)]
        no_record: bool,

        /// JSON output for machine parsing
        #[arg(long)]
        json: bool,
    },

    /// Show the recorded run history
    History {
        /// JSON output for machine parsing
        #[arg(long)]
        json: bool,
    },

    /// Preview what will run in the next N hours
    SchedulePreview {
        /// Hours to preview
        #[arg(long, default_value = "24")]
        hours: u64,
    },
}

fn init_logging(logging: &LoggingConfig) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&logging.level));

    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    match logging.format {
        LogFormat::Json => builder.json().init(),
        LogFormat::Text => builder.init(),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let mut config = KeepaliveConfig::resolve(cli.config.as_deref())?;

    init_logging(&config.logging);

    match cli.command {
        Commands::Serve { bind } => {
            if let Some(bind) = bind {
                config.server.bind = bind;
                config.validate()?;
            }
            tracing::info!(bind = %config.server.bind, "Starting keepalive daemon");
            keepalive::serve(config).await?;
        }
        Commands::Run { no_record, json } => {
            let runner = Runner::new(config.runner_settings())?;
            let history = if no_record {
                None
            } else {
                keepalive::open_history(&config)
            };

            let result = run_and_record(&runner, history.as_ref(), RunSource::Manual).await;

            if json {
                println!("{}", serde_json::to_string_pretty(&result)?);
            } else {
                println!("\n=== Keep-alive Run ===");
                println!("Result: {}", if result.success { "SUCCESS" } else { "ERROR" });
                for line in &result.messages {
                    println!(" - {}", line);
                }
                println!();
            }

            if !result.success {
                anyhow::bail!("keep-alive check failed");
            }
        }
        Commands::History { json } => {
            // Reading must not create the database as a side effect.
            let records = if config.history.db_path.exists() {
                keepalive::open_history(&config)
                    .map(|history| history.list())
                    .unwrap_or_default()
            } else {
                Vec::new()
            };

            if json {
                println!("{}", serde_json::to_string_pretty(&records)?);
            } else if records.is_empty() {
                println!("No runs recorded.");
            } else {
                println!("{:<26} | {:<7} | {:<9} | Summary", "Timestamp", "Status", "Source");
                println!("{:-<26}-|-{:-<7}-|-{:-<9}-|-{:-<40}", "", "", "", "");
                for record in records {
                    let status = match record.status {
                        RunStatus::Success => "OK",
                        RunStatus::Error => "ERROR",
                    };
                    let source = record
                        .source
                        .map(|s| s.to_string())
                        .unwrap_or_else(|| "-".to_string());
                    let summary = record
                        .messages
                        .iter()
                        .rev()
                        .nth(1)
                        .or_else(|| record.messages.first())
                        .cloned()
                        .unwrap_or_default();
                    println!(
                        "{:<26} | {:<7} | {:<9} | {}",
                        record.timestamp, status, source, summary
                    );
                }
            }
        }
        Commands::SchedulePreview { hours } => {
            if !config.schedule.enabled {
                println!("Scheduled runs are disabled.");
                return Ok(());
            }
            let schedule = KeepaliveSchedule::parse(&config.schedule.cron)?;
            let preview = schedule.preview(Utc::now(), hours);
            if preview.is_empty() {
                println!("No runs scheduled in next {} hours.", hours);
            } else {
                println!("Upcoming runs (next {} hours, cron '{}'):", hours, schedule.expr());
                for time in preview {
                    println!("{}", time.to_rfc3339());
                }
            }
        }
    }

    Ok(())
}
