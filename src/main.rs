use alarmetl::alarm::event::Stage;
use alarmetl::storage::traits::{EventFilter, Table};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "alarmetl")]
#[command(about = "Alarm log extraction and loading", long_about = None)]
struct Cli {
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Read, parse and load every log file once
    Run,
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
    /// Show stored events, newest first
    Query {
        /// CFN, ACK, OK or the full stage name
        #[arg(long)]
        stage: Option<Stage>,
        #[arg(long)]
        device: Option<String>,
        #[arg(long)]
        alarm: Option<String>,
        #[arg(long)]
        file: Option<String>,
        #[arg(long, default_value_t = 50)]
        limit: usize,
        /// One JSON object per line
        #[arg(long)]
        json: bool,
    },
    /// Show recorded run statistics, newest first
    History {
        #[arg(long, default_value_t = 20)]
        limit: usize,
        #[arg(long)]
        json: bool,
    },
    /// Delete every row of a table (events or statistics)
    Clear { table: Table },
}

#[derive(Subcommand)]
enum ConfigAction {
    Init {
        #[arg(long)]
        stdout: bool,
    },
    Validate,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing subscriber
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "alarmetl=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    let config_path = alarmetl::config::resolve_config_path(cli.config.as_deref());

    match cli.command {
        Some(Commands::Run) | None => {
            // Default behavior is to run
            alarmetl::cli::run::run(config_path).await?;
        }
        Some(Commands::Config { action }) => match action {
            ConfigAction::Init { stdout } => {
                alarmetl::cli::config::init(stdout)?;
            }
            ConfigAction::Validate => {
                alarmetl::cli::config::validate(config_path)?;
            }
        },
        Some(Commands::Query {
            stage,
            device,
            alarm,
            file,
            limit,
            json,
        }) => {
            let filter = EventFilter {
                stage,
                device_id: device,
                alarm_code: alarm,
                source_file: file,
            };
            alarmetl::cli::query::query(config_path, filter, limit, json).await?;
        }
        Some(Commands::History { limit, json }) => {
            alarmetl::cli::query::history(config_path, limit, json).await?;
        }
        Some(Commands::Clear { table }) => {
            alarmetl::cli::query::clear(config_path, table).await?;
        }
    }

    Ok(())
}
