use clap::{Parser, Subcommand};
use crime_grouping::config::resolve_config_path;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "crime-grouping")]
#[command(about = "Groups citizen crime reports into crimes by submitter session", long_about = None)]
struct Cli {
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Assign cluster ids to JSON-lines reports and print them to stdout
    Run {
        /// Read reports from this file instead of stdin
        #[arg(long)]
        input: Option<PathBuf>,
    },
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
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
    // Logs go to stderr, stdout carries the assigned reports
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "crime_grouping=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    let config_path = resolve_config_path(cli.config.as_deref());

    match cli.command {
        Some(Commands::Run { input }) => {
            crime_grouping::cli::run::run(config_path, input).await?;
        }
        None => {
            crime_grouping::cli::run::run(config_path, None).await?;
        }
        Some(Commands::Config { action }) => match action {
            ConfigAction::Init { stdout } => {
                crime_grouping::cli::config::init(stdout)?;
            }
            ConfigAction::Validate => {
                crime_grouping::cli::config::validate(config_path)?;
            }
        },
    }

    Ok(())
}
