mod cli;
mod core;

use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::core::composer::RunStatus;

#[derive(Parser)]
#[command(name = "costreport", about = "Daily GCP billing digest for Slack", version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Config file (default: $XDG_CONFIG_HOME/costreport/config.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Debug logging to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Only log warnings and errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    quiet: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Query billing data and post the report to Slack
    Run,
    /// Query billing data and print the messages instead of posting them
    Preview {
        /// Report date (default: the day before yesterday)
        #[arg(short, long)]
        date: Option<NaiveDate>,
    },
    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Generate default config file
    Init,
    /// Validate config file and environment
    Check,
}

fn init_logging(verbose: bool, quiet: bool) {
    let filter = if verbose {
        EnvFilter::new("costreport=debug")
    } else if quiet {
        EnvFilter::new("warn")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("costreport=info"))
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.quiet);
    let config_path = cli.config.as_deref();

    let status = match cli.command {
        None | Some(Commands::Run) => cli::report_cmd::run(config_path).await?,
        Some(Commands::Preview { date }) => cli::report_cmd::preview(config_path, date).await?,
        Some(Commands::Config { action }) => {
            match action {
                ConfigAction::Init => cli::config_cmd::init(config_path)?,
                ConfigAction::Check => cli::config_cmd::check(config_path)?,
            }
            return Ok(());
        }
    };

    println!("{}", status);
    if status == RunStatus::Error {
        std::process::exit(1);
    }
    Ok(())
}
