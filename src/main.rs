use std::path::PathBuf;

use clap::{Parser, Subcommand};
use uc_pairing_lib::bootstrap;

#[derive(Parser)]
#[command(name = "uc-pairing")]
#[command(about = "UniClipboard device pairing coordinator", long_about = None)]
struct Cli {
    /// Path to the TOML config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Pair with devices: user actions and verification events on stdin
    Run,
    /// Run the first-run setup flow
    Setup {
        /// Override the setup status file
        #[arg(long)]
        status_file: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let mut config = bootstrap::resolve_config(cli.config.as_deref())?;

    if let Err(err) = bootstrap::tracing::init_tracing_subscriber(&config) {
        eprintln!("Failed to initialize tracing: {err}");
    }

    match cli.command.unwrap_or(Commands::Run) {
        Commands::Run => bootstrap::run_pairing(&config).await,
        Commands::Setup { status_file } => {
            if status_file.is_some() {
                config.setup_status_file = status_file;
            }
            bootstrap::run_setup(&config).await
        }
    }
}
