//! CLI for the EDA triage bot.

mod commands;
mod config;
mod context;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use config::Settings;

#[derive(Parser)]
#[command(name = "triage-bot")]
#[command(about = "Durable EDA triage orchestration over Matrix", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP API (webhook, login, widget, admin).
    Serve {
        #[arg(short, long, default_value = "8080")]
        port: u16,
        #[arg(short = 'H', long, default_value = "127.0.0.1")]
        host: String,
    },
    /// Run boot recovery and the queue worker loop.
    Worker,
    /// Run the Matrix listener (Room-1 intake, Room-2/3 replies).
    Listener,
    /// One scheduler pass for the previous Room-4 summary window.
    SchedulerOnce,
    /// Create the bootstrap admin account if no active admin exists.
    BootstrapAdmin,
    /// Seed a prompt template version from a file and activate it.
    SeedPrompt {
        /// Prompt name (llm1_system, llm1_user, llm2_system, llm2_user).
        name: String,
        /// Path to the prompt content file.
        file: std::path::PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let settings = Settings::load()?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env().add_directive(settings.log_level.parse()?),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Serve { port, host } => {
            commands::serve::run(&settings, &host, port).await?;
        }
        Commands::Worker => {
            commands::worker::run(&settings).await?;
        }
        Commands::Listener => {
            commands::listener::run(&settings).await?;
        }
        Commands::SchedulerOnce => {
            commands::scheduler::run_once(&settings).await?;
        }
        Commands::BootstrapAdmin => {
            commands::bootstrap::run(&settings).await?;
        }
        Commands::SeedPrompt { name, file } => {
            commands::bootstrap::seed_prompt(&settings, &name, &file).await?;
        }
    }

    Ok(())
}
