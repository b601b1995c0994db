//! docsage CLI, the main entry point.
//!
//! Commands:
//! - `ask`: Answer one documentation question
//! - `init`: Write the default config
//! - `doctor`: Check config, API keys and the local index

use clap::{Parser, Subcommand};
use docsage_core::RetrievalMode;

mod commands;

#[derive(Parser)]
#[command(
    name = "docsage",
    about = "docsage: agentic documentation assistant",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging and step-by-step progress
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Ask a question about the framework documentation
    Ask {
        /// The question to answer
        question: String,

        /// Retrieval mode: local (offline index) or web (online search)
        #[arg(short, long)]
        mode: Option<RetrievalMode>,

        /// Do not write run artifacts to the output directory
        #[arg(long)]
        no_save: bool,

        /// Override agent.max_retrieval_attempts
        #[arg(long)]
        max_retrieval_attempts: Option<u32>,

        /// Override agent.max_quality_attempts
        #[arg(long)]
        max_quality_attempts: Option<u32>,

        /// Override agent.max_total_iterations
        #[arg(long)]
        max_iterations: Option<u32>,

        /// Override agent.quality_threshold (0-10)
        #[arg(long)]
        threshold: Option<u8>,
    },

    /// Write the default configuration
    Init,

    /// Diagnose configuration and retrieval backends
    Doctor,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize tracing
    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .init();

    match cli.command {
        Commands::Ask {
            question,
            mode,
            no_save,
            max_retrieval_attempts,
            max_quality_attempts,
            max_iterations,
            threshold,
        } => {
            let options = commands::ask::AskOptions {
                question,
                mode,
                save: !no_save,
                max_retrieval_attempts,
                max_quality_attempts,
                max_iterations,
                threshold,
                verbose: cli.verbose,
            };
            commands::ask::run(options).await?
        }
        Commands::Init => commands::init::run().await?,
        Commands::Doctor => commands::doctor::run().await?,
    }

    Ok(())
}
