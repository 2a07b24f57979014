//! examprep CLI: timed practice tests in the terminal.

use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "examprep", version, about = "Timed exam practice tests")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Take a timed test
    Take {
        /// Path to the test definition JSON
        #[arg(long)]
        test: PathBuf,

        /// Stored learner session JSON (overrides learner_file in config)
        #[arg(long)]
        learner: Option<PathBuf>,

        /// Also save the submission to this file
        #[arg(long)]
        save: Option<PathBuf>,

        /// Config file path
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Validate test definition files
    Validate {
        /// Path to a test definition or a directory of them
        #[arg(long)]
        test: PathBuf,
    },

    /// Review a submitted attempt
    Review {
        /// Submission JSON (as written to the outbox)
        #[arg(long)]
        result: PathBuf,

        /// Test definition, for the per-subject breakdown
        #[arg(long)]
        test: Option<PathBuf>,

        /// Output format: text, json, markdown
        #[arg(long, default_value = "text")]
        format: String,
    },

    /// Create starter config and a sample test
    Init,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("examprep=info")),
        )
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Take {
            test,
            learner,
            save,
            config,
        } => commands::take::execute(test, learner, save, config).await,
        Commands::Validate { test } => commands::validate::execute(test),
        Commands::Review {
            result,
            test,
            format,
        } => commands::review::execute(result, test, format),
        Commands::Init => commands::init::execute(),
    };

    if let Err(e) = result {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}
