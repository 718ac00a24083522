//! chartqa CLI - Command-line interface
//!
//! Usage:
//!   chartqa ask <question>
//!   chartqa agent <question> [--data <path>] [--max-iterations <n>]
//!   chartqa inspect [--data <path>] [--rows <n>]
//!
//! Author: hephaex@gmail.com

use anyhow::Context;
use chartqa_agent::{Table, TabularService};
use chartqa_core::{AnswerService, AppConfig};
use chartqa_llm::{create_llm_client, CompletionService};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "chartqa")]
#[command(about = "Ask questions of a language model or a CSV data file")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Ask the language model directly
    Ask {
        /// Question to ask
        question: String,
    },
    /// Ask the tabular agent about the data file
    Agent {
        /// Question to ask
        question: String,
        /// CSV file to answer from
        #[arg(long)]
        data: Option<PathBuf>,
        /// Reason/act iteration limit
        #[arg(long)]
        max_iterations: Option<usize>,
    },
    /// Print column summaries and the first rows of the data file
    Inspect {
        /// CSV file to inspect
        #[arg(long)]
        data: Option<PathBuf>,
        /// Number of rows to preview
        #[arg(long, default_value_t = 5)]
        rows: usize,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    let mut config = AppConfig::load()?;

    // Logs go to stderr so answers can be piped
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("chartqa_agent={0},chartqa_llm={0}", config.logging.level).into()),
        )
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Ask { question } => {
            config.validate()?;
            let llm = create_llm_client(&config.llm)?;
            let answer = CompletionService::new(llm).answer(&question).await?;
            println!("{answer}");
        }
        Commands::Agent {
            question,
            data,
            max_iterations,
        } => {
            if let Some(data) = data {
                config.agent.data_path = data;
            }
            if let Some(max_iterations) = max_iterations {
                config.agent.max_iterations = max_iterations;
            }
            config.validate()?;

            let llm = create_llm_client(&config.agent_llm())?;
            let answer = TabularService::new(llm, &config.agent)
                .answer(&question)
                .await?;
            println!("{answer}");
        }
        Commands::Inspect { data, rows } => {
            let path = data.unwrap_or(config.agent.data_path);
            let table = Table::from_path(&path)
                .with_context(|| format!("Failed to load {}", path.display()))?;

            println!("{}: {} rows, {} columns", path.display(), table.len(), table.columns().len());
            println!();
            for summary in table.describe() {
                println!("  {summary}");
            }
            println!();
            println!("{}", table.to_markdown(rows));
        }
    }

    Ok(())
}
