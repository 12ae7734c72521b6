use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

mod commands;

#[derive(Parser, Debug)]
#[command(
    name = "quarry",
    version,
    about = "Answer natural-language questions from a live Postgres schema"
)]
struct Cli {
    /// Configuration file. Defaults to ./quarry.yaml when present.
    #[arg(long, short = 'c', env = "QUARRY_CONFIG", global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the database context block for a question.
    Ask {
        question: String,

        /// The question is not about the database; print an empty context.
        #[arg(long, default_value_t = false)]
        no_db: bool,
    },

    /// Print the discovered catalog.
    Catalog {
        /// Only show this table.
        #[arg(long)]
        table: Option<String>,

        /// Print the catalog as JSON.
        #[arg(long, default_value_t = false)]
        json: bool,
    },

    /// Show the classification and SQL for a question without running it.
    Plan {
        question: String,

        /// Print the plan as JSON.
        #[arg(long, default_value_t = false)]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Logs go to stderr so stdout carries only the rendered output.
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = commands::load_config(cli.config.as_deref())?;

    match cli.cmd {
        Command::Ask { question, no_db } => commands::ask::run(&config, &question, !no_db).await,
        Command::Catalog { table, json } => {
            commands::catalog::run(&config, table.as_deref(), json).await
        }
        Command::Plan { question, json } => commands::plan::run(&config, &question, json).await,
    }
}
