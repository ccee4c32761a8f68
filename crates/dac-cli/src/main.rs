use std::path::PathBuf;

use clap::{Parser, Subcommand};
use dac_core::DacConfig;
use tracing_subscriber::EnvFilter;

mod commands;

use commands::{OutputFormat, SourceArgs};

#[derive(Parser, Debug)]
#[command(name = "dac", version, about = "Plan foreign-key joins between database tables")]
struct Cli {
    /// Path to the configuration file. Defaults apply when it does not exist.
    #[arg(long, global = true, default_value = "dac.yaml")]
    config: PathBuf,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the joins connecting two or more tables.
    JoinPath {
        #[command(flatten)]
        source: SourceArgs,

        /// Tables to connect. Use `schema.table` names for live databases.
        #[arg(required = true, num_args = 2..)]
        tables: Vec<String>,

        #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },

    /// Capture a database's tables and foreign keys as a JSON snapshot.
    Snapshot {
        /// Configured database name
        #[arg(long)]
        database: String,

        /// Output file (stdout when omitted)
        #[arg(long)]
        out: Option<PathBuf>,
    },

    /// Summarize the foreign-key graph of a database or snapshot.
    Graph {
        #[command(flatten)]
        source: SourceArgs,

        #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },

    /// List the configured databases.
    Databases,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = DacConfig::load_or_default(&cli.config)?;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.observability.log_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.cmd {
        Command::JoinPath {
            source,
            tables,
            format,
        } => commands::join_path::run(&config, &source, &tables, format).await?,

        Command::Snapshot { database, out } => {
            commands::snapshot::run(&config, &database, out.as_deref()).await?
        }

        Command::Graph { source, format } => commands::graph::run(&config, &source, format).await?,

        Command::Databases => commands::databases::run(&config),
    }

    Ok(())
}
