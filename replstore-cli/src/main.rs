use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use replstore_core::config::Config;
use replstore_core::logging::{init_logging_with_config, LogConfig, LogLevel};
use replstore_core::metrics::describe_metrics;
use replstore_core::StoreRole;
use std::path::PathBuf;
use std::time::Duration;
use tracing::info;

mod query;

#[derive(Parser, Debug)]
#[command(name = "replstore")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Set the log level (trace, debug, info, warn, error)
    #[arg(short, long)]
    log_level: Option<String>,

    /// Enable JSON formatted logging
    #[arg(long)]
    json_logs: bool,

    /// TOML configuration file. Environment variables are used when absent.
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Look up keys in a store and print one JSON line per key
    Query {
        /// Store name
        store: String,

        /// Keys to look up. Parsed as JSON, plain strings otherwise.
        #[arg(required = true)]
        keys: Vec<String>,

        /// Role of the handle issuing the lookups
        #[arg(long, default_value = "owner")]
        role: StoreRole,

        /// JSON object file whose entries seed the owner
        #[arg(long)]
        seed: Option<PathBuf>,

        /// Per-lookup timeout
        #[arg(long, value_parser = humantime::parse_duration, default_value = "5s")]
        timeout: Duration,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => Config::from_file(path)
            .with_context(|| format!("loading config from {}", path.display()))?,
        None => Config::from_env()?,
    };

    let level: LogLevel = args.log_level.as_deref().unwrap_or(&config.logging.level).parse()?;
    let log_config = LogConfig::new(level)
        .with_timestamp(config.logging.with_timestamp)
        .with_target(config.logging.with_target)
        .json_format(args.json_logs || config.logging.json_format);
    init_logging_with_config(log_config)?;
    describe_metrics();

    match args.command {
        Command::Query { store, keys, role, seed, timeout } => {
            info!(store = %store, role = %role, keys = keys.len(), "Running query");

            let seed = seed.map(|path| query::load_seed(&path)).transpose()?;
            let request = query::QueryRequest {
                store,
                role,
                keys: keys.iter().map(|k| query::parse_key(k)).collect(),
                seed: seed.unwrap_or_default(),
                timeout,
            };

            for line in query::run(&config, request).await? {
                println!("{}", line);
            }
        }
    }

    Ok(())
}
