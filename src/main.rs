//! db-record - Main entry point.
//!
//! Loads or stores fields of one database row and prints the outcome as JSON.

use db_record::config::{Command, Config};
use db_record::{ConnectionPool, DbError, RecordAccessor};
use serde_json::json;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Initialize the tracing subscriber for logging.
fn init_tracing(config: &Config) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    let subscriber = tracing_subscriber::registry().with(filter);

    if config.json_logs {
        subscriber
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        subscriber
            .with(
                fmt::layer()
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_writer(std::io::stderr),
            )
            .init();
    }
}

async fn run(accessor: &RecordAccessor, command: &Command) -> Result<serde_json::Value, DbError> {
    match command {
        Command::Load { fields } => {
            let record = accessor.load(fields.as_slice()).await?;
            Ok(json!(record))
        }
        Command::Store { values } => {
            let stored = accessor.store(values.iter().cloned()).await?;
            Ok(json!({ "stored": stored }))
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::parse_args();

    if config.enable_logs {
        init_tracing(&config);
    }

    info!("Starting db-record v{}", env!("CARGO_PKG_VERSION"));

    let pool = Arc::new(ConnectionPool::new());
    let mut accessor = RecordAccessor::new(config.accessor_config(), Arc::clone(&pool)).await?;

    let result = run(&accessor, &config.command).await;

    accessor.release_connection().await;
    pool.close_all().await;

    match result {
        Ok(output) => {
            println!("{}", serde_json::to_string_pretty(&output)?);
            Ok(())
        }
        Err(e) => {
            error!(error = %e, "Command failed");
            if let Some(suggestion) = e.suggestion() {
                eprintln!("Hint: {suggestion}");
            }
            Err(e.into())
        }
    }
}
