//! Command-line configuration for the `db-record` binary.
//!
//! Connection settings come from CLI flags with `DB_RECORD_*` environment
//! variable fallbacks and are turned into an [`AccessorConfig`].

use crate::models::{AccessorConfig, FieldValue};
use clap::{Parser, Subcommand};

pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Load or store fields of a single database row.
#[derive(Parser, Debug, Clone)]
#[command(name = "db-record")]
#[command(author, version, about, long_about = None)]
pub struct Config {
    /// Database driver (mysql, mariadb, pg, postgres, postgresql, sqlite)
    #[arg(long, env = "DB_RECORD_DRIVER")]
    pub driver: Option<String>,

    /// Database host
    #[arg(long, env = "DB_RECORD_HOST")]
    pub host: Option<String>,

    /// Database name (file path for SQLite)
    #[arg(long, env = "DB_RECORD_DATABASE")]
    pub database: Option<String>,

    /// User to connect as
    #[arg(short, long, env = "DB_RECORD_USER")]
    pub user: Option<String>,

    /// Password (sensitive - not logged)
    #[arg(long, env = "DB_RECORD_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,

    /// Driver connection option, passed through to the connection URL.
    /// Can be specified multiple times.
    #[arg(
        short = 'o',
        long = "option",
        value_name = "KEY=VALUE",
        value_parser = parse_key_value
    )]
    pub options: Vec<(String, String)>,

    /// Table holding the record
    #[arg(short, long, env = "DB_RECORD_TABLE")]
    pub table: Option<String>,

    /// Equality condition selecting the record.
    /// Can be specified multiple times; conditions are joined with AND.
    #[arg(
        short = 'w',
        long = "where",
        value_name = "COLUMN=VALUE",
        value_parser = parse_assignment
    )]
    pub predicate: Vec<(String, FieldValue)>,

    /// Open a dedicated connection instead of a shared one
    #[arg(long)]
    pub private: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = DEFAULT_LOG_LEVEL, env = "DB_RECORD_LOG_LEVEL")]
    pub log_level: String,

    /// Enable JSON logging format
    #[arg(long, env = "DB_RECORD_JSON_LOGS")]
    pub json_logs: bool,

    /// Enable logging output on stderr
    #[arg(long, env = "DB_RECORD_ENABLE_LOGS")]
    pub enable_logs: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Command {
    /// Print the named fields of the record as JSON
    Load {
        #[arg(required = true, value_name = "FIELD")]
        fields: Vec<String>,
    },
    /// Update fields of the record
    Store {
        #[arg(required = true, value_name = "FIELD=VALUE", value_parser = parse_assignment)]
        values: Vec<(String, FieldValue)>,
    },
}

impl Config {
    /// Parse configuration from command line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Build the accessor configuration described by the flags.
    pub fn accessor_config(&self) -> AccessorConfig {
        AccessorConfig {
            driver: self.driver.clone(),
            host: self.host.clone(),
            database: self.database.clone(),
            username: self.user.clone(),
            password: self.password.clone(),
            options: self.options.iter().cloned().collect(),
            table: self.table.clone(),
            predicate: self.predicate.iter().cloned().collect(),
            share_connection: !self.private,
        }
    }
}

/// Parse `KEY=VALUE`, splitting on the first `=`.
pub fn parse_key_value(s: &str) -> Result<(String, String), String> {
    let (key, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected KEY=VALUE, got '{s}'"))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(format!("empty key in '{s}'"));
    }
    Ok((key.to_string(), value.to_string()))
}

/// Parse `COLUMN=VALUE` with the value read as a typed literal.
pub fn parse_assignment(s: &str) -> Result<(String, FieldValue), String> {
    let (column, value) = parse_key_value(s)?;
    Ok((column, FieldValue::parse_literal(&value)))
}
