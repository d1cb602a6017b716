//! dbcompat CLI Entry Point
//!
//! Subcommands:
//! - `describe` - Table metadata as the field-info layer sees it
//! - `remap` - Placeholder rewriting for an engine
//! - `query` - Execute one statement through a link
//! - `latin1` - Windows-1252 codec (`decode` hex bytes, `encode` text)
//!
//! All output to stdout is JSON-only. Logs go to stderr.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Instant;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use serde_json::{json, Value};
use tracing_subscriber::EnvFilter;

use dbcompat::clock::SystemClock;
use dbcompat::config::{load_with_precedence, Settings};
use dbcompat::{
    charset, CompatError, ConnectionConfig, DatabaseType, ErrorEnvelope, Link, Metadata,
    ParameterRemapper, SuccessEnvelope, TableMetadataCache,
};

/// dbcompat - database core of the scripting-runtime compatibility adapters
#[derive(Parser)]
#[command(name = "dbcompat")]
#[command(about = "Table metadata, placeholder remapping and latin1 codec for mysqli/pg adapters")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Describe a table's columns, keys and field flags
    Describe {
        #[command(flatten)]
        connection: ConnectionArgs,

        /// Table name
        #[arg(long)]
        table: String,

        /// Schema (postgres) the table lives in
        #[arg(long)]
        schema: Option<String>,
    },

    /// Rewrite placeholders to canonical `?` form
    Remap {
        /// Engine whose placeholder style the query uses
        #[arg(long, default_value = "postgres")]
        engine: String,

        /// Query text
        sql: String,
    },

    /// Execute one statement and print its result
    Query {
        #[command(flatten)]
        connection: ConnectionArgs,

        /// SQL text, in the engine's own placeholder style
        sql: String,

        /// Parameter value as JSON (repeatable, in caller order)
        #[arg(long = "param")]
        params: Vec<String>,

        /// Also report field info for each result column
        #[arg(long)]
        fields: bool,
    },

    /// Windows-1252 ("latin1") codec
    Latin1 {
        #[command(subcommand)]
        action: Latin1Action,
    },
}

#[derive(Subcommand)]
enum Latin1Action {
    /// Decode hex-encoded bytes to text
    Decode { hex: String },
    /// Encode text to hex-encoded bytes
    Encode { text: String },
}

/// Connection selection: a named profile, or explicit parameters
#[derive(Args)]
struct ConnectionArgs {
    /// Named connection from the config files (default connection if omitted)
    #[arg(long = "name")]
    name: Option<String>,

    /// Database engine (postgres, mysql, sqlite); enables explicit parameters
    #[arg(long)]
    engine: Option<String>,

    #[arg(long)]
    host: Option<String>,

    #[arg(long)]
    port: Option<u16>,

    #[arg(long)]
    user: Option<String>,

    /// Environment variable holding the password
    #[arg(long)]
    password_env: Option<String>,

    #[arg(long)]
    database: Option<String>,

    /// Database file (sqlite)
    #[arg(long)]
    file: Option<PathBuf>,

    /// Connection charset (utf8, latin1)
    #[arg(long)]
    charset: Option<String>,
}

impl ConnectionArgs {
    fn resolve(&self, settings: &Settings) -> dbcompat::Result<ConnectionConfig> {
        let Some(engine) = self.engine.as_deref() else {
            return settings.resolve_connection(self.name.as_deref());
        };

        let password = match &self.password_env {
            Some(var) => Some(std::env::var(var).map_err(|_| {
                CompatError::config_error(format!("Environment variable {var} not found for password"))
            })?),
            None => None,
        };

        Ok(ConnectionConfig {
            engine: engine.parse::<DatabaseType>()?,
            host: self.host.clone(),
            port: self.port,
            user: self.user.clone(),
            password,
            database: self.database.clone(),
            file: self.file.clone(),
            charset: self.charset.clone(),
        })
    }
}

/// Result of one command: engine label plus JSON data and metadata
type Outcome = (String, dbcompat::Result<(Value, Metadata)>);

fn main() -> anyhow::Result<ExitCode> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let command = command_name(&cli.command);
    let started = Instant::now();

    let (engine, result) = run(cli.command, started);

    let (output, code) = match result {
        Ok((data, meta)) => {
            let envelope = SuccessEnvelope::new(engine, command, data, meta);
            (serde_json::to_string(&envelope).context("serializing success envelope")?, ExitCode::SUCCESS)
        }
        Err(err) => {
            let envelope = ErrorEnvelope::from_error(engine, command, &err);
            (serde_json::to_string(&envelope).context("serializing error envelope")?, ExitCode::FAILURE)
        }
    };

    println!("{output}");
    Ok(code)
}

const fn command_name(command: &Commands) -> &'static str {
    match command {
        Commands::Describe { .. } => "describe",
        Commands::Remap { .. } => "remap",
        Commands::Query { .. } => "query",
        Commands::Latin1 { .. } => "latin1",
    }
}

fn elapsed_ms(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}

fn run(command: Commands, started: Instant) -> Outcome {
    match command {
        Commands::Describe { connection, table, schema } => with_link(&connection, |link| {
            let descriptor = link.table_metadata(None, schema.as_deref(), &table)?;
            let data = serde_json::to_value(&*descriptor)
                .map_err(|e| CompatError::invalid_input(format!("Could not serialize table: {e}")))?;
            Ok((data, Metadata::new(elapsed_ms(started))))
        }),

        Commands::Remap { engine, sql } => {
            let result = engine.parse::<DatabaseType>().and_then(|engine| {
                let prepared = ParameterRemapper::new(engine.placeholder_style()).prepare(&sql)?;
                let data = json!(prepared);
                Ok((data, Metadata::new(elapsed_ms(started))))
            });
            (String::new(), result)
        }

        Commands::Query { connection, sql, params, fields } => with_link(&connection, |link| {
            let params = params
                .iter()
                .map(|p| {
                    serde_json::from_str::<Value>(p)
                        .map_err(|e| CompatError::invalid_input(format!("Invalid JSON parameter '{p}': {e}")))
                })
                .collect::<dbcompat::Result<Vec<_>>>()?;

            let outcome = link.query(&sql, &params)?;
            let field_info = if fields { Some(link.fields(&outcome)?) } else { None };

            let meta = match outcome.rows_affected {
                Some(affected) if outcome.columns.is_empty() => {
                    Metadata::with_affected(elapsed_ms(started), affected)
                }
                _ => Metadata::with_rows(elapsed_ms(started), outcome.rows.len()),
            };

            let mut data = serde_json::to_value(&outcome)
                .map_err(|e| CompatError::invalid_input(format!("Could not serialize result: {e}")))?;
            if let (Some(info), Value::Object(map)) = (field_info, &mut data) {
                map.insert("fields".to_string(), json!(info));
            }
            Ok((data, meta))
        }),

        Commands::Latin1 { action } => {
            let result = match action {
                Latin1Action::Decode { hex } => decode_hex(&hex).map(|bytes| json!({ "text": charset::decode(&bytes) })),
                Latin1Action::Encode { text } => charset::encode(&text).map(|bytes| json!({ "hex": encode_hex(&bytes) })),
            };
            (String::new(), result.map(|data| (data, Metadata::new(elapsed_ms(started)))))
        }
    }
}

/// Resolve the connection, open a link and run `f` on it
fn with_link<F>(args: &ConnectionArgs, f: F) -> Outcome
where
    F: FnOnce(&mut Link) -> dbcompat::Result<(Value, Metadata)>,
{
    let resolved = load_with_precedence().and_then(|settings| {
        Ok((args.resolve(&settings)?, settings.cache_settings()))
    });
    let (config, cache_settings) = match resolved {
        Ok(resolved) => resolved,
        Err(e) => return (args.engine.clone().unwrap_or_default(), Err(e)),
    };
    let engine = config.engine.to_string();

    let result = Link::connect(&config, TableMetadataCache::new(cache_settings), Arc::new(SystemClock))
        .and_then(|mut link| f(&mut link));
    (engine, result)
}

fn decode_hex(hex: &str) -> dbcompat::Result<Vec<u8>> {
    let hex = hex.trim();
    if hex.len() % 2 != 0 {
        return Err(CompatError::invalid_input("Hex input must have an even number of digits"));
    }
    (0..hex.len())
        .step_by(2)
        .map(|i| {
            hex.get(i..i + 2)
                .and_then(|pair| u8::from_str_radix(pair, 16).ok())
                .ok_or_else(|| CompatError::invalid_input(format!("Invalid hex digits at offset {i}")))
        })
        .collect()
}

fn encode_hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}
