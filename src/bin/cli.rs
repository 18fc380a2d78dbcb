//! SealKV CLI
//!
//! Inspect and edit an encrypted store on disk.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand, ValueEnum};
use sealkv::crypto::KeyFileProvider;
use sealkv::{Config, KeyValueStore, Value};
use tracing_subscriber::{fmt, EnvFilter};

/// SealKV CLI
#[derive(Parser, Debug)]
#[command(name = "sealkv-cli")]
#[command(about = "CLI for the SealKV encrypted settings store")]
#[command(version)]
struct Args {
    /// Data directory
    #[arg(short, long, default_value = "./sealkv_data")]
    data_dir: PathBuf,

    /// File holding the raw 32-byte data key
    #[arg(short, long, default_value = "./sealkv.key")]
    key_file: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Generate a new data key file
    Keygen,

    #[command(flatten)]
    Data(DataCommand),
}

/// Commands that open the store
#[derive(Subcommand, Debug)]
enum DataCommand {
    /// Get a value by key
    Get {
        /// The key to get
        key: String,
    },

    /// Set a key to a typed value (blobs are given as hex)
    Set {
        /// The key to set
        key: String,

        /// The value to set
        value: String,

        /// How to interpret the value
        #[arg(short = 't', long = "type", value_enum, default_value = "string")]
        value_type: CliType,
    },

    /// Delete a key
    Del {
        /// The key to delete
        key: String,
    },

    /// List all keys
    Keys,

    /// Fold the WAL into the snapshot file
    Compact,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum CliType {
    Bool,
    Int,
    Long,
    Float,
    String,
    /// Hex-encoded bytes
    Blob,
}

fn main() -> ExitCode {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,sealkv=debug"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(args: Args) -> sealkv::Result<()> {
    let command = match args.command {
        Commands::Keygen => {
            KeyFileProvider::generate(&args.key_file)?;
            tracing::info!("Wrote new key to {}", args.key_file.display());
            return Ok(());
        }
        Commands::Data(command) => command,
    };

    let config = Config::builder().data_dir(&args.data_dir).build();
    let store = KeyValueStore::open(config, &KeyFileProvider::new(&args.key_file))?;

    match command {
        DataCommand::Get { key } => match store.get_value(&key)? {
            Some(value) => println!("{}", render(&value)),
            None => return Err(sealkv::StoreError::KeyMissing(key)),
        },
        DataCommand::Set {
            key,
            value,
            value_type,
        } => {
            let value = parse_value(&value, value_type)?;
            store.put(key, value).wait()?;
        }
        DataCommand::Del { key } => {
            store.remove(key).wait()?;
        }
        DataCommand::Keys => {
            for key in store.snapshot()?.keys() {
                println!("{}", key);
            }
        }
        DataCommand::Compact => store.compact()?,
    }

    store.close()
}

fn parse_value(raw: &str, value_type: CliType) -> sealkv::Result<Value> {
    let invalid = |e: &dyn std::fmt::Display| {
        sealkv::StoreError::Config(format!("Cannot parse '{}' as {:?}: {}", raw, value_type, e))
    };

    Ok(match value_type {
        CliType::Bool => Value::Bool(raw.parse().map_err(|e| invalid(&e))?),
        CliType::Int => Value::Int(raw.parse().map_err(|e| invalid(&e))?),
        CliType::Long => Value::Long(raw.parse().map_err(|e| invalid(&e))?),
        CliType::Float => Value::Float(raw.parse().map_err(|e| invalid(&e))?),
        CliType::String => Value::String(raw.to_string()),
        CliType::Blob => Value::Blob(hex::decode(raw).map_err(|e| invalid(&e))?),
    })
}

fn render(value: &Value) -> String {
    match value {
        Value::Bool(v) => v.to_string(),
        Value::Int(v) => v.to_string(),
        Value::Long(v) => v.to_string(),
        Value::Float(v) => v.to_string(),
        Value::String(v) => v.clone(),
        Value::Blob(v) => hex::encode(v),
    }
}
