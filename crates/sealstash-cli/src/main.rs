mod cli;
mod config;
mod storage;

use crate::cli::{Command, ConfigCommand};
use clap::Parser;
use color_eyre::{Report, Result};
use sealstash_core::{storage::BlobBackend, StoreError};
use sealstash_storage::EncryptedStore;
use serde_json::Value;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    init_tracing();

    let cli = cli::Cli::parse();
    let config = config::load()?;
    match cli.command {
        Command::Version => print_version(),
        Command::Config(ConfigCommand::Init) => init_config(&config)?,
        command => {
            let store = storage::store_from_config(&config, cli.data_dir.as_deref()).await?;
            run_store_command(&store, command)
                .await
                .map_err(with_decode_hint)?;
        }
    }

    Ok(())
}

fn init_tracing() {
    // Respect user-provided filters, default to info to avoid noisy stdout.
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_writer(std::io::stderr);
    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .init();
}

fn print_version() {
    println!("sealstash {}", env!("CARGO_PKG_VERSION"));
}

fn init_config(config: &config::Config) -> Result<()> {
    let path = config::write_default_if_missing(config)?;
    println!("Config initialized at {}", path.display());
    Ok(())
}

async fn run_store_command<B: BlobBackend>(
    store: &EncryptedStore<B>,
    command: Command,
) -> Result<()> {
    match command {
        Command::Get { key } => match store.get_value_async(&key).await? {
            Some(value) => println!("{}", serde_json::to_string_pretty(&value)?),
            None => println!("No value stored for `{key}`."),
        },
        Command::Set { key, value } => {
            store.set_async(&key, &parse_value(value)).await?;
            info!(%key, "value stored");
        }
        Command::Delete { key } => {
            store.delete_async(&key).await?;
            info!(%key, "key deleted");
        }
        Command::List => match store.get_all_async().await? {
            Some(map) if !map.is_empty() => {
                for (key, value) in map {
                    println!("{key} = {value}");
                }
            }
            _ => println!("Nothing stored yet. Add a value with `sealstash set <key> <value>`."),
        },
        Command::Reset => {
            store.reset_async().await?;
            println!("Store reset.");
        }
        Command::Health => {
            run_store_health(store).await?;
            println!("Storage: ok ({})", store.path().display());
        }
        Command::Version | Command::Config(_) => {}
    }
    Ok(())
}

/// Undecodable data almost always means the key or IV changed since the
/// file was written.
fn with_decode_hint(report: Report) -> Report {
    if report
        .downcast_ref::<StoreError>()
        .is_some_and(StoreError::is_decode)
    {
        report.wrap_err("data file could not be decrypted; check the configured key material")
    } else {
        report
    }
}

/// Values are JSON when they parse as JSON, plain strings otherwise.
fn parse_value(raw: String) -> Value {
    serde_json::from_str(&raw).unwrap_or(Value::String(raw))
}

/// Round-trips a scratch key through the store and removes it again.
async fn run_store_health<B: BlobBackend>(store: &EncryptedStore<B>) -> Result<()> {
    let check_key = "health/check";
    let payload = Value::from("ok");
    store.set_async(check_key, &payload).await?;
    let round_trip = store.get_value_async(check_key).await?;
    store.delete_async(check_key).await?;

    if round_trip.as_ref() != Some(&payload) {
        color_eyre::eyre::bail!("storage round-trip failed");
    }
    if store.contains_key_async(check_key).await? {
        color_eyre::eyre::bail!("health key survived delete");
    }
    Ok(())
}
