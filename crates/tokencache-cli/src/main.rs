mod cli;
mod config;
mod storage;

use std::{fs, path::Path};

use clap::Parser;
use color_eyre::Result;
use tokencache_storage::KeyProvider;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::{cli::ConfigCommand, storage::TokenStore};

const PROBE_KEY: &str = "health/probe";

fn main() -> Result<()> {
    color_eyre::install()?;
    init_tracing();

    let cli = cli::Cli::parse();
    let config = config::load()?;
    match cli.command.unwrap_or(cli::Command::Show) {
        cli::Command::Show => show(&storage::store_from_config(&config)?)?,
        cli::Command::Set { key, value } => {
            set_entry(&storage::store_from_config(&config)?, &key, &value)?;
            println!("Stored {key}");
        }
        cli::Command::Remove { key } => {
            if remove_entry(&storage::store_from_config(&config)?, &key)? {
                println!("Removed {key}");
            } else {
                println!("No entry for {key}");
            }
        }
        cli::Command::Clear => {
            let store = storage::store_from_config(&config)?;
            store.clear()?;
            println!("Cleared {}", store.cache_file_path().display());
        }
        cli::Command::Health => run_health_check(&config)?,
        cli::Command::Version => print_version(),
        cli::Command::Config(ConfigCommand::Init) => init_config(&config)?,
    }

    Ok(())
}

fn init_tracing() {
    // Respect user-provided filters, default to info to avoid noisy stdout.
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let fmt_layer = tracing_subscriber::fmt::layer().with_target(false);
    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .init();
}

fn print_version() {
    println!("tokencache {}", env!("CARGO_PKG_VERSION"));
}

fn show<P: KeyProvider>(store: &TokenStore<P>) -> Result<()> {
    let keys = list_keys(store)?;
    println!("Cache file: {}", store.cache_file_path().display());
    if keys.is_empty() {
        println!("Cache is empty.");
        return Ok(());
    }
    println!("Entries ({}):", keys.len());
    for key in keys {
        println!("  {key}");
    }
    Ok(())
}

fn list_keys<P: KeyProvider>(store: &TokenStore<P>) -> Result<Vec<String>> {
    Ok(store.access(|cache| cache.keys().map(str::to_string).collect())?)
}

fn set_entry<P: KeyProvider>(store: &TokenStore<P>, key: &str, value: &str) -> Result<()> {
    store.access(|cache| cache.insert(key, value))?;
    Ok(())
}

fn remove_entry<P: KeyProvider>(store: &TokenStore<P>, key: &str) -> Result<bool> {
    Ok(store.access(|cache| cache.remove(key).is_some())?)
}

/// Runs a write/reopen/clear probe next to the configured cache file.
fn run_health_check(config: &config::Config) -> Result<()> {
    let probe = storage::cache_file(config)?.with_extension("probe");
    run_store_health(&probe, || storage::key_provider(config))?;
    println!("Storage: ok");
    Ok(())
}

fn run_store_health<P: KeyProvider>(probe: &Path, keys: impl Fn() -> P) -> Result<()> {
    if probe.exists() {
        fs::remove_file(probe)?;
    }

    let writer = storage::open_store(probe, keys())?;
    set_entry(&writer, PROBE_KEY, "ok")?;

    let reader = storage::open_store(probe, keys())?;
    let round_trip = reader.with_cache(|cache| cache.get(PROBE_KEY).map(str::to_string))?;
    reader.clear()?;
    info!(path = %probe.display(), "health probe finished");

    if round_trip.as_deref() != Some("ok") {
        color_eyre::eyre::bail!("storage round-trip failed");
    }
    if probe.exists() {
        color_eyre::eyre::bail!("probe file survived clear");
    }
    Ok(())
}

fn init_config(config: &config::Config) -> Result<()> {
    let path = config::write_default_if_missing(config)?;
    println!("Config initialized at {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use tokencache_storage::InMemoryKeyProvider;

    use super::*;

    #[test]
    fn health_check_with_test_keys_succeeds() {
        let dir = tempfile::tempdir().expect("tempdir");
        let keys = InMemoryKeyProvider::default();
        run_store_health(&dir.path().join("token.probe"), || keys.clone())
            .expect("health check should succeed");
    }

    #[test]
    fn health_check_replaces_stale_probe() {
        let dir = tempfile::tempdir().expect("tempdir");
        let probe = dir.path().join("token.probe");
        fs::write(&probe, b"left over from another key").expect("write stale probe");

        let keys = InMemoryKeyProvider::default();
        run_store_health(&probe, || keys.clone()).expect("health check should succeed");
    }

    #[test]
    fn entries_survive_a_fresh_store() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("token.cache");
        let keys = InMemoryKeyProvider::default();

        let first = storage::test_store(&path, &keys);
        set_entry(&first, "account/bob", "rt-9").expect("set");
        set_entry(&first, "account/alice", "rt-1").expect("set");

        let second = storage::test_store(&path, &keys);
        assert_eq!(
            list_keys(&second).expect("list"),
            vec!["account/alice".to_string(), "account/bob".to_string()]
        );

        assert!(remove_entry(&second, "account/bob").expect("remove"));
        assert!(!remove_entry(&second, "account/bob").expect("remove again"));
        assert_eq!(list_keys(&first).expect("list"), vec!["account/alice".to_string()]);
    }

    #[test]
    fn removing_last_entry_deletes_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("token.cache");
        let store = storage::test_store(&path, &InMemoryKeyProvider::default());

        set_entry(&store, "k", "v").expect("set");
        assert!(path.exists());
        remove_entry(&store, "k").expect("remove");
        assert!(!path.exists());
    }
}
