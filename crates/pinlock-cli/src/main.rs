//! Pinlock CLI - command-line host for the session guard

mod config;
mod session;

use std::io::BufRead;
use std::num::NonZeroU64;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use zeroize::Zeroizing;

use pinlock_core::{
    FileStore, GuardState, KeyValueStore, LayeredStore, MemoryStore, SessionGuard,
};

use crate::config::CliConfig;

#[derive(Parser)]
#[command(name = "pinlock")]
#[command(about = "PIN lock and inactivity guard for terminal sessions", long_about = None)]
#[command(version)]
struct Cli {
    /// Store file holding the PIN and timeout
    #[arg(long, global = true)]
    store: Option<PathBuf>,

    /// Config file (defaults to $PINLOCK_CONFIG or the user config directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Configure the PIN
    Setup {
        /// PIN to set (read from stdin if omitted)
        #[arg(short, long)]
        pin: Option<String>,
    },

    /// Check a PIN against the configured one
    Verify {
        /// PIN to check (read from stdin if omitted)
        #[arg(short, long)]
        pin: Option<String>,
    },

    /// Set the inactivity timeout in milliseconds
    Timeout {
        /// Timeout in milliseconds
        ms: NonZeroU64,
    },

    /// Remove the configured PIN
    Clear {
        /// Confirm removal
        #[arg(long)]
        yes: bool,
    },

    /// Print guard status as JSON
    Status,

    /// Run an interactive session that locks when idle
    Session,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct StatusReport {
    pin_set: bool,
    locked: bool,
    inactivity_timeout: u64,
    store: PathBuf,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    // Logs go to stderr so command output stays parseable
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "pinlock_core=info,pinlock_cli=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    let config_path = cli.config.clone().unwrap_or_else(CliConfig::default_path);
    let config = CliConfig::load_or_create(&config_path)?;
    let store_path = cli.store.clone().unwrap_or_else(|| config.store_path.clone());

    let store = open_store(&store_path, matches!(cli.command, Commands::Session))?;
    let guard = Arc::new(build_guard(&config, store));

    // Mounting the session hydrates the guard itself
    if !matches!(cli.command, Commands::Session) {
        guard.hydrate().await.context("Failed to load guard state")?;
    }

    handle_command(guard, cli.command, &config, store_path).await
}

/// Open the guard's store
///
/// One-shot commands write straight to the file so a failed write is
/// reported instead of being absorbed by a process-local fallback. An
/// interactive session layers the file over memory so it stays usable if
/// the file becomes unwritable.
fn open_store(store_path: &Path, interactive: bool) -> Result<Arc<dyn KeyValueStore>> {
    if let Some(parent) = store_path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create store directory {:?}", parent))?;
    }

    let file = Arc::new(FileStore::new(store_path));
    if !interactive {
        return Ok(file);
    }

    Ok(Arc::new(
        LayeredStore::new()
            .with_tier("file", file)
            .with_tier("memory", Arc::new(MemoryStore::new())),
    ))
}

fn build_guard(config: &CliConfig, store: Arc<dyn KeyValueStore>) -> SessionGuard {
    let navigator = |route: &str| {
        println!("Session locked ({}). Enter your PIN to continue.", route);
    };

    SessionGuard::new(store, Arc::new(navigator), config.guard.clone())
}

async fn handle_command(
    guard: Arc<SessionGuard>,
    command: Commands,
    config: &CliConfig,
    store_path: PathBuf,
) -> Result<ExitCode> {
    match command {
        Commands::Setup { pin } => {
            let pin = pin_or_prompt(pin, "Enter new PIN:")?;
            guard.setup_pin(&pin).await?;
            info!("PIN configured");
            println!("PIN configured.");
        }

        Commands::Verify { pin } => {
            if !guard.is_pin_set() {
                bail!("No PIN configured. Run `pinlock setup` first.");
            }
            let pin = pin_or_prompt(pin, "Enter PIN:")?;
            if guard.verify_pin(&pin) {
                println!("PIN matches.");
            } else {
                println!("PIN does not match.");
                return Ok(ExitCode::FAILURE);
            }
        }

        Commands::Timeout { ms } => {
            guard.set_inactivity_timeout(ms).await?;
            println!("Inactivity timeout set to {} ms.", ms);
        }

        Commands::Clear { yes } => {
            if !yes {
                bail!("Refusing to remove the PIN without --yes");
            }
            guard.clear_pin().await?;
            println!("PIN removed.");
        }

        Commands::Status => {
            let report = StatusReport {
                pin_set: guard.is_pin_set(),
                locked: guard.state() == GuardState::Locked,
                inactivity_timeout: guard.inactivity_timeout(),
                store: store_path,
            };
            println!("{}", serde_json::to_string_pretty(&report)?);
        }

        Commands::Session => session::run(guard, config.unlock_backoff).await?,
    }

    Ok(ExitCode::SUCCESS)
}

/// Use the PIN from the command line or read one line from stdin
fn pin_or_prompt(pin: Option<String>, prompt: &str) -> Result<Zeroizing<String>> {
    if let Some(pin) = pin {
        return Ok(Zeroizing::new(pin));
    }

    eprintln!("{}", prompt);
    let mut line = Zeroizing::new(String::new());
    std::io::stdin()
        .lock()
        .read_line(&mut line)
        .context("Failed to read PIN from stdin")?;

    Ok(Zeroizing::new(line.trim().to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn guard_over(store: Arc<dyn KeyValueStore>) -> SessionGuard {
        let config = CliConfig {
            guard: pinlock_core::GuardConfig::testing(),
            ..CliConfig::default()
        };
        build_guard(&config, store)
    }

    #[tokio::test]
    async fn test_one_shot_setup_is_durable() {
        let temp_dir = tempdir().unwrap();
        let path = temp_dir.path().join("data").join("store.json");

        let guard = guard_over(open_store(&path, false).unwrap());
        guard.hydrate().await.unwrap();
        guard.setup_pin("7412").await.unwrap();

        // A later invocation sees the PIN
        let guard = guard_over(open_store(&path, false).unwrap());
        guard.hydrate().await.unwrap();
        assert!(guard.is_pin_set());
        assert!(guard.verify_pin("7412"));
    }

    #[tokio::test]
    async fn test_one_shot_setup_reports_unwritable_store() {
        let temp_dir = tempdir().unwrap();
        // The store path is a directory, so it reads as unreadable and
        // every write fails
        let path = temp_dir.path().join("store.json");
        std::fs::create_dir(&path).unwrap();

        let guard = guard_over(open_store(&path, false).unwrap());
        assert!(guard.setup_pin("7412").await.is_err());
        assert!(!guard.is_pin_set());
    }

    #[tokio::test]
    async fn test_session_store_falls_back_to_memory() {
        let temp_dir = tempdir().unwrap();
        let path = temp_dir.path().join("store.json");
        std::fs::create_dir(&path).unwrap();

        let guard = guard_over(open_store(&path, true).unwrap());
        guard.hydrate().await.unwrap();
        guard.setup_pin("7412").await.unwrap();
        assert!(guard.is_pin_set());
        assert!(guard.verify_pin("7412"));
    }
}
