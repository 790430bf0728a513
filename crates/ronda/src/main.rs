//! ronda - neighbourhood patrol duty from the command line
//!
//! Wires together:
//! - Configuration loading
//! - Store initialization
//! - The ledger journal
//! - The patrol service
//!
//! Each invocation runs a single command and prints the JSON response on stdout.

mod cli;
mod dispatch;

use anyhow::{Context, Result};
use clap::Parser;
use ronda_api::{Identity, Request};
use ronda_config::{load_config_or_default, Settings};
use ronda_core::PatrolService;
use ronda_ledger::JournalLedger;
use ronda_store::{SqliteStore, Store};
use ronda_util::{default_config_path, SystemClock, LEDGER_JOURNAL_FILENAME};
use serde::Serialize;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use cli::Action;

/// ronda - patrol rosters, geofenced attendance and fines
#[derive(Parser, Debug)]
#[command(name = "ronda", version)]
#[command(about = "Neighbourhood patrol rosters, geofenced attendance and fines", long_about = None)]
struct Args {
    /// Configuration file path (default: ~/.config/ronda/config.toml)
    #[arg(short, long, env = "RONDA_CONFIG", default_value_os_t = default_config_path())]
    config: PathBuf,

    /// Data directory override (or set RONDA_DATA_DIR env var)
    #[arg(short, long, env = "RONDA_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// Log level
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Acting user
    #[arg(short, long, env = "RONDA_USER")]
    user: String,

    /// Unit the acting user belongs to
    #[arg(long, env = "RONDA_UNIT")]
    unit: String,

    #[command(subcommand)]
    action: Action,
}

#[derive(Serialize)]
struct AuditListing<'a> {
    unit_id: &'a str,
    events: Vec<ronda_store::AuditEvent>,
}

fn load_settings(args: &Args) -> Result<Settings> {
    let mut settings = load_config_or_default(&args.config)
        .with_context(|| format!("Failed to load config from {:?}", args.config))?;

    if let Some(data_dir) = &args.data_dir {
        // A journal kept beside the database follows it
        if settings
            .service
            .ledger_journal
            .starts_with(&settings.service.data_dir)
        {
            settings.service.ledger_journal = data_dir.join(LEDGER_JOURNAL_FILENAME);
        }
        settings.service.data_dir = data_dir.clone();
    }

    Ok(settings)
}

fn open_service(settings: Settings) -> Result<PatrolService> {
    let data_dir = settings.service.data_dir.clone();
    std::fs::create_dir_all(&data_dir)
        .with_context(|| format!("Failed to create data directory {:?}", data_dir))?;

    let db_path = settings.service.database_path();
    let store: Arc<dyn Store> = Arc::new(
        SqliteStore::open(&db_path)
            .with_context(|| format!("Failed to open database {:?}", db_path))?,
    );
    debug!(db_path = %db_path.display(), "Store initialized");

    let journal_path = settings.service.ledger_journal.clone();
    let ledger = Arc::new(
        JournalLedger::open(&journal_path)
            .with_context(|| format!("Failed to open ledger journal {:?}", journal_path))?,
    );
    debug!(journal_path = %journal_path.display(), "Ledger journal opened");

    Ok(PatrolService::new(
        store,
        ledger,
        Arc::new(SystemClock),
        settings,
    ))
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value).context("Failed to serialize output")?;
    println!("{json}");
    Ok(())
}

fn main() -> Result<ExitCode> {
    let args = Args::parse();

    // Logs go to stderr, stdout carries the response
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    debug!(version = env!("CARGO_PKG_VERSION"), "ronda starting");

    let settings = load_settings(&args)?;
    let service = open_service(settings)?;
    let identity = Identity::new(args.user.as_str(), args.unit.as_str());

    let limit = match &args.action {
        Action::Audit { limit } => Some(*limit),
        _ => None,
    };

    match args.action.into_command() {
        Some(command) => {
            let request = Request::new(1, identity, command);
            let response = dispatch::handle(&service, request);
            print_json(&response)?;
            if response.is_ok() {
                Ok(ExitCode::SUCCESS)
            } else {
                Ok(ExitCode::FAILURE)
            }
        }
        None => {
            let events = service
                .store()
                .get_recent_audits(&identity.unit_id, limit.unwrap_or(cli::DEFAULT_AUDIT_LIMIT))
                .context("Failed to read audit log")?;
            info!(count = events.len(), "Audit events loaded");
            print_json(&AuditListing {
                unit_id: identity.unit_id.as_str(),
                events,
            })?;
            Ok(ExitCode::SUCCESS)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn args(config: PathBuf, data_dir: Option<PathBuf>) -> Args {
        Args {
            config,
            data_dir,
            log_level: "info".into(),
            user: "admin".into(),
            unit: "rt-05".into(),
            action: Action::History,
        }
    }

    #[test]
    fn data_dir_flag_moves_database_and_journal() {
        let dir = tempdir().unwrap();
        let settings = load_settings(&args(
            dir.path().join("missing.toml"),
            Some(dir.path().join("data")),
        ))
        .unwrap();

        assert_eq!(settings.service.data_dir, dir.path().join("data"));
        assert_eq!(
            settings.service.ledger_journal,
            dir.path().join("data").join(LEDGER_JOURNAL_FILENAME)
        );
    }

    #[test]
    fn explicit_journal_path_is_kept() {
        let dir = tempdir().unwrap();
        let config = dir.path().join("config.toml");
        std::fs::write(
            &config,
            format!(
                "config_version = 1\n\n[service]\nledger_journal = {:?}\n",
                "/srv/ledger/ronda.jsonl"
            ),
        )
        .unwrap();

        let settings = load_settings(&args(config, Some(dir.path().join("data")))).unwrap();
        assert_eq!(
            settings.service.ledger_journal,
            PathBuf::from("/srv/ledger/ronda.jsonl")
        );
    }

    #[test]
    fn service_opens_in_fresh_directory() {
        let dir = tempdir().unwrap();
        let settings = load_settings(&args(
            dir.path().join("missing.toml"),
            Some(dir.path().join("nested").join("data")),
        ))
        .unwrap();

        let service = open_service(settings).unwrap();
        assert!(service.store().is_healthy());
        assert!(dir.path().join("nested/data/ronda.db").exists());
    }
}
