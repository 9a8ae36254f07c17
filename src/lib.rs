pub mod db;
pub mod error;
pub mod moments;
pub mod settings;
pub mod temporal;
pub mod utils;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use log::info;
use serde::Serialize;

use db::Database;
use moments::{MomentsService, ViewQuery};
use settings::SettingsStore;

const DEFAULT_DATA_DIR: &str = ".moments";
const DEFAULT_USER: &str = "local";

pub struct AppState {
    pub db: Database,
    pub settings: SettingsStore,
    pub moments: MomentsService,
}

impl AppState {
    /// Loads `settings.json` from `data_dir` and opens the database it names.
    pub fn open(data_dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(data_dir)
            .with_context(|| format!("failed to create data directory {}", data_dir.display()))?;

        let settings = SettingsStore::new(data_dir.join("settings.json"))?;
        let config = settings.config();
        let db = Database::new(config.database_path(data_dir))?;
        let moments = MomentsService::new(db.clone(), &config);

        Ok(Self {
            db,
            settings,
            moments,
        })
    }
}

enum Command {
    View,
    Audit,
    Destinations,
}

fn parse_command(args: &[String]) -> (Command, &[String]) {
    match args.first().map(String::as_str) {
        Some("view") => (Command::View, &args[1..]),
        Some("audit") => (Command::Audit, &args[1..]),
        Some("destinations") => (Command::Destinations, &args[1..]),
        _ => (Command::View, args),
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// `moments [view|audit|destinations] [key=value ...]`
pub fn run() -> Result<()> {
    utils::logging::init();

    let data_dir = std::env::var_os("MOMENTS_DATA_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_DATA_DIR));
    let user_id = std::env::var("MOMENTS_USER").unwrap_or_else(|_| DEFAULT_USER.to_string());

    let args: Vec<String> = std::env::args().skip(1).collect();
    let (command, rest) = parse_command(&args);

    let state = AppState::open(&data_dir)?;
    info!("Moments ready for user {user_id} in {}", data_dir.display());

    let runtime = tokio::runtime::Runtime::new().context("failed to start async runtime")?;
    runtime.block_on(async {
        match command {
            Command::View => {
                let query = ViewQuery::from_args(rest);
                let view = state.moments.resolve_view(&user_id, &query).await?;
                print_json(&view)
            }
            Command::Audit => {
                let findings = state.moments.audit_user(&user_id).await?;
                print_json(&findings)
            }
            Command::Destinations => {
                let destinations = state.db.list_destinations(&user_id).await?;
                print_json(&destinations)
            }
        }
    })
}
