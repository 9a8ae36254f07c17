use anyhow::{Context, Result};
use chrono::{FixedOffset, Offset, Utc};
use log::warn;
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
    sync::RwLock,
};

pub const DEFAULT_PAGE_SIZE: u32 = 5;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AppConfig {
    /// Fixed page size shared by every partition.
    pub page_size: u32,
    pub database_file: String,
    /// Offset applied when grouping moments by calendar day.
    pub utc_offset_minutes: i32,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
            database_file: "moments.sqlite3".into(),
            utc_offset_minutes: 0,
        }
    }
}

impl AppConfig {
    pub fn page_size(&self) -> u32 {
        self.page_size.max(1)
    }

    pub fn day_offset(&self) -> FixedOffset {
        FixedOffset::east_opt(self.utc_offset_minutes.saturating_mul(60))
            .unwrap_or_else(|| Utc.fix())
    }

    pub fn database_path(&self, data_dir: &Path) -> PathBuf {
        data_dir.join(&self.database_file)
    }
}

pub struct SettingsStore {
    path: PathBuf,
    data: RwLock<AppConfig>,
}

impl SettingsStore {
    pub fn new(path: PathBuf) -> Result<Self> {
        let data = if path.exists() {
            match fs::read_to_string(&path) {
                Ok(contents) => serde_json::from_str(&contents).unwrap_or_else(|err| {
                    warn!("Ignoring unparseable settings at {}: {err}", path.display());
                    AppConfig::default()
                }),
                Err(err) => {
                    warn!("Ignoring unreadable settings at {}: {err}", path.display());
                    AppConfig::default()
                }
            }
        } else {
            AppConfig::default()
        };

        Ok(Self {
            path,
            data: RwLock::new(data),
        })
    }

    pub fn config(&self) -> AppConfig {
        match self.data.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn update(&self, config: AppConfig) -> Result<()> {
        let mut guard = match self.data.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        self.persist(&config)?;
        *guard = config;
        Ok(())
    }

    fn persist(&self, data: &AppConfig) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let serialized = serde_json::to_string_pretty(data)?;
        fs::write(&self.path, serialized)
            .with_context(|| format!("Failed to write settings to {}", self.path.display()))
    }
}
