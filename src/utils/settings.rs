//! Notification settings and their SQLite-backed store
//!
//! The settings are a single JSON blob stored under one key, mirroring a
//! browser's local storage entry.

use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

const SETTINGS_KEY: &str = "notificationSettings";

pub const DEFAULT_MIN_BALANCE_SOL: f64 = 10_000.0;
pub const DEFAULT_INACTIVITY_DAYS: u64 = 180;

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("settings database error: {0}")]
    Database(#[from] rusqlite::Error),
    #[error("settings serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("settings directory error: {0}")]
    Io(#[from] std::io::Error),
}

/// Per-channel switches and credentials plus detection thresholds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NotificationConfig {
    pub email_enabled: bool,
    pub email_address: Option<String>,

    pub telegram_enabled: bool,
    pub telegram_bot_token: Option<String>,
    pub telegram_chat_id: Option<String>,

    pub discord_enabled: bool,
    pub discord_webhook: Option<String>,

    /// In SOL
    pub min_balance: f64,
    /// In days
    pub inactivity_threshold: u64,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            email_enabled: false,
            email_address: None,
            telegram_enabled: false,
            telegram_bot_token: None,
            telegram_chat_id: None,
            discord_enabled: false,
            discord_webhook: None,
            min_balance: DEFAULT_MIN_BALANCE_SOL,
            inactivity_threshold: DEFAULT_INACTIVITY_DAYS,
        }
    }
}

/// True when the credential is present and not blank
pub fn has_value(field: &Option<String>) -> bool {
    field.as_deref().map(|v| !v.trim().is_empty()).unwrap_or(false)
}

/// Settings store
pub struct SettingsStore {
    conn: Arc<Mutex<Connection>>,
}

impl SettingsStore {
    /// Open (or create) the store at `db_path`
    pub fn new<P: AsRef<Path>>(db_path: P) -> Result<Self, SettingsError> {
        if let Some(parent) = db_path.as_ref().parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        Self::with_connection(Connection::open(db_path)?)
    }

    pub fn in_memory() -> Result<Self, SettingsError> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self, SettingsError> {
        conn.execute(
            r#"
            CREATE TABLE IF NOT EXISTS settings (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL,
                updated_at TEXT
            )
            "#,
            [],
        )?;
        info!(target: "SETTINGS", "Settings store initialized");
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Load settings, falling back to defaults when the blob is missing,
    /// unreadable or not valid JSON.
    pub fn load(&self) -> NotificationConfig {
        let raw = match self.read_raw() {
            Ok(Some(raw)) => raw,
            Ok(None) => return NotificationConfig::default(),
            Err(e) => {
                warn!(target: "SETTINGS", "Failed to read saved settings: {}", e);
                return NotificationConfig::default();
            }
        };

        match serde_json::from_str(&raw) {
            Ok(config) => config,
            Err(e) => {
                warn!(target: "SETTINGS", "Failed to parse saved settings: {}", e);
                NotificationConfig::default()
            }
        }
    }

    pub fn save(&self, config: &NotificationConfig) -> Result<(), SettingsError> {
        let raw = serde_json::to_string(config)?;
        self.write_raw(&raw)?;
        info!(target: "SETTINGS", "Notification settings saved");
        Ok(())
    }

    fn read_raw(&self) -> Result<Option<String>, SettingsError> {
        let conn = self.conn.lock();
        let raw = conn
            .query_row(
                "SELECT value FROM settings WHERE key = ?1",
                params![SETTINGS_KEY],
                |row| row.get(0),
            )
            .optional()?;
        Ok(raw)
    }

    fn write_raw(&self, raw: &str) -> Result<(), SettingsError> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT OR REPLACE INTO settings (key, value, updated_at) VALUES (?1, ?2, ?3)",
            params![SETTINGS_KEY, raw, chrono::Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }
}

impl Clone for SettingsStore {
    fn clone(&self) -> Self {
        Self {
            conn: Arc::clone(&self.conn),
        }
    }
}
