// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

pub mod demo;

pub use demo::*;

use anyhow::{Context, Result, anyhow, bail};
use peacock_app::{Language, SettingKey, SettingValue};
use rusqlite::{Connection, OptionalExtension, params};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

pub const APP_NAME: &str = "peacock";

const SETTINGS_SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS settings (
  key TEXT PRIMARY KEY,
  value TEXT NOT NULL,
  updated_at TEXT NOT NULL
);
";

const REQUIRED_SETTINGS_COLUMNS: [&str; 3] = ["key", "value", "updated_at"];

/// Local preference store. Only client-side state lives here; menu data
/// belongs to the data service.
pub struct Store {
    conn: Connection,
}

impl Store {
    pub fn open(path: &Path) -> Result<Self> {
        let printable = path.to_string_lossy().to_string();
        validate_db_path(&printable)?;
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)
                .with_context(|| format!("create database directory {}", parent.display()))?;
        }
        let conn = Connection::open(path)
            .with_context(|| format!("open database at {}", path.display()))?;
        configure_connection(&conn)?;
        Ok(Self { conn })
    }

    pub fn open_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("open in-memory database")?;
        configure_connection(&conn)?;
        Ok(Self { conn })
    }

    pub fn raw_connection(&self) -> &Connection {
        &self.conn
    }

    pub fn bootstrap(&self) -> Result<()> {
        if table_exists(&self.conn, "settings")? {
            validate_settings_table(&self.conn)?;
            return Ok(());
        }
        self.conn
            .execute_batch(SETTINGS_SCHEMA)
            .context("create settings table")
    }

    fn get_setting_raw(&self, key: &str) -> Result<Option<String>> {
        self.conn
            .query_row(
                "SELECT value FROM settings WHERE key = ?",
                params![key],
                |row| row.get::<_, String>(0),
            )
            .optional()
            .with_context(|| format!("read setting {key}"))
    }

    fn put_setting_raw(&self, key: &str, value: &str) -> Result<()> {
        let now = now_rfc3339()?;
        self.conn
            .execute(
                "
                INSERT INTO settings (key, value, updated_at)
                VALUES (?, ?, ?)
                ON CONFLICT(key) DO UPDATE SET
                  value = excluded.value,
                  updated_at = excluded.updated_at
                ",
                params![key, value, now],
            )
            .with_context(|| format!("upsert setting {key}"))?;
        Ok(())
    }

    pub fn get_setting(&self, key: SettingKey) -> Result<Option<SettingValue>> {
        let raw = self.get_setting_raw(key.as_str())?;
        raw.map(|value| {
            SettingValue::parse_for_key(key, &value).ok_or_else(|| {
                anyhow!(
                    "setting `{}` has invalid value `{}`; toggle the language once to overwrite it",
                    key.as_str(),
                    value
                )
            })
        })
        .transpose()
    }

    pub fn put_setting(&self, key: SettingKey, value: SettingValue) -> Result<()> {
        let raw = value
            .to_storage(key)
            .ok_or_else(|| anyhow!("setting `{}` cannot store {value:?}", key.as_str()))?;
        self.put_setting_raw(key.as_str(), &raw)
    }

    /// Stored language preference; `None` when the user never chose one.
    pub fn get_language(&self) -> Result<Option<Language>> {
        match self.get_setting(SettingKey::UiLanguage)? {
            Some(SettingValue::Language(language)) => Ok(Some(language)),
            None => Ok(None),
        }
    }

    pub fn put_language(&self, language: Language) -> Result<()> {
        self.put_setting(SettingKey::UiLanguage, SettingValue::Language(language))
    }
}

pub fn default_db_path() -> Result<PathBuf> {
    if let Some(override_path) = env::var_os("PEACOCK_DB_PATH") {
        return Ok(PathBuf::from(override_path));
    }

    let data_root = dirs::data_local_dir().ok_or_else(|| {
        anyhow!("cannot resolve data directory; set PEACOCK_DB_PATH to a writable database path")
    })?;

    let app_dir = data_root.join(APP_NAME);
    fs::create_dir_all(&app_dir)
        .with_context(|| format!("create data directory {}", app_dir.display()))?;
    Ok(app_dir.join("peacock.db"))
}

pub fn validate_db_path(path: &str) -> Result<()> {
    if path.is_empty() {
        bail!("database path must not be empty");
    }
    if path == ":memory:" {
        return Ok(());
    }

    if let Some(index) = path.find("://")
        && index > 0
    {
        let scheme = &path[..index];
        if scheme.chars().all(char::is_alphabetic) {
            bail!(
                "database path {path:?} looks like a URI ({scheme}://); pass a filesystem path instead"
            );
        }
    }

    if path.starts_with("file:") {
        bail!("database path {path:?} uses file: URI syntax; pass a plain filesystem path");
    }

    if path.contains('?') {
        bail!(
            "database path {path:?} contains '?'; remove query parameters and use a plain file path"
        );
    }

    Ok(())
}

fn table_exists(conn: &Connection, table: &str) -> Result<bool> {
    let count: i64 = conn
        .query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?",
            params![table],
            |row| row.get(0),
        )
        .with_context(|| format!("look up table {table}"))?;
    Ok(count > 0)
}

fn validate_settings_table(conn: &Connection) -> Result<()> {
    let mut stmt = conn
        .prepare("SELECT name FROM pragma_table_info('settings')")
        .context("inspect settings table")?;
    let columns = stmt
        .query_map([], |row| row.get::<_, String>(0))
        .context("list settings columns")?
        .collect::<rusqlite::Result<Vec<_>>>()
        .context("read settings columns")?;
    for required in REQUIRED_SETTINGS_COLUMNS {
        if !columns.iter().any(|column| column == required) {
            bail!(
                "settings table is missing column `{required}`; point [storage].db_path at a fresh file"
            );
        }
    }
    Ok(())
}

fn configure_connection(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        PRAGMA foreign_keys = ON;
        PRAGMA journal_mode = WAL;
        PRAGMA synchronous = NORMAL;
        PRAGMA busy_timeout = 5000;
        ",
    )
    .context("configure sqlite pragmas")
}

fn now_rfc3339() -> Result<String> {
    OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .context("format current timestamp")
}

#[cfg(test)]
mod tests {
    use super::{Store, validate_db_path};
    use peacock_app::Language;

    #[test]
    fn language_round_trips_through_settings() {
        let store = Store::open_memory().expect("open");
        store.bootstrap().expect("bootstrap");
        assert_eq!(store.get_language().expect("read"), None);

        store.put_language(Language::Cn).expect("write");
        assert_eq!(store.get_language().expect("read"), Some(Language::Cn));

        store.put_language(Language::En).expect("overwrite");
        assert_eq!(store.get_language().expect("read"), Some(Language::En));
    }

    #[test]
    fn memory_path_is_accepted() {
        assert!(validate_db_path(":memory:").is_ok());
        assert!(validate_db_path("").is_err());
    }
}
