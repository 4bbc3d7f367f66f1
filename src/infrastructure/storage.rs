use crate::infrastructure::error::InfraError;
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

const SCHEMA_SQL: &str = include_str!("../../sql/schema.sql");

pub fn initialize_database(path: &Path) -> Result<(), InfraError> {
    let connection = Connection::open(path)?;
    connection.execute_batch(SCHEMA_SQL)?;
    Ok(())
}

/// Opaque key-value store holding JSON-encoded values.
pub trait StateStore: Send + Sync {
    fn read_raw(&self, key: &str) -> Result<Option<String>, InfraError>;
    fn write_raw(&self, key: &str, value: &str) -> Result<(), InfraError>;
    fn remove(&self, key: &str) -> Result<(), InfraError>;
}

/// Reads a JSON value, substituting the fallback on a missing, unreadable or
/// unparsable entry. Storage faults never surface past this boundary.
pub fn load_or_default<T, F>(store: &dyn StateStore, key: &str, fallback: F) -> T
where
    T: DeserializeOwned,
    F: FnOnce() -> T,
{
    match store.read_raw(key) {
        Ok(Some(raw)) => serde_json::from_str(&raw).unwrap_or_else(|_| fallback()),
        _ => fallback(),
    }
}

pub fn save_json<T: Serialize + ?Sized>(
    store: &dyn StateStore,
    key: &str,
    value: &T,
) -> Result<(), InfraError> {
    let raw = serde_json::to_string(value)?;
    store.write_raw(key, &raw)
}

#[derive(Debug, Clone)]
pub struct SqliteStateStore {
    db_path: PathBuf,
}

impl SqliteStateStore {
    pub fn new(db_path: impl AsRef<Path>) -> Self {
        Self {
            db_path: db_path.as_ref().to_path_buf(),
        }
    }

    fn connect(&self) -> Result<Connection, InfraError> {
        Connection::open(&self.db_path).map_err(InfraError::from)
    }
}

impl StateStore for SqliteStateStore {
    fn read_raw(&self, key: &str) -> Result<Option<String>, InfraError> {
        let connection = self.connect()?;
        let value: Option<String> = connection
            .query_row(
                "SELECT value FROM app_state WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()?;
        Ok(value)
    }

    fn write_raw(&self, key: &str, value: &str) -> Result<(), InfraError> {
        let connection = self.connect()?;
        connection.execute(
            "INSERT INTO app_state (key, value, updated_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
            params![key, value, Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), InfraError> {
        let connection = self.connect()?;
        connection.execute("DELETE FROM app_state WHERE key = ?1", params![key])?;
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct InMemoryStateStore {
    entries: Mutex<HashMap<String, String>>,
}

impl StateStore for InMemoryStateStore {
    fn read_raw(&self, key: &str) -> Result<Option<String>, InfraError> {
        let entries = self
            .entries
            .lock()
            .map_err(|error| InfraError::InvalidConfig(format!("state lock poisoned: {error}")))?;
        Ok(entries.get(key).cloned())
    }

    fn write_raw(&self, key: &str, value: &str) -> Result<(), InfraError> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|error| InfraError::InvalidConfig(format!("state lock poisoned: {error}")))?;
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), InfraError> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|error| InfraError::InvalidConfig(format!("state lock poisoned: {error}")))?;
        entries.remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::{default_durations, DurationMinutes, ModeMap};

    #[test]
    fn load_or_default_falls_back_on_missing_entry() {
        let store = InMemoryStateStore::default();
        let durations: DurationMinutes =
            load_or_default(&store, "zen_pomodoro_settings", default_durations);
        assert_eq!(durations, default_durations());
    }

    #[test]
    fn load_or_default_falls_back_on_corrupt_entry() {
        let store = InMemoryStateStore::default();
        store
            .write_raw("zen_pomodoro_settings", "{not json")
            .expect("write entry");
        let durations: DurationMinutes =
            load_or_default(&store, "zen_pomodoro_settings", default_durations);
        assert_eq!(durations, default_durations());
    }

    #[test]
    fn save_then_load_round_trips() {
        let store = InMemoryStateStore::default();
        let custom = ModeMap::new(50, 10, 20);
        save_json(&store, "zen_pomodoro_settings", &custom).expect("save settings");
        let loaded: DurationMinutes =
            load_or_default(&store, "zen_pomodoro_settings", default_durations);
        assert_eq!(loaded, custom);
    }

    #[test]
    fn sqlite_store_persists_across_instances() {
        let dir = std::env::temp_dir().join(format!(
            "flowpomodoro-storage-tests-{}-{}",
            std::process::id(),
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .expect("clock after epoch")
                .as_nanos()
        ));
        std::fs::create_dir_all(&dir).expect("create temp dir");
        let db_path = dir.join("state.sqlite");
        initialize_database(&db_path).expect("initialize database");

        {
            let store = SqliteStateStore::new(&db_path);
            store
                .write_raw("flow_pomodoro_theme", "\"dark\"")
                .expect("write theme");
            store
                .write_raw("flow_pomodoro_theme", "\"light\"")
                .expect("overwrite theme");
        }

        let store = SqliteStateStore::new(&db_path);
        assert_eq!(
            store.read_raw("flow_pomodoro_theme").expect("read theme"),
            Some("\"light\"".to_string())
        );
        store.remove("flow_pomodoro_theme").expect("remove theme");
        assert_eq!(store.read_raw("flow_pomodoro_theme").expect("read theme"), None);

        let _ = std::fs::remove_dir_all(&dir);
    }
}
