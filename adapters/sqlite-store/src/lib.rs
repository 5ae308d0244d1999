//! sqlite-store — SQLite implementation of the GuestStore port for offline mode.
//!
//! Purpose
//! - Provide lightweight, file-based persistence so the registry runs
//!   without the remote document store.
//! - Implements the `GuestStore` trait from the `domain` crate.
//! - Also hosts the small key-value flag space the app shares with the guest
//!   collection: the "configured" marker and the saved remote config.
//!
//! Notes
//! - Uses `rusqlite` with the `bundled` feature for portability.
//! - The whole guest collection serializes as one JSON array under a single
//!   kv key; every mutation rewrites it wholesale. A payload that fails to
//!   parse reads as an empty collection with an observable warning, never as
//!   an error.

use std::path::Path;
use std::sync::Mutex;

use domain::{CoreError, GuestId, GuestRecord, GuestStore, Snapshot, StoreWarning};
use rusqlite::{params, Connection};

/// Key holding the serialized guest collection.
const GUESTS_KEY: &str = "guests";
/// Flag set once the app has completed first-run configuration.
pub const CONFIGURED_KEY: &str = "app_configured";
/// Previously saved remote store configuration (JSON), if any.
pub const REMOTE_CONFIG_KEY: &str = "docstore_config";

/// SQLite-backed store for offline operation.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open (or create) a SQLite database at the given path and ensure schema.
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self, CoreError> {
        let conn = Connection::open(path).map_err(map_sqerr)?;
        init_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Read one kv entry.
    pub fn get_value(&self, key: &str) -> Result<Option<String>, CoreError> {
        let conn = self
            .conn
            .lock()
            .map_err(|_| CoreError::Store("mutex poisoned".into()))?;
        let mut stmt = conn
            .prepare("SELECT value FROM kv WHERE key = ?1")
            .map_err(map_sqerr)?;
        let mut rows = stmt.query(params![key]).map_err(map_sqerr)?;
        if let Some(row) = rows.next().map_err(map_sqerr)? {
            Ok(Some(row.get(0).map_err(map_sqerr)?))
        } else {
            Ok(None)
        }
    }

    /// Write one kv entry, replacing any previous value.
    pub fn set_value(&self, key: &str, value: &str) -> Result<(), CoreError> {
        let conn = self
            .conn
            .lock()
            .map_err(|_| CoreError::Store("mutex poisoned".into()))?;
        conn.execute(
            "INSERT OR REPLACE INTO kv(key, value) VALUES (?1, ?2)",
            params![key, value],
        )
        .map_err(map_sqerr)?;
        Ok(())
    }

    /// Whether first-run configuration has completed.
    pub fn is_configured(&self) -> Result<bool, CoreError> {
        Ok(self.get_value(CONFIGURED_KEY)?.as_deref() == Some("true"))
    }

    pub fn mark_configured(&self) -> Result<(), CoreError> {
        self.set_value(CONFIGURED_KEY, "true")
    }

    /// Remote config JSON saved by a previous successful connection.
    pub fn saved_remote_config(&self) -> Result<Option<String>, CoreError> {
        self.get_value(REMOTE_CONFIG_KEY)
    }

    pub fn save_remote_config(&self, json: &str) -> Result<(), CoreError> {
        self.set_value(REMOTE_CONFIG_KEY, json)
    }

    fn read_guests(&self) -> Result<Snapshot, CoreError> {
        match self.get_value(GUESTS_KEY)? {
            None => Ok(Snapshot::clean(Vec::new())),
            Some(text) => match serde_json::from_str::<Vec<GuestRecord>>(&text) {
                Ok(guests) => Ok(Snapshot::clean(guests)),
                // Fail soft: a payload we cannot parse reads as empty, with
                // the recovery reported in the snapshot
                Err(_) => Ok(Snapshot {
                    guests: Vec::new(),
                    warning: Some(StoreWarning::MalformedData),
                }),
            },
        }
    }

    fn write_guests(&self, guests: &[GuestRecord]) -> Result<(), CoreError> {
        let text = serde_json::to_string(guests)
            .map_err(|e| CoreError::Store(format!("serialize guests: {e}")))?;
        self.set_value(GUESTS_KEY, &text)
    }
}

fn init_schema(conn: &Connection) -> Result<(), CoreError> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS kv (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL
        );
        "#,
    )
    .map_err(map_sqerr)
}

fn map_sqerr<E: std::fmt::Display>(e: E) -> CoreError {
    CoreError::Store(format!("sqlite error: {e}"))
}

impl GuestStore for SqliteStore {
    fn list(&self) -> Result<Snapshot, CoreError> {
        self.read_guests()
    }

    fn add(&self, guest: &GuestRecord) -> Result<(), CoreError> {
        let mut guests = self.read_guests()?.guests;
        guests.push(guest.clone());
        self.write_guests(&guests)
    }

    fn delete_by_id(&self, id: &GuestId) -> Result<(), CoreError> {
        let mut guests = self.read_guests()?.guests;
        let before = guests.len();
        guests.retain(|g| g.id != *id);
        if guests.len() == before {
            // Absent id: leave the stored payload as is
            return Ok(());
        }
        self.write_guests(&guests)
    }

    fn clear(&self) -> Result<(), CoreError> {
        self.write_guests(&[])
    }
}
