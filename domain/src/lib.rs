//! Domain library for the guest check-in registry.
//!
//! This crate holds the guest record model, the ports (traits) the storage
//! adapters implement, and the registration controller. Keep adapters and IO
//! concerns out of this crate; concrete backends live in sibling crates.

use std::error::Error;
use std::fmt::{Display, Formatter};
use std::time::SystemTime;

use serde::{Deserialize, Serialize};

/// Unique identifier of a guest record, assigned at creation and immutable.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct GuestId(String);

impl GuestId {
    pub fn new<S: Into<String>>(s: S) -> Result<Self, CoreError> {
        let val = s.into();
        if val.trim().is_empty() {
            return Err(CoreError::InvalidId("empty".into()));
        }
        Ok(Self(val))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for GuestId {
    type Error = CoreError;

    fn try_from(s: String) -> Result<Self, CoreError> {
        Self::new(s)
    }
}

impl From<GuestId> for String {
    fn from(id: GuestId) -> String {
        id.0
    }
}

/// Display name of a guest. Non-empty after trimming; stored trimmed.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct GuestName(String);

impl GuestName {
    pub fn new<S: Into<String>>(s: S) -> Result<Self, CoreError> {
        let val = s.into();
        let trimmed = val.trim();
        if trimmed.is_empty() {
            return Err(CoreError::InvalidName("empty".into()));
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for GuestName {
    type Error = CoreError;

    fn try_from(s: String) -> Result<Self, CoreError> {
        Self::new(s)
    }
}

impl From<GuestName> for String {
    fn from(name: GuestName) -> String {
        name.0
    }
}

/// Input data for registering a new guest, normalized at the API boundary.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NewGuest {
    pub name: String,
    pub phone: Option<String>,
    pub companions: u32,
}

/// One check-in entry.
///
/// `created_at` is the sortable instant; `entry_time` is the human-readable
/// localized rendering produced once at creation and stored alongside it.
/// This is also the canonical JSON shape both adapters persist.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuestRecord {
    pub id: GuestId,
    pub name: GuestName,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default)]
    pub companions: u32,
    #[serde(rename = "created_at_ms", with = "time_ms")]
    pub created_at: SystemTime,
    pub entry_time: String,
}

/// Serialize `SystemTime` as integer milliseconds since the UNIX epoch so the
/// stored form stays sortable and locale-free.
pub mod time_ms {
    use std::time::{Duration, SystemTime, UNIX_EPOCH};

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(t: &SystemTime, s: S) -> Result<S::Ok, S::Error> {
        let ms = t
            .duration_since(UNIX_EPOCH)
            .unwrap_or(Duration::ZERO)
            .as_millis() as u64;
        s.serialize_u64(ms)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<SystemTime, D::Error> {
        let ms = u64::deserialize(d)?;
        Ok(UNIX_EPOCH + Duration::from_millis(ms))
    }
}

/// A full read of the collection, with fail-soft recovery made observable:
/// a store that recovered from a malformed payload reports it here rather
/// than returning an indistinguishable empty collection.
#[derive(Clone, Debug, Default)]
pub struct Snapshot {
    pub guests: Vec<GuestRecord>,
    pub warning: Option<StoreWarning>,
}

impl Snapshot {
    /// A snapshot with nothing to report.
    pub fn clean(guests: Vec<GuestRecord>) -> Self {
        Self {
            guests,
            warning: None,
        }
    }
}

/// Non-fatal condition a store recovered from while reading.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StoreWarning {
    /// The persisted payload did not parse; the store treated it as empty.
    MalformedData,
}

impl Display for StoreWarning {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreWarning::MalformedData => write!(f, "stored guest data was malformed"),
        }
    }
}

/// Time source abstraction to make code testable. `local_stamp` renders the
/// human-readable entry time stored alongside the sortable instant.
pub trait Clock: Send + Sync {
    fn now(&self) -> SystemTime;
    fn local_stamp(&self, t: SystemTime) -> String;
}

/// Guest id generator. Ids must be unique within one process lifetime.
pub trait IdGenerator: Send + Sync {
    fn next_id(&self, now: SystemTime) -> GuestId;
}

/// Storage port for the guest collection.
///
/// Both the local and the remote adapter implement the same four operations;
/// after every mutation the adapter, not the in-memory cache, is the source
/// of truth, so callers re-`list` rather than patching their copy.
pub trait GuestStore: Send + Sync {
    fn list(&self) -> Result<Snapshot, CoreError>;
    fn add(&self, guest: &GuestRecord) -> Result<(), CoreError>;
    /// Removing an absent id leaves the collection unchanged; not an error.
    fn delete_by_id(&self, id: &GuestId) -> Result<(), CoreError>;
    fn clear(&self) -> Result<(), CoreError>;
}

impl<T: GuestStore + ?Sized> GuestStore for std::sync::Arc<T> {
    fn list(&self) -> Result<Snapshot, CoreError> {
        (**self).list()
    }

    fn add(&self, guest: &GuestRecord) -> Result<(), CoreError> {
        (**self).add(guest)
    }

    fn delete_by_id(&self, id: &GuestId) -> Result<(), CoreError> {
        (**self).delete_by_id(id)
    }

    fn clear(&self) -> Result<(), CoreError> {
        (**self).clear()
    }
}

/// Core domain errors (no external error crates to keep deps at zero).
#[derive(Debug)]
pub enum CoreError {
    InvalidName(String),
    InvalidId(String),
    Config(String),
    Store(String),
}

impl Display for CoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            CoreError::InvalidName(msg) => write!(f, "invalid guest name: {}", msg),
            CoreError::InvalidId(msg) => write!(f, "invalid guest id: {}", msg),
            CoreError::Config(msg) => write!(f, "configuration error: {}", msg),
            CoreError::Store(msg) => write!(f, "store error: {}", msg),
        }
    }
}

impl Error for CoreError {}

// Re-export modules when added
pub mod adapters;
pub mod csv;
pub mod id;
pub mod service;
pub mod validate;
pub mod view;
