use std::sync::{Arc, Mutex};

use crate::{CoreError, GuestId, GuestRecord, GuestStore, Snapshot};

/// Simple in-memory guest store for tests.
///
/// Clones share the same underlying collection, so a test can hand a clone
/// to the controller and keep another to inspect the backend directly.
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<Vec<GuestRecord>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl GuestStore for MemoryStore {
    fn list(&self) -> Result<Snapshot, CoreError> {
        let guests = self
            .inner
            .lock()
            .map_err(|_| CoreError::Store("mutex poisoned".into()))?;
        Ok(Snapshot::clean(guests.clone()))
    }

    fn add(&self, guest: &GuestRecord) -> Result<(), CoreError> {
        let mut guests = self
            .inner
            .lock()
            .map_err(|_| CoreError::Store("mutex poisoned".into()))?;
        guests.push(guest.clone());
        Ok(())
    }

    fn delete_by_id(&self, id: &GuestId) -> Result<(), CoreError> {
        let mut guests = self
            .inner
            .lock()
            .map_err(|_| CoreError::Store("mutex poisoned".into()))?;
        guests.retain(|g| g.id != *id);
        Ok(())
    }

    fn clear(&self) -> Result<(), CoreError> {
        let mut guests = self
            .inner
            .lock()
            .map_err(|_| CoreError::Store("mutex poisoned".into()))?;
        guests.clear();
        Ok(())
    }
}
