//! Registration controller.
//!
//! Routes every CRUD call to the storage backend matching the current mode
//! and keeps an in-memory cache that mirrors the backend after every
//! successful write. The cache is never patched incrementally: each mutation
//! re-reads the full collection from the same adapter it wrote to, so the
//! cache is always a faithful snapshot of the adapter's state.

use std::sync::Mutex;

use crate::{
    validate, view, Clock, CoreError, GuestId, GuestName, GuestRecord, GuestStore, IdGenerator,
    NewGuest, StoreWarning,
};

/// Connection state of the registry.
///
/// Decided once at startup; `Reconnecting` only occurs while an externally
/// triggered [`Registry::reconnect`] is in flight. There is no automatic
/// re-probe and no fallback from `Online` back to `Offline` mid-session.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Mode {
    Offline,
    Online,
    Reconnecting,
}

impl Mode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Mode::Offline => "offline",
            Mode::Online => "online",
            Mode::Reconnecting => "reconnecting",
        }
    }
}

/// The registration controller. Constructed once at startup and handed to
/// every handler as shared state; handlers never reach for a global.
pub struct Registry<G: IdGenerator, C: Clock> {
    local: Box<dyn GuestStore>,
    remote: Mutex<Option<Box<dyn GuestStore>>>,
    mode: Mutex<Mode>,
    ids: G,
    clock: C,
    cache: Mutex<Vec<GuestRecord>>,
    // Single-slot guard: at most one mutation (write plus cache refresh) is
    // in flight at a time, so concurrent triggers cannot interleave.
    write_gate: Mutex<()>,
}

impl<G: IdGenerator, C: Clock> Registry<G, C> {
    /// Offline registry backed by the local store only.
    ///
    /// The initial cache comes from the local collection; a malformed payload
    /// is reported to the caller for a non-fatal notice, never raised.
    pub fn offline(
        local: Box<dyn GuestStore>,
        ids: G,
        clock: C,
    ) -> Result<(Self, Option<StoreWarning>), CoreError> {
        let snap = local.list()?;
        let registry = Self {
            local,
            remote: Mutex::new(None),
            mode: Mutex::new(Mode::Offline),
            ids,
            clock,
            cache: Mutex::new(snap.guests),
            write_gate: Mutex::new(()),
        };
        Ok((registry, snap.warning))
    }

    /// Online registry: the remote collection is authoritative from the
    /// first read. A failing initial `list` surfaces here so the caller can
    /// fall back to [`Registry::offline`] instead.
    pub fn online(
        local: Box<dyn GuestStore>,
        remote: Box<dyn GuestStore>,
        ids: G,
        clock: C,
    ) -> Result<Self, CoreError> {
        let snap = remote.list()?;
        Ok(Self {
            local,
            remote: Mutex::new(Some(remote)),
            mode: Mutex::new(Mode::Online),
            ids,
            clock,
            cache: Mutex::new(snap.guests),
            write_gate: Mutex::new(()),
        })
    }

    pub fn mode(&self) -> Result<Mode, CoreError> {
        let mode = self
            .mode
            .lock()
            .map_err(|_| CoreError::Store("mutex poisoned".into()))?;
        Ok(*mode)
    }

    /// Snapshot of the cached collection, in at-rest (insertion) order.
    pub fn guests(&self) -> Result<Vec<GuestRecord>, CoreError> {
        let cache = self
            .cache
            .lock()
            .map_err(|_| CoreError::Store("mutex poisoned".into()))?;
        Ok(cache.clone())
    }

    pub fn stats(&self) -> Result<view::Stats, CoreError> {
        let cache = self
            .cache
            .lock()
            .map_err(|_| CoreError::Store("mutex poisoned".into()))?;
        Ok(view::stats(&cache))
    }

    /// The display list: most recent first, capped.
    pub fn recent(&self, limit: usize) -> Result<Vec<GuestRecord>, CoreError> {
        let cache = self
            .cache
            .lock()
            .map_err(|_| CoreError::Store("mutex poisoned".into()))?;
        Ok(view::recent(&cache, limit))
    }

    /// Register a new guest: validate, stamp id and both timestamps, write
    /// through the active adapter, then refresh the cache from it.
    ///
    /// On any failure the cache is left untouched and the error is returned
    /// for user notification; the operation is not retried.
    pub fn register(&self, input: NewGuest) -> Result<GuestRecord, CoreError> {
        let name = GuestName::new(input.name)?;
        let _gate = self
            .write_gate
            .lock()
            .map_err(|_| CoreError::Store("mutex poisoned".into()))?;
        let now = self.clock.now();
        let record = GuestRecord {
            id: self.ids.next_id(now),
            name,
            phone: validate::normalize_phone(input.phone.as_deref()),
            companions: input.companions,
            created_at: now,
            entry_time: self.clock.local_stamp(now),
        };
        self.with_active(|store| {
            store.add(&record)?;
            let snap = store.list()?;
            self.replace_cache(snap.guests)
        })?;
        Ok(record)
    }

    /// Delete one record by id. An absent id is a no-op at the adapter, so
    /// the refreshed cache simply comes back unchanged.
    pub fn remove(&self, id: &GuestId) -> Result<(), CoreError> {
        let _gate = self
            .write_gate
            .lock()
            .map_err(|_| CoreError::Store("mutex poisoned".into()))?;
        self.with_active(|store| {
            store.delete_by_id(id)?;
            let snap = store.list()?;
            self.replace_cache(snap.guests)
        })
    }

    /// Delete every record through the active adapter.
    pub fn clear_all(&self) -> Result<(), CoreError> {
        let _gate = self
            .write_gate
            .lock()
            .map_err(|_| CoreError::Store("mutex poisoned".into()))?;
        self.with_active(|store| {
            store.clear()?;
            let snap = store.list()?;
            self.replace_cache(snap.guests)
        })
    }

    /// Re-read the full collection from the active adapter into the cache.
    pub fn refresh(&self) -> Result<Option<StoreWarning>, CoreError> {
        let _gate = self
            .write_gate
            .lock()
            .map_err(|_| CoreError::Store("mutex poisoned".into()))?;
        let snap = self.with_active(|store| store.list())?;
        let warning = snap.warning;
        self.replace_cache(snap.guests)?;
        Ok(warning)
    }

    /// Externally triggered transition `Offline -> Reconnecting -> Online`.
    ///
    /// `connect` performs the remote init round trip. While the attempt is
    /// in flight, mutations keep dispatching to the local store. On connect
    /// or initial-list failure the mode drops back to `Offline` and the
    /// cache is left untouched.
    pub fn reconnect<F>(&self, connect: F) -> Result<(), CoreError>
    where
        F: FnOnce() -> Result<Box<dyn GuestStore>, CoreError>,
    {
        {
            let mut mode = self
                .mode
                .lock()
                .map_err(|_| CoreError::Store("mutex poisoned".into()))?;
            match *mode {
                Mode::Online => return Ok(()),
                Mode::Reconnecting => {
                    return Err(CoreError::Store("reconnect already in progress".into()))
                }
                Mode::Offline => *mode = Mode::Reconnecting,
            }
        }
        match connect().and_then(|store| store.list().map(|snap| (store, snap))) {
            Ok((store, snap)) => {
                // Lock order matches the mutation path: gate first.
                let _gate = self
                    .write_gate
                    .lock()
                    .map_err(|_| CoreError::Store("mutex poisoned".into()))?;
                {
                    let mut remote = self
                        .remote
                        .lock()
                        .map_err(|_| CoreError::Store("mutex poisoned".into()))?;
                    *remote = Some(store);
                }
                self.replace_cache(snap.guests)?;
                let mut mode = self
                    .mode
                    .lock()
                    .map_err(|_| CoreError::Store("mutex poisoned".into()))?;
                *mode = Mode::Online;
                Ok(())
            }
            Err(e) => {
                let mut mode = self
                    .mode
                    .lock()
                    .map_err(|_| CoreError::Store("mutex poisoned".into()))?;
                *mode = Mode::Offline;
                Err(e)
            }
        }
    }

    /// Run `f` against the store matching the current mode. `Reconnecting`
    /// still dispatches locally: the remote only becomes active once the
    /// transition to `Online` completes.
    fn with_active<T>(
        &self,
        f: impl FnOnce(&dyn GuestStore) -> Result<T, CoreError>,
    ) -> Result<T, CoreError> {
        let mode = {
            let mode = self
                .mode
                .lock()
                .map_err(|_| CoreError::Store("mutex poisoned".into()))?;
            *mode
        };
        match mode {
            Mode::Online => {
                let remote = self
                    .remote
                    .lock()
                    .map_err(|_| CoreError::Store("mutex poisoned".into()))?;
                match remote.as_deref() {
                    Some(store) => f(store),
                    None => Err(CoreError::Store("online mode without a remote store".into())),
                }
            }
            Mode::Offline | Mode::Reconnecting => f(self.local.as_ref()),
        }
    }

    fn replace_cache(&self, guests: Vec<GuestRecord>) -> Result<(), CoreError> {
        let mut cache = self
            .cache
            .lock()
            .map_err(|_| CoreError::Store("mutex poisoned".into()))?;
        *cache = guests;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::time::{Duration, SystemTime, UNIX_EPOCH};

    use super::*;
    use crate::adapters::memory_store::MemoryStore;
    use crate::id::TimestampIds;
    use crate::Snapshot;

    /// Deterministic clock that advances one second per `now()` call.
    struct TickClock {
        ticks: AtomicU64,
    }

    impl TickClock {
        fn new() -> Self {
            Self {
                ticks: AtomicU64::new(0),
            }
        }
    }

    impl Clock for TickClock {
        fn now(&self) -> SystemTime {
            let t = self.ticks.fetch_add(1, Ordering::Relaxed);
            UNIX_EPOCH + Duration::from_secs(t)
        }

        fn local_stamp(&self, _t: SystemTime) -> String {
            "1/1/24, 10:00".into()
        }
    }

    /// Store whose mutations always fail; `list` still works.
    struct FailingStore(MemoryStore);

    impl GuestStore for FailingStore {
        fn list(&self) -> Result<Snapshot, CoreError> {
            self.0.list()
        }

        fn add(&self, _guest: &GuestRecord) -> Result<(), CoreError> {
            Err(CoreError::Store("connection refused".into()))
        }

        fn delete_by_id(&self, _id: &GuestId) -> Result<(), CoreError> {
            Err(CoreError::Store("connection refused".into()))
        }

        fn clear(&self) -> Result<(), CoreError> {
            Err(CoreError::Store("connection refused".into()))
        }
    }

    fn offline_registry() -> (Registry<TimestampIds, TickClock>, MemoryStore) {
        let store = MemoryStore::new();
        let (registry, warning) = Registry::offline(
            Box::new(store.clone()),
            TimestampIds::new(),
            TickClock::new(),
        )
        .expect("offline init");
        assert!(warning.is_none());
        (registry, store)
    }

    fn new_guest(name: &str, companions: u32) -> NewGuest {
        NewGuest {
            name: name.into(),
            phone: None,
            companions,
        }
    }

    #[test]
    fn cache_matches_store_after_every_mutation() {
        let (registry, store) = offline_registry();

        let ana = registry.register(new_guest("Ana", 2)).unwrap();
        assert_eq!(registry.guests().unwrap(), store.list().unwrap().guests);

        registry.register(new_guest("Luis", 0)).unwrap();
        assert_eq!(registry.guests().unwrap(), store.list().unwrap().guests);

        registry.remove(&ana.id).unwrap();
        assert_eq!(registry.guests().unwrap(), store.list().unwrap().guests);

        registry.clear_all().unwrap();
        assert_eq!(registry.guests().unwrap(), store.list().unwrap().guests);
        assert!(registry.guests().unwrap().is_empty());
    }

    #[test]
    fn register_stamps_id_and_both_timestamps() {
        let (registry, _store) = offline_registry();
        let guest = registry
            .register(NewGuest {
                name: " Ana ".into(),
                phone: Some(" 555 ".into()),
                companions: 2,
            })
            .unwrap();
        assert_eq!(guest.name.as_str(), "Ana");
        assert_eq!(guest.phone.as_deref(), Some("555"));
        assert!(!guest.id.as_str().is_empty());
        assert_eq!(guest.entry_time, "1/1/24, 10:00");
    }

    #[test]
    fn register_rejects_blank_name_without_touching_cache() {
        let (registry, _store) = offline_registry();
        registry.register(new_guest("Ana", 0)).unwrap();
        let err = registry.register(new_guest("  ", 0)).unwrap_err();
        assert!(matches!(err, CoreError::InvalidName(_)));
        assert_eq!(registry.guests().unwrap().len(), 1);
    }

    #[test]
    fn remove_absent_id_leaves_collection_unchanged() {
        let (registry, _store) = offline_registry();
        registry.register(new_guest("Ana", 1)).unwrap();
        let missing = GuestId::new("nope").unwrap();
        registry.remove(&missing).unwrap();
        assert_eq!(registry.guests().unwrap().len(), 1);
    }

    #[test]
    fn failed_mutation_leaves_cache_untouched() {
        let backing = MemoryStore::new();
        let (registry, _) = Registry::offline(
            Box::new(FailingStore(backing)),
            TimestampIds::new(),
            TickClock::new(),
        )
        .unwrap();
        let err = registry.register(new_guest("Ana", 0)).unwrap_err();
        assert!(matches!(err, CoreError::Store(_)));
        assert!(registry.guests().unwrap().is_empty());
    }

    #[test]
    fn online_registry_reads_and_writes_the_remote() {
        let local = MemoryStore::new();
        let remote = MemoryStore::new();
        let registry = Registry::online(
            Box::new(local.clone()),
            Box::new(remote.clone()),
            TimestampIds::new(),
            TickClock::new(),
        )
        .unwrap();
        assert_eq!(registry.mode().unwrap(), Mode::Online);

        registry.register(new_guest("Ana", 2)).unwrap();
        assert_eq!(remote.list().unwrap().guests.len(), 1);
        assert!(local.list().unwrap().guests.is_empty());
        assert_eq!(registry.guests().unwrap(), remote.list().unwrap().guests);
    }

    #[test]
    fn reconnect_switches_to_the_remote_collection() {
        let (registry, _local) = offline_registry();
        registry.register(new_guest("Ana", 0)).unwrap();

        let remote = MemoryStore::new();
        remote
            .add(&GuestRecord {
                id: GuestId::new("r1").unwrap(),
                name: GuestName::new("Remota").unwrap(),
                phone: None,
                companions: 4,
                created_at: UNIX_EPOCH + Duration::from_secs(99),
                entry_time: "9/9/24, 09:00".into(),
            })
            .unwrap();

        let handle = remote.clone();
        registry
            .reconnect(move || Ok(Box::new(handle) as Box<dyn GuestStore>))
            .unwrap();

        assert_eq!(registry.mode().unwrap(), Mode::Online);
        assert_eq!(registry.guests().unwrap(), remote.list().unwrap().guests);
    }

    #[test]
    fn failed_reconnect_drops_back_to_offline() {
        let (registry, _local) = offline_registry();
        registry.register(new_guest("Ana", 0)).unwrap();
        let before = registry.guests().unwrap();

        let err = registry
            .reconnect(|| Err(CoreError::Store("dns failure".into())))
            .unwrap_err();
        assert!(matches!(err, CoreError::Store(_)));
        assert_eq!(registry.mode().unwrap(), Mode::Offline);
        assert_eq!(registry.guests().unwrap(), before);
    }

    #[test]
    fn reconnect_while_online_is_a_noop() {
        let registry = Registry::online(
            Box::new(MemoryStore::new()),
            Box::new(MemoryStore::new()),
            TimestampIds::new(),
            TickClock::new(),
        )
        .unwrap();
        registry
            .reconnect(|| Err(CoreError::Store("should not be called".into())))
            .unwrap();
        assert_eq!(registry.mode().unwrap(), Mode::Online);
    }

    #[test]
    fn refresh_reports_store_warnings() {
        struct MalformedStore;
        impl GuestStore for MalformedStore {
            fn list(&self) -> Result<Snapshot, CoreError> {
                Ok(Snapshot {
                    guests: Vec::new(),
                    warning: Some(StoreWarning::MalformedData),
                })
            }
            fn add(&self, _guest: &GuestRecord) -> Result<(), CoreError> {
                Ok(())
            }
            fn delete_by_id(&self, _id: &GuestId) -> Result<(), CoreError> {
                Ok(())
            }
            fn clear(&self) -> Result<(), CoreError> {
                Ok(())
            }
        }

        let (registry, warning) = Registry::offline(
            Box::new(MalformedStore),
            TimestampIds::new(),
            TickClock::new(),
        )
        .unwrap();
        assert_eq!(warning, Some(StoreWarning::MalformedData));
        assert_eq!(
            registry.refresh().unwrap(),
            Some(StoreWarning::MalformedData)
        );
    }
}
