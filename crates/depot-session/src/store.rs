use std::sync::{Arc, PoisonError, RwLock};

use tracing::{debug, warn};

use crate::error::StorageError;
use crate::storage::SessionStorage;
use crate::types::Session;

#[derive(Debug, Default)]
struct Committed {
    session: Session,
    version: u64,
}

/// Process-wide holder of the current [`Session`].
///
/// Every commit bumps `version` and is persisted before the call returns.
/// Writers are serialized by [`crate::SessionMachine`]; reads only take the
/// read lock long enough to clone a snapshot.
pub struct TokenStore {
    current: RwLock<Committed>,
    storage: Arc<dyn SessionStorage>,
}

impl TokenStore {
    pub fn new(storage: Arc<dyn SessionStorage>) -> Self {
        Self {
            current: RwLock::new(Committed::default()),
            storage,
        }
    }

    /// Loads the persisted record into memory.
    ///
    /// A missing record yields an empty session. On a corrupt record the
    /// store resets to (and persists) an empty session, then returns the error
    /// so the caller can record the failure.
    pub fn hydrate(&self) -> Result<Session, StorageError> {
        match self.storage.load() {
            Ok(loaded) => {
                let session = loaded.map(Session::normalized).unwrap_or_default();
                self.replace(session.clone());
                debug!(
                    authenticated = session.is_authenticated,
                    "session hydrated from storage"
                );
                Ok(session)
            }
            Err(err) => {
                self.replace(Session::default());
                self.persist(&Session::default());
                Err(err)
            }
        }
    }

    #[must_use]
    pub fn get(&self) -> Session {
        self.read(|committed| committed.session.clone())
    }

    #[must_use]
    pub fn version(&self) -> u64 {
        self.read(|committed| committed.version)
    }

    /// Session and the version it was committed at, read atomically.
    #[must_use]
    pub fn snapshot(&self) -> (Session, u64) {
        self.read(|committed| (committed.session.clone(), committed.version))
    }

    /// Commits `session` and returns the new version.
    pub fn set(&self, session: Session) -> u64 {
        let version = self.replace(session.clone());
        self.persist(&session);
        version
    }

    /// Commits only if nothing was committed since `expected`.
    pub fn set_if_version(&self, expected: u64, session: Session) -> Option<u64> {
        let version = {
            let mut committed = self.current.write().unwrap_or_else(PoisonError::into_inner);
            if committed.version != expected {
                debug!(
                    expected,
                    actual = committed.version,
                    "discarding stale session write"
                );
                return None;
            }
            committed.session = session.clone();
            committed.version += 1;
            committed.version
        };
        self.persist(&session);
        Some(version)
    }

    pub fn clear(&self) -> u64 {
        self.set(Session::default())
    }

    /// Writes `session` to durable storage. Failures are logged, never raised.
    pub fn persist(&self, session: &Session) {
        if let Err(err) = self.storage.save(session) {
            warn!(error = %err, "failed to persist session");
        }
    }

    fn replace(&self, session: Session) -> u64 {
        let mut committed = self.current.write().unwrap_or_else(PoisonError::into_inner);
        committed.session = session;
        committed.version += 1;
        committed.version
    }

    fn read<T>(&self, f: impl FnOnce(&Committed) -> T) -> T {
        let committed = self.current.read().unwrap_or_else(PoisonError::into_inner);
        f(&committed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStorage;
    use crate::testing::alice_session;

    #[test]
    fn set_persists_and_bumps_version() -> Result<(), StorageError> {
        let storage = Arc::new(MemoryStorage::new());
        let store = TokenStore::new(storage.clone());
        let before = store.version();
        let version = store.set(alice_session("A1", "R1"));
        assert_eq!(version, before + 1);
        assert_eq!(store.get(), alice_session("A1", "R1"));
        assert_eq!(storage.load()?, Some(alice_session("A1", "R1")));
        Ok(())
    }

    #[test]
    fn clear_empties_memory_and_storage() -> Result<(), StorageError> {
        let storage = Arc::new(MemoryStorage::new());
        let store = TokenStore::new(storage.clone());
        store.set(alice_session("A1", "R1"));
        store.clear();
        assert_eq!(store.get(), Session::default());
        assert_eq!(storage.load()?, Some(Session::default()));
        Ok(())
    }

    #[test]
    fn set_if_version_rejects_stale_writer() {
        let store = TokenStore::new(Arc::new(MemoryStorage::new()));
        let (_, seen) = store.snapshot();
        store.clear();
        assert_eq!(store.set_if_version(seen, alice_session("A1", "R1")), None);
        assert_eq!(store.get(), Session::default());

        let current = store.version();
        assert_eq!(
            store.set_if_version(current, alice_session("A1", "R1")),
            Some(current + 1)
        );
    }

    #[test]
    fn hydrate_reads_persisted_session() -> Result<(), StorageError> {
        let storage = Arc::new(MemoryStorage::new());
        storage.save(&alice_session("A1", "R1"))?;
        let store = TokenStore::new(storage);
        assert_eq!(store.hydrate()?, alice_session("A1", "R1"));
        assert_eq!(store.get(), alice_session("A1", "R1"));
        Ok(())
    }

    #[test]
    fn hydrate_resets_corrupt_record() {
        let storage = Arc::new(MemoryStorage::with_raw("{\"user\": 42"));
        let store = TokenStore::new(storage.clone());
        let err = store.hydrate().expect_err("corrupt record");
        assert!(matches!(err, StorageError::Corrupt(_)));
        assert_eq!(store.get(), Session::default());
        assert!(matches!(storage.load(), Ok(Some(session)) if session.is_empty()));
    }
}
