#[cfg(test)]
use std::collections::HashMap;
#[cfg(test)]
use std::sync::{Mutex, OnceLock};
#[cfg(test)]
use tokio::sync::Mutex as TokioMutex;

use depot_session::storage::{decode, encode};
use depot_session::{Session, SessionStorage, StorageError};
use tracing::debug;
#[cfg(not(test))]
use tracing::warn;

#[cfg(not(test))]
const KEYRING_SERVICE: &str = "depot-cli";

fn keyring_key(context_name: &str) -> String {
    format!("session::{context_name}")
}

/// Session record kept in the OS keychain, one entry per context.
pub(crate) struct KeyringStorage {
    context_name: String,
}

impl KeyringStorage {
    pub(crate) fn new(context_name: &str) -> Self {
        Self {
            context_name: context_name.to_string(),
        }
    }
}

impl SessionStorage for KeyringStorage {
    fn load(&self) -> Result<Option<Session>, StorageError> {
        match keyring_get(&self.context_name)? {
            Some(raw) => decode(&raw),
            None => Ok(None),
        }
    }

    fn save(&self, session: &Session) -> Result<(), StorageError> {
        let raw = encode(session)?;
        keyring_set(&self.context_name, &raw)?;
        debug!(context = %self.context_name, "stored session in keyring");
        Ok(())
    }
}

pub(crate) fn delete_session_record(context_name: &str) -> anyhow::Result<()> {
    keyring_delete(context_name)?;
    Ok(())
}

#[cfg(not(test))]
fn keyring_entry(context_name: &str) -> Result<keyring::Entry, StorageError> {
    keyring::Entry::new(KEYRING_SERVICE, &keyring_key(context_name))
        .map_err(|err| StorageError::Backend(format!("failed to access keyring: {err}")))
}

#[cfg(not(test))]
fn keyring_set(context_name: &str, value: &str) -> Result<(), StorageError> {
    keyring_entry(context_name)?
        .set_password(value)
        .map_err(|err| StorageError::Backend(format!("failed to store session: {err}")))
}

#[cfg(not(test))]
fn keyring_get(context_name: &str) -> Result<Option<String>, StorageError> {
    match keyring_entry(context_name)?.get_password() {
        Ok(value) => Ok(Some(value)),
        Err(keyring::Error::NoEntry) => Ok(None),
        Err(err) => Err(StorageError::Backend(format!(
            "failed to load session from keychain for context '{context_name}': {err}"
        ))),
    }
}

#[cfg(not(test))]
fn keyring_delete(context_name: &str) -> Result<(), StorageError> {
    match keyring_entry(context_name)?.delete_password() {
        Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
        Err(err) => {
            warn!(context = %context_name, "failed to delete session: {err}");
            Ok(())
        }
    }
}

#[cfg(test)]
fn keyring_store() -> &'static Mutex<HashMap<String, String>> {
    static STORE: OnceLock<Mutex<HashMap<String, String>>> = OnceLock::new();
    STORE.get_or_init(|| Mutex::new(HashMap::new()))
}

#[cfg(test)]
static KEYRING_TEST_LOCK: OnceLock<TokioMutex<()>> = OnceLock::new();

#[cfg(test)]
pub(crate) fn lock_keyring_tests_sync() -> tokio::sync::MutexGuard<'static, ()> {
    KEYRING_TEST_LOCK
        .get_or_init(|| TokioMutex::new(()))
        .blocking_lock()
}

#[cfg(test)]
pub(crate) async fn lock_keyring_tests_async() -> tokio::sync::MutexGuard<'static, ()> {
    KEYRING_TEST_LOCK
        .get_or_init(|| TokioMutex::new(()))
        .lock()
        .await
}

#[cfg(test)]
fn keyring_set(context_name: &str, value: &str) -> Result<(), StorageError> {
    let mut store = keyring_store()
        .lock()
        .map_err(|_| StorageError::Backend("failed to lock keyring store".to_string()))?;
    store.insert(keyring_key(context_name), value.to_string());
    Ok(())
}

#[cfg(test)]
fn keyring_get(context_name: &str) -> Result<Option<String>, StorageError> {
    let store = keyring_store()
        .lock()
        .map_err(|_| StorageError::Backend("failed to lock keyring store".to_string()))?;
    Ok(store.get(&keyring_key(context_name)).cloned())
}

#[cfg(test)]
fn keyring_delete(context_name: &str) -> Result<(), StorageError> {
    let mut store = keyring_store()
        .lock()
        .map_err(|_| StorageError::Backend("failed to lock keyring store".to_string()))?;
    store.remove(&keyring_key(context_name));
    Ok(())
}

#[cfg(test)]
pub(crate) fn seed_keyring_mock(context_name: &str, raw: &str) {
    if let Ok(mut map) = keyring_store().lock() {
        map.insert(keyring_key(context_name), raw.to_string());
    }
}

#[cfg(test)]
pub(crate) fn clear_keyring_mock() {
    if let Ok(mut map) = keyring_store().lock() {
        map.clear();
    }
}
