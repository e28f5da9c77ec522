//! In-memory configuration store.
//!
//! Mirrors NVS semantics closely enough for host testing: writes are staged
//! until commit, and a simulated power loss drops anything uncommitted.
//! Clones share the same underlying storage so a test can keep a handle
//! after giving the store to the manager.

use super::{ConfigStore, StoreError};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

#[derive(Debug, Clone, PartialEq, Eq)]
enum StoredValue {
    Bool(bool),
    Text(String),
}

#[derive(Debug, Default)]
struct MemoryState {
    durable: BTreeMap<String, StoredValue>,
    /// `None` stages a removal.
    staged: BTreeMap<String, Option<StoredValue>>,
    failing_reads: BTreeSet<String>,
    fail_commits: bool,
    commits: usize,
}

impl MemoryState {
    fn lookup(&self, key: &str) -> Result<Option<StoredValue>, StoreError> {
        if self.failing_reads.contains(key) {
            return Err(StoreError::Read {
                key: key.to_string(),
                reason: "corrupt entry".to_string(),
            });
        }
        match self.staged.get(key) {
            Some(staged) => Ok(staged.clone()),
            None => Ok(self.durable.get(key).cloned()),
        }
    }
}

/// Shared in-memory store.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryStore {
    /// Create an empty store, as on first boot.
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Make every read of `key` fail, as with a corrupt entry.
    pub fn fail_reads(&self, key: &str) {
        self.state().failing_reads.insert(key.to_string());
    }

    /// Make commits fail (e.g. storage full).
    pub fn fail_commits(&self, fail: bool) {
        self.state().fail_commits = fail;
    }

    /// Drop staged writes, as a reset before commit would.
    pub fn power_loss(&self) {
        self.state().staged.clear();
    }

    /// Durable boolean value of `key`, ignoring staged writes.
    pub fn durable_bool(&self, key: &str) -> Option<bool> {
        match self.state().durable.get(key) {
            Some(StoredValue::Bool(value)) => Some(*value),
            _ => None,
        }
    }

    /// Durable string value of `key`, ignoring staged writes.
    pub fn durable_str(&self, key: &str) -> Option<String> {
        match self.state().durable.get(key) {
            Some(StoredValue::Text(value)) => Some(value.clone()),
            _ => None,
        }
    }

    /// Number of successful commits so far.
    pub fn commit_count(&self) -> usize {
        self.state().commits
    }
}

impl ConfigStore for MemoryStore {
    fn get_bool(&self, key: &str) -> Result<Option<bool>, StoreError> {
        match self.state().lookup(key)? {
            None => Ok(None),
            Some(StoredValue::Bool(value)) => Ok(Some(value)),
            Some(StoredValue::Text(_)) => Err(StoreError::TypeMismatch {
                key: key.to_string(),
            }),
        }
    }

    fn get_str(&self, key: &str) -> Result<Option<String>, StoreError> {
        match self.state().lookup(key)? {
            None => Ok(None),
            Some(StoredValue::Text(value)) => Ok(Some(value)),
            Some(StoredValue::Bool(_)) => Err(StoreError::TypeMismatch {
                key: key.to_string(),
            }),
        }
    }

    fn set_bool(&mut self, key: &str, value: bool) -> Result<(), StoreError> {
        self.state()
            .staged
            .insert(key.to_string(), Some(StoredValue::Bool(value)));
        Ok(())
    }

    fn set_str(&mut self, key: &str, value: &str) -> Result<(), StoreError> {
        self.state()
            .staged
            .insert(key.to_string(), Some(StoredValue::Text(value.to_string())));
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<(), StoreError> {
        self.state().staged.insert(key.to_string(), None);
        Ok(())
    }

    fn commit(&mut self) -> Result<(), StoreError> {
        let mut state = self.state();
        if state.fail_commits {
            return Err(StoreError::Commit("storage full".to_string()));
        }
        let staged = std::mem::take(&mut state.staged);
        for (key, value) in staged {
            match value {
                Some(value) => {
                    state.durable.insert(key, value);
                }
                None => {
                    state.durable.remove(&key);
                }
            }
        }
        state.commits += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_staged_write_visible_before_commit() {
        let mut store = MemoryStore::new();
        store.set_str("k", "v").unwrap();
        assert_eq!(store.get_str("k").unwrap(), Some("v".to_string()));
        assert_eq!(store.durable_str("k"), None);
    }

    #[test]
    fn test_power_loss_keeps_prior_durable_value() {
        let mut store = MemoryStore::new();
        store.set_str("sta_ssid", "Old").unwrap();
        store.commit().unwrap();

        store.set_str("sta_ssid", "New").unwrap();
        store.power_loss();

        assert_eq!(store.get_str("sta_ssid").unwrap(), Some("Old".to_string()));
        assert_eq!(store.durable_str("sta_ssid"), Some("Old".to_string()));
    }

    #[test]
    fn test_remove_on_commit() {
        let mut store = MemoryStore::new();
        store.set_bool("flag", true).unwrap();
        store.commit().unwrap();
        store.remove("flag").unwrap();
        assert_eq!(store.get_bool("flag").unwrap(), None);
        assert_eq!(store.durable_bool("flag"), Some(true));
        store.commit().unwrap();
        assert_eq!(store.durable_bool("flag"), None);
    }

    #[test]
    fn test_type_mismatch() {
        let mut store = MemoryStore::new();
        store.set_str("flag", "yes").unwrap();
        assert!(matches!(
            store.get_bool("flag"),
            Err(StoreError::TypeMismatch { .. })
        ));
    }

    #[test]
    fn test_failed_commit_keeps_staged() {
        let mut store = MemoryStore::new();
        store.set_bool("flag", true).unwrap();
        store.fail_commits(true);
        assert!(store.commit().is_err());
        assert_eq!(store.durable_bool("flag"), None);

        store.fail_commits(false);
        store.commit().unwrap();
        assert_eq!(store.durable_bool("flag"), Some(true));
        assert_eq!(store.commit_count(), 1);
    }

    #[test]
    fn test_clones_share_storage() {
        let mut store = MemoryStore::new();
        let observer = store.clone();
        store.set_bool("flag", true).unwrap();
        store.commit().unwrap();
        assert_eq!(observer.durable_bool("flag"), Some(true));
    }
}
