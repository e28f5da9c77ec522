//! File-backed configuration store for host (development) builds.
//!
//! Stores the namespace as a JSON object so it persists across runs.
//! Uses `~/.cardputer-wifi/cardputer_wifi.json` by default.
//!
//! Commits write a temporary file, read it back to verify, then rename it over
//! the durable file. A crash before the rename leaves the previous file intact.

use super::{ConfigStore, StoreError};
use crate::config::NVS_NAMESPACE;
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
enum FileValue {
    Bool(bool),
    Text(String),
}

/// Get the default store file path.
///
/// Returns `~/.cardputer-wifi/cardputer_wifi.json`
pub fn default_store_path() -> io::Result<PathBuf> {
    let home = std::env::var("HOME")
        .map_err(|_| io::Error::new(io::ErrorKind::NotFound, "HOME not set"))?;
    Ok(PathBuf::from(home)
        .join(".cardputer-wifi")
        .join(format!("{}.json", NVS_NAMESPACE)))
}

/// JSON file store.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    durable: BTreeMap<String, FileValue>,
    staged: BTreeMap<String, Option<FileValue>>,
    /// Set when the file exists but could not be parsed.
    corrupt: Option<String>,
}

impl FileStore {
    /// Open the store at `path`.
    ///
    /// A missing file is an empty namespace. An unparsable file opens
    /// successfully but every read fails until the next successful commit.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let (durable, corrupt) = match fs::read_to_string(&path) {
            Ok(text) => match serde_json::from_str(&text) {
                Ok(map) => (map, None),
                Err(e) => {
                    warn!("Config file {:?} is corrupt: {}", path, e);
                    (BTreeMap::new(), Some(e.to_string()))
                }
            },
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                log::debug!("No config file at {:?}, starting empty", path);
                (BTreeMap::new(), None)
            }
            Err(e) => return Err(StoreError::Unavailable(e.to_string())),
        };

        Ok(Self {
            path,
            durable,
            staged: BTreeMap::new(),
            corrupt,
        })
    }

    /// Open the store at the default path.
    pub fn open_default() -> Result<Self, StoreError> {
        let path = default_store_path().map_err(|e| StoreError::Unavailable(e.to_string()))?;
        Self::open(path)
    }

    /// Path of the durable file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn lookup(&self, key: &str) -> Result<Option<FileValue>, StoreError> {
        if let Some(reason) = &self.corrupt {
            return Err(StoreError::Read {
                key: key.to_string(),
                reason: reason.clone(),
            });
        }
        match self.staged.get(key) {
            Some(staged) => Ok(staged.clone()),
            None => Ok(self.durable.get(key).cloned()),
        }
    }

    fn write_verified(&self, contents: &BTreeMap<String, FileValue>) -> io::Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }

        let json = serde_json::to_string_pretty(contents)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, &json)?;

        // Verify write by reading back
        let read_back = fs::read_to_string(&tmp)?;
        if read_back != json {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!(
                    "Config verification failed: wrote {} bytes, read {} bytes",
                    json.len(),
                    read_back.len()
                ),
            ));
        }

        fs::rename(&tmp, &self.path)
    }
}

impl ConfigStore for FileStore {
    fn get_bool(&self, key: &str) -> Result<Option<bool>, StoreError> {
        match self.lookup(key)? {
            None => Ok(None),
            Some(FileValue::Bool(value)) => Ok(Some(value)),
            Some(FileValue::Text(_)) => Err(StoreError::TypeMismatch {
                key: key.to_string(),
            }),
        }
    }

    fn get_str(&self, key: &str) -> Result<Option<String>, StoreError> {
        match self.lookup(key)? {
            None => Ok(None),
            Some(FileValue::Text(value)) => Ok(Some(value)),
            Some(FileValue::Bool(_)) => Err(StoreError::TypeMismatch {
                key: key.to_string(),
            }),
        }
    }

    fn set_bool(&mut self, key: &str, value: bool) -> Result<(), StoreError> {
        self.staged
            .insert(key.to_string(), Some(FileValue::Bool(value)));
        Ok(())
    }

    fn set_str(&mut self, key: &str, value: &str) -> Result<(), StoreError> {
        self.staged
            .insert(key.to_string(), Some(FileValue::Text(value.to_string())));
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<(), StoreError> {
        self.staged.insert(key.to_string(), None);
        Ok(())
    }

    fn commit(&mut self) -> Result<(), StoreError> {
        let mut next = self.durable.clone();
        for (key, value) in &self.staged {
            match value {
                Some(value) => {
                    next.insert(key.clone(), value.clone());
                }
                None => {
                    next.remove(key);
                }
            }
        }

        self.write_verified(&next)
            .map_err(|e| StoreError::Commit(e.to_string()))?;

        if self.corrupt.take().is_some() {
            info!("Config file {:?} rewritten", self.path);
        }
        self.durable = next;
        self.staged.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use std::sync::atomic::{AtomicU32, Ordering};

    // Counter to ensure unique test files even in parallel execution
    static TEST_COUNTER: AtomicU32 = AtomicU32::new(0);

    fn unique_store_path() -> PathBuf {
        let id = TEST_COUNTER.fetch_add(1, Ordering::SeqCst);
        let pid = std::process::id();
        env::temp_dir().join(format!("cardputer-wifi-test-{}-{}.json", pid, id))
    }

    #[test]
    fn test_missing_file_is_empty() {
        let path = unique_store_path();
        let store = FileStore::open(&path).unwrap();
        assert_eq!(store.get_bool("sta_on").unwrap(), None);
        assert_eq!(store.get_str("sta_ssid").unwrap(), None);
    }

    #[test]
    fn test_commit_roundtrip() {
        let path = unique_store_path();

        let mut store = FileStore::open(&path).unwrap();
        store.set_bool("sta_on", true).unwrap();
        store.set_str("sta_ssid", "HomeNet").unwrap();
        store.commit().unwrap();

        let reopened = FileStore::open(&path).unwrap();
        assert_eq!(reopened.get_bool("sta_on").unwrap(), Some(true));
        assert_eq!(
            reopened.get_str("sta_ssid").unwrap(),
            Some("HomeNet".to_string())
        );

        let _ = fs::remove_file(&path);
    }

    #[test]
    fn test_uncommitted_writes_are_lost() {
        let path = unique_store_path();

        let mut store = FileStore::open(&path).unwrap();
        store.set_str("ap_ssid", "Before").unwrap();
        store.commit().unwrap();
        store.set_str("ap_ssid", "After").unwrap();
        drop(store);

        let reopened = FileStore::open(&path).unwrap();
        assert_eq!(
            reopened.get_str("ap_ssid").unwrap(),
            Some("Before".to_string())
        );

        let _ = fs::remove_file(&path);
    }

    #[test]
    fn test_corrupt_file_fails_reads_until_commit() {
        let path = unique_store_path();
        fs::write(&path, "{not json").unwrap();

        let mut store = FileStore::open(&path).unwrap();
        assert!(matches!(
            store.get_bool("sta_on"),
            Err(StoreError::Read { .. })
        ));

        store.set_bool("sta_on", false).unwrap();
        store.commit().unwrap();
        assert_eq!(store.get_bool("sta_on").unwrap(), Some(false));

        let _ = fs::remove_file(&path);
    }
}
