//! NVS-backed configuration store.
//!
//! Stores the wireless configuration in ESP32's Non-Volatile Storage so it
//! persists across reboots. `EspNvs` commits every individual write, so
//! writes are staged in RAM and only handed to NVS on [`ConfigStore::commit`].
//!
//! A commit is atomic per key only. Staged writes are applied in the order
//! they were made, which lets callers order keys so that any prefix of a
//! commit is a consistent configuration.

use super::{ConfigStore, StoreError};
use crate::config::{MAX_PASSWORD_LEN, NVS_NAMESPACE};
use esp_idf_svc::nvs::{EspDefaultNvsPartition, EspNvs, NvsDefault};
use esp_idf_sys::EspError;

/// Read buffer size: longest stored string plus NUL terminator.
const MAX_VALUE_BUFFER_SIZE: usize = MAX_PASSWORD_LEN + 1;

#[derive(Debug, Clone)]
enum Staged {
    Bool(bool),
    Text(String),
    Remove,
}

/// NVS namespace handle with staged writes.
pub struct NvsStore {
    nvs: EspNvs<NvsDefault>,
    /// Pending writes in staging order. Later entries win on reads.
    staged: Vec<(String, Staged)>,
}

impl NvsStore {
    /// Open the `cardputer_wifi` namespace on the default partition.
    pub fn open(partition: EspDefaultNvsPartition) -> Result<Self, StoreError> {
        let nvs = EspNvs::new(partition, NVS_NAMESPACE, true)
            .map_err(|e| StoreError::Unavailable(format!("{:?}", e)))?;
        Ok(Self {
            nvs,
            staged: Vec::new(),
        })
    }

    fn read_error(key: &str, e: EspError) -> StoreError {
        StoreError::Read {
            key: key.to_string(),
            reason: format!("{:?}", e),
        }
    }

    fn staged_value(&self, key: &str) -> Option<&Staged> {
        self.staged
            .iter()
            .rev()
            .find(|(k, _)| k == key)
            .map(|(_, value)| value)
    }

    fn stage(&mut self, key: &str, value: Staged) {
        self.staged.push((key.to_string(), value));
    }
}

impl ConfigStore for NvsStore {
    fn get_bool(&self, key: &str) -> Result<Option<bool>, StoreError> {
        match self.staged_value(key) {
            Some(Staged::Bool(value)) => return Ok(Some(*value)),
            Some(Staged::Remove) => return Ok(None),
            Some(Staged::Text(_)) => {
                return Err(StoreError::TypeMismatch {
                    key: key.to_string(),
                })
            }
            None => {}
        }
        let value = self
            .nvs
            .get_u8(key)
            .map_err(|e| Self::read_error(key, e))?;
        Ok(value.map(|v| v != 0))
    }

    fn get_str(&self, key: &str) -> Result<Option<String>, StoreError> {
        match self.staged_value(key) {
            Some(Staged::Text(value)) => return Ok(Some(value.clone())),
            Some(Staged::Remove) => return Ok(None),
            Some(Staged::Bool(_)) => {
                return Err(StoreError::TypeMismatch {
                    key: key.to_string(),
                })
            }
            None => {}
        }
        let mut buf = [0u8; MAX_VALUE_BUFFER_SIZE];
        let value = self
            .nvs
            .get_str(key, &mut buf)
            .map_err(|e| Self::read_error(key, e))?;
        Ok(value.map(str::to_string))
    }

    fn set_bool(&mut self, key: &str, value: bool) -> Result<(), StoreError> {
        self.stage(key, Staged::Bool(value));
        Ok(())
    }

    fn set_str(&mut self, key: &str, value: &str) -> Result<(), StoreError> {
        if value.len() >= MAX_VALUE_BUFFER_SIZE {
            return Err(StoreError::Write {
                key: key.to_string(),
                reason: format!("value too long: {} bytes", value.len()),
            });
        }
        self.stage(key, Staged::Text(value.to_string()));
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<(), StoreError> {
        self.stage(key, Staged::Remove);
        Ok(())
    }

    fn commit(&mut self) -> Result<(), StoreError> {
        let staged = std::mem::take(&mut self.staged);
        for (key, value) in &staged {
            let result = match value {
                Staged::Bool(v) => self.nvs.set_u8(key, u8::from(*v)),
                Staged::Text(v) => self.nvs.set_str(key, v),
                Staged::Remove => self.nvs.remove(key).map(|_| ()),
            };
            if let Err(e) = result {
                log::error!("NVS write of {} failed: {:?}", key, e);
                self.staged = staged.clone();
                return Err(StoreError::Commit(format!("{}: {:?}", key, e)));
            }
        }
        log::debug!("NVS commit of {} keys", staged.len());
        Ok(())
    }
}
