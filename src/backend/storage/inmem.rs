//! In-memory storage backed by an ordered map.
//!
//! Cloning an `InMem` yields a second handle onto the same store, which
//! the test suites use to inspect and tamper with "on-disk" state while
//! a sub-store owns the other handle.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};

use super::{visible, Storage};
use crate::errors::{Result, StoreError};

/// Process-local storage for tests and ephemeral stores.
#[derive(Clone, Default)]
pub struct InMem {
    data: Arc<Mutex<BTreeMap<String, Vec<u8>>>>,
}

impl InMem {
    /// An empty store.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, BTreeMap<String, Vec<u8>>> {
        self.data.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Storage for InMem {
    fn get(&self, name: &str) -> Result<Vec<u8>> {
        self.lock()
            .get(name)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(name.to_string()))
    }

    fn set(&self, name: &str, value: &[u8]) -> Result<()> {
        self.lock().insert(name.to_string(), value.to_vec());
        Ok(())
    }

    fn delete(&self, name: &str) -> Result<()> {
        if self.lock().remove(name).is_none() {
            return Err(StoreError::NotFound(name.to_string()));
        }
        Ok(())
    }

    fn exists(&self, name: &str) -> bool {
        self.lock().contains_key(name)
    }

    fn is_dir(&self, name: &str) -> bool {
        let want = format!("{}/", name.trim_end_matches('/'));
        self.lock().keys().any(|k| k.starts_with(&want))
    }

    fn list(&self, prefix: &str) -> Result<Vec<String>> {
        // The map is ordered, so the output is already sorted.
        Ok(self
            .lock()
            .keys()
            .filter(|k| k.starts_with(prefix) && visible(k, prefix))
            .cloned()
            .collect())
    }

    fn prune(&self, prefix: &str) -> Result<()> {
        let dir_prefix = format!("{}/", prefix.trim_end_matches('/'));
        let mut data = self.lock();
        let before = data.len();
        data.retain(|k, _| k != prefix && !k.starts_with(&dir_prefix));
        if data.len() == before {
            return Err(StoreError::NotFound(prefix.to_string()));
        }
        Ok(())
    }

    fn fsck(&self) -> Result<Vec<String>> {
        Ok(Vec::new())
    }

    fn available(&self) -> Result<()> {
        Ok(())
    }

    fn name(&self) -> &'static str {
        "inmem"
    }

    fn location(&self) -> String {
        "inmem://".to_string()
    }
}
