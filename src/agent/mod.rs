//! The passphrase agent: an in-process TTL cache plus an encrypted
//! on-disk sealed store for passphrases that must survive restarts.

pub mod sealed;

pub use sealed::SealedStore;

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use zeroize::Zeroize;

/// In-memory passphrase cache with a sliding TTL and a hard lifetime cap.
///
/// A hit refreshes the sliding window; no amount of refreshing extends
/// an entry past `max_ttl` after insertion.  Expired entries are swept
/// on every insert.
pub struct Cache {
    entries: Mutex<HashMap<String, Entry>>,
    ttl: Duration,
    max_ttl: Duration,
}

struct Entry {
    value: String,
    created: Instant,
    refreshed: Instant,
}

impl Entry {
    fn expired(&self, now: Instant, ttl: Duration, max_ttl: Duration) -> bool {
        now.duration_since(self.created) > max_ttl || now.duration_since(self.refreshed) > ttl
    }
}

impl Drop for Entry {
    fn drop(&mut self) {
        self.value.zeroize();
    }
}

impl Cache {
    pub fn new(ttl: Duration, max_ttl: Duration) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            ttl,
            max_ttl,
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, Entry>> {
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Look up a passphrase.  A hit refreshes the sliding window.
    pub fn get(&self, key: &str) -> Option<String> {
        let now = Instant::now();
        let mut entries = self.lock();
        match entries.get_mut(key) {
            Some(e) if !e.expired(now, self.ttl, self.max_ttl) => {
                e.refreshed = now;
                Some(e.value.clone())
            }
            Some(_) => {
                entries.remove(key);
                None
            }
            None => None,
        }
    }

    /// Store a passphrase and sweep everything already expired.
    pub fn set(&self, key: &str, value: &str) {
        let now = Instant::now();
        let mut entries = self.lock();
        entries.retain(|_, e| !e.expired(now, self.ttl, self.max_ttl));
        entries.insert(
            key.to_string(),
            Entry {
                value: value.to_string(),
                created: now,
                refreshed: now,
            },
        );
    }

    /// Drop a single entry.
    pub fn remove(&self, key: &str) {
        self.lock().remove(key);
    }

    /// Drop every entry.
    pub fn purge(&self) {
        self.lock().clear();
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread::sleep;

    #[test]
    fn hit_and_miss() {
        let c = Cache::new(Duration::from_secs(60), Duration::from_secs(600));
        c.set("gpg:0xAA", "hunter2");
        assert_eq!(c.get("gpg:0xAA").as_deref(), Some("hunter2"));
        assert_eq!(c.get("gpg:0xBB"), None);
    }

    #[test]
    fn sliding_ttl_expires_idle_entries() {
        let c = Cache::new(Duration::from_millis(30), Duration::from_secs(600));
        c.set("k", "v");
        sleep(Duration::from_millis(50));
        assert_eq!(c.get("k"), None);
    }

    #[test]
    fn refresh_extends_sliding_window_but_not_past_max() {
        let c = Cache::new(Duration::from_millis(60), Duration::from_millis(150));
        c.set("k", "v");
        // Keep the entry warm past its sliding TTL.
        sleep(Duration::from_millis(40));
        assert!(c.get("k").is_some());
        sleep(Duration::from_millis(40));
        assert!(c.get("k").is_some());
        // The hard cap wins regardless of refreshes.
        sleep(Duration::from_millis(120));
        assert_eq!(c.get("k"), None);
    }

    #[test]
    fn set_sweeps_expired_entries() {
        let c = Cache::new(Duration::from_millis(30), Duration::from_secs(600));
        c.set("old", "v");
        sleep(Duration::from_millis(50));
        c.set("new", "v");
        assert_eq!(c.len(), 1);
    }

    #[test]
    fn remove_and_purge() {
        let c = Cache::new(Duration::from_secs(60), Duration::from_secs(600));
        c.set("a", "1");
        c.set("b", "2");
        c.remove("a");
        assert_eq!(c.get("a"), None);
        c.purge();
        assert!(c.is_empty());
    }
}
