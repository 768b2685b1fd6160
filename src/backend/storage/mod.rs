//! The pluggable storage backend interface: a byte-level KV store over a
//! path namespace.

pub mod fs;
pub mod inmem;

pub use fs::Fs;
pub use inmem::InMem;

use crate::errors::Result;

/// A path-keyed byte store.
///
/// Names are slash-separated relative paths (`a/b/c.gpg`).  Listing is
/// always sorted; hidden directories (a component starting with `.`) are
/// skipped during recursive listing unless the prefix explicitly points
/// at or into one.
pub trait Storage: Send + Sync {
    /// Read the bytes stored under `name`.
    fn get(&self, name: &str) -> Result<Vec<u8>>;

    /// Store bytes under `name`, creating parents as needed.
    fn set(&self, name: &str, value: &[u8]) -> Result<()>;

    /// Remove `name`.  Empty parent directories are pruned upward until
    /// a non-empty directory or the store root is reached.
    fn delete(&self, name: &str) -> Result<()>;

    /// Whether `name` exists as a stored entry.
    fn exists(&self, name: &str) -> bool;

    /// Whether `name` is a directory (has entries below it).
    fn is_dir(&self, name: &str) -> bool;

    /// Every stored name starting with `prefix`, sorted.
    fn list(&self, prefix: &str) -> Result<Vec<String>>;

    /// Recursive delete of everything under `prefix`, including upward
    /// pruning of emptied parents.
    fn prune(&self, prefix: &str) -> Result<()>;

    /// Backend-defined integrity check; returns human-readable warnings
    /// for anything it found (and possibly fixed).
    fn fsck(&self) -> Result<Vec<String>>;

    /// Dry-run write probe: fails when the store is not writable.
    fn available(&self) -> Result<()>;

    /// Registered backend name.
    fn name(&self) -> &'static str;

    /// Human-readable physical location of this store.
    fn location(&self) -> String;
}

/// Decide whether a stored name is visible for a given listing prefix.
///
/// A name is hidden when one of its *directory* components starts with a
/// dot, unless the prefix explicitly points at or into that directory.
/// Hidden files at any level stay visible; only hidden directories cut
/// off recursive listing.
pub(crate) fn visible(name: &str, prefix: &str) -> bool {
    let mut dir = String::new();
    let components: Vec<&str> = name.split('/').collect();
    // All but the last component are directories.
    for comp in &components[..components.len().saturating_sub(1)] {
        if !dir.is_empty() {
            dir.push('/');
        }
        dir.push_str(comp);
        if comp.starts_with('.') && prefix != dir && !prefix.starts_with(&format!("{dir}/")) {
            return false;
        }
    }
    true
}
