//! The pluggable revision-control backend interface.
//!
//! The sub-store engine treats `RcsNotInit`, `RcsNoRemote`, and
//! `RcsNothingToCommit` as non-fatal: they are swallowed at the
//! sub-store boundary and turned into log events.  Everything else
//! propagates.

pub mod gitcli;
pub mod noop;

pub use gitcli::GitCli;
pub use noop::Noop;

use crate::errors::{Result, StoreError};

/// One revision of a tracked file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Revision {
    pub hash: String,
    pub author_name: String,
    pub author_email: String,
    /// Author date as reported by the backend (ISO-8601 for git).
    pub date: String,
    pub subject: String,
}

/// Capability set exposed by any revision-control backend.
pub trait Rcs: Send + Sync {
    /// Initialize revision control for the store and configure the
    /// author identity.
    fn init(&self, user_name: &str, user_email: &str) -> Result<()>;

    /// (Re-)write the author configuration for an existing repository.
    fn init_config(&self, user_name: &str, user_email: &str) -> Result<()>;

    /// Stage the given paths (additions, modifications, and deletions).
    fn add(&self, paths: &[String]) -> Result<()>;

    /// Commit staged changes.  Fails with `RcsNothingToCommit` when
    /// nothing is staged.
    fn commit(&self, message: &str) -> Result<()>;

    /// Push to a remote.  An empty remote or branch selects the default.
    fn push(&self, remote: &str, branch: &str) -> Result<()>;

    /// Pull from a remote.  An empty remote or branch selects the default.
    fn pull(&self, remote: &str, branch: &str) -> Result<()>;

    /// Register a named remote.
    fn add_remote(&self, remote: &str, url: &str) -> Result<()>;

    /// Remove a named remote.
    fn remove_remote(&self, remote: &str) -> Result<()>;

    /// All revisions touching `name`, newest first.
    fn revisions(&self, name: &str) -> Result<Vec<Revision>>;

    /// The content of `name` at a given revision.
    fn get_revision(&self, name: &str, revision: &str) -> Result<Vec<u8>>;

    /// Registered backend name.
    fn name(&self) -> &'static str;
}

/// Whether an RCS error is one of the conditions the sub-store engine
/// recovers from locally.
pub fn is_non_fatal(err: &StoreError) -> bool {
    matches!(
        err,
        StoreError::RcsNotInit | StoreError::RcsNoRemote | StoreError::RcsNothingToCommit
    )
}
