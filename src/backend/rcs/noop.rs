//! The `noop` RCS backend: no revision control at all.
//!
//! Mutating operations report `RcsNotInit`, which the sub-store engine
//! treats as non-fatal, so a store without revision control behaves
//! exactly like one whose git repository was never initialized.

use super::{Rcs, Revision};
use crate::errors::{Result, StoreError};

/// No-op revision control.
#[derive(Debug, Clone, Copy, Default)]
pub struct Noop;

impl Noop {
    pub fn new() -> Self {
        Self
    }
}

impl Rcs for Noop {
    fn init(&self, _user_name: &str, _user_email: &str) -> Result<()> {
        Ok(())
    }

    fn init_config(&self, _user_name: &str, _user_email: &str) -> Result<()> {
        Ok(())
    }

    fn add(&self, _paths: &[String]) -> Result<()> {
        Err(StoreError::RcsNotInit)
    }

    fn commit(&self, _message: &str) -> Result<()> {
        Err(StoreError::RcsNotInit)
    }

    fn push(&self, _remote: &str, _branch: &str) -> Result<()> {
        Err(StoreError::RcsNotInit)
    }

    fn pull(&self, _remote: &str, _branch: &str) -> Result<()> {
        Err(StoreError::RcsNotInit)
    }

    fn add_remote(&self, _remote: &str, _url: &str) -> Result<()> {
        Err(StoreError::RcsNotInit)
    }

    fn remove_remote(&self, _remote: &str) -> Result<()> {
        Err(StoreError::RcsNotInit)
    }

    fn revisions(&self, _name: &str) -> Result<Vec<Revision>> {
        // A single synthetic revision so callers can always show
        // "latest" without special-casing unversioned stores.
        Ok(vec![Revision {
            hash: "latest".to_string(),
            author_name: String::new(),
            author_email: String::new(),
            date: String::new(),
            subject: String::new(),
        }])
    }

    fn get_revision(&self, _name: &str, _revision: &str) -> Result<Vec<u8>> {
        Err(StoreError::RcsNotInit)
    }

    fn name(&self) -> &'static str {
        "noop"
    }
}
