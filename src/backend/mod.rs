//! Backend selection: the composite URL and the registry that turns a
//! parsed URL into live crypto/storage/rcs handles.
//!
//! Selection happens once, at URL parse time; after that every
//! downstream path is statically typed against the capability traits.
//! The registry is an explicit value handed to the root store on
//! construction; there is no process-wide backend state.

pub mod crypto;
pub mod rcs;
pub mod storage;
pub mod url;

pub use crypto::Crypto;
pub use rcs::{Rcs, Revision};
pub use storage::Storage;
pub use url::{BackendUrl, CryptoKind, RcsKind, StorageKind};

use crate::errors::Result;

/// Maps backend kinds to constructors.
///
/// The default registry knows every built-in backend.  Construction is
/// infallible for in-memory backends; filesystem-backed ones create
/// their root directory on open.
#[derive(Debug, Clone, Copy, Default)]
pub struct BackendRegistry;

impl BackendRegistry {
    pub fn new() -> Self {
        Self
    }

    /// Build the crypto backend a URL selects.
    pub fn open_crypto(&self, url: &BackendUrl) -> Result<Box<dyn Crypto>> {
        Ok(match url.crypto {
            CryptoKind::Plain => Box::new(crypto::Plain::new()),
            CryptoKind::GpgCli => Box::new(crypto::GpgCli::new()),
        })
    }

    /// Build the storage backend a URL selects, rooted at the URL path.
    pub fn open_storage(&self, url: &BackendUrl) -> Result<Box<dyn Storage>> {
        Ok(match url.storage {
            StorageKind::Fs => Box::new(storage::Fs::new(url.path.as_str())?),
            StorageKind::InMem => Box::new(storage::InMem::new()),
        })
    }

    /// Build the RCS backend a URL selects, bound to the URL path as its
    /// worktree.
    pub fn open_rcs(&self, url: &BackendUrl) -> Result<Box<dyn Rcs>> {
        Ok(match url.rcs {
            RcsKind::Noop => Box::new(rcs::Noop::new()),
            RcsKind::GitCli => Box::new(rcs::GitCli::new(url.path.as_str())),
        })
    }

    /// Build all three backends for a URL.
    #[allow(clippy::type_complexity)]
    pub fn open(
        &self,
        url: &BackendUrl,
    ) -> Result<(Box<dyn Crypto>, Box<dyn Storage>, Box<dyn Rcs>)> {
        Ok((
            self.open_crypto(url)?,
            self.open_storage(url)?,
            self.open_rcs(url)?,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_builds_backends_from_url() {
        let url = BackendUrl::parse("plain-noop-inmem+file:///").unwrap();
        let (crypto, storage, rcs) = BackendRegistry::new().open(&url).unwrap();

        assert_eq!(crypto.name(), "plain");
        assert_eq!(storage.name(), "inmem");
        assert_eq!(rcs.name(), "noop");
    }
}
