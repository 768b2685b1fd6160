//! The sealed store: passphrases encrypted at rest.
//!
//! Entries are serialized as a JSON map and sealed with
//! XChaCha20-Poly1305 under a key derived from a master passphrase via
//! Argon2id.  File layout:
//!
//! ```text
//! salt (16 bytes) || nonce (24 bytes) || AEAD box
//! ```
//!
//! A fresh salt and nonce are drawn on every save, so rewriting the
//! store never reuses a (key, nonce) pair.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use argon2::{Algorithm, Argon2, Params, Version};
use chacha20poly1305::aead::Aead;
use chacha20poly1305::{Key, KeyInit, XChaCha20Poly1305, XNonce};
use rand::rngs::OsRng;
use rand::RngCore;
use zeroize::Zeroize;

use crate::errors::{Result, StoreError};

const SALT_LEN: usize = 16;
const NONCE_LEN: usize = 24;
const KEY_LEN: usize = 32;

// Argon2id cost parameters: 64 MiB, 4 passes, 4 lanes.
const ARGON_MEM_KIB: u32 = 65536;
const ARGON_TIME: u32 = 4;
const ARGON_LANES: u32 = 4;

/// Encrypted persistent passphrase storage.
pub struct SealedStore {
    path: PathBuf,
}

impl SealedStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Decrypt and deserialize the store.  A missing file is an empty
    /// store; a present file that fails to open is an error.
    pub fn load(&self, passphrase: &str) -> Result<BTreeMap<String, String>> {
        if !self.path.exists() {
            return Ok(BTreeMap::new());
        }
        let raw = fs::read(&self.path)?;
        if raw.len() < SALT_LEN + NONCE_LEN {
            return Err(StoreError::Decrypt(format!(
                "sealed store {} is truncated",
                self.path.display()
            )));
        }
        let (salt, rest) = raw.split_at(SALT_LEN);
        let (nonce, sealed) = rest.split_at(NONCE_LEN);

        let mut key = derive_key(passphrase, salt)?;
        let cipher = XChaCha20Poly1305::new(Key::from_slice(&key));
        let plaintext = cipher
            .decrypt(XNonce::from_slice(nonce), sealed)
            .map_err(|_| StoreError::Decrypt("sealed store: wrong passphrase or tampered data".to_string()));
        key.zeroize();
        let plaintext = plaintext?;

        serde_json::from_slice(&plaintext)
            .map_err(|e| StoreError::Serialization(format!("sealed store: {e}")))
    }

    /// Serialize and encrypt the store, then write it atomically.
    pub fn save(&self, passphrase: &str, entries: &BTreeMap<String, String>) -> Result<()> {
        let plaintext = serde_json::to_vec(entries)
            .map_err(|e| StoreError::Serialization(format!("sealed store: {e}")))?;

        let mut salt = [0u8; SALT_LEN];
        let mut nonce = [0u8; NONCE_LEN];
        OsRng.fill_bytes(&mut salt);
        OsRng.fill_bytes(&mut nonce);

        let mut key = derive_key(passphrase, &salt)?;
        let cipher = XChaCha20Poly1305::new(Key::from_slice(&key));
        let sealed = cipher
            .encrypt(XNonce::from_slice(&nonce), plaintext.as_slice())
            .map_err(|_| StoreError::Encrypt("sealed store: AEAD failure".to_string()));
        key.zeroize();
        let sealed = sealed?;

        let mut out = Vec::with_capacity(SALT_LEN + NONCE_LEN + sealed.len());
        out.extend_from_slice(&salt);
        out.extend_from_slice(&nonce);
        out.extend_from_slice(&sealed);

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let tmp = self.path.with_extension("tmp");
        fs::write(&tmp, &out)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

/// Derive a 32-byte key from the passphrase with Argon2id.
fn derive_key(passphrase: &str, salt: &[u8]) -> Result<[u8; KEY_LEN]> {
    let params = Params::new(ARGON_MEM_KIB, ARGON_TIME, ARGON_LANES, Some(KEY_LEN))
        .map_err(|e| StoreError::Encrypt(format!("argon2 params: {e}")))?;
    let argon = Argon2::new(Algorithm::Argon2id, Version::V0x13, params);

    let mut key = [0u8; KEY_LEN];
    argon
        .hash_password_into(passphrase.as_bytes(), salt, &mut key)
        .map_err(|e| StoreError::Encrypt(format!("argon2: {e}")))?;
    Ok(key)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn entries() -> BTreeMap<String, String> {
        let mut m = BTreeMap::new();
        m.insert("gpg:0xAA".to_string(), "hunter2".to_string());
        m.insert("gpg:0xBB".to_string(), "s3cret".to_string());
        m
    }

    #[test]
    fn missing_file_loads_empty() {
        let tmp = TempDir::new().unwrap();
        let store = SealedStore::new(tmp.path().join("sealed.bin"));
        assert!(store.load("pw").unwrap().is_empty());
    }

    #[test]
    fn save_load_roundtrip() {
        let tmp = TempDir::new().unwrap();
        let store = SealedStore::new(tmp.path().join("sealed.bin"));

        store.save("master", &entries()).unwrap();
        let loaded = store.load("master").unwrap();
        assert_eq!(loaded, entries());
    }

    #[test]
    fn wrong_passphrase_fails() {
        let tmp = TempDir::new().unwrap();
        let store = SealedStore::new(tmp.path().join("sealed.bin"));
        store.save("master", &entries()).unwrap();

        assert!(matches!(
            store.load("not-master"),
            Err(StoreError::Decrypt(_))
        ));
    }

    #[test]
    fn tampered_file_fails() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("sealed.bin");
        let store = SealedStore::new(&path);
        store.save("master", &entries()).unwrap();

        let mut raw = fs::read(&path).unwrap();
        let last = raw.len() - 1;
        raw[last] ^= 0x01;
        fs::write(&path, &raw).unwrap();

        assert!(matches!(store.load("master"), Err(StoreError::Decrypt(_))));
    }

    #[test]
    fn truncated_file_fails() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("sealed.bin");
        fs::write(&path, b"short").unwrap();

        let store = SealedStore::new(&path);
        assert!(matches!(store.load("pw"), Err(StoreError::Decrypt(_))));
    }

    #[test]
    fn each_save_uses_fresh_salt_and_nonce() {
        let tmp = TempDir::new().unwrap();
        let store = SealedStore::new(tmp.path().join("sealed.bin"));

        store.save("master", &entries()).unwrap();
        let first = fs::read(store.path()).unwrap();
        store.save("master", &entries()).unwrap();
        let second = fs::read(store.path()).unwrap();

        assert_ne!(first[..SALT_LEN + NONCE_LEN], second[..SALT_LEN + NONCE_LEN]);
    }
}
