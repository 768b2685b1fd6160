//! The `plain` crypto backend: no real encryption, full bookkeeping.
//!
//! Used by the test suites and as the fallback for unknown backend
//! names.  "Ciphertext" is a recipient header line followed by the
//! base64 of the plaintext, so `recipient_ids` works without decryption
//! and binary bodies survive:
//!
//! ```text
//! PLAIN;<r1>,<r2>,...\n
//! <base64 plaintext>\n
//! ```
//!
//! Signatures are a signer tag plus a SHA-256 digest of the signed data;
//! `verify` recomputes the digest and checks the signer is a known
//! public key.

use std::collections::BTreeSet;
use std::sync::Mutex;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use sha2::{Digest, Sha256};

use super::Crypto;
use crate::errors::{Result, StoreError};

/// Header tag at the start of every plain "ciphertext".
const HEADER: &str = "PLAIN;";

/// Header tag at the start of every plain signature.
const SIG_HEADER: &str = "PLAINSIG;";

/// The identity every fresh `Plain` backend starts with.
pub const DEFAULT_IDENTITY: &str = "0xDEADBEEF";

struct Keyring {
    public: BTreeSet<String>,
    private: BTreeSet<String>,
}

/// The no-op cipher with an in-memory keyring.
pub struct Plain {
    keys: Mutex<Keyring>,
}

impl Default for Plain {
    fn default() -> Self {
        Self::new()
    }
}

impl Plain {
    /// A backend whose keyring holds the default test identity as both a
    /// public and a private key.
    pub fn new() -> Self {
        Self::with_keys(
            [DEFAULT_IDENTITY.to_string()],
            [DEFAULT_IDENTITY.to_string()],
        )
    }

    /// A backend with an explicit keyring.
    pub fn with_keys(
        public: impl IntoIterator<Item = String>,
        private: impl IntoIterator<Item = String>,
    ) -> Self {
        Self {
            keys: Mutex::new(Keyring {
                public: public.into_iter().collect(),
                private: private.into_iter().collect(),
            }),
        }
    }

    fn match_keys(keys: &BTreeSet<String>, needles: &[String]) -> Vec<String> {
        if needles.is_empty() {
            return keys.iter().cloned().collect();
        }
        keys.iter()
            .filter(|k| {
                needles
                    .iter()
                    .any(|n| k.to_lowercase().contains(&n.to_lowercase()))
            })
            .cloned()
            .collect()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Keyring> {
        // The keyring stays usable even if a holder panicked.
        self.keys.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Crypto for Plain {
    fn encrypt(&self, plaintext: &[u8], recipients: &[String]) -> Result<Vec<u8>> {
        if recipients.is_empty() {
            return Err(StoreError::Encrypt("no recipients given".to_string()));
        }
        let mut sorted: Vec<&str> = recipients.iter().map(String::as_str).collect();
        sorted.sort_unstable();
        sorted.dedup();

        let out = format!(
            "{}{}\n{}\n",
            HEADER,
            sorted.join(","),
            BASE64.encode(plaintext)
        );
        Ok(out.into_bytes())
    }

    fn decrypt(&self, ciphertext: &[u8]) -> Result<Vec<u8>> {
        let text = std::str::from_utf8(ciphertext)
            .map_err(|_| StoreError::Decrypt("ciphertext is not valid UTF-8".to_string()))?;
        let (header, body) = text
            .split_once('\n')
            .ok_or_else(|| StoreError::Decrypt("missing recipient header".to_string()))?;
        if !header.starts_with(HEADER) {
            return Err(StoreError::Decrypt("missing PLAIN header".to_string()));
        }
        BASE64
            .decode(body.trim_end())
            .map_err(|e| StoreError::Decrypt(format!("bad base64 body: {e}")))
    }

    fn recipient_ids(&self, ciphertext: &[u8]) -> Result<Vec<String>> {
        let text = std::str::from_utf8(ciphertext)
            .map_err(|_| StoreError::Decrypt("ciphertext is not valid UTF-8".to_string()))?;
        let header = text.lines().next().unwrap_or_default();
        let ids = header
            .strip_prefix(HEADER)
            .ok_or_else(|| StoreError::Decrypt("missing PLAIN header".to_string()))?;
        Ok(ids
            .split(',')
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect())
    }

    fn sign(&self, data: &[u8]) -> Result<Vec<u8>> {
        let keys = self.lock();
        let signer = keys.private.iter().next().cloned().ok_or_else(|| {
            StoreError::SignatureInvalid("no private key available for signing".to_string())
        })?;
        drop(keys);

        let digest = Sha256::digest(data);
        Ok(format!("{}{};{}\n", SIG_HEADER, signer, hex::encode(digest)).into_bytes())
    }

    fn verify(&self, data: &[u8], signature: &[u8]) -> Result<bool> {
        let text = std::str::from_utf8(signature)
            .map_err(|_| StoreError::SignatureInvalid("signature is not UTF-8".to_string()))?;
        let rest = match text.trim_end().strip_prefix(SIG_HEADER) {
            Some(rest) => rest,
            None => return Ok(false),
        };
        let (signer, digest_hex) = match rest.split_once(';') {
            Some(parts) => parts,
            None => return Ok(false),
        };

        if !self.lock().public.contains(signer) {
            return Ok(false);
        }
        let digest = Sha256::digest(data);
        Ok(hex::encode(digest) == digest_hex)
    }

    fn find_public_keys(&self, needles: &[String]) -> Result<Vec<String>> {
        Ok(Self::match_keys(&self.lock().public, needles))
    }

    fn find_private_keys(&self, needles: &[String]) -> Result<Vec<String>> {
        Ok(Self::match_keys(&self.lock().private, needles))
    }

    fn import_public_key(&self, key: &[u8]) -> Result<()> {
        let id = std::str::from_utf8(key)
            .map_err(|_| StoreError::Serialization("key material is not UTF-8".to_string()))?
            .trim();
        if id.is_empty() {
            return Err(StoreError::Serialization("empty key material".to_string()));
        }
        self.lock().public.insert(id.to_string());
        Ok(())
    }

    fn export_public_key(&self, id: &str) -> Result<Vec<u8>> {
        let keys = self.lock();
        if !keys.public.contains(id) {
            return Err(StoreError::NotFound(id.to_string()));
        }
        Ok(id.as_bytes().to_vec())
    }

    fn ext(&self) -> &'static str {
        "txt"
    }

    fn id_file(&self) -> &'static str {
        ".plain-id"
    }

    fn name(&self) -> &'static str {
        "plain"
    }
}
