//! The recipient ACL: the idfile plus its signed, HMAC-chained tokens.
//!
//! The ACL protects the idfile against unauthorized recipient addition,
//! downgrade to a stale recipient set, and splicing of an old
//! signature+HMAC pair onto a newer idfile.  Per subtree:
//!
//! ```text
//! <idfile>               newline-separated recipients, sorted, deduped
//! <idfile>.token         token list (JSON array), encrypted to recipients
//! <idfile>.sig.<keyid>   detached signature(s) over the idfile
//! <idfile>.hmac.<keyid>  raw HMAC-SHA256 of the signature file
//! ```
//!
//! The last token is the *current* HMAC key.  Older tokens are retained
//! so historical HMACs stay verifiable, but only a signature whose HMAC
//! matches under the current token counts; anything else is a replay.

use hmac::{Hmac, Mac};
use rand::distributions::Alphanumeric;
use rand::Rng;
use sha2::Sha256;
use sha3::{Digest, Sha3_256};

use crate::backend::{Crypto, Storage};
use crate::errors::{Result, StoreError};

/// Length of a generated token in characters.
const TOKEN_LEN: usize = 128;

// ---------------------------------------------------------------------------
// Recipients
// ---------------------------------------------------------------------------

/// An unordered recipient set with a deterministic (lexicographic)
/// serialization order.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Recipients(Vec<String>);

impl Recipients {
    /// Build a set from arbitrary ids; duplicates collapse, order is
    /// normalized.
    pub fn new(ids: impl IntoIterator<Item = String>) -> Self {
        let mut v: Vec<String> = ids.into_iter().collect();
        v.sort();
        v.dedup();
        Self(v)
    }

    /// Parse idfile text: one recipient per line, blank lines and
    /// `#` comments skipped.
    pub fn parse(text: &str) -> Self {
        Self::new(
            text.lines()
                .map(str::trim)
                .filter(|l| !l.is_empty() && !l.starts_with('#'))
                .map(str::to_string),
        )
    }

    /// Serialize to idfile text: sorted, one per line, trailing newline.
    pub fn serialize(&self) -> String {
        let mut out = self.0.join("\n");
        if !out.is_empty() {
            out.push('\n');
        }
        out
    }

    /// Add an id.  Returns `false` when it was already present.
    pub fn add(&mut self, id: &str) -> bool {
        if self.contains(id) {
            return false;
        }
        self.0.push(id.to_string());
        self.0.sort();
        true
    }

    /// Remove an id.  Returns `false` when it was absent.
    pub fn remove(&mut self, id: &str) -> bool {
        let before = self.0.len();
        self.0.retain(|r| r != id);
        self.0.len() != before
    }

    pub fn contains(&self, id: &str) -> bool {
        self.0.iter().any(|r| r == id)
    }

    pub fn as_slice(&self) -> &[String] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<'a> IntoIterator for &'a Recipients {
    type Item = &'a String;
    type IntoIter = std::slice::Iter<'a, String>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

// ---------------------------------------------------------------------------
// AclStore
// ---------------------------------------------------------------------------

/// The ACL files of one subtree, viewed through a store's backends.
pub struct AclStore<'a> {
    crypto: &'a dyn Crypto,
    storage: &'a dyn Storage,
    /// Directory containing the idfile, `""` for the store root.
    dir: String,
}

impl<'a> AclStore<'a> {
    pub fn new(crypto: &'a dyn Crypto, storage: &'a dyn Storage, dir: impl Into<String>) -> Self {
        Self {
            crypto,
            storage,
            dir: dir.into(),
        }
    }

    /// Path of the idfile inside the store.
    pub fn idfile(&self) -> String {
        if self.dir.is_empty() {
            self.crypto.id_file().to_string()
        } else {
            format!("{}/{}", self.dir, self.crypto.id_file())
        }
    }

    fn token_path(&self) -> String {
        format!("{}.token", self.idfile())
    }

    fn sig_path(&self, keyid: &str) -> String {
        format!("{}.sig.{}", self.idfile(), keyid)
    }

    fn hmac_path(&self, keyid: &str) -> String {
        format!("{}.hmac.{}", self.idfile(), keyid)
    }

    /// Whether this subtree has an idfile at all.
    pub fn exists(&self) -> bool {
        self.storage.exists(&self.idfile())
    }

    /// Whether the token chain has been initialized for this subtree.
    pub fn has_token(&self) -> bool {
        self.storage.exists(&self.token_path())
    }

    /// Read the recipient set without any integrity verification.
    /// Callers outside the ACL itself should prefer `verify`.
    pub fn recipients_raw(&self) -> Result<Recipients> {
        let raw = self.storage.get(&self.idfile())?;
        let text = String::from_utf8_lossy(&raw);
        Ok(Recipients::parse(&text))
    }

    /// First-time initialization of the ACL state.
    ///
    /// Writes the idfile, generates the initial token, encrypts the
    /// token list to the recipients, signs the idfile, and seals the
    /// signature with an HMAC under the new token.  Returns every path
    /// written so the caller can stage them.
    pub fn init(&self, recipients: &Recipients) -> Result<Vec<String>> {
        let tokens = vec![generate_token()];
        self.write_state(recipients, &tokens)
    }

    /// Verify the ACL state and return the recipient set.
    ///
    /// Fails with `ReplayDetected` when no signature is accepted under
    /// the current token, the exact situation an attacker creates by
    /// preserving an old (signature, hmac) pair against a newer idfile.
    pub fn verify(&self) -> Result<Recipients> {
        // Decrypting the token list already authenticates membership in
        // the current recipient set.
        let tokens = self.read_tokens()?;
        let current = tokens.last().ok_or(StoreError::HmacInvalid)?;

        let idfile_bytes = self.storage.get(&self.idfile())?;

        let sig_prefix = format!("{}.sig.", self.idfile());
        let sig_files = self.storage.list(&sig_prefix)?;
        if sig_files.is_empty() {
            return Err(StoreError::SignatureInvalid(format!(
                "no signature found for {}",
                self.idfile()
            )));
        }

        let mut current_ok = false;
        for sig_file in &sig_files {
            let sig_bytes = self.storage.get(sig_file)?;
            if !self.crypto.verify(&idfile_bytes, &sig_bytes)? {
                continue;
            }

            let keyid = match sig_file.strip_prefix(&sig_prefix) {
                Some(k) => k,
                None => continue,
            };
            let hmac_bytes = match self.storage.get(&self.hmac_path(keyid)) {
                Ok(b) => b,
                Err(_) => continue,
            };

            // Newest token first; only the current one counts.
            for (i, token) in tokens.iter().enumerate().rev() {
                if hmac_verify(token.as_bytes(), &sig_bytes, &hmac_bytes)? {
                    if i == tokens.len() - 1 {
                        current_ok = true;
                    }
                    break;
                }
            }
        }

        if !current_ok {
            return Err(StoreError::ReplayDetected);
        }

        let text = String::from_utf8_lossy(&idfile_bytes);
        Ok(Recipients::parse(&text))
    }

    /// Rotate the token chain for a changed recipient set.
    ///
    /// Appends a fresh token, re-encrypts the token list to the new
    /// recipients (which revokes removed ones by construction), and
    /// re-signs + re-HMACs the idfile under the new current token.
    /// Returns every path written so the caller can stage them; the
    /// caller is responsible for bulk re-encryption.
    pub fn rotate(&self, recipients: &Recipients) -> Result<Vec<String>> {
        let mut tokens = self.read_tokens()?;
        tokens.push(generate_token());
        self.write_state(recipients, &tokens)
    }

    /// Number of tokens in the chain (one per rotation).
    pub fn token_count(&self) -> Result<usize> {
        Ok(self.read_tokens()?.len())
    }

    fn read_tokens(&self) -> Result<Vec<String>> {
        let ciphertext = self.storage.get(&self.token_path())?;
        let plaintext = self.crypto.decrypt(&ciphertext)?;
        serde_json::from_slice(&plaintext)
            .map_err(|e| StoreError::Serialization(format!("token list: {e}")))
    }

    /// Write idfile + token file + signature + HMAC for the given state
    /// and return the touched paths.
    fn write_state(&self, recipients: &Recipients, tokens: &[String]) -> Result<Vec<String>> {
        if recipients.is_empty() {
            return Err(StoreError::Encrypt("empty recipient set".to_string()));
        }

        let mut touched = Vec::new();
        let idfile = self.idfile();
        let idfile_bytes = recipients.serialize().into_bytes();
        self.storage.set(&idfile, &idfile_bytes)?;
        touched.push(idfile.clone());

        let token_json = serde_json::to_vec(tokens)
            .map_err(|e| StoreError::Serialization(format!("token list: {e}")))?;
        let token_ct = self.crypto.encrypt(&token_json, recipients.as_slice())?;
        self.storage.set(&self.token_path(), &token_ct)?;
        touched.push(self.token_path());

        // Signature/HMAC files from earlier rotations stay on disk.
        // They remain verifiable under older tokens but never count as
        // current; only the pair for the active signer is rewritten.
        let signer = self.signing_key(recipients)?;
        let sig = self.crypto.sign(&idfile_bytes)?;
        self.storage.set(&self.sig_path(&signer), &sig)?;
        touched.push(self.sig_path(&signer));

        let current = tokens.last().ok_or(StoreError::HmacInvalid)?;
        let tag = hmac_sha256(current.as_bytes(), &sig)?;
        self.storage.set(&self.hmac_path(&signer), &tag)?;
        touched.push(self.hmac_path(&signer));

        Ok(touched)
    }

    /// Pick the signing key: the lexicographically first recipient for
    /// which a private key is locally available.
    fn signing_key(&self, recipients: &Recipients) -> Result<String> {
        for r in recipients {
            if !self.crypto.find_private_keys(&[r.clone()])?.is_empty() {
                return Ok(r.clone());
            }
        }
        Err(StoreError::SignatureInvalid(
            "no recipient with a locally available private key".to_string(),
        ))
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Generate a fresh 128-character alphanumeric token.
pub fn generate_token() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(TOKEN_LEN)
        .map(char::from)
        .collect()
}

/// SHA3-256 checksum of serialized idfile bytes, hex-encoded.  Used by
/// the bare-idfile fallback when no token chain exists yet.
pub fn recipients_checksum(data: &[u8]) -> String {
    hex::encode(Sha3_256::digest(data))
}

/// Raw 32-byte HMAC-SHA256.
fn hmac_sha256(key: &[u8], data: &[u8]) -> Result<Vec<u8>> {
    let mut mac = Hmac::<Sha256>::new_from_slice(key)
        .map_err(|e| StoreError::Serialization(format!("invalid HMAC key: {e}")))?;
    mac.update(data);
    Ok(mac.finalize().into_bytes().to_vec())
}

/// Constant-time HMAC comparison via `Mac::verify_slice`.
fn hmac_verify(key: &[u8], data: &[u8], expected: &[u8]) -> Result<bool> {
    let mut mac = Hmac::<Sha256>::new_from_slice(key)
        .map_err(|e| StoreError::Serialization(format!("invalid HMAC key: {e}")))?;
    mac.update(data);
    Ok(mac.verify_slice(expected).is_ok())
}
