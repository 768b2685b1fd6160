//! The pluggable crypto backend interface.
//!
//! The engine never implements a cryptographic primitive itself; every
//! encrypt/decrypt/sign/verify goes through this capability set.  Adding
//! a new backend requires no change to anything downstream of the trait.

pub mod gpgcli;
pub mod plain;

pub use gpgcli::GpgCli;
pub use plain::Plain;

use crate::errors::Result;

/// Capability set exposed by any crypto backend.
pub trait Crypto: Send + Sync {
    /// Encrypt `plaintext` so every listed recipient can decrypt it.
    fn encrypt(&self, plaintext: &[u8], recipients: &[String]) -> Result<Vec<u8>>;

    /// Decrypt a ciphertext produced by `encrypt`.
    fn decrypt(&self, ciphertext: &[u8]) -> Result<Vec<u8>>;

    /// The fingerprints this ciphertext was encrypted for.
    fn recipient_ids(&self, ciphertext: &[u8]) -> Result<Vec<String>>;

    /// Produce a detached signature over `data` with a locally available
    /// private key.
    fn sign(&self, data: &[u8]) -> Result<Vec<u8>>;

    /// Check a detached signature over `data`.  Returns `Ok(false)` for a
    /// well-formed but non-matching signature.
    fn verify(&self, data: &[u8], signature: &[u8]) -> Result<bool>;

    /// Find public keys matching the needles by hex-suffix or UID
    /// substring.  No needles returns every known key.
    fn find_public_keys(&self, needles: &[String]) -> Result<Vec<String>>;

    /// Find private keys matching the needles by hex-suffix or UID
    /// substring.  No needles returns every known key.
    fn find_private_keys(&self, needles: &[String]) -> Result<Vec<String>>;

    /// Import a public key into the local keyring.
    fn import_public_key(&self, key: &[u8]) -> Result<()>;

    /// Export a public key from the local keyring.
    fn export_public_key(&self, id: &str) -> Result<Vec<u8>>;

    /// Filename extension for ciphertext files (e.g. `gpg`).
    fn ext(&self) -> &'static str;

    /// Name of the per-subtree recipient idfile (e.g. `.gpg-id`).
    fn id_file(&self) -> &'static str;

    /// Registered backend name.
    fn name(&self) -> &'static str;
}
