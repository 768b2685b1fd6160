use thiserror::Error;

/// All errors that can occur in passtree.
#[derive(Debug, Error)]
pub enum StoreError {
    // --- Entry errors ---
    #[error("Entry '{0}' not found")]
    NotFound(String),

    #[error("Bad entry name '{0}'")]
    BadName(String),

    #[error("Ambiguous request: {0}")]
    Ambiguous(String),

    // --- Crypto errors ---
    #[error("Decryption failed: {0}")]
    Decrypt(String),

    #[error("Encryption failed: {0}")]
    Encrypt(String),

    // --- Recipient ACL errors ---
    #[error("Recipient checksum changed for '{0}': the idfile was modified outside of passtree")]
    RecipientChecksumChanged(String),

    #[error("Replay detected: no signature verifies under the current token")]
    ReplayDetected,

    #[error("HMAC verification failed")]
    HmacInvalid,

    #[error("Signature verification failed: {0}")]
    SignatureInvalid(String),

    // --- Revision control (non-fatal at the sub-store boundary) ---
    #[error("Revision control not initialized")]
    RcsNotInit,

    #[error("No remote configured")]
    RcsNoRemote,

    #[error("Nothing to commit")]
    RcsNothingToCommit,

    #[error("Revision control error: {0}")]
    Rcs(String),

    // --- Composition errors ---
    #[error("'{0}' is already mounted")]
    AlreadyMounted(String),

    #[error("'{0}' is not mounted")]
    NotMounted(String),

    #[error("A store is already mounted at '{0}'")]
    DuplicateMount(String),

    // --- Secret container errors ---
    #[error("Secret body has no YAML document marker")]
    NoYamlMark,

    #[error("No key '{0}' in secret body")]
    NoKey(String),

    // --- Backend URL errors ---
    #[error("Invalid backend URL: {0}")]
    Url(String),

    // --- Pipeline errors ---
    #[error("Pipeline reordering: expected sequence {expected}, got {got}")]
    Reordering { expected: usize, got: usize },

    #[error("Operation cancelled")]
    Cancelled,

    // --- Config errors ---
    #[error("Config file error: {0}")]
    Config(String),

    // --- Serialization errors ---
    #[error("Serialization error: {0}")]
    Serialization(String),

    // --- IO errors ---
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience type alias for passtree results.
pub type Result<T> = std::result::Result<T, StoreError>;
