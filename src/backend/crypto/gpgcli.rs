//! The `gpgcli` crypto backend: spawns the `gpg` binary.
//!
//! All operations stream data through stdin/stdout of a short-lived
//! `gpg` child process; nothing is linked in-process.  Recipient listing
//! parses `--list-packets` output, key discovery parses the
//! machine-readable `--with-colons` listing.

use std::io::Write;
use std::process::{Command, Stdio};

use rand::distributions::Alphanumeric;
use rand::Rng;

use super::Crypto;
use crate::errors::{Result, StoreError};

/// Arguments passed to every gpg invocation.
const BASE_ARGS: &[&str] = &["--batch", "--yes", "--quiet"];

/// Spawns `gpg` for every operation.
pub struct GpgCli {
    binary: String,
}

impl Default for GpgCli {
    fn default() -> Self {
        Self::new()
    }
}

impl GpgCli {
    /// A backend using the `gpg` found on `PATH`.
    pub fn new() -> Self {
        Self::with_binary("gpg")
    }

    /// A backend using an explicit gpg binary.
    pub fn with_binary(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    /// Run gpg with the given arguments, feeding `stdin` and returning
    /// stdout.  A non-zero exit becomes the error built by `err`.
    fn run(
        &self,
        args: &[&str],
        stdin: Option<&[u8]>,
        err: impl Fn(String) -> StoreError,
    ) -> Result<Vec<u8>> {
        let mut cmd = Command::new(&self.binary);
        cmd.args(BASE_ARGS)
            .args(args)
            .stdin(if stdin.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        let mut child = cmd.spawn().map_err(|e| err(format!("spawn gpg: {e}")))?;

        if let Some(data) = stdin {
            // Dropping the handle closes the pipe so gpg sees EOF.
            let mut handle = child
                .stdin
                .take()
                .ok_or_else(|| err("gpg stdin unavailable".to_string()))?;
            handle
                .write_all(data)
                .map_err(|e| err(format!("write to gpg: {e}")))?;
        }

        let output = child
            .wait_with_output()
            .map_err(|e| err(format!("wait for gpg: {e}")))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(err(stderr.trim().to_string()));
        }
        Ok(output.stdout)
    }

    /// Parse fingerprints out of a `--with-colons` key listing.
    fn parse_colons(listing: &[u8]) -> Vec<String> {
        let text = String::from_utf8_lossy(listing);
        let mut fprs: Vec<String> = text
            .lines()
            .filter(|l| l.starts_with("fpr:"))
            .filter_map(|l| l.split(':').nth(9))
            .filter(|f| !f.is_empty())
            .map(str::to_string)
            .collect();
        fprs.sort_unstable();
        fprs.dedup();
        fprs
    }
}

impl Crypto for GpgCli {
    fn encrypt(&self, plaintext: &[u8], recipients: &[String]) -> Result<Vec<u8>> {
        if recipients.is_empty() {
            return Err(StoreError::Encrypt("no recipients given".to_string()));
        }
        let mut args: Vec<&str> = vec!["--encrypt", "--trust-model=always", "--output", "-"];
        for r in recipients {
            args.push("--recipient");
            args.push(r);
        }
        self.run(&args, Some(plaintext), StoreError::Encrypt)
    }

    fn decrypt(&self, ciphertext: &[u8]) -> Result<Vec<u8>> {
        self.run(
            &["--decrypt", "--output", "-"],
            Some(ciphertext),
            StoreError::Decrypt,
        )
    }

    fn recipient_ids(&self, ciphertext: &[u8]) -> Result<Vec<String>> {
        let out = self.run(
            &["--list-only", "--list-packets"],
            Some(ciphertext),
            StoreError::Decrypt,
        )?;
        let text = String::from_utf8_lossy(&out);

        // Packet dumps look like ":pubkey enc packet: version 3, algo 1,
        // keyid 1234567890ABCDEF".
        let mut ids: Vec<String> = text
            .lines()
            .filter_map(|l| {
                let (_, rest) = l.split_once("keyid ")?;
                let id: String = rest
                    .chars()
                    .take_while(|c| c.is_ascii_hexdigit())
                    .collect();
                if id.is_empty() {
                    None
                } else {
                    Some(id)
                }
            })
            .collect();
        ids.sort_unstable();
        ids.dedup();
        Ok(ids)
    }

    fn sign(&self, data: &[u8]) -> Result<Vec<u8>> {
        self.run(
            &["--detach-sign", "--armor", "--output", "-"],
            Some(data),
            StoreError::SignatureInvalid,
        )
    }

    fn verify(&self, data: &[u8], signature: &[u8]) -> Result<bool> {
        // gpg insists on reading the detached signature from a file; the
        // signed data can come in on stdin.
        let suffix: String = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(12)
            .map(char::from)
            .collect();
        let sig_path = std::env::temp_dir().join(format!(".passtree-sig-{suffix}"));
        std::fs::write(&sig_path, signature)?;

        let result = self.run(
            &["--verify", &sig_path.to_string_lossy(), "-"],
            Some(data),
            StoreError::SignatureInvalid,
        );
        let _ = std::fs::remove_file(&sig_path);

        match result {
            Ok(_) => Ok(true),
            Err(StoreError::SignatureInvalid(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }

    fn find_public_keys(&self, needles: &[String]) -> Result<Vec<String>> {
        let mut args: Vec<&str> = vec!["--with-colons", "--fixed-list-mode", "--list-keys"];
        args.extend(needles.iter().map(String::as_str));
        match self.run(&args, None, StoreError::Config) {
            Ok(out) => Ok(Self::parse_colons(&out)),
            // gpg exits non-zero when nothing matches.
            Err(_) => Ok(Vec::new()),
        }
    }

    fn find_private_keys(&self, needles: &[String]) -> Result<Vec<String>> {
        let mut args: Vec<&str> = vec!["--with-colons", "--fixed-list-mode", "--list-secret-keys"];
        args.extend(needles.iter().map(String::as_str));
        match self.run(&args, None, StoreError::Config) {
            Ok(out) => Ok(Self::parse_colons(&out)),
            Err(_) => Ok(Vec::new()),
        }
    }

    fn import_public_key(&self, key: &[u8]) -> Result<()> {
        self.run(&["--import"], Some(key), StoreError::Config)?;
        Ok(())
    }

    fn export_public_key(&self, id: &str) -> Result<Vec<u8>> {
        let out = self.run(&["--export", "--armor", id], None, StoreError::Config)?;
        if out.is_empty() {
            return Err(StoreError::NotFound(id.to_string()));
        }
        Ok(out)
    }

    fn ext(&self) -> &'static str {
        "gpg"
    }

    fn id_file(&self) -> &'static str {
        ".gpg-id"
    }

    fn name(&self) -> &'static str {
        "gpgcli"
    }
}
