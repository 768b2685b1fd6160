//! The sub-store engine: all CRUD on one directory tree.
//!
//! A `SubStore` binds one URL to one crypto, one storage, and one RCS
//! handle and enforces the central invariant: every secret is encrypted
//! for exactly the recipients authorized at its path.  Recipient
//! changes rotate the ACL token chain and re-encrypt every entry.
//!
//! RCS failures of the recoverable kind (`RcsNotInit`, `RcsNoRemote`,
//! `RcsNothingToCommit`) are swallowed here and logged; a store without
//! working revision control still stores secrets.

use std::sync::{Arc, Mutex};

use tracing::{debug, warn};

use super::acl::{recipients_checksum, AclStore, Recipients};
use super::reencrypt::encrypt_parallel;
use crate::backend::rcs::is_non_fatal;
use crate::backend::{BackendRegistry, BackendUrl, Crypto, Rcs, Revision, Storage};
use crate::config::Config;
use crate::ctx::Context;
use crate::errors::{Result, StoreError};
use crate::secret::Secret;

/// Maximum number of parent levels walked while resolving an idfile.
const MAX_IDFILE_DEPTH: usize = 100;

/// Name of the optional per-directory generation template.
const TEMPLATE_FILE: &str = ".pass-template";

/// Directory holding exported public keys.
const PUBLIC_KEYS_DIR: &str = ".public-keys";

/// Callback consulted before every write: may drop candidate
/// recipients, but can never add unauthorized ones.
pub type RecipientConfirm = Box<dyn Fn(&str, &[String]) -> Result<Vec<String>> + Send + Sync>;

/// One mounted (or root) store: a directory tree plus its backends.
pub struct SubStore {
    alias: String,
    url: BackendUrl,
    crypto: Box<dyn Crypto>,
    storage: Box<dyn Storage>,
    rcs: Box<dyn Rcs>,
    config: Arc<Mutex<Config>>,
    recipient_confirm: Option<RecipientConfirm>,
}

impl SubStore {
    /// Open a sub-store through the backend registry.
    pub fn open(
        alias: impl Into<String>,
        url: BackendUrl,
        registry: &BackendRegistry,
        config: Arc<Mutex<Config>>,
    ) -> Result<Self> {
        let (crypto, storage, rcs) = registry.open(&url)?;
        Ok(Self {
            alias: alias.into(),
            url,
            crypto,
            storage,
            rcs,
            config,
            recipient_confirm: None,
        })
    }

    /// Build a sub-store from explicit backends (used by tests and by
    /// callers that need to share a storage handle).
    pub fn with_backends(
        alias: impl Into<String>,
        url: BackendUrl,
        crypto: Box<dyn Crypto>,
        storage: Box<dyn Storage>,
        rcs: Box<dyn Rcs>,
    ) -> Self {
        Self {
            alias: alias.into(),
            url,
            crypto,
            storage,
            rcs,
            config: Arc::new(Mutex::new(Config::default())),
            recipient_confirm: None,
        }
    }

    /// Register the recipient-confirmation callback.
    pub fn set_recipient_confirm(&mut self, cb: RecipientConfirm) {
        self.recipient_confirm = Some(cb);
    }

    pub fn alias(&self) -> &str {
        &self.alias
    }

    pub fn url(&self) -> &BackendUrl {
        &self.url
    }

    pub fn crypto(&self) -> &dyn Crypto {
        self.crypto.as_ref()
    }

    pub fn storage(&self) -> &dyn Storage {
        self.storage.as_ref()
    }

    pub fn rcs(&self) -> &dyn Rcs {
        self.rcs.as_ref()
    }

    // ------------------------------------------------------------------
    // Initialization
    // ------------------------------------------------------------------

    /// First-time initialization: write the recipient ACL for the store
    /// root and commit it.
    pub fn init(&self, ctx: &Context, recipient_ids: &[String]) -> Result<()> {
        ctx.check()?;
        let acl = self.acl("");
        if acl.has_token() {
            return Err(StoreError::Ambiguous(format!(
                "store '{}' is already initialized",
                self.alias
            )));
        }
        let recipients = Recipients::new(recipient_ids.iter().cloned());
        let mut paths = acl.init(&recipients)?;
        paths.extend(self.export_public_keys(&recipients));

        self.rcs_stage(ctx, &paths, "Initialized store recipients");
        Ok(())
    }

    // ------------------------------------------------------------------
    // CRUD
    // ------------------------------------------------------------------

    /// Decrypt and parse one entry.
    pub fn get(&self, ctx: &Context, name: &str) -> Result<Secret> {
        ctx.check()?;
        validate_name(name)?;

        let file = self.passfile(name);
        let ciphertext = match self.storage.get(&file) {
            Ok(ct) => ct,
            Err(StoreError::NotFound(_)) => return Err(StoreError::NotFound(name.to_string())),
            Err(e) => return Err(e),
        };

        // Verify the ACL governing this path before trusting anything.
        self.recipients_for(name)?;

        let plaintext = self.crypto.decrypt(&ciphertext)?;
        Secret::parse(&plaintext)
    }

    /// Encrypt and store one entry.
    pub fn set(&self, ctx: &Context, name: &str, secret: &Secret) -> Result<()> {
        self.write(ctx, name, secret, &format!("Save secret to {name}"))
    }

    fn write(&self, ctx: &Context, name: &str, secret: &Secret, message: &str) -> Result<()> {
        ctx.check()?;
        validate_name(name)?;
        if self.storage.is_dir(name) {
            return Err(StoreError::BadName(format!(
                "'{name}' names an existing directory"
            )));
        }

        let recipients = self.recipients_for(name)?;
        let finalized = self.confirm_recipients(name, &recipients)?;

        let ciphertext = self
            .crypto
            .encrypt(&secret.bytes(), finalized.as_slice())?;
        let file = self.passfile(name);
        self.storage.set(&file, &ciphertext)?;

        self.rcs_stage(ctx, &[file], message);
        Ok(())
    }

    /// Remove one entry.  The second removal of the same entry reports
    /// `NotFound`.
    pub fn delete(&self, ctx: &Context, name: &str) -> Result<()> {
        ctx.check()?;
        validate_name(name)?;

        let file = self.passfile(name);
        match self.storage.delete(&file) {
            Ok(()) => {}
            Err(StoreError::NotFound(_)) => return Err(StoreError::NotFound(name.to_string())),
            Err(e) => return Err(e),
        }
        self.rcs_stage(ctx, &[file], &format!("Remove secret {name}"));
        Ok(())
    }

    /// Recursively remove everything under `prefix`.
    pub fn prune(&self, ctx: &Context, prefix: &str) -> Result<()> {
        ctx.check()?;
        validate_name(prefix)?;

        if self.storage.is_dir(prefix) {
            self.storage.prune(prefix)?;
        } else {
            // A prefix matching a single entry prunes just that entry.
            let file = self.passfile(prefix);
            match self.storage.delete(&file) {
                Ok(()) => {}
                Err(StoreError::NotFound(_)) => {
                    return Err(StoreError::NotFound(prefix.to_string()))
                }
                Err(e) => return Err(e),
            }
        }
        self.rcs_stage(ctx, &[prefix.to_string()], &format!("Prune {prefix}"));
        Ok(())
    }

    /// Copy one entry within this store.  Recursive copies and copies
    /// onto an existing entry are unsupported and fail with `Ambiguous`.
    pub fn copy(&self, ctx: &Context, from: &str, to: &str) -> Result<()> {
        ctx.check()?;
        if self.storage.is_dir(from) {
            return Err(StoreError::Ambiguous(format!(
                "'{from}' is a directory; recursive copy within one store is not supported"
            )));
        }
        if self.exists(to) {
            return Err(StoreError::Ambiguous(format!(
                "'{to}' already exists; delete it first or pick another name"
            )));
        }
        let secret = self.get(ctx, from)?;
        self.write(ctx, to, &secret, &format!("Copy {from} to {to}"))
    }

    /// Move one entry within this store.  The destination write happens
    /// before the source delete; a failed write leaves the source
    /// untouched.  Moving onto an existing entry fails with `Ambiguous`.
    pub fn mv(&self, ctx: &Context, from: &str, to: &str) -> Result<()> {
        ctx.check()?;
        if self.storage.is_dir(from) {
            return Err(StoreError::Ambiguous(format!(
                "'{from}' is a directory; recursive move within one store is not supported"
            )));
        }
        if self.exists(to) {
            return Err(StoreError::Ambiguous(format!(
                "'{to}' already exists; delete it first or pick another name"
            )));
        }
        let secret = self.get(ctx, from)?;
        self.write(ctx, to, &secret, &format!("Move {from} to {to}"))?;
        self.delete(ctx, from)
    }

    /// Whether an entry exists (no decryption).
    pub fn exists(&self, name: &str) -> bool {
        validate_name(name).is_ok() && self.storage.exists(&self.passfile(name))
    }

    /// All entry names in this store, sorted.
    pub fn list(&self, ctx: &Context) -> Result<Vec<String>> {
        ctx.check()?;
        let suffix = format!(".{}", self.crypto.ext());
        Ok(self
            .storage
            .list("")?
            .into_iter()
            .filter_map(|f| f.strip_suffix(&suffix).map(str::to_string))
            .collect())
    }

    // ------------------------------------------------------------------
    // Recipients
    // ------------------------------------------------------------------

    /// Add a recipient, rotate the token chain, and re-encrypt every
    /// entry for the new set.
    pub fn add_recipient(&self, ctx: &Context, id: &str) -> Result<()> {
        ctx.check()?;
        let acl = self.acl("");
        let mut recipients = self.load_root_recipients(&acl)?;
        if !recipients.add(id) {
            return Err(StoreError::Ambiguous(format!(
                "'{id}' is already a recipient"
            )));
        }
        self.rotate_and_reencrypt(ctx, &acl, &recipients, &format!("added recipient {id}"))
    }

    /// Remove a recipient, rotate the token chain, and re-encrypt every
    /// entry so the removed key can no longer read new ciphertexts.
    pub fn remove_recipient(&self, ctx: &Context, id: &str) -> Result<()> {
        ctx.check()?;
        let acl = self.acl("");
        let mut recipients = self.load_root_recipients(&acl)?;
        if !recipients.remove(id) {
            return Err(StoreError::NotFound(id.to_string()));
        }
        if recipients.is_empty() {
            return Err(StoreError::Ambiguous(
                "cannot remove the last recipient".to_string(),
            ));
        }
        self.rotate_and_reencrypt(ctx, &acl, &recipients, &format!("removed recipient {id}"))
    }

    /// The verified recipient set for the store root.
    pub fn recipients(&self) -> Result<Recipients> {
        self.recipients_for("")
    }

    /// Number of tokens in the root ACL chain (one per rotation).
    pub fn token_count(&self) -> Result<usize> {
        self.acl("").token_count()
    }

    /// Accept the current bare idfile as authoritative by updating the
    /// stored checksum.  Only meaningful for stores that predate the
    /// token chain.
    pub fn update_recipient_checksum(&self) -> Result<()> {
        let acl = self.acl(&self.idfile_dir_for(""));
        let raw = self.storage.get(&acl.idfile())?;
        let sum = recipients_checksum(&raw);
        let key = self.checksum_key(&acl.idfile());
        self.lock_config().set_recipient_checksum(&key, &sum);
        Ok(())
    }

    fn rotate_and_reencrypt(
        &self,
        ctx: &Context,
        acl: &AclStore<'_>,
        recipients: &Recipients,
        reason: &str,
    ) -> Result<()> {
        // Stores migrated from a bare idfile get their first token here.
        let mut paths = if acl.has_token() {
            acl.rotate(recipients)?
        } else {
            acl.init(recipients)?
        };
        paths.extend(self.export_public_keys(recipients));

        paths.extend(self.reencrypt_all(ctx)?);
        self.rcs_stage(ctx, &paths, &format!("Re-encrypted for {reason}"));
        Ok(())
    }

    /// Re-encrypt every entry for the recipients currently authorized
    /// at its path.  Returns the touched storage paths; cancellable at
    /// every entry boundary, and idempotent under retry.
    fn reencrypt_all(&self, ctx: &Context) -> Result<Vec<String>> {
        use std::collections::BTreeMap;

        // Group entries by governing idfile so subtrees with their own
        // recipient set are re-encrypted for that set.
        let mut groups: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for entry in self.list(ctx)? {
            ctx.check()?;
            groups
                .entry(self.idfile_dir_for(&entry))
                .or_default()
                .push(entry);
        }

        let mut touched = Vec::new();
        for (dir, entries) in groups {
            let recipients = self.recipients_for_dir(&dir)?;

            let mut items = Vec::with_capacity(entries.len());
            for entry in &entries {
                ctx.check()?;
                let ciphertext = self.storage.get(&self.passfile(entry))?;
                let plaintext = self.crypto.decrypt(&ciphertext)?;
                items.push((entry.clone(), plaintext));
            }

            let sealed = encrypt_parallel(ctx, self.crypto.as_ref(), recipients.as_slice(), items)?;
            for (entry, ciphertext) in sealed {
                ctx.check()?;
                let file = self.passfile(&entry);
                self.storage.set(&file, &ciphertext)?;
                touched.push(file);
            }
        }
        Ok(touched)
    }

    // ------------------------------------------------------------------
    // Revisions
    // ------------------------------------------------------------------

    /// All revisions of one entry, newest first.
    pub fn list_revisions(&self, ctx: &Context, name: &str) -> Result<Vec<Revision>> {
        ctx.check()?;
        validate_name(name)?;
        self.rcs.revisions(&self.passfile(name))
    }

    /// Decrypt and parse one entry at a given revision.
    pub fn get_revision(&self, ctx: &Context, name: &str, revision: &str) -> Result<Secret> {
        ctx.check()?;
        validate_name(name)?;
        let ciphertext = self.rcs.get_revision(&self.passfile(name), revision)?;
        let plaintext = self.crypto.decrypt(&ciphertext)?;
        Secret::parse(&plaintext)
    }

    // ------------------------------------------------------------------
    // Fsck
    // ------------------------------------------------------------------

    /// Check every entry against the ACL's expected recipient set and
    /// re-encrypt entries whose ciphertext disagrees.  Per-file
    /// failures become warnings; the walk continues.
    pub fn fsck(&self, ctx: &Context, check_decrypt: bool) -> Result<Vec<String>> {
        let mut warnings = self.storage.fsck()?;
        let mut repaired = Vec::new();

        for entry in self.list(ctx)? {
            ctx.check()?;
            let file = self.passfile(&entry);

            let ciphertext = match self.storage.get(&file) {
                Ok(ct) => ct,
                Err(e) => {
                    warnings.push(format!("{entry}: unreadable: {e}"));
                    continue;
                }
            };
            let expected = match self.recipients_for(&entry) {
                Ok(r) => r,
                Err(e) => {
                    warnings.push(format!("{entry}: recipient lookup failed: {e}"));
                    continue;
                }
            };
            let actual = match self.crypto.recipient_ids(&ciphertext) {
                Ok(ids) => Recipients::new(ids),
                Err(e) => {
                    warnings.push(format!("{entry}: cannot list recipients: {e}"));
                    continue;
                }
            };

            if actual != expected {
                match self.reencrypt_one(&file, &ciphertext, &expected) {
                    Ok(()) => {
                        warnings.push(format!("{entry}: re-encrypted for authorized recipients"));
                        repaired.push(file);
                    }
                    Err(e) => warnings.push(format!("{entry}: re-encryption failed: {e}")),
                }
            } else if check_decrypt {
                if let Err(e) = self.crypto.decrypt(&ciphertext) {
                    warnings.push(format!("{entry}: decryption failed: {e}"));
                }
            }
        }

        if !repaired.is_empty() {
            self.rcs_stage(ctx, &repaired, "Fsck re-encrypted entries");
        }
        Ok(warnings)
    }

    fn reencrypt_one(
        &self,
        file: &str,
        ciphertext: &[u8],
        recipients: &Recipients,
    ) -> Result<()> {
        let plaintext = self.crypto.decrypt(ciphertext)?;
        let sealed = self.crypto.encrypt(&plaintext, recipients.as_slice())?;
        self.storage.set(file, &sealed)
    }

    // ------------------------------------------------------------------
    // Templates and public keys
    // ------------------------------------------------------------------

    /// Directories carrying a generation template, sorted.
    pub fn template_dirs(&self) -> Result<Vec<String>> {
        Ok(self
            .storage
            .list("")?
            .into_iter()
            .filter_map(|f| {
                if f == TEMPLATE_FILE {
                    Some(String::new())
                } else {
                    f.strip_suffix(&format!("/{TEMPLATE_FILE}"))
                        .map(str::to_string)
                }
            })
            .collect())
    }

    /// Import every exported public key found under `.public-keys/`.
    pub fn import_public_keys(&self) -> Result<usize> {
        let mut imported = 0;
        for file in self.storage.list(PUBLIC_KEYS_DIR)? {
            let key = self.storage.get(&file)?;
            match self.crypto.import_public_key(&key) {
                Ok(()) => imported += 1,
                Err(e) => warn!(file = %file, "public key import failed: {e}"),
            }
        }
        Ok(imported)
    }

    /// Export the public keys of all recipients into `.public-keys/`.
    /// Keys the crypto backend cannot export are skipped.
    fn export_public_keys(&self, recipients: &Recipients) -> Vec<String> {
        let mut written = Vec::new();
        for id in recipients {
            let path = format!("{PUBLIC_KEYS_DIR}/{id}");
            if self.storage.exists(&path) {
                continue;
            }
            match self.crypto.export_public_key(id) {
                Ok(key) => {
                    if self.storage.set(&path, &key).is_ok() {
                        written.push(path);
                    }
                }
                Err(e) => debug!(id = %id, "public key export skipped: {e}"),
            }
        }
        written
    }

    // ------------------------------------------------------------------
    // Internal helpers
    // ------------------------------------------------------------------

    fn passfile(&self, name: &str) -> String {
        format!("{}.{}", name, self.crypto.ext())
    }

    fn acl<'a>(&'a self, dir: &str) -> AclStore<'a> {
        AclStore::new(self.crypto.as_ref(), self.storage.as_ref(), dir)
    }

    fn lock_config(&self) -> std::sync::MutexGuard<'_, Config> {
        self.config.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Walk parents of `name` until a directory with an idfile is
    /// found, bounded at 100 levels; defaults to the store root.
    fn idfile_dir_for(&self, name: &str) -> String {
        let mut dir = match name.rsplit_once('/') {
            Some((parent, _)) => parent.to_string(),
            None => String::new(),
        };
        for _ in 0..MAX_IDFILE_DEPTH {
            if dir.is_empty() {
                break;
            }
            if self.acl(&dir).exists() {
                return dir;
            }
            dir = match dir.rsplit_once('/') {
                Some((parent, _)) => parent.to_string(),
                None => String::new(),
            };
        }
        String::new()
    }

    /// The verified recipient set governing `name`.
    fn recipients_for(&self, name: &str) -> Result<Recipients> {
        self.recipients_for_dir(&self.idfile_dir_for(name))
    }

    fn recipients_for_dir(&self, dir: &str) -> Result<Recipients> {
        let acl = self.acl(dir);
        if !acl.exists() {
            return Err(StoreError::NotFound(format!(
                "no recipient idfile for store '{}'",
                self.alias
            )));
        }
        if acl.has_token() {
            return acl.verify();
        }

        // Bare idfile (no token chain yet): fall back to the sidecar
        // checksum.  First sight records the checksum; any later
        // mismatch fails until explicitly updated.
        let raw = self.storage.get(&acl.idfile())?;
        let sum = recipients_checksum(&raw);
        let key = self.checksum_key(&acl.idfile());
        let mut config = self.lock_config();
        match config.recipient_checksum(&key) {
            Some(expected) if expected != sum => {
                return Err(StoreError::RecipientChecksumChanged(acl.idfile()))
            }
            Some(_) => {}
            None => config.set_recipient_checksum(&key, &sum),
        }
        drop(config);

        Ok(Recipients::parse(&String::from_utf8_lossy(&raw)))
    }

    fn checksum_key(&self, idfile: &str) -> String {
        format!("{}:{}", self.storage.location(), idfile)
    }

    /// The root recipient set as seen by a rotation.
    ///
    /// Rotation is an explicit edit of the recipient list by a holder of
    /// the signing key, so a set that fails verification is still loaded
    /// (raw, with a warning): this is the recovery path after tampering,
    /// and the rotation rewrites idfile, signature, and HMAC anyway.
    fn load_root_recipients(&self, acl: &AclStore<'_>) -> Result<Recipients> {
        if !acl.has_token() {
            return self.recipients_for_dir("");
        }
        match acl.verify() {
            Ok(r) => Ok(r),
            Err(StoreError::ReplayDetected) | Err(StoreError::SignatureInvalid(_)) => {
                warn!(store = %self.alias, "recipient ACL failed verification; loading raw set for rotation");
                acl.recipients_raw()
            }
            Err(e) => Err(e),
        }
    }

    /// Run the recipient set through the confirmation callback and make
    /// sure the local signing-capable recipient stays in the set so the
    /// writer can decrypt their own write.
    fn confirm_recipients(&self, name: &str, recipients: &Recipients) -> Result<Recipients> {
        let candidates: Vec<String> = recipients.as_slice().to_vec();

        let mut chosen = match &self.recipient_confirm {
            Some(cb) => {
                let picked = cb(name, &candidates)?;
                for id in &picked {
                    if !recipients.contains(id) {
                        return Err(StoreError::Ambiguous(format!(
                            "recipient '{id}' is not authorized for '{name}'"
                        )));
                    }
                }
                Recipients::new(picked)
            }
            None => recipients.clone(),
        };

        // The writer's own key must stay in the set.
        for id in &candidates {
            if !self.crypto.find_private_keys(&[id.clone()])?.is_empty() {
                chosen.add(id);
                break;
            }
        }

        if chosen.is_empty() {
            return Err(StoreError::Encrypt(format!(
                "no recipients left for '{name}' after confirmation"
            )));
        }
        Ok(chosen)
    }

    /// The per-write RCS tail of every mutation:
    ///
    /// ```text
    /// add → commit (if auto-commit) → push (if auto-sync)
    /// ```
    ///
    /// Recoverable RCS conditions end the chain successfully and are
    /// logged; anything else is logged as a warning but never fails the
    /// already-persisted write.
    fn rcs_stage(&self, ctx: &Context, paths: &[String], message: &str) {
        match self.rcs.add(paths) {
            Ok(()) => {}
            Err(ref e) if is_non_fatal(e) => {
                debug!(store = %self.alias, "rcs add skipped: {e}");
                return;
            }
            Err(e) => {
                warn!(store = %self.alias, "rcs add failed: {e}");
                return;
            }
        }

        let (auto_commit, auto_sync) = {
            let config = self.lock_config();
            (config.auto_commit, config.auto_sync)
        };
        if !(auto_commit && ctx.commit_enabled()) {
            return;
        }
        match self.rcs.commit(message) {
            Ok(()) => {}
            Err(ref e) if is_non_fatal(e) => {
                debug!(store = %self.alias, "rcs commit skipped: {e}");
                return;
            }
            Err(e) => {
                warn!(store = %self.alias, "rcs commit failed: {e}");
                return;
            }
        }

        if !(auto_sync && ctx.sync_enabled()) {
            return;
        }
        match self.rcs.push("", "") {
            Ok(()) => {}
            Err(ref e) if is_non_fatal(e) => {
                debug!(store = %self.alias, "rcs push skipped: {e}");
            }
            Err(e) => {
                warn!(store = %self.alias, "rcs push failed: {e}");
            }
        }
    }
}

/// Validate an entry name: no empty names, no double slashes, no
/// leading or trailing slash, no dot-dot traversal.
fn validate_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(StoreError::BadName("empty entry name".to_string()));
    }
    if name.contains("//") || name.starts_with('/') || name.ends_with('/') {
        return Err(StoreError::BadName(name.to_string()));
    }
    if name.split('/').any(|c| c == "." || c == "..") {
        return Err(StoreError::BadName(name.to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::crypto::Plain;
    use crate::backend::rcs::Noop;
    use crate::backend::storage::InMem;

    fn plain_store() -> (SubStore, InMem) {
        let storage = InMem::new();
        let store = SubStore::with_backends(
            "root",
            BackendUrl::parse("plain-noop-inmem+file:///").unwrap(),
            Box::new(Plain::new()),
            Box::new(storage.clone()),
            Box::new(Noop::new()),
        );
        store.init(&Context::new(), &["0xDEADBEEF".to_string()]).unwrap();
        (store, storage)
    }

    #[test]
    fn validate_name_rejects_bad_shapes() {
        assert!(validate_name("a/b/c").is_ok());
        assert!(validate_name("").is_err());
        assert!(validate_name("a//b").is_err());
        assert!(validate_name("/a").is_err());
        assert!(validate_name("a/").is_err());
        assert!(validate_name("a/../b").is_err());
    }

    #[test]
    fn idfile_resolution_walks_parents() {
        let (store, storage) = plain_store();
        storage.set("team/.plain-id", b"0xDEADBEEF\n").unwrap();

        assert_eq!(store.idfile_dir_for("team/deep/nested/entry"), "team");
        assert_eq!(store.idfile_dir_for("elsewhere/entry"), "");
        assert_eq!(store.idfile_dir_for("toplevel"), "");
    }

    #[test]
    fn set_refuses_directory_names() {
        let (store, _) = plain_store();
        let ctx = Context::new();
        store
            .set(&ctx, "dir/entry", &Secret::new("pw", ""))
            .unwrap();

        let err = store.set(&ctx, "dir", &Secret::new("pw", "")).unwrap_err();
        assert!(matches!(err, StoreError::BadName(_)));
    }

    #[test]
    fn confirm_callback_cannot_add_recipients() {
        let (mut store, _) = plain_store();
        store.set_recipient_confirm(Box::new(|_, _| Ok(vec!["0xINTRUDER".to_string()])));

        let err = store
            .set(&Context::new(), "x", &Secret::new("pw", ""))
            .unwrap_err();
        assert!(matches!(err, StoreError::Ambiguous(_)));
    }

    #[test]
    fn confirm_callback_keeps_local_signer() {
        let (mut store, _) = plain_store();
        // The callback drops everyone; the writer's own key is restored.
        store.set_recipient_confirm(Box::new(|_, _| Ok(vec![])));

        let ctx = Context::new();
        store.set(&ctx, "x", &Secret::new("pw", "")).unwrap();
        assert_eq!(store.get(&ctx, "x").unwrap().password(), "pw");
    }

    #[test]
    fn list_strips_extension_and_sorts() {
        let (store, _) = plain_store();
        let ctx = Context::new();
        store.set(&ctx, "zzz", &Secret::new("1", "")).unwrap();
        store.set(&ctx, "aaa/bbb", &Secret::new("2", "")).unwrap();

        assert_eq!(store.list(&ctx).unwrap(), vec!["aaa/bbb", "zzz"]);
    }

    #[test]
    fn template_dirs_are_detected() {
        let (store, storage) = plain_store();
        storage.set(".pass-template", b"{}").unwrap();
        storage.set("web/.pass-template", b"{}").unwrap();

        assert_eq!(store.template_dirs().unwrap(), vec!["", "web"]);
    }
}
