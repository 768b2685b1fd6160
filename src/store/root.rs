//! The root store: one primary sub-store plus mounts.
//!
//! Every entry name is routed by longest matching mount alias; the
//! unmatched remainder goes to the root sub-store.  Cross-store copy
//! and move decrypt under the source store's recipients and re-encrypt
//! under the destination store's, with the destination written before
//! the source is deleted.

use std::sync::{Arc, Mutex};

use super::sub::SubStore;
use super::tree::Tree;
use crate::backend::{BackendRegistry, BackendUrl, Revision};
use crate::config::Config;
use crate::ctx::Context;
use crate::errors::{Result, StoreError};
use crate::secret::Secret;

struct Mount {
    alias: String,
    store: SubStore,
}

/// The top-level store facade.
pub struct RootStore {
    registry: BackendRegistry,
    config: Arc<Mutex<Config>>,
    store: SubStore,
    /// Sorted by alias for stable listing; routing scans for the
    /// longest match.
    mounts: Vec<Mount>,
}

impl RootStore {
    /// Open the root store at the given URL with the default registry
    /// and configuration.
    pub fn open(url: BackendUrl) -> Result<Self> {
        Self::with_config(url, Config::default())
    }

    /// Open the root store with an explicit configuration.  Mounted
    /// stores share the same configuration handle.
    pub fn with_config(url: BackendUrl, config: Config) -> Result<Self> {
        let registry = BackendRegistry::new();
        let config = Arc::new(Mutex::new(config));
        let store = SubStore::open("", url, &registry, Arc::clone(&config))?;
        Ok(Self {
            registry,
            config,
            store,
            mounts: Vec::new(),
        })
    }

    /// Build a root store around an already-constructed sub-store.
    pub fn from_store(store: SubStore) -> Self {
        Self {
            registry: BackendRegistry::new(),
            config: Arc::new(Mutex::new(Config::default())),
            store,
            mounts: Vec::new(),
        }
    }

    /// The primary (unmounted) sub-store.
    pub fn root(&self) -> &SubStore {
        &self.store
    }

    /// Shared configuration handle.
    pub fn config(&self) -> Arc<Mutex<Config>> {
        Arc::clone(&self.config)
    }

    // ------------------------------------------------------------------
    // Mounts
    // ------------------------------------------------------------------

    /// Mount the store at `url` under `alias`.
    ///
    /// Fails with `AlreadyMounted` when the alias is taken and with
    /// `DuplicateMount` when another mount already points at the same
    /// URL path.
    pub fn add_mount(&mut self, alias: &str, url: BackendUrl) -> Result<()> {
        validate_alias(alias)?;
        self.check_mountable(alias, &url)?;

        let store = SubStore::open(alias, url, &self.registry, Arc::clone(&self.config))?;
        self.insert_mount(alias, store);
        Ok(())
    }

    /// Mount an already-constructed sub-store under `alias`.
    pub fn add_mount_store(&mut self, alias: &str, store: SubStore) -> Result<()> {
        validate_alias(alias)?;
        self.check_mountable(alias, store.url())?;
        self.insert_mount(alias, store);
        Ok(())
    }

    /// Unmount `alias`.  Unmounting an alias that is not mounted is a
    /// no-op, so teardown sequences can run unconditionally.
    pub fn remove_mount(&mut self, alias: &str) {
        self.mounts.retain(|m| m.alias != alias);
    }

    /// The mounted store registered under `alias`.
    pub fn get_mount(&self, alias: &str) -> Result<&SubStore> {
        self.mounts
            .iter()
            .find(|m| m.alias == alias)
            .map(|m| &m.store)
            .ok_or_else(|| StoreError::NotMounted(alias.to_string()))
    }

    /// All mount aliases, sorted.
    pub fn mounts(&self) -> Vec<&str> {
        self.mounts.iter().map(|m| m.alias.as_str()).collect()
    }

    fn check_mountable(&self, alias: &str, url: &BackendUrl) -> Result<()> {
        if self.mounts.iter().any(|m| m.alias == alias) {
            return Err(StoreError::AlreadyMounted(alias.to_string()));
        }
        if self.store.url().path == url.path
            || self.mounts.iter().any(|m| m.store.url().path == url.path)
        {
            return Err(StoreError::DuplicateMount(url.path.clone()));
        }
        Ok(())
    }

    fn insert_mount(&mut self, alias: &str, store: SubStore) {
        self.mounts.push(Mount {
            alias: alias.to_string(),
            store,
        });
        self.mounts.sort_by(|a, b| a.alias.cmp(&b.alias));
    }

    /// Resolve a name to the store responsible for it and the
    /// store-local remainder.  The longest matching alias wins; names
    /// under no mount stay in the root store.
    pub fn route<'a>(&'a self, name: &'a str) -> (&'a SubStore, &'a str) {
        let mut best: Option<&Mount> = None;
        for m in &self.mounts {
            let matches = name == m.alias || name.starts_with(&format!("{}/", m.alias));
            if matches && best.map_or(true, |b| m.alias.len() > b.alias.len()) {
                best = Some(m);
            }
        }
        match best {
            Some(m) => {
                let local = name
                    .strip_prefix(m.alias.as_str())
                    .map(|r| r.strip_prefix('/').unwrap_or(r))
                    .unwrap_or(name);
                (&m.store, local)
            }
            None => (&self.store, name),
        }
    }

    // ------------------------------------------------------------------
    // Routed CRUD
    // ------------------------------------------------------------------

    pub fn get(&self, ctx: &Context, name: &str) -> Result<Secret> {
        let (store, local) = self.route(name);
        store.get(ctx, local)
    }

    pub fn set(&self, ctx: &Context, name: &str, secret: &Secret) -> Result<()> {
        let (store, local) = self.route(name);
        store.set(ctx, local, secret)
    }

    pub fn delete(&self, ctx: &Context, name: &str) -> Result<()> {
        let (store, local) = self.route(name);
        store.delete(ctx, local)
    }

    pub fn prune(&self, ctx: &Context, prefix: &str) -> Result<()> {
        let (store, local) = self.route(prefix);
        store.prune(ctx, local)
    }

    pub fn exists(&self, name: &str) -> bool {
        let (store, local) = self.route(name);
        store.exists(local)
    }

    pub fn list_revisions(&self, ctx: &Context, name: &str) -> Result<Vec<Revision>> {
        let (store, local) = self.route(name);
        store.list_revisions(ctx, local)
    }

    pub fn get_revision(&self, ctx: &Context, name: &str, revision: &str) -> Result<Secret> {
        let (store, local) = self.route(name);
        store.get_revision(ctx, local, revision)
    }

    /// Copy an entry, possibly across stores.  A cross-store copy
    /// decrypts under the source recipients and re-encrypts under the
    /// destination recipients.  Copying onto an existing entry fails
    /// with `Ambiguous`.
    pub fn copy(&self, ctx: &Context, from: &str, to: &str) -> Result<()> {
        let (src, src_local) = self.route(from);
        let (dst, dst_local) = self.route(to);
        if std::ptr::eq(src, dst) {
            return src.copy(ctx, src_local, dst_local);
        }
        if dst.exists(dst_local) {
            return Err(StoreError::Ambiguous(format!(
                "'{to}' already exists; delete it first or pick another name"
            )));
        }
        let secret = src.get(ctx, src_local)?;
        dst.set(ctx, dst_local, &secret)
    }

    /// Move an entry, possibly across stores.  The destination is
    /// written before the source is deleted so a failure never loses
    /// the secret.  Moving onto an existing entry fails with
    /// `Ambiguous`.
    pub fn mv(&self, ctx: &Context, from: &str, to: &str) -> Result<()> {
        let (src, src_local) = self.route(from);
        let (dst, dst_local) = self.route(to);
        if std::ptr::eq(src, dst) {
            return src.mv(ctx, src_local, dst_local);
        }
        if dst.exists(dst_local) {
            return Err(StoreError::Ambiguous(format!(
                "'{to}' already exists; delete it first or pick another name"
            )));
        }
        let secret = src.get(ctx, src_local)?;
        dst.set(ctx, dst_local, &secret)?;
        src.delete(ctx, src_local)
    }

    /// All entries across the root store and every mount, with mount
    /// entries prefixed by their alias.  Sorted.
    pub fn list(&self, ctx: &Context) -> Result<Vec<String>> {
        let mut out = self.store.list(ctx)?;
        for m in &self.mounts {
            for entry in m.store.list(ctx)? {
                out.push(format!("{}/{}", m.alias, entry));
            }
        }
        out.sort();
        Ok(out)
    }

    /// Run fsck across the root store and every mount, prefixing mount
    /// warnings with the alias.
    pub fn fsck(&self, ctx: &Context, check_decrypt: bool) -> Result<Vec<String>> {
        let mut warnings = self.store.fsck(ctx, check_decrypt)?;
        for m in &self.mounts {
            for w in m.store.fsck(ctx, check_decrypt)? {
                warnings.push(format!("{}/{}", m.alias, w));
            }
        }
        Ok(warnings)
    }

    /// Build the merged tree of all stores, annotated with mount points
    /// and template directories.
    pub fn tree(&self, ctx: &Context) -> Result<Tree> {
        let mut tree = Tree::new();
        for entry in self.store.list(ctx)? {
            tree.insert(&entry);
        }
        for dir in self.store.template_dirs()? {
            tree.mark_template(&dir);
        }
        for m in &self.mounts {
            tree.mark_mount(&m.alias, &m.store.url().to_string());
            for entry in m.store.list(ctx)? {
                tree.insert(&format!("{}/{}", m.alias, entry));
            }
            for dir in m.store.template_dirs()? {
                if dir.is_empty() {
                    tree.mark_template(&m.alias);
                } else {
                    tree.mark_template(&format!("{}/{}", m.alias, dir));
                }
            }
        }
        Ok(tree)
    }
}

/// Mount aliases follow entry-name rules: non-empty, no double or
/// edge slashes, no traversal.
fn validate_alias(alias: &str) -> Result<()> {
    if alias.is_empty()
        || alias.contains("//")
        || alias.starts_with('/')
        || alias.ends_with('/')
        || alias.split('/').any(|c| c == "." || c == "..")
    {
        return Err(StoreError::BadName(alias.to_string()));
    }
    Ok(())
}
