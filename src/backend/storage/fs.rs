//! Filesystem storage: one file per entry under a root directory.
//!
//! Files are created with mode 0600 and directories with 0700.  Writes
//! go through a temp file plus rename so readers never observe a
//! half-written entry.  Deletes prune emptied parent directories upward
//! until a non-empty directory or the store root is reached.

use std::fs;
use std::path::{Path, PathBuf};

use super::{visible, Storage};
use crate::errors::{Result, StoreError};

#[cfg(unix)]
const FILE_MODE: u32 = 0o600;
#[cfg(unix)]
const DIR_MODE: u32 = 0o700;

/// Plain-file storage rooted at a directory.
pub struct Fs {
    root: PathBuf,
}

impl Fs {
    /// Open (and create, if needed) a store rooted at `root`.
    pub fn new(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        create_dirs(&root)?;
        Ok(Self { root })
    }

    /// Resolve a relative entry name to an absolute path, refusing
    /// anything that could escape the root.
    fn abs(&self, name: &str) -> Result<PathBuf> {
        if name.starts_with('/') {
            return Err(StoreError::BadName(name.to_string()));
        }
        let mut path = self.root.clone();
        for comp in name.split('/') {
            if comp == ".." {
                return Err(StoreError::BadName(name.to_string()));
            }
            if comp.is_empty() || comp == "." {
                continue;
            }
            path.push(comp);
        }
        Ok(path)
    }

    /// Remove empty directories above `path`, stopping at the first
    /// non-empty directory or the store root.
    fn prune_empty_parents(&self, path: &Path) {
        let mut dir = path.parent();
        while let Some(d) = dir {
            if d == self.root || !d.starts_with(&self.root) {
                break;
            }
            match fs::read_dir(d) {
                Ok(mut entries) => {
                    if entries.next().is_some() {
                        break;
                    }
                }
                Err(_) => break,
            }
            if fs::remove_dir(d).is_err() {
                break;
            }
            dir = d.parent();
        }
    }

    /// Recursively collect relative entry names below `dir`.
    ///
    /// Hidden directories are descended only when `prefix` explicitly
    /// points at or into them.
    fn walk(&self, dir: &Path, rel: &str, prefix: &str, out: &mut Vec<String>) -> Result<()> {
        for entry in fs::read_dir(dir)? {
            let entry = entry?;
            let name = entry.file_name().to_string_lossy().into_owned();
            let child_rel = if rel.is_empty() {
                name.clone()
            } else {
                format!("{rel}/{name}")
            };
            let ft = entry.file_type()?;
            if ft.is_dir() {
                let explicit =
                    prefix == child_rel || prefix.starts_with(&format!("{child_rel}/"));
                if name.starts_with('.') && !explicit {
                    continue;
                }
                self.walk(&entry.path(), &child_rel, prefix, out)?;
            } else if ft.is_file() {
                out.push(child_rel);
            }
        }
        Ok(())
    }
}

impl Storage for Fs {
    fn get(&self, name: &str) -> Result<Vec<u8>> {
        let path = self.abs(name)?;
        if !path.is_file() {
            return Err(StoreError::NotFound(name.to_string()));
        }
        Ok(fs::read(path)?)
    }

    fn set(&self, name: &str, value: &[u8]) -> Result<()> {
        let path = self.abs(name)?;
        if let Some(parent) = path.parent() {
            create_dirs(parent)?;
        }

        // Atomic write: temp file in the same directory, then rename.
        let parent = path.parent().unwrap_or(&self.root);
        let tmp = parent.join(format!(
            ".{}.tmp",
            path.file_name().unwrap_or_default().to_string_lossy()
        ));
        fs::write(&tmp, value)?;
        set_file_mode(&tmp)?;
        fs::rename(&tmp, &path)?;
        Ok(())
    }

    fn delete(&self, name: &str) -> Result<()> {
        let path = self.abs(name)?;
        if !path.is_file() {
            return Err(StoreError::NotFound(name.to_string()));
        }
        fs::remove_file(&path)?;
        self.prune_empty_parents(&path);
        Ok(())
    }

    fn exists(&self, name: &str) -> bool {
        self.abs(name).map(|p| p.is_file()).unwrap_or(false)
    }

    fn is_dir(&self, name: &str) -> bool {
        self.abs(name).map(|p| p.is_dir()).unwrap_or(false)
    }

    fn list(&self, prefix: &str) -> Result<Vec<String>> {
        let mut out = Vec::new();
        self.walk(&self.root, "", prefix, &mut out)?;
        out.retain(|name| name.starts_with(prefix) && visible(name, prefix));
        out.sort();
        Ok(out)
    }

    fn prune(&self, prefix: &str) -> Result<()> {
        let path = self.abs(prefix)?;
        if path.is_dir() {
            fs::remove_dir_all(&path)?;
        } else if path.is_file() {
            fs::remove_file(&path)?;
        } else {
            return Err(StoreError::NotFound(prefix.to_string()));
        }
        self.prune_empty_parents(&path);
        Ok(())
    }

    /// Tighten over-wide POSIX permissions: files to 0600, directories
    /// to 0700.  Returns one warning per fixed path.
    fn fsck(&self) -> Result<Vec<String>> {
        let mut warnings = Vec::new();
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;

            let mut stack = vec![self.root.clone()];
            while let Some(dir) = stack.pop() {
                for entry in fs::read_dir(&dir)? {
                    let entry = entry?;
                    let path = entry.path();
                    let meta = entry.metadata()?;
                    let mode = meta.permissions().mode() & 0o777;
                    if meta.is_dir() {
                        if mode & !DIR_MODE != 0 {
                            fs::set_permissions(&path, fs::Permissions::from_mode(DIR_MODE))?;
                            warnings
                                .push(format!("fixed permissions on {} (was {mode:o})", path.display()));
                        }
                        stack.push(path);
                    } else if mode & !FILE_MODE != 0 {
                        fs::set_permissions(&path, fs::Permissions::from_mode(FILE_MODE))?;
                        warnings
                            .push(format!("fixed permissions on {} (was {mode:o})", path.display()));
                    }
                }
            }
        }
        Ok(warnings)
    }

    fn available(&self) -> Result<()> {
        let probe = self.root.join(".passtree-probe");
        fs::write(&probe, b"probe")?;
        fs::remove_file(&probe)?;
        Ok(())
    }

    fn name(&self) -> &'static str {
        "fs"
    }

    fn location(&self) -> String {
        self.root.display().to_string()
    }
}

/// Create a directory chain with mode 0700 on Unix.
fn create_dirs(path: &Path) -> Result<()> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::DirBuilderExt;
        fs::DirBuilder::new()
            .recursive(true)
            .mode(DIR_MODE)
            .create(path)?;
    }
    #[cfg(not(unix))]
    fs::create_dir_all(path)?;
    Ok(())
}

/// Restrict a file to owner read/write on Unix.
fn set_file_mode(path: &Path) -> Result<()> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(path, fs::Permissions::from_mode(FILE_MODE))?;
    }
    #[cfg(not(unix))]
    let _ = path;
    Ok(())
}
