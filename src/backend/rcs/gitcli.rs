//! The `gitcli` RCS backend: spawns the `git` binary.
//!
//! Operates on the same worktree the filesystem storage writes to.
//! Failure modes the engine recovers from are mapped to their typed
//! errors: a missing `.git` is `RcsNotInit`, a clean index is
//! `RcsNothingToCommit`, and a missing push destination is
//! `RcsNoRemote`.

use std::path::PathBuf;
use std::process::Command;

use super::{Rcs, Revision};
use crate::errors::{Result, StoreError};

/// Field separator used in the `git log` format string.
const LOG_SEP: char = '\x1f';

/// Revision control via the system `git`.
pub struct GitCli {
    worktree: PathBuf,
}

impl GitCli {
    /// A backend operating on the given worktree.
    pub fn new(worktree: impl Into<PathBuf>) -> Self {
        Self {
            worktree: worktree.into(),
        }
    }

    fn is_initialized(&self) -> bool {
        self.worktree.join(".git").exists()
    }

    /// Run git in the worktree and return stdout, mapping failures
    /// through `classify`.
    fn run(&self, args: &[&str]) -> Result<Vec<u8>> {
        let output = Command::new("git")
            .arg("-C")
            .arg(&self.worktree)
            .args(args)
            .output()
            .map_err(|e| StoreError::Rcs(format!("spawn git: {e}")))?;

        if output.status.success() {
            return Ok(output.stdout);
        }

        let stderr = String::from_utf8_lossy(&output.stderr);
        let stdout = String::from_utf8_lossy(&output.stdout);
        Err(classify(&stdout, &stderr))
    }

    fn ensure_init(&self) -> Result<()> {
        if !self.is_initialized() {
            return Err(StoreError::RcsNotInit);
        }
        Ok(())
    }
}

/// Map git's output to a typed error.
fn classify(stdout: &str, stderr: &str) -> StoreError {
    let combined = format!("{stdout}\n{stderr}");
    if combined.contains("nothing to commit") || combined.contains("nothing added to commit") {
        return StoreError::RcsNothingToCommit;
    }
    if combined.contains("not a git repository") {
        return StoreError::RcsNotInit;
    }
    if combined.contains("No configured push destination")
        || combined.contains("does not appear to be a git repository")
        || combined.contains("No such remote")
    {
        return StoreError::RcsNoRemote;
    }
    StoreError::Rcs(combined.trim().to_string())
}

impl Rcs for GitCli {
    fn init(&self, user_name: &str, user_email: &str) -> Result<()> {
        self.run(&["init"])?;
        self.init_config(user_name, user_email)
    }

    fn init_config(&self, user_name: &str, user_email: &str) -> Result<()> {
        self.ensure_init()?;
        if !user_name.is_empty() {
            self.run(&["config", "user.name", user_name])?;
        }
        if !user_email.is_empty() {
            self.run(&["config", "user.email", user_email])?;
        }
        Ok(())
    }

    fn add(&self, paths: &[String]) -> Result<()> {
        self.ensure_init()?;
        if paths.is_empty() {
            return Ok(());
        }
        let mut args: Vec<&str> = vec!["add", "--all", "--"];
        args.extend(paths.iter().map(String::as_str));
        self.run(&args)?;
        Ok(())
    }

    fn commit(&self, message: &str) -> Result<()> {
        self.ensure_init()?;
        self.run(&["commit", "--no-verify", "-m", message])?;
        Ok(())
    }

    fn push(&self, remote: &str, branch: &str) -> Result<()> {
        self.ensure_init()?;
        let remote = if remote.is_empty() { "origin" } else { remote };

        // Probe the remote first so a missing destination is reported as
        // the typed non-fatal error rather than a push failure.
        if self.run(&["remote", "get-url", remote]).is_err() {
            return Err(StoreError::RcsNoRemote);
        }

        let mut args = vec!["push", remote];
        if !branch.is_empty() {
            args.push(branch);
        }
        self.run(&args)?;
        Ok(())
    }

    fn pull(&self, remote: &str, branch: &str) -> Result<()> {
        self.ensure_init()?;
        let remote = if remote.is_empty() { "origin" } else { remote };
        if self.run(&["remote", "get-url", remote]).is_err() {
            return Err(StoreError::RcsNoRemote);
        }

        let mut args = vec!["pull", remote];
        if !branch.is_empty() {
            args.push(branch);
        }
        self.run(&args)?;
        Ok(())
    }

    fn add_remote(&self, remote: &str, url: &str) -> Result<()> {
        self.ensure_init()?;
        self.run(&["remote", "add", remote, url])?;
        Ok(())
    }

    fn remove_remote(&self, remote: &str) -> Result<()> {
        self.ensure_init()?;
        self.run(&["remote", "remove", remote])?;
        Ok(())
    }

    fn revisions(&self, name: &str) -> Result<Vec<Revision>> {
        self.ensure_init()?;
        let format = "--format=%H\x1f%an\x1f%ae\x1f%aI\x1f%s";
        let out = self.run(&["log", format, "--", name])?;
        let text = String::from_utf8_lossy(&out);

        let revisions = text
            .lines()
            .filter_map(|line| {
                let mut fields = line.split(LOG_SEP);
                Some(Revision {
                    hash: fields.next()?.to_string(),
                    author_name: fields.next().unwrap_or_default().to_string(),
                    author_email: fields.next().unwrap_or_default().to_string(),
                    date: fields.next().unwrap_or_default().to_string(),
                    subject: fields.next().unwrap_or_default().to_string(),
                })
            })
            .collect();
        Ok(revisions)
    }

    fn get_revision(&self, name: &str, revision: &str) -> Result<Vec<u8>> {
        self.ensure_init()?;
        self.run(&["show", &format!("{revision}:{name}")])
    }

    fn name(&self) -> &'static str {
        "gitcli"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn operations_on_uninitialized_worktree_fail_with_not_init() {
        let dir = TempDir::new().unwrap();
        let git = GitCli::new(dir.path());

        assert!(matches!(
            git.add(&["x".to_string()]),
            Err(StoreError::RcsNotInit)
        ));
        assert!(matches!(git.commit("msg"), Err(StoreError::RcsNotInit)));
        assert!(matches!(git.push("", ""), Err(StoreError::RcsNotInit)));
    }

    #[test]
    fn classify_maps_git_output() {
        assert!(matches!(
            classify("nothing to commit, working tree clean", ""),
            StoreError::RcsNothingToCommit
        ));
        assert!(matches!(
            classify("", "fatal: not a git repository"),
            StoreError::RcsNotInit
        ));
        assert!(matches!(
            classify("", "fatal: No configured push destination."),
            StoreError::RcsNoRemote
        ));
        assert!(matches!(
            classify("", "fatal: something else"),
            StoreError::Rcs(_)
        ));
    }

    // The full init/add/commit/push cycle needs a system git and is
    // covered by the integration suite in tests/.
}
