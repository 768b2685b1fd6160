//! Integration of the sub-store engine with a real git repository.
//!
//! These tests spawn the system `git`; they bail out early when no git
//! binary is available.

use std::process::Command;

use passtree::backend::crypto::Plain;
use passtree::backend::rcs::GitCli;
use passtree::backend::storage::Fs;
use passtree::store::SubStore;
use passtree::{BackendUrl, Context, Rcs, Secret};

fn git_available() -> bool {
    Command::new("git")
        .arg("--version")
        .output()
        .map(|o| o.status.success())
        .unwrap_or(false)
}

fn git_store(root: &std::path::Path) -> SubStore {
    let path = root.to_str().unwrap();
    let git = GitCli::new(root);
    git.init("Test User", "test@example.com").unwrap();

    let store = SubStore::with_backends(
        "git",
        BackendUrl::parse(&format!("plain-gitcli-fs+file://{path}")).unwrap(),
        Box::new(Plain::new()),
        Box::new(Fs::new(root).unwrap()),
        Box::new(git),
    );
    store.init(&Context::new(), &["0xDEADBEEF".to_string()]).unwrap();
    store
}

#[test]
fn every_write_becomes_a_commit() {
    if !git_available() {
        return;
    }
    let tmp = tempfile::TempDir::new().unwrap();
    let store = git_store(tmp.path());
    let ctx = Context::new();

    store.set(&ctx, "entry", &Secret::new("first", "")).unwrap();
    store.set(&ctx, "entry", &Secret::new("second", "")).unwrap();

    let revisions = store.list_revisions(&ctx, "entry").unwrap();
    assert_eq!(revisions.len(), 2);
    // Newest first.
    assert_eq!(revisions[0].subject, "Save secret to entry");
    assert_eq!(revisions[0].author_name, "Test User");
    assert_eq!(revisions[0].author_email, "test@example.com");
}

#[test]
fn old_revisions_stay_readable() {
    if !git_available() {
        return;
    }
    let tmp = tempfile::TempDir::new().unwrap();
    let store = git_store(tmp.path());
    let ctx = Context::new();

    store.set(&ctx, "entry", &Secret::new("first", "")).unwrap();
    store.set(&ctx, "entry", &Secret::new("second", "")).unwrap();

    let revisions = store.list_revisions(&ctx, "entry").unwrap();
    let oldest = &revisions[revisions.len() - 1];

    let old = store.get_revision(&ctx, "entry", &oldest.hash).unwrap();
    assert_eq!(old.password(), "first");
    assert_eq!(store.get(&ctx, "entry").unwrap().password(), "second");
}

#[test]
fn identical_rewrite_leaves_history_untouched() {
    if !git_available() {
        return;
    }
    let tmp = tempfile::TempDir::new().unwrap();
    let store = git_store(tmp.path());
    let ctx = Context::new();
    let secret = Secret::new("pw", "---\nk: v\n");

    store.set(&ctx, "same", &secret).unwrap();
    let before = store.list_revisions(&ctx, "same").unwrap();

    // The rewrite produces a byte-identical ciphertext, so git finds a
    // clean index on commit; the write itself still succeeds.
    store.set(&ctx, "same", &secret).unwrap();

    let after = store.list_revisions(&ctx, "same").unwrap();
    assert_eq!(after.len(), before.len());
    assert_eq!(store.get(&ctx, "same").unwrap().password(), "pw");
}

#[test]
fn delete_is_committed_too() {
    if !git_available() {
        return;
    }
    let tmp = tempfile::TempDir::new().unwrap();
    let store = git_store(tmp.path());
    let ctx = Context::new();

    store.set(&ctx, "gone", &Secret::new("pw", "")).unwrap();
    store.delete(&ctx, "gone").unwrap();

    let revisions = store.list_revisions(&ctx, "gone").unwrap();
    assert_eq!(revisions.len(), 2);
    assert_eq!(revisions[0].subject, "Remove secret gone");
}

#[test]
fn no_commit_context_suppresses_the_commit() {
    if !git_available() {
        return;
    }
    let tmp = tempfile::TempDir::new().unwrap();
    let store = git_store(tmp.path());
    let ctx = Context::new();

    store.set(&ctx, "a", &Secret::new("1", "")).unwrap();
    let before = store.list_revisions(&ctx, "a").unwrap().len();

    store
        .set(&ctx.with_no_commit(), "a", &Secret::new("2", ""))
        .unwrap();
    assert_eq!(store.list_revisions(&ctx, "a").unwrap().len(), before);

    // The write itself still happened.
    assert_eq!(store.get(&ctx, "a").unwrap().password(), "2");
}
