//! Tests of the multi-store root: mounting, routing, cross-store
//! operations, and the merged tree view.

use passtree::backend::crypto::Plain;
use passtree::backend::rcs::Noop;
use passtree::backend::storage::InMem;
use passtree::store::{RootStore, SubStore};
use passtree::{BackendUrl, Context, Crypto, Secret, Storage, StoreError};

fn store(alias: &str, path: &str, recipients: &[&str]) -> (SubStore, InMem) {
    let storage = InMem::new();
    let store = SubStore::with_backends(
        alias,
        BackendUrl::parse(&format!("plain-noop-inmem+file://{path}")).unwrap(),
        Box::new(Plain::new()),
        Box::new(storage.clone()),
        Box::new(Noop::new()),
    );
    let ids: Vec<String> = recipients.iter().map(|s| s.to_string()).collect();
    store.init(&Context::new(), &ids).unwrap();
    (store, storage)
}

fn root_with_mounts() -> (RootStore, InMem, InMem) {
    let (root_sub, root_storage) = store("", "/root", &["0xDEADBEEF"]);
    let (team_sub, team_storage) = store("team", "/team", &["0xDEADBEEF", "0xFEEDBEEF"]);

    let mut root = RootStore::from_store(root_sub);
    root.add_mount_store("team", team_sub).unwrap();
    (root, root_storage, team_storage)
}

#[test]
fn entries_route_to_the_right_store() {
    let (root, root_storage, team_storage) = root_with_mounts();
    let ctx = Context::new();

    root.set(&ctx, "personal", &Secret::new("1", "")).unwrap();
    root.set(&ctx, "team/shared", &Secret::new("2", "")).unwrap();

    assert!(root_storage.exists("personal.txt"));
    assert!(!root_storage.exists("team/shared.txt"));
    assert!(team_storage.exists("shared.txt"));

    assert_eq!(root.get(&ctx, "personal").unwrap().password(), "1");
    assert_eq!(root.get(&ctx, "team/shared").unwrap().password(), "2");
}

#[test]
fn cross_store_move_reencrypts_for_the_destination() {
    let (root, root_storage, team_storage) = root_with_mounts();
    let ctx = Context::new();

    root.set(&ctx, "alpha/s", &Secret::new("pw", "---\nk: v\n"))
        .unwrap();
    root.mv(&ctx, "alpha/s", "team/s").unwrap();

    // The source entry is gone, source-side.
    assert!(!root_storage.exists("alpha/s.txt"));
    assert!(!root.exists("alpha/s"));

    // The destination ciphertext names the destination's recipients.
    let ciphertext = team_storage.get("s.txt").unwrap();
    let crypto = Plain::new();
    let ids = crypto.recipient_ids(&ciphertext).unwrap();
    assert_eq!(ids, vec!["0xDEADBEEF", "0xFEEDBEEF"]);

    let moved = root.get(&ctx, "team/s").unwrap();
    assert_eq!(moved.password(), "pw");
    assert_eq!(moved.value("k").unwrap(), "v");
}

#[test]
fn cross_store_copy_keeps_the_source() {
    let (root, _, _) = root_with_mounts();
    let ctx = Context::new();

    root.set(&ctx, "keepme", &Secret::new("pw", "")).unwrap();
    root.copy(&ctx, "keepme", "team/copy").unwrap();

    assert!(root.exists("keepme"));
    assert_eq!(root.get(&ctx, "team/copy").unwrap().password(), "pw");
}

#[test]
fn cross_store_copy_onto_an_existing_entry_is_rejected() {
    let (root, _, _) = root_with_mounts();
    let ctx = Context::new();
    root.set(&ctx, "x", &Secret::new("source", "")).unwrap();
    root.set(&ctx, "team/x", &Secret::new("kept", "")).unwrap();

    assert!(matches!(
        root.copy(&ctx, "x", "team/x"),
        Err(StoreError::Ambiguous(_))
    ));
    assert!(matches!(
        root.mv(&ctx, "x", "team/x"),
        Err(StoreError::Ambiguous(_))
    ));

    // The refused move deleted nothing on either side.
    assert!(root.exists("x"));
    assert_eq!(root.get(&ctx, "team/x").unwrap().password(), "kept");
}

#[test]
fn merged_list_and_tree() {
    let (root, _, _) = root_with_mounts();
    let ctx = Context::new();

    root.set(&ctx, "misc/local", &Secret::new("1", "")).unwrap();
    root.set(&ctx, "team/infra/db", &Secret::new("2", "")).unwrap();

    assert_eq!(
        root.list(&ctx).unwrap(),
        vec!["misc/local", "team/infra/db"]
    );

    let tree = root.tree(&ctx).unwrap();
    assert_eq!(tree.list(None), vec!["misc/local", "team/infra/db"]);
    assert!(tree.get("team").unwrap().is_mount());

    let rendered = tree.format(None);
    assert!(rendered.contains("└── team (plain-noop-inmem+file:///team)"));
    assert!(rendered.contains("infra"));
}

#[test]
fn mount_collisions_are_rejected() {
    let (mut root, _, _) = root_with_mounts();

    let (dup_alias, _) = store("team", "/elsewhere", &["0xDEADBEEF"]);
    assert!(matches!(
        root.add_mount_store("team", dup_alias),
        Err(StoreError::AlreadyMounted(_))
    ));

    let (dup_path, _) = store("again", "/team", &["0xDEADBEEF"]);
    assert!(matches!(
        root.add_mount_store("again", dup_path),
        Err(StoreError::DuplicateMount(_))
    ));
}

#[test]
fn unmounting_restores_root_routing() {
    let (mut root, _, _) = root_with_mounts();
    let ctx = Context::new();
    root.set(&ctx, "team/x", &Secret::new("pw", "")).unwrap();

    root.remove_mount("team");

    // "team/x" now routes to the root store, which has no such entry.
    assert!(matches!(
        root.get(&ctx, "team/x"),
        Err(StoreError::NotFound(_))
    ));
    // Unmounting again stays a no-op.
    root.remove_mount("team");
}
