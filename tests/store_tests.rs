//! End-to-end tests of the sub-store engine over the in-memory and
//! filesystem backends.

use passtree::backend::crypto::Plain;
use passtree::backend::rcs::Noop;
use passtree::backend::storage::{Fs, InMem};
use passtree::store::SubStore;
use passtree::{BackendUrl, Context, Crypto, Secret, Storage, StoreError};

fn inmem_store(recipients: &[&str]) -> (SubStore, InMem) {
    let storage = InMem::new();
    let store = SubStore::with_backends(
        "test",
        BackendUrl::parse("plain-noop-inmem+file:///").unwrap(),
        Box::new(Plain::new()),
        Box::new(storage.clone()),
        Box::new(Noop::new()),
    );
    let ids: Vec<String> = recipients.iter().map(|s| s.to_string()).collect();
    store.init(&Context::new(), &ids).unwrap();
    (store, storage)
}

#[test]
fn create_read_update_delete() {
    let (store, _) = inmem_store(&["0xDEADBEEF"]);
    let ctx = Context::new();

    let secret = Secret::new("swordfish", "---\nlogin: muh\n");
    store.set(&ctx, "web/example", &secret).unwrap();

    let loaded = store.get(&ctx, "web/example").unwrap();
    assert_eq!(loaded.password(), "swordfish");
    assert_eq!(loaded.value("login").unwrap(), "muh");

    let updated = Secret::new("hunter2", "");
    store.set(&ctx, "web/example", &updated).unwrap();
    assert_eq!(store.get(&ctx, "web/example").unwrap().password(), "hunter2");

    store.delete(&ctx, "web/example").unwrap();
    assert!(matches!(
        store.get(&ctx, "web/example"),
        Err(StoreError::NotFound(_))
    ));
}

#[test]
fn second_delete_reports_not_found() {
    let (store, _) = inmem_store(&["0xDEADBEEF"]);
    let ctx = Context::new();

    store.set(&ctx, "once", &Secret::new("pw", "")).unwrap();
    store.delete(&ctx, "once").unwrap();

    let err = store.delete(&ctx, "once").unwrap_err();
    assert!(matches!(err, StoreError::NotFound(name) if name == "once"));
}

#[test]
fn get_missing_entry_reports_not_found() {
    let (store, _) = inmem_store(&["0xDEADBEEF"]);
    let err = store.get(&Context::new(), "nope").unwrap_err();
    assert!(matches!(err, StoreError::NotFound(name) if name == "nope"));
}

#[test]
fn set_is_idempotent() {
    let (store, storage) = inmem_store(&["0xDEADBEEF"]);
    let ctx = Context::new();
    let secret = Secret::new("pw", "---\nk: v\n");

    store.set(&ctx, "twice", &secret).unwrap();
    let first = storage.get("twice.txt").unwrap();
    store.set(&ctx, "twice", &secret).unwrap();
    let second = storage.get("twice.txt").unwrap();

    // Same plaintext, same recipients: the plain backend is
    // deterministic, so the ciphertexts agree too.
    assert_eq!(first, second);
    assert_eq!(store.get(&ctx, "twice").unwrap(), secret);
}

#[test]
fn add_recipient_reencrypts_existing_entries() {
    let (store, storage) = inmem_store(&["0xDEADBEEF"]);
    let ctx = Context::new();

    store.set(&ctx, "one", &Secret::new("1", "")).unwrap();
    store.set(&ctx, "two", &Secret::new("2", "")).unwrap();

    store.add_recipient(&ctx, "0xFEEDBEEF").unwrap();

    // The token chain grew by one and still verifies.
    assert_eq!(store.token_count().unwrap(), 2);
    let recipients = store.recipients().unwrap();
    assert_eq!(recipients.as_slice(), &["0xDEADBEEF", "0xFEEDBEEF"]);

    // Both ciphertexts now name the new recipient.
    for file in ["one.txt", "two.txt"] {
        let ciphertext = storage.get(file).unwrap();
        let ids = store.crypto().recipient_ids(&ciphertext).unwrap();
        assert!(ids.contains(&"0xFEEDBEEF".to_string()), "{file}: {ids:?}");
    }

    // Content is unchanged.
    assert_eq!(store.get(&ctx, "one").unwrap().password(), "1");
    assert_eq!(store.get(&ctx, "two").unwrap().password(), "2");
}

#[test]
fn remove_recipient_shrinks_the_set() {
    let (store, storage) = inmem_store(&["0xDEADBEEF", "0xFEEDBEEF"]);
    let ctx = Context::new();
    store.set(&ctx, "entry", &Secret::new("pw", "")).unwrap();

    store.remove_recipient(&ctx, "0xFEEDBEEF").unwrap();

    let recipients = store.recipients().unwrap();
    assert_eq!(recipients.as_slice(), &["0xDEADBEEF"]);

    let ciphertext = storage.get("entry.txt").unwrap();
    let ids = store.crypto().recipient_ids(&ciphertext).unwrap();
    assert_eq!(ids, vec!["0xDEADBEEF"]);
}

#[test]
fn last_recipient_cannot_be_removed() {
    let (store, _) = inmem_store(&["0xDEADBEEF"]);
    let err = store
        .remove_recipient(&Context::new(), "0xDEADBEEF")
        .unwrap_err();
    assert!(matches!(err, StoreError::Ambiguous(_)));
}

#[test]
fn removing_a_non_member_reports_not_found() {
    let (store, _) = inmem_store(&["0xDEADBEEF"]);
    let err = store
        .remove_recipient(&Context::new(), "0xNOBODY")
        .unwrap_err();
    assert!(matches!(err, StoreError::NotFound(_)));
}

#[test]
fn adding_an_existing_recipient_fails() {
    let (store, _) = inmem_store(&["0xDEADBEEF"]);
    let err = store
        .add_recipient(&Context::new(), "0xDEADBEEF")
        .unwrap_err();
    assert!(matches!(err, StoreError::Ambiguous(_)));
}

#[test]
fn copy_and_move_within_one_store() {
    let (store, _) = inmem_store(&["0xDEADBEEF"]);
    let ctx = Context::new();
    store.set(&ctx, "src", &Secret::new("pw", "")).unwrap();

    store.copy(&ctx, "src", "dup").unwrap();
    assert!(store.exists("src"));
    assert_eq!(store.get(&ctx, "dup").unwrap().password(), "pw");

    store.mv(&ctx, "dup", "moved").unwrap();
    assert!(!store.exists("dup"));
    assert_eq!(store.get(&ctx, "moved").unwrap().password(), "pw");
}

#[test]
fn copy_onto_an_existing_entry_is_rejected() {
    let (store, _) = inmem_store(&["0xDEADBEEF"]);
    let ctx = Context::new();
    store.set(&ctx, "src", &Secret::new("new", "")).unwrap();
    store.set(&ctx, "dst", &Secret::new("old", "")).unwrap();

    assert!(matches!(
        store.copy(&ctx, "src", "dst"),
        Err(StoreError::Ambiguous(_))
    ));
    assert!(matches!(
        store.mv(&ctx, "src", "dst"),
        Err(StoreError::Ambiguous(_))
    ));

    // Both endpoints are untouched by the refused operations.
    assert_eq!(store.get(&ctx, "dst").unwrap().password(), "old");
    assert_eq!(store.get(&ctx, "src").unwrap().password(), "new");
}

#[test]
fn recursive_copy_is_rejected() {
    let (store, _) = inmem_store(&["0xDEADBEEF"]);
    let ctx = Context::new();
    store.set(&ctx, "dir/a", &Secret::new("1", "")).unwrap();
    store.set(&ctx, "dir/b", &Secret::new("2", "")).unwrap();

    assert!(matches!(
        store.copy(&ctx, "dir", "other"),
        Err(StoreError::Ambiguous(_))
    ));
    assert!(matches!(
        store.mv(&ctx, "dir", "other"),
        Err(StoreError::Ambiguous(_))
    ));
}

#[test]
fn prune_removes_a_subtree() {
    let (store, _) = inmem_store(&["0xDEADBEEF"]);
    let ctx = Context::new();
    store.set(&ctx, "old/a", &Secret::new("1", "")).unwrap();
    store.set(&ctx, "old/deep/b", &Secret::new("2", "")).unwrap();
    store.set(&ctx, "oldish", &Secret::new("3", "")).unwrap();

    store.prune(&ctx, "old").unwrap();

    assert!(!store.exists("old/a"));
    assert!(!store.exists("old/deep/b"));
    // A shared string prefix without a path boundary survives.
    assert!(store.exists("oldish"));
}

#[test]
fn cancellation_aborts_operations() {
    let (store, _) = inmem_store(&["0xDEADBEEF"]);
    let ctx = Context::new();
    store.set(&ctx, "x", &Secret::new("pw", "")).unwrap();

    ctx.cancel();
    assert!(matches!(store.get(&ctx, "x"), Err(StoreError::Cancelled)));
    assert!(matches!(
        store.set(&ctx, "y", &Secret::new("pw", "")),
        Err(StoreError::Cancelled)
    ));
}

#[test]
fn fsck_repairs_recipient_drift() {
    let (store, storage) = inmem_store(&["0xDEADBEEF", "0xFEEDBEEF"]);
    let ctx = Context::new();
    store.set(&ctx, "drifted", &Secret::new("pw", "")).unwrap();

    // Simulate an entry written before the second recipient was added.
    let stale = store
        .crypto()
        .encrypt(b"pw", &["0xDEADBEEF".to_string()])
        .unwrap();
    storage.set("drifted.txt", &stale).unwrap();

    let warnings = store.fsck(&ctx, false).unwrap();
    assert!(warnings.iter().any(|w| w.contains("drifted")));

    let ids = store
        .crypto()
        .recipient_ids(&storage.get("drifted.txt").unwrap())
        .unwrap();
    assert_eq!(ids, vec!["0xDEADBEEF", "0xFEEDBEEF"]);
}

#[test]
fn filesystem_store_end_to_end() {
    let tmp = tempfile::TempDir::new().unwrap();
    let root = tmp.path().to_str().unwrap();
    let store = SubStore::with_backends(
        "disk",
        BackendUrl::parse(&format!("plain-noop-fs+file://{root}")).unwrap(),
        Box::new(Plain::new()),
        Box::new(Fs::new(root).unwrap()),
        Box::new(Noop::new()),
    );
    let ctx = Context::new();
    store.init(&ctx, &["0xDEADBEEF".to_string()]).unwrap();

    store
        .set(&ctx, "web/example", &Secret::new("pw", "---\nk: v\n"))
        .unwrap();

    // The ciphertext landed on disk under the backend extension.
    assert!(tmp.path().join("web/example.txt").exists());

    let loaded = store.get(&ctx, "web/example").unwrap();
    assert_eq!(loaded.password(), "pw");
    assert_eq!(loaded.value("k").unwrap(), "v");

    // Deleting the entry prunes the emptied directory.
    store.delete(&ctx, "web/example").unwrap();
    assert!(!tmp.path().join("web").exists());

    assert!(store.fsck(&ctx, true).unwrap().is_empty());
}
