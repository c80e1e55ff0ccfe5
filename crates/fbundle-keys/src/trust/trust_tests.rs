#![allow(non_snake_case)]

use super::*;
use crate::{KeyAlgorithm, KeyPairFiles, generate_key_pair};
use tempfile::TempDir;

fn store() -> (TempDir, TrustStore) {
    let dir = TempDir::new().unwrap();
    let store = TrustStore::new(dir.path().join("keys"));
    (dir, store)
}

fn ed25519() -> KeyPairFiles {
    generate_key_pair(KeyAlgorithm::Ed25519).unwrap()
}

fn place(store: &TrustStore, source: &str, name: &str, contents: &[u8]) -> PathBuf {
    let dir = store.source_dir(source);
    fs::create_dir_all(&dir).unwrap();
    let path = dir.join(name);
    fs::write(&path, contents).unwrap();
    path
}

// ============================================================================
// Listing
// ============================================================================

#[test]
fn TrustStore___missing_root___lists_nothing() {
    let (_dir, store) = store();

    assert!(store.list_trusted().unwrap().is_empty());
    assert!(store.sources().unwrap().is_empty());
}

#[test]
fn TrustStore___list_trusted___sorts_by_source_then_file_name() {
    let (_dir, store) = store();
    let a = ed25519();
    let b = ed25519();
    let c = ed25519();
    place(&store, "zeta", "a.pub.pem", a.public_pem.as_bytes());
    place(&store, MANUAL_SOURCE, "b.pub", b.openssh_public.as_bytes());
    place(&store, MANUAL_SOURCE, "a.pem", c.public_pem.as_bytes());

    let entries = store.list_trusted().unwrap();

    let order: Vec<(&str, &str)> = entries
        .iter()
        .map(|e| (e.source.as_str(), e.file_name()))
        .collect();
    assert_eq!(
        order,
        vec![("manual", "a.pem"), ("manual", "b.pub"), ("zeta", "a.pub.pem")]
    );
    assert_eq!(entries[0].fingerprint, c.fingerprint);
    assert_eq!(entries[1].fingerprint, b.fingerprint);
}

#[test]
fn TrustStore___list_trusted___skips_unparseable_and_foreign_files() {
    let (_dir, store) = store();
    let key = ed25519();
    place(&store, MANUAL_SOURCE, "good.pem", key.public_pem.as_bytes());
    place(&store, MANUAL_SOURCE, "broken.pem", b"-----BEGIN PUBLIC KEY-----\nnope\n");
    place(&store, MANUAL_SOURCE, "private.pem", key.private_pem.as_bytes());
    place(&store, MANUAL_SOURCE, "notes.txt", b"hello");

    let entries = store.list_trusted().unwrap();

    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].file_name(), "good.pem");
}

#[test]
fn TrustStore___find_by_fingerprint___returns_first_match() {
    let (_dir, store) = store();
    let key = ed25519();
    place(&store, "remote-b", "k.pem", key.public_pem.as_bytes());
    place(&store, "remote-a", "k.pub", key.openssh_public.as_bytes());

    let entry = store.find_by_fingerprint(&key.fingerprint).unwrap();

    assert_eq!(entry.source, "remote-a");
    let loaded = store.load_public_key(&entry).unwrap();
    assert_eq!(loaded.fingerprint().unwrap(), key.fingerprint);
}

#[test]
fn TrustStore___find_unknown_fingerprint___is_key_not_found() {
    let (_dir, store) = store();

    let result = store.find_by_fingerprint("sha256:0000");

    assert!(matches!(result, Err(KeyError::KeyNotFound(_))));
}

// ============================================================================
// Adding
// ============================================================================

#[test]
fn TrustStore___add___writes_key_into_source() {
    let (_dir, store) = store();
    let key = ed25519();

    let added = store
        .add(MANUAL_SOURCE, "release.pub.pem", key.public_pem.as_bytes())
        .unwrap();

    assert_eq!(added.outcome, AddOutcome::Added);
    assert_eq!(added.entry.fingerprint, key.fingerprint);
    assert!(store.source_dir(MANUAL_SOURCE).join("release.pub.pem").is_file());
    assert_eq!(store.list_trusted().unwrap(), vec![added.entry]);
}

#[test]
fn TrustStore___add_identical_twice___is_noop_success() {
    let (_dir, store) = store();
    let key = ed25519();
    store
        .add(MANUAL_SOURCE, "release.pem", key.public_pem.as_bytes())
        .unwrap();

    let again = store
        .add(MANUAL_SOURCE, "release.pem", key.public_pem.as_bytes())
        .unwrap();

    assert_eq!(again.outcome, AddOutcome::AlreadyPresent);
    assert_eq!(store.list_trusted().unwrap().len(), 1);
}

#[test]
fn TrustStore___add_different_key_same_name___is_conflict() {
    let (_dir, store) = store();
    store
        .add(MANUAL_SOURCE, "release.pem", ed25519().public_pem.as_bytes())
        .unwrap();

    let result = store.add(MANUAL_SOURCE, "release.pem", ed25519().public_pem.as_bytes());

    assert!(matches!(result, Err(KeyError::Conflict(_))));
}

#[test]
fn TrustStore___add_unparseable_key___writes_nothing() {
    let (_dir, store) = store();

    let result = store.add(MANUAL_SOURCE, "junk.pem", b"junk");

    assert!(result.is_err());
    assert!(!store.source_dir(MANUAL_SOURCE).join("junk.pem").exists());
}

#[test]
fn TrustStore___add_with_path_in_name___is_rejected() {
    let (_dir, store) = store();

    let result = store.add(MANUAL_SOURCE, "../escape.pem", ed25519().public_pem.as_bytes());

    assert!(matches!(result, Err(KeyError::UnsupportedKey(_))));
}

#[test]
fn TrustStore___add_file___copies_into_manual_source() {
    let (dir, store) = store();
    let key = ed25519();
    let paths = key.write(dir.path(), "colleague").unwrap();

    let added = store.add_file(&paths.openssh_public).unwrap();

    assert_eq!(added.entry.source, MANUAL_SOURCE);
    assert_eq!(added.entry.file_name(), "colleague.pub");
    assert_eq!(added.entry.fingerprint, key.fingerprint);
}

// ============================================================================
// Removing
// ============================================================================

#[test]
fn TrustStore___remove_by_fingerprint___removes_every_manual_copy() {
    let (_dir, store) = store();
    let key = ed25519();
    place(&store, MANUAL_SOURCE, "one.pem", key.public_pem.as_bytes());
    place(&store, MANUAL_SOURCE, "two.pub", key.openssh_public.as_bytes());
    place(&store, "remote", "three.pem", key.public_pem.as_bytes());

    let removed = store.remove(&key.fingerprint).unwrap();

    assert_eq!(removed.len(), 2);
    let remaining = store.list_trusted().unwrap();
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].source, "remote");
}

#[test]
fn TrustStore___remove_by_file_name_and_path___matches() {
    let (_dir, store) = store();
    let first = place(&store, MANUAL_SOURCE, "one.pem", ed25519().public_pem.as_bytes());
    place(&store, MANUAL_SOURCE, "two.pem", ed25519().public_pem.as_bytes());

    assert_eq!(store.remove("two.pem").unwrap().len(), 1);
    assert_eq!(store.remove(first.to_str().unwrap()).unwrap().len(), 1);
    assert!(store.list_trusted().unwrap().is_empty());
}

#[test]
fn TrustStore___remove_unknown___is_key_not_found() {
    let (_dir, store) = store();

    let result = store.remove("sha256:nothing");

    assert!(matches!(result, Err(KeyError::KeyNotFound(_))));
}
