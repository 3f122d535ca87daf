//! Contact store and store-access relay tests.

use mailkeys::contacts::ContactStore;
use mailkeys::relay::{serve, RelayChannel, StoreAccess, StoreError, StoreRequest, StoreResponse};
use mailkeys::types::{ContactFilter, ContactObj, ContactUpdate};
use mailkeys::{generate_key, Error, GeneratedKeyPair, KeyAlgo};
use tempfile::tempdir;

const TEST_PASSPHRASE: &str = "correct horse battery staple";

fn test_key(uid: &str) -> GeneratedKeyPair {
    generate_key(&[uid], KeyAlgo::Curve25519, TEST_PASSPHRASE, None).unwrap()
}

fn keyed_obj(email: &str, pubkey: &str) -> ContactObj {
    ContactObj {
        email: email.to_string(),
        pubkey: Some(pubkey.to_string()),
        ..Default::default()
    }
}

#[test]
fn test_store_create_on_disk() {
    let dir = tempdir().unwrap();
    let db_path = dir.path().join("contacts.db");
    let store = ContactStore::open(&db_path).unwrap();
    assert!(db_path.exists());
    assert_eq!(store.path(), Some(db_path.as_path()));
}

#[test]
fn test_obj_email_only_defaults() {
    let contact = ContactStore::obj(&ContactObj::email_only("Foo@Bar.com ")).unwrap();
    assert_eq!(contact.email, "foo@bar.com");
    assert_eq!(contact.has_pgp, 0);
    assert_eq!(contact.pubkey, None);
    assert_eq!(contact.fingerprint, None);
    assert_eq!(contact.longid, None);
    assert!(contact.longids.is_empty());
    assert!(!contact.searchable.is_empty());
    assert!(contact.searchable.iter().all(|term| term.starts_with("f:")));
}

#[test]
fn test_obj_rejects_invalid_email() {
    let err = ContactStore::obj(&ContactObj::email_only("not an address")).unwrap_err();
    assert!(matches!(err, Error::InvalidInput(_)));
}

#[test]
fn test_obj_with_pubkey_derives_key_fields() {
    let pair = test_key("Alice <alice@example.com>");
    let contact = ContactStore::obj(&keyed_obj("alice@example.com", &pair.public)).unwrap();

    assert_eq!(contact.has_pgp, 1);
    assert_eq!(contact.fingerprint.as_deref(), Some(pair.fingerprint.as_str()));
    let longid = contact.longid.clone().unwrap();
    assert_eq!(longid, pair.fingerprint[pair.fingerprint.len() - 16..]);
    assert!(contact.longids.len() >= 2); // primary + encryption subkey
    assert_eq!(contact.longids[0], longid);
    assert!(contact.pubkey.as_deref().unwrap().contains("BEGIN PGP PUBLIC KEY BLOCK"));
    assert_eq!(contact.client.as_deref(), Some("pgp"));
    assert!(contact.pubkey_last_sig.is_some());
    assert!(contact.searchable.iter().all(|term| term.starts_with("t:")));
    assert_eq!(contact.expires_on, None); // generated without expiry
}

#[test]
fn test_save_and_get_by_email() {
    let store = ContactStore::open_in_memory().unwrap();
    let pair = test_key("Alice <alice@example.com>");
    let contact = ContactStore::obj(&keyed_obj("alice@example.com", &pair.public)).unwrap();
    store.save(&contact).unwrap();

    let results = store.get(&["alice@example.com"]).unwrap();
    assert_eq!(results.len(), 1);
    let loaded = results[0].as_ref().unwrap();
    assert_eq!(loaded.email, "alice@example.com");
    assert_eq!(loaded.fingerprint, contact.fingerprint);
    assert_eq!(loaded.longids, contact.longids);
    assert_eq!(loaded.searchable, contact.searchable);
}

#[test]
fn test_get_by_primary_and_subkey_longid() {
    let store = ContactStore::open_in_memory().unwrap();
    let pair = test_key("Alice <alice@example.com>");
    let contact = ContactStore::obj(&keyed_obj("alice@example.com", &pair.public)).unwrap();
    store.save(&contact).unwrap();

    let primary = contact.longid.clone().unwrap();
    let by_primary = store.get(&[primary.as_str()]).unwrap();
    assert!(by_primary[0].is_some());

    // subkey longids resolve through the all-longids index
    let subkey = contact.longids[1].clone();
    assert_ne!(subkey, primary);
    let by_subkey = store.get(&[subkey.as_str()]).unwrap();
    assert_eq!(by_subkey[0].as_ref().unwrap().email, "alice@example.com");
}

#[test]
fn test_get_legacy_record_with_primary_longid_only() {
    let store = ContactStore::open_in_memory().unwrap();
    let pair = test_key("Alice <alice@example.com>");
    let mut contact = ContactStore::obj(&keyed_obj("alice@example.com", &pair.public)).unwrap();
    let subkey = contact.longids[1].clone();
    contact.longids = Vec::new(); // as written before the all-longids index existed

    store.save(&contact).unwrap();
    let primary = contact.longid.clone().unwrap();
    assert!(store.get(&[primary.as_str()]).unwrap()[0].is_some());
    assert!(store.get(&[subkey.as_str()]).unwrap()[0].is_none());
}

#[test]
fn test_get_preserves_input_order_and_length() {
    let store = ContactStore::open_in_memory().unwrap();
    let contact = ContactStore::obj(&ContactObj::email_only("bob@example.com")).unwrap();
    store.save(&contact).unwrap();

    let results = store
        .get(&["missing@example.com", "bob@example.com", "0123456789ABCDEF"])
        .unwrap();
    assert_eq!(results.len(), 3);
    assert!(results[0].is_none());
    assert_eq!(results[1].as_ref().unwrap().email, "bob@example.com");
    assert!(results[2].is_none());
}

#[test]
fn test_update_nonexistent_synthesizes_placeholder() {
    let store = ContactStore::open_in_memory().unwrap();
    store
        .update(
            "ghost@example.com",
            &ContactUpdate {
                name: Some(Some("Ghost".to_string())),
                ..Default::default()
            },
        )
        .unwrap();

    let results = store.get(&["ghost@example.com"]).unwrap();
    let contact = results[0].as_ref().unwrap();
    assert_eq!(contact.name.as_deref(), Some("Ghost"));
    assert_eq!(contact.has_pgp, 0);
    assert_eq!(contact.pubkey, None);
}

#[test]
fn test_update_merges_onto_existing_fields() {
    let store = ContactStore::open_in_memory().unwrap();
    let contact = ContactStore::obj(&ContactObj {
        email: "bob@example.com".to_string(),
        last_use: Some(12345),
        ..Default::default()
    })
    .unwrap();
    store.save(&contact).unwrap();

    store
        .update(
            "bob@example.com",
            &ContactUpdate {
                name: Some(Some("Bob".to_string())),
                ..Default::default()
            },
        )
        .unwrap();

    let results = store.get(&["bob@example.com"]).unwrap();
    let updated = results[0].as_ref().unwrap();
    assert_eq!(updated.name.as_deref(), Some("Bob"));
    assert_eq!(updated.last_use, Some(12345)); // unspecified fields survive
}

#[test]
fn test_update_recomputes_searchable_on_name_change() {
    let store = ContactStore::open_in_memory().unwrap();
    let contact = ContactStore::obj(&ContactObj::email_only("carol@example.com")).unwrap();
    store.save(&contact).unwrap();

    store
        .update(
            "carol@example.com",
            &ContactUpdate {
                name: Some(Some("Nickname".to_string())),
                ..Default::default()
            },
        )
        .unwrap();

    let results = store.get(&["carol@example.com"]).unwrap();
    let updated = results[0].as_ref().unwrap();
    assert!(updated.searchable.contains(&"f:nickname".to_string()));
}

#[test]
fn test_update_converts_private_key_to_public() {
    let store = ContactStore::open_in_memory().unwrap();
    let pair = test_key("Dave <dave@example.com>");
    let contact = ContactStore::obj(&ContactObj::email_only("dave@example.com")).unwrap();
    store.save(&contact).unwrap();

    store
        .update(
            "dave@example.com",
            &ContactUpdate {
                pubkey: Some(pair.private.clone()),
                has_pgp: Some(1),
                ..Default::default()
            },
        )
        .unwrap();

    let results = store.get(&["dave@example.com"]).unwrap();
    let stored = results[0].as_ref().unwrap().pubkey.as_deref().unwrap();
    assert!(stored.contains("BEGIN PGP PUBLIC KEY BLOCK"));
    assert!(!stored.contains("BEGIN PGP PRIVATE KEY BLOCK"));
}

#[test]
fn test_search_prioritizes_keyed_contacts() {
    let store = ContactStore::open_in_memory().unwrap();
    let pair = test_key("A <a@x.com>");
    store
        .save(&ContactStore::obj(&keyed_obj("a@x.com", &pair.public)).unwrap())
        .unwrap();
    store
        .save(&ContactStore::obj(&ContactObj::email_only("ab@x.com")).unwrap())
        .unwrap();

    let found = store
        .search(&ContactFilter {
            substring: Some("a".to_string()),
            ..Default::default()
        })
        .unwrap();
    assert_eq!(found.len(), 2);
    assert_eq!(found[0].email, "a@x.com");
    assert_eq!(found[0].has_pgp, 1);
    assert_eq!(found[1].email, "ab@x.com");
    assert_eq!(found[1].has_pgp, 0);
}

#[test]
fn test_search_limit_quota_spills_to_unkeyed() {
    let store = ContactStore::open_in_memory().unwrap();
    let pair = test_key("A <a@x.com>");
    store
        .save(&ContactStore::obj(&keyed_obj("a@x.com", &pair.public)).unwrap())
        .unwrap();
    store
        .save(&ContactStore::obj(&ContactObj::email_only("ab@x.com")).unwrap())
        .unwrap();
    store
        .save(&ContactStore::obj(&ContactObj::email_only("ac@x.com")).unwrap())
        .unwrap();

    let found = store
        .search(&ContactFilter {
            substring: Some("a".to_string()),
            limit: Some(2),
            ..Default::default()
        })
        .unwrap();
    assert_eq!(found.len(), 2);
    assert_eq!(found[0].has_pgp, 1);
    assert_eq!(found[1].has_pgp, 0);
}

#[test]
fn test_search_by_has_pgp_only() {
    let store = ContactStore::open_in_memory().unwrap();
    let pair = test_key("A <a@x.com>");
    store
        .save(&ContactStore::obj(&keyed_obj("a@x.com", &pair.public)).unwrap())
        .unwrap();
    store
        .save(&ContactStore::obj(&ContactObj::email_only("b@y.com")).unwrap())
        .unwrap();

    let keyed = store
        .search(&ContactFilter {
            has_pgp: Some(true),
            ..Default::default()
        })
        .unwrap();
    assert_eq!(keyed.len(), 1);
    assert_eq!(keyed[0].email, "a@x.com");

    let unkeyed = store
        .search(&ContactFilter {
            has_pgp: Some(false),
            ..Default::default()
        })
        .unwrap();
    assert_eq!(unkeyed.len(), 1);
    assert_eq!(unkeyed[0].email, "b@y.com");
}

#[test]
fn test_search_full_scan_without_filters() {
    let store = ContactStore::open_in_memory().unwrap();
    for email in ["a@x.com", "b@y.com", "c@z.com"] {
        store
            .save(&ContactStore::obj(&ContactObj::email_only(email)).unwrap())
            .unwrap();
    }
    let all = store.search(&ContactFilter::default()).unwrap();
    assert_eq!(all.len(), 3);

    let limited = store
        .search(&ContactFilter {
            limit: Some(2),
            ..Default::default()
        })
        .unwrap();
    assert_eq!(limited.len(), 2);
}

#[test]
fn test_logical_delete_by_keyless_overwrite() {
    let store = ContactStore::open_in_memory().unwrap();
    let pair = test_key("Eve <eve@example.com>");
    store
        .save(&ContactStore::obj(&keyed_obj("eve@example.com", &pair.public)).unwrap())
        .unwrap();

    // overwrite with a key-less record instead of deleting
    store
        .save(&ContactStore::obj(&ContactObj::email_only("eve@example.com")).unwrap())
        .unwrap();

    let results = store.get(&["eve@example.com"]).unwrap();
    let contact = results[0].as_ref().unwrap();
    assert_eq!(contact.has_pgp, 0);
    assert_eq!(contact.pubkey, None);
    assert_eq!(contact.fingerprint, None);
}

/// A channel that actually serializes both directions, like a real
/// message port would.
struct InProcessChannel {
    store: ContactStore,
}

impl RelayChannel for InProcessChannel {
    fn roundtrip(&self, request: StoreRequest) -> Result<StoreResponse, StoreError> {
        let wire = serde_json::to_string(&request).expect("encode request");
        let request: StoreRequest = serde_json::from_str(&wire).expect("decode request");
        let response = serve(&self.store, request)?;
        let wire = serde_json::to_string(&response).expect("encode response");
        Ok(serde_json::from_str(&wire).expect("decode response"))
    }
}

#[test]
fn test_relay_matches_direct_access() {
    let pair = test_key("Alice <alice@example.com>");
    let channel = InProcessChannel {
        store: ContactStore::open_in_memory().unwrap(),
    };
    let access = StoreAccess::Relay(&channel);

    let contact = access.obj(&keyed_obj("alice@example.com", &pair.public)).unwrap();
    assert_eq!(contact.has_pgp, 1);
    access.save(std::slice::from_ref(&contact)).unwrap();

    let fetched = access.get(&["alice@example.com"]).unwrap();
    assert_eq!(fetched[0].as_ref().unwrap().fingerprint, contact.fingerprint);

    access
        .update(
            &["alice@example.com"],
            &ContactUpdate {
                name: Some(Some("Alice".to_string())),
                ..Default::default()
            },
        )
        .unwrap();

    let found = access
        .search(&ContactFilter {
            substring: Some("ali".to_string()),
            ..Default::default()
        })
        .unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].name.as_deref(), Some("Alice"));
}

#[test]
fn test_relay_carries_categorized_errors() {
    let channel = InProcessChannel {
        store: ContactStore::open_in_memory().unwrap(),
    };
    let access = StoreAccess::Relay(&channel);

    let err = access.obj(&ContactObj::email_only("bogus")).unwrap_err();
    assert!(matches!(err, Error::InvalidInput(_)));
}

#[test]
fn test_direct_access_capability() {
    let store = ContactStore::open_in_memory().unwrap();
    let access = StoreAccess::Direct(&store);

    let contact = access.obj(&ContactObj::email_only("direct@example.com")).unwrap();
    access.save(std::slice::from_ref(&contact)).unwrap();
    let fetched = access.get(&["direct@example.com"]).unwrap();
    assert!(fetched[0].is_some());
}
