//! Key parsing, protection and capability tests.
//!
//! Fixture keys are generated at test time; Curve25519 keeps that fast.

use mailkeys::{generate_key, GeneratedKeyPair, KeyAlgo, KeyCache};
use mailkeys::parse::{self, ParsedKey};
use mailkeys::{expiry, protect};

const TEST_PASSPHRASE: &str = "correct horse battery staple";

fn test_key(uid: &str) -> GeneratedKeyPair {
    generate_key(&[uid], KeyAlgo::Curve25519, TEST_PASSPHRASE, None).unwrap()
}

fn read_prv(armored: &str) -> ParsedKey {
    parse::read_uncached(armored).unwrap()
}

#[test]
fn test_generated_key_parses() {
    let pair = test_key("Alice <alice@example.com>");
    let key = read_prv(&pair.private);
    assert!(key.is_private());
    assert_eq!(key.fingerprint().len(), 40);
    assert_eq!(key.fingerprint(), pair.fingerprint);

    let public = parse::read_uncached(&pair.public).unwrap();
    assert!(!public.is_private());
    assert_eq!(public.fingerprint(), pair.fingerprint);
}

#[test]
fn test_longid_is_trailing_16_of_fingerprint() {
    let pair = test_key("Alice <alice@example.com>");
    let key = read_prv(&pair.private);
    let fingerprint = key.fingerprint();
    let longid = key.longid().unwrap();
    assert_eq!(longid, fingerprint[fingerprint.len() - 16..]);
    assert_eq!(parse::longid(&fingerprint).unwrap(), longid);
}

#[test]
fn test_read_caches_private_keys_only() {
    let pair = test_key("Alice <alice@example.com>");
    let cache = KeyCache::new();

    parse::read(&cache, &pair.private).unwrap();
    assert_eq!(cache.len(), 1);
    parse::read(&cache, &pair.private).unwrap();
    assert_eq!(cache.len(), 1);

    parse::read(&cache, &pair.public).unwrap();
    assert_eq!(cache.len(), 1);
}

#[test]
fn test_decrypt_with_correct_passphrase() {
    let pair = test_key("Alice <alice@example.com>");
    let mut key = read_prv(&pair.private);
    assert_eq!(key.is_fully_encrypted(), Some(true));

    let ok = protect::decrypt_key(&mut key, TEST_PASSPHRASE, None, false).unwrap();
    assert!(ok);
    assert_eq!(key.is_fully_decrypted(), Some(true));
}

#[test]
fn test_decrypt_with_wrong_passphrase_returns_false() {
    let pair = test_key("Alice <alice@example.com>");
    let mut key = read_prv(&pair.private);

    let ok = protect::decrypt_key(&mut key, "wrong passphrase", None, false).unwrap();
    assert!(!ok);
    // the key's encrypted state is untouched
    assert_eq!(key.is_fully_encrypted(), Some(true));
}

#[test]
fn test_encrypt_decrypt_round_trip() {
    let pair = test_key("Alice <alice@example.com>");
    let mut key = read_prv(&pair.private);

    assert!(protect::decrypt_key(&mut key, TEST_PASSPHRASE, None, false).unwrap());
    protect::encrypt_key(&mut key, TEST_PASSPHRASE).unwrap();
    assert_eq!(key.is_fully_encrypted(), Some(true));

    assert!(protect::decrypt_key(&mut key, TEST_PASSPHRASE, None, false).unwrap());
    assert_eq!(key.is_fully_decrypted(), Some(true));
}

#[test]
fn test_encrypt_requires_fully_decrypted_key() {
    let pair = test_key("Alice <alice@example.com>");
    let mut key = read_prv(&pair.private);

    let err = protect::encrypt_key(&mut key, TEST_PASSPHRASE).unwrap_err();
    assert!(matches!(err, mailkeys::Error::Structural(_)));
}

#[test]
fn test_decrypt_public_key_is_structural_error() {
    let pair = test_key("Alice <alice@example.com>");
    let mut key = parse::read_uncached(&pair.public).unwrap();

    let err = protect::decrypt_key(&mut key, TEST_PASSPHRASE, None, false).unwrap_err();
    assert!(matches!(err, mailkeys::Error::Structural(_)));
}

#[test]
fn test_decrypt_already_decrypted_without_flag_fails() {
    let pair = test_key("Alice <alice@example.com>");
    let mut key = read_prv(&pair.private);
    assert!(protect::decrypt_key(&mut key, TEST_PASSPHRASE, None, false).unwrap());

    let err = protect::decrypt_key(&mut key, TEST_PASSPHRASE, None, false).unwrap_err();
    assert!(matches!(err, mailkeys::Error::Structural(_)));

    // and succeeds when explicitly allowed
    assert!(protect::decrypt_key(&mut key, TEST_PASSPHRASE, None, true).unwrap());
}

#[test]
fn test_read_many_concatenated_blocks() {
    let alice = test_key("Alice <alice@example.com>");
    let bob = test_key("Bob <bob@example.com>");
    let combined = format!("{}\n{}", alice.public, bob.public);

    let result = parse::read_many(combined.as_bytes());
    assert_eq!(result.keys.len(), 2);
    assert!(result.errs.is_empty());
}

#[test]
fn test_read_many_with_corrupt_block() {
    let alice = test_key("Alice <alice@example.com>");
    let bob = test_key("Bob <bob@example.com>");
    let corrupted = corrupt_armor_body(&bob.public);
    let combined = format!("{}\n{}", alice.public, corrupted);

    let result = parse::read_many(combined.as_bytes());
    assert_eq!(result.keys.len(), 1);
    assert!(!result.errs.is_empty());
}

#[test]
fn test_read_many_mixed_public_and_private() {
    let alice = test_key("Alice <alice@example.com>");
    let combined = format!("{}\n{}", alice.public, alice.private);

    let result = parse::read_many(combined.as_bytes());
    assert_eq!(result.keys.len(), 2);
    assert!(result.errs.is_empty());
    assert_eq!(result.keys.iter().filter(|k| k.is_private()).count(), 1);
}

#[test]
fn test_normalize_repairs_framing() {
    let pair = test_key("Alice <alice@example.com>");
    let mangled = format!(
        "pasted from an email:\r\n{}\r\nbest regards",
        pair.public.replace('\n', "\r\n")
    );

    let normalized = parse::normalize(&mangled);
    assert_eq!(normalized.keys.len(), 1);
    assert!(!normalized.normalized.is_empty());
    assert_eq!(normalized.keys[0].fingerprint(), pair.fingerprint);

    // the normalized armor parses cleanly again
    parse::read_uncached(&normalized.normalized).unwrap();
}

#[test]
fn test_normalize_fails_soft_on_garbage() {
    let normalized = parse::normalize("clearly not a key");
    assert!(normalized.normalized.is_empty());
    assert!(normalized.keys.is_empty());
}

#[test]
fn test_details_snapshot() {
    let pair = test_key("Alice <alice@example.com>");
    let key = read_prv(&pair.private);
    let details = parse::details(&key).unwrap();

    assert!(details.private.is_some());
    assert!(details.public.contains("BEGIN PGP PUBLIC KEY BLOCK"));
    assert_eq!(details.is_fully_encrypted, Some(true));
    assert_eq!(details.is_fully_decrypted, Some(false));
    assert!(details.ids.len() >= 2); // primary + encryption subkey
    assert_eq!(details.ids[0].fingerprint, pair.fingerprint);
    assert_eq!(details.ids[0].longid.len(), 16);
    assert_eq!(details.ids[0].shortid.len(), 8);
    assert_eq!(details.users, vec!["Alice <alice@example.com>".to_string()]);
    assert!(details.created > 0);
    assert!(!details.algo.algorithm.is_empty());
}

#[test]
fn test_last_sig_is_recent() {
    let pair = test_key("Alice <alice@example.com>");
    let key = read_prv(&pair.private);
    let last_sig = parse::last_sig(&key).unwrap();
    // generated moments ago; allow a generous window
    let now_millis = chrono::Utc::now().timestamp_millis();
    assert!(last_sig > now_millis - 60_000);
    assert!(last_sig <= now_millis + 60_000);
}

#[test]
fn test_fingerprint_query_on_armor_and_hex() {
    let pair = test_key("Alice <alice@example.com>");
    assert_eq!(parse::fingerprint(&pair.public).unwrap(), pair.fingerprint);
    assert_eq!(
        parse::fingerprint(&pair.fingerprint.to_lowercase()).unwrap(),
        pair.fingerprint
    );
    assert_eq!(parse::fingerprint("garbage"), None);
}

#[test]
fn test_fresh_key_capabilities() {
    let pair = test_key("Alice <alice@example.com>");
    let key = read_prv(&pair.private);

    assert!(expiry::can_encrypt_now(&key));
    assert!(expiry::can_sign_now(&key));
    assert!(!expiry::expired(&key));
    assert!(!expiry::usable_but_expired(&key));
    assert!(expiry::usable_for_encryption(&pair.public));
}

#[test]
fn test_expiring_key_reports_expiration() {
    let pair = generate_key(
        &["Expiring <exp@example.com>"],
        KeyAlgo::Curve25519,
        TEST_PASSPHRASE,
        Some(12),
    )
    .unwrap();
    let key = parse::read_uncached(&pair.public).unwrap();

    let expiration = expiry::expiration(&key).expect("key should have an expiration");
    assert!(expiration > chrono::Utc::now());
    assert!(!expiry::expired(&key));
    assert!(expiry::can_encrypt_now(&key));
}

/// Replace a slice of the armor body with characters that are not valid
/// base64, keeping begin/end markers intact.
fn corrupt_armor_body(armored: &str) -> String {
    let lines: Vec<&str> = armored.lines().collect();
    let middle = lines.len() / 2;
    lines
        .iter()
        .enumerate()
        .map(|(i, line)| {
            if i == middle && !line.starts_with("-----") {
                "!!!!!!!!!!!!!!!!!!!!".to_string()
            } else {
                line.to_string()
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}
