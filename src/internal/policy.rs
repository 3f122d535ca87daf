//! Key validation and capability policy functions.
//!
//! rpgp has no policy system, so key properties are validated manually
//! here: revocation, expiration windows, and capability flags, each
//! evaluated as of an arbitrary reference time so callers can re-query
//! the past (needed to tell an expired-but-once-valid key from a
//! malformed one).

use chrono::{DateTime, Utc};
use pgp::composed::{SignedPublicKey, SignedPublicSubKey};
use pgp::packet::SignatureType;
use pgp::types::PublicKeyTrait;

/// Check if a subkey is revoked.
pub(crate) fn is_subkey_revoked(subkey: &SignedPublicSubKey) -> bool {
    subkey
        .signatures
        .iter()
        .any(|sig| sig.typ() == Some(SignatureType::SubkeyRevocation))
}

/// Expiration instant of a subkey from its most recent binding signature.
/// None = never expires.
pub(crate) fn subkey_expiration(subkey: &SignedPublicSubKey) -> Option<DateTime<Utc>> {
    let sig = subkey.signatures.last()?;
    let validity = sig.key_expiration_time()?;
    let created: std::time::SystemTime = (*subkey.key.created_at()).into();
    let created: DateTime<Utc> = created.into();
    Some(created + chrono::Duration::seconds(validity.num_seconds()))
}

/// Expiration instant of the primary key from user self-certifications.
/// None = never expires.
pub(crate) fn primary_expiration(key: &SignedPublicKey) -> Option<DateTime<Utc>> {
    for user in &key.details.users {
        for sig in &user.signatures {
            if let Some(validity) = sig.key_expiration_time() {
                let created: std::time::SystemTime = (*key.primary_key.created_at()).into();
                let created: DateTime<Utc> = created.into();
                return Some(created + chrono::Duration::seconds(validity.num_seconds()));
            }
        }
    }
    None
}

/// Whether a subkey's binding signatures carry the encryption flag.
pub(crate) fn subkey_can_encrypt(subkey: &SignedPublicSubKey) -> bool {
    subkey.signatures.iter().any(|sig| {
        let flags = sig.key_flags();
        flags.encrypt_comms() || flags.encrypt_storage()
    })
}

/// Whether a subkey's binding signatures carry the signing flag.
pub(crate) fn subkey_can_sign(subkey: &SignedPublicSubKey) -> bool {
    subkey.signatures.iter().any(|sig| sig.key_flags().sign())
}

/// Whether the primary key's self-certifications carry the signing flag.
pub(crate) fn primary_can_sign(key: &SignedPublicKey) -> bool {
    key.details
        .users
        .iter()
        .flat_map(|u| &u.signatures)
        .any(|sig| sig.key_flags().sign())
}

/// Whether a subkey is alive at `at`: not revoked, created by then, and
/// within its validity window.
pub(crate) fn is_subkey_valid_at(subkey: &SignedPublicSubKey, at: DateTime<Utc>) -> bool {
    if is_subkey_revoked(subkey) {
        return false;
    }
    let created: std::time::SystemTime = (*subkey.key.created_at()).into();
    let created: DateTime<Utc> = created.into();
    if created > at {
        return false;
    }
    match subkey_expiration(subkey) {
        Some(exp) => at < exp,
        None => true,
    }
}

/// Count the key packets usable for encryption at `at`.
///
/// Encryption-flagged, non-revoked subkeys within their validity window
/// count; so does an encryption-flagged primary key within the primary
/// validity window.
pub(crate) fn encryption_keys_at(key: &SignedPublicKey, at: DateTime<Utc>) -> usize {
    let mut count = key
        .public_subkeys
        .iter()
        .filter(|sk| subkey_can_encrypt(sk) && is_subkey_valid_at(sk, at))
        .count();
    let primary_encrypt = key.details.users.iter().flat_map(|u| &u.signatures).any(|sig| {
        let flags = sig.key_flags();
        flags.encrypt_comms() || flags.encrypt_storage()
    });
    if primary_encrypt {
        let alive = match primary_expiration(key) {
            Some(exp) => at < exp,
            None => true,
        };
        if alive {
            count += 1;
        }
    }
    count
}

/// Count the key packets usable for signing at `at`.
pub(crate) fn signing_keys_at(key: &SignedPublicKey, at: DateTime<Utc>) -> usize {
    let mut count = key
        .public_subkeys
        .iter()
        .filter(|sk| subkey_can_sign(sk) && is_subkey_valid_at(sk, at))
        .count();
    if primary_can_sign(key) {
        let alive = match primary_expiration(key) {
            Some(exp) => at < exp,
            None => true,
        };
        if alive {
            count += 1;
        }
    }
    count
}

/// Whether at least one user id carries a self-certification that
/// verifies against the primary key.
pub(crate) fn has_valid_self_cert(key: &SignedPublicKey) -> bool {
    key.details
        .users
        .iter()
        .any(|user| user.verify(&key.primary_key).is_ok())
}
