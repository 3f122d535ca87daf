//! Key capability and expiration probes.
//!
//! Expiration is tracked for the encryption capability specifically; a
//! key that cannot encrypt *now* but could shortly before its computed
//! expiration instant is "usable but expired" rather than malformed.
//! Import flows give the two cases different guidance.

use chrono::{DateTime, Duration, Utc};

use crate::internal::{
    encryption_keys_at, primary_expiration, signing_keys_at, subkey_can_encrypt,
    subkey_expiration, is_subkey_revoked,
};
use crate::parse::{self, ParsedKey};

/// Expiration instant of the encryption capability. None = never expires
/// (or no encryption-capable packet to expire).
pub fn expiration(key: &ParsedKey) -> Option<DateTime<Utc>> {
    let public = key.public_image();
    let mut latest: Option<DateTime<Utc>> = None;
    let mut any_capable = false;
    for subkey in &public.public_subkeys {
        if !subkey_can_encrypt(subkey) || is_subkey_revoked(subkey) {
            continue;
        }
        any_capable = true;
        match subkey_expiration(subkey) {
            Some(exp) => latest = Some(latest.map_or(exp, |l| l.max(exp))),
            None => return None, // a never-expiring encryption subkey wins
        }
    }
    let primary_encrypt = public.details.users.iter().flat_map(|u| &u.signatures).any(|sig| {
        let flags = sig.key_flags();
        flags.encrypt_comms() || flags.encrypt_storage()
    });
    if primary_encrypt {
        any_capable = true;
        match primary_expiration(&public) {
            Some(exp) => latest = Some(latest.map_or(exp, |l| l.max(exp))),
            None => return None,
        }
    }
    if !any_capable {
        return None;
    }
    latest
}

/// Whether the encryption capability's validity window has passed.
pub fn expired(key: &ParsedKey) -> bool {
    match expiration(key) {
        Some(exp) => Utc::now() > exp,
        None => false,
    }
}

/// One second before the computed expiration instant, but only for keys
/// that have in fact expired. Used to re-query capability in the past.
pub fn date_before_expiration_if_already_expired(key: &ParsedKey) -> Option<DateTime<Utc>> {
    let exp = expiration(key)?;
    if expired(key) {
        Some(exp - Duration::seconds(1))
    } else {
        None
    }
}

/// Whether a key that cannot encrypt now was correctly formed and usable
/// just before its expiration instant.
///
/// Distinguishes "well-formed key whose validity window has passed" from
/// "malformed key"; false for keys that are currently usable.
pub fn usable_but_expired(key: &ParsedKey) -> bool {
    let public = key.public_image();
    if encryption_keys_at(&public, Utc::now()) > 0 {
        return false; // good key, cannot be expired
    }
    match date_before_expiration_if_already_expired(key) {
        Some(just_before) => encryption_keys_at(&public, just_before) > 0,
        None => false,
    }
}

/// Whether armored key material is usable for encryption, counting keys
/// whose validity window has passed but that were once valid.
pub fn usable_for_encryption(armored: &str) -> bool {
    if parse::longid(armored).is_none() {
        return false;
    }
    let Ok(key) = parse::read_uncached(armored) else {
        return false;
    };
    if encryption_keys_at(&key.public_image(), Utc::now()) > 0 {
        return true;
    }
    usable_but_expired(&key)
}

/// Whether the key has a currently valid encryption-capable packet.
pub fn can_encrypt_now(key: &ParsedKey) -> bool {
    encryption_keys_at(&key.public_image(), Utc::now()) > 0
}

/// Whether the key has a currently valid signing-capable packet.
pub fn can_sign_now(key: &ParsedKey) -> bool {
    signing_keys_at(&key.public_image(), Utc::now()) > 0
}
