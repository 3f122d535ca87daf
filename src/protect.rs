//! Secret-key material protection.
//!
//! Per-packet decrypt/encrypt of private keys and the derived
//! fully-encrypted / fully-decrypted state. A private key must always be
//! left uniformly encrypted or uniformly decrypted; the mixed state is
//! detected here and rejected at import.

use pgp::composed::SignedSecretKey;
use pgp::types::Password;
use rand::thread_rng;

use crate::error::{Error, Result};
use crate::internal::keyid_to_hex;
use crate::parse::ParsedKey;

/// Count (plaintext, total) secret packets of a private key.
pub(crate) fn count_plaintext_packets(key: &SignedSecretKey) -> (usize, usize) {
    let mut plain = 0;
    let mut total = 1;
    if !key.primary_key.secret_params().is_encrypted() {
        plain += 1;
    }
    for subkey in &key.secret_subkeys {
        total += 1;
        if !subkey.key.secret_params().is_encrypted() {
            plain += 1;
        }
    }
    (plain, total)
}

/// Whether an engine error means the passphrase was wrong, as opposed to
/// a corrupt packet or an unsupported scheme.
fn is_wrong_passphrase(e: &pgp::errors::Error) -> bool {
    let msg = e.to_string().to_lowercase();
    msg.contains("checksum")
        || msg.contains("passphrase")
        || msg.contains("password")
        || msg.contains("invalid mac")
        || msg.contains("hash mismatch")
}

/// Decrypt the selected secret packets of a private key in place.
///
/// Returns `Ok(false)` when the passphrase is wrong; this is a normal,
/// expected outcome. Any other engine failure is passed through
/// unchanged so callers can special-case unsupported legacy schemes.
///
/// Fails with [`Error::Structural`] when the key has no private packets,
/// the `keyid_filter` longid selects none, or a selected packet is
/// already decrypted and `allow_already_decrypted` is not set.
pub fn decrypt_key(
    key: &mut ParsedKey,
    passphrase: &str,
    keyid_filter: Option<&str>,
    allow_already_decrypted: bool,
) -> Result<bool> {
    let prv = match key {
        ParsedKey::Private(k) => k,
        ParsedKey::Public(_) => {
            return Err(Error::Structural(
                "Nothing to decrypt in a public key".to_string(),
            ));
        }
    };
    let password = Password::from(passphrase);
    let matches =
        |id: &str| keyid_filter.map_or(true, |filter| filter.eq_ignore_ascii_case(id));
    let mut selected = 0usize;

    if matches(&keyid_to_hex(&prv.primary_key)) {
        selected += 1;
        if !prv.primary_key.secret_params().is_encrypted() {
            if !allow_already_decrypted {
                return Err(Error::Structural(
                    "Decryption failed - key packet was already decrypted".to_string(),
                ));
            }
        } else {
            match prv.primary_key.remove_password(&password) {
                Ok(()) => {}
                Err(e) if is_wrong_passphrase(&e) => return Ok(false),
                Err(e) => return Err(e.into()),
            }
        }
    }
    for subkey in &mut prv.secret_subkeys {
        if !matches(&keyid_to_hex(&subkey.key)) {
            continue;
        }
        selected += 1;
        if !subkey.key.secret_params().is_encrypted() {
            if !allow_already_decrypted {
                return Err(Error::Structural(
                    "Decryption failed - key packet was already decrypted".to_string(),
                ));
            }
        } else {
            match subkey.key.remove_password(&password) {
                Ok(()) => {}
                Err(e) if is_wrong_passphrase(&e) => return Ok(false),
                Err(e) => return Err(e.into()),
            }
        }
    }
    if selected == 0 {
        let (_, total) = count_plaintext_packets(prv);
        return Err(Error::Structural(format!(
            "No private key packets selected of {} available",
            total
        )));
    }
    Ok(true)
}

/// Encrypt every secret packet of a fully-decrypted private key in place.
///
/// The passphrase must be a non-empty, non-placeholder string and every
/// packet must already be decrypted; the post-condition that the key
/// reports fully encrypted is verified rather than trusted, so an engine
/// that silently skips a packet is caught here.
pub fn encrypt_key(key: &mut ParsedKey, passphrase: &str) -> Result<()> {
    if passphrase.is_empty() || passphrase == "undefined" || passphrase == "null" {
        return Err(Error::Structural(format!(
            "Encryption passphrase should not be empty: {:?}",
            passphrase
        )));
    }
    let prv = match key {
        ParsedKey::Private(k) => k,
        ParsedKey::Public(_) => {
            return Err(Error::Structural(
                "No private key packets in key to encrypt".to_string(),
            ));
        }
    };
    let (plain, total) = count_plaintext_packets(prv);
    if plain < total {
        return Err(Error::Structural(format!(
            "Cannot encrypt a key that has {} of {} private packets still encrypted",
            total - plain,
            total
        )));
    }
    let password = Password::from(passphrase);
    let mut rng = thread_rng();
    prv.primary_key
        .set_password(&mut rng, &password)
        .map_err(Error::OpenPgp)?;
    for subkey in &mut prv.secret_subkeys {
        subkey
            .key
            .set_password(&mut rng, &password)
            .map_err(Error::OpenPgp)?;
    }
    if key.is_fully_encrypted() != Some(true) {
        return Err(Error::Structural(
            "Expected key to be fully encrypted after encrypt".to_string(),
        ));
    }
    Ok(())
}
