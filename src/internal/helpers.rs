//! Internal helper functions.

use std::io::Cursor;

use pgp::composed::{Deserializable, SignedPublicKey, SignedSecretKey};
use pgp::types::{KeyDetails as KeyDetailsTrait, PublicKeyTrait};

use crate::error::{Error, Result};

/// Parse a secret key from bytes (armored or binary).
pub(crate) fn parse_secret_key(data: &[u8]) -> Result<SignedSecretKey> {
    let cursor = Cursor::new(data);
    match SignedSecretKey::from_armor_single(cursor) {
        Ok((key, _headers)) => Ok(key),
        Err(_) => {
            let cursor = Cursor::new(data);
            SignedSecretKey::from_bytes(cursor).map_err(|e| Error::Format(e.to_string()))
        }
    }
}

/// Parse a public key from bytes (armored or binary).
pub(crate) fn parse_public_key(data: &[u8]) -> Result<SignedPublicKey> {
    let cursor = Cursor::new(data);
    if let Ok((key, _headers)) = SignedPublicKey::from_armor_single(cursor) {
        return Ok(key);
    }
    let cursor = Cursor::new(data);
    SignedPublicKey::from_bytes(cursor).map_err(|e| Error::Format(e.to_string()))
}

/// Serialize a public key to ASCII-armored format.
pub(crate) fn public_key_to_armored(key: &SignedPublicKey) -> Result<String> {
    key.to_armored_string(None.into())
        .map_err(|e| Error::Structural(e.to_string()))
}

/// Serialize a secret key to ASCII-armored format.
pub(crate) fn secret_key_to_armored(key: &SignedSecretKey) -> Result<String> {
    key.to_armored_string(None.into())
        .map_err(|e| Error::Structural(e.to_string()))
}

/// Get the fingerprint as a hex string (uppercase, no spaces).
pub(crate) fn fingerprint_to_hex(key: &impl KeyDetailsTrait) -> String {
    hex::encode_upper(key.fingerprint().as_bytes())
}

/// Get the key id as an uppercase hex string (the longid).
pub(crate) fn keyid_to_hex(key: &impl KeyDetailsTrait) -> String {
    hex::encode_upper(key.key_id().as_ref())
}

/// Primary key creation time in unix seconds.
pub(crate) fn created_unix_secs(key: &(impl KeyDetailsTrait + PublicKeyTrait)) -> i64 {
    let st: std::time::SystemTime = (*key.created_at()).into();
    chrono::DateTime::<chrono::Utc>::from(st).timestamp()
}

/// Get a normalized algorithm name for display.
pub(crate) fn get_algorithm_name(key: &impl KeyDetailsTrait) -> String {
    use pgp::crypto::public_key::PublicKeyAlgorithm;

    match key.algorithm() {
        PublicKeyAlgorithm::RSA | PublicKeyAlgorithm::RSAEncrypt | PublicKeyAlgorithm::RSASign => {
            "RSA".to_string()
        }
        PublicKeyAlgorithm::EdDSALegacy | PublicKeyAlgorithm::Ed25519 => "EdDSA".to_string(),
        PublicKeyAlgorithm::ECDH => "ECDH".to_string(),
        PublicKeyAlgorithm::ECDSA => "ECDSA".to_string(),
        PublicKeyAlgorithm::X25519 => "X25519".to_string(),
        PublicKeyAlgorithm::X448 => "X448".to_string(),
        PublicKeyAlgorithm::Ed448 => "Ed448".to_string(),
        PublicKeyAlgorithm::DSA => "DSA".to_string(),
        PublicKeyAlgorithm::Elgamal => "Elgamal".to_string(),
        algo => format!("{:?}", algo),
    }
}

/// Approximate key size in bits based on the algorithm.
///
/// Returns None when the size cannot be determined from the algorithm
/// alone.
pub(crate) fn get_key_bits(key: &impl KeyDetailsTrait) -> Option<usize> {
    use pgp::crypto::public_key::PublicKeyAlgorithm;

    match key.algorithm() {
        PublicKeyAlgorithm::RSA | PublicKeyAlgorithm::RSAEncrypt | PublicKeyAlgorithm::RSASign => {
            Some(2048)
        }
        PublicKeyAlgorithm::EdDSALegacy
        | PublicKeyAlgorithm::Ed25519
        | PublicKeyAlgorithm::X25519
        | PublicKeyAlgorithm::ECDH
        | PublicKeyAlgorithm::ECDSA => Some(256),
        PublicKeyAlgorithm::X448 | PublicKeyAlgorithm::Ed448 => Some(448),
        PublicKeyAlgorithm::DSA | PublicKeyAlgorithm::Elgamal => Some(2048),
        _ => None,
    }
}

/// Curve name for ECC algorithms, when one applies.
pub(crate) fn get_curve_name(key: &impl KeyDetailsTrait) -> Option<String> {
    use pgp::crypto::public_key::PublicKeyAlgorithm;

    match key.algorithm() {
        PublicKeyAlgorithm::EdDSALegacy | PublicKeyAlgorithm::Ed25519 => {
            Some("ed25519".to_string())
        }
        PublicKeyAlgorithm::X25519 => Some("curve25519".to_string()),
        PublicKeyAlgorithm::ECDH | PublicKeyAlgorithm::ECDSA => Some("curve25519".to_string()),
        _ => None,
    }
}

/// Extract and normalize a bare email address.
///
/// Accepts either a bare address or the "Name <email@example.com>" user-id
/// form; trims whitespace and lowercases. Returns None when the result is
/// not a plausible address.
pub(crate) fn parse_email(input: &str) -> Option<String> {
    let raw = input.trim();
    let candidate = if let (Some(start), Some(end)) = (raw.find('<'), raw.rfind('>')) {
        if start < end {
            &raw[start + 1..end]
        } else {
            raw
        }
    } else {
        raw
    };
    let email = candidate.trim().to_lowercase();
    let at = email.find('@')?;
    let (local, domain) = email.split_at(at);
    let domain = &domain[1..];
    if local.is_empty() || domain.is_empty() || !domain.contains('.') || email.contains(' ') {
        return None;
    }
    Some(email)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_email_normalizes() {
        assert_eq!(parse_email("Foo@Bar.com "), Some("foo@bar.com".to_string()));
        assert_eq!(
            parse_email("Display Name <Person@Example.ORG>"),
            Some("person@example.org".to_string())
        );
        assert_eq!(parse_email("not an email"), None);
        assert_eq!(parse_email("missing@tld"), None);
        assert_eq!(parse_email("@example.com"), None);
    }
}
