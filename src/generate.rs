//! Key pair generation.
//!
//! Produces a passphrase-protected private key with a certifying/signing
//! primary key and one encryption subkey, armored for storage.

use pgp::composed::{KeyType, SecretKeyParamsBuilder, SubkeyParamsBuilder};
use pgp::crypto::ecc_curve::ECCCurve;
use rand::thread_rng;

use crate::error::{Error, Result};
use crate::internal::{fingerprint_to_hex, public_key_to_armored, secret_key_to_armored};
use crate::types::KeyAlgo;

/// A freshly generated key pair, armored.
#[derive(Debug)]
pub struct GeneratedKeyPair {
    /// ASCII-armored private key, secret packets encrypted with the
    /// supplied passphrase
    pub private: String,
    /// ASCII-armored public key
    pub public: String,
    /// Primary key fingerprint, 40 uppercase hex characters
    pub fingerprint: String,
}

impl KeyAlgo {
    fn primary_key_type(&self) -> KeyType {
        match self {
            KeyAlgo::Curve25519 => KeyType::Ed25519Legacy,
            KeyAlgo::Rsa2048 => KeyType::Rsa(2048),
            KeyAlgo::Rsa4096 => KeyType::Rsa(4096),
        }
    }

    fn encryption_key_type(&self) -> KeyType {
        match self {
            KeyAlgo::Curve25519 => KeyType::ECDH(ECCCurve::Curve25519),
            KeyAlgo::Rsa2048 => KeyType::Rsa(2048),
            KeyAlgo::Rsa4096 => KeyType::Rsa(4096),
        }
    }
}

/// Generate a new key pair.
///
/// # Arguments
/// * `user_ids` - User id strings (e.g., "Alice <alice@example.com>"); at
///   least one is required and the first becomes primary
/// * `algo` - Key algorithm variant
/// * `passphrase` - Protects the secret packets; must not be empty
/// * `expire_in_months` - Optional expiration, in months from now
pub fn generate_key(
    user_ids: &[&str],
    algo: KeyAlgo,
    passphrase: &str,
    expire_in_months: Option<u32>,
) -> Result<GeneratedKeyPair> {
    if user_ids.is_empty() {
        return Err(Error::InvalidInput(
            "At least one user id is required".to_string(),
        ));
    }
    if passphrase.is_empty() {
        return Err(Error::InvalidInput(
            "Generation passphrase must not be empty".to_string(),
        ));
    }

    let mut rng = thread_rng();
    let expiration = expire_in_months
        .map(|months| std::time::Duration::from_secs(60 * 60 * 24 * 30 * u64::from(months)));

    let mut enc_builder = SubkeyParamsBuilder::default();
    enc_builder
        .key_type(algo.encryption_key_type())
        .can_encrypt(true)
        .can_sign(false)
        .can_authenticate(false)
        .passphrase(Some(passphrase.to_string()));
    if let Some(exp) = expiration {
        enc_builder.expiration(Some(exp));
    }
    let enc_subkey = enc_builder
        .build()
        .map_err(|e| Error::InvalidInput(e.to_string()))?;

    let mut key_params = SecretKeyParamsBuilder::default();
    key_params
        .key_type(algo.primary_key_type())
        .can_certify(true)
        .can_sign(true)
        .can_encrypt(false)
        .primary_user_id(user_ids[0].to_string())
        .passphrase(Some(passphrase.to_string()))
        .subkeys(vec![enc_subkey]);
    if user_ids.len() > 1 {
        let additional: Vec<String> = user_ids[1..].iter().map(|s| s.to_string()).collect();
        key_params.user_ids(additional);
    }
    if let Some(exp) = expiration {
        key_params.expiration(Some(exp));
    }

    let params = key_params
        .build()
        .map_err(|e| Error::InvalidInput(e.to_string()))?;
    let secret_key = params
        .generate(&mut rng)
        .map_err(Error::OpenPgp)?
        .sign(&mut rng, &pgp::types::Password::from(passphrase))
        .map_err(Error::OpenPgp)?;
    let public_key = secret_key.signed_public_key();

    Ok(GeneratedKeyPair {
        private: secret_key_to_armored(&secret_key)?,
        public: public_key_to_armored(&public_key)?,
        fingerprint: fingerprint_to_hex(&public_key.primary_key),
    })
}
