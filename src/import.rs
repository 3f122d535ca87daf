//! Key import validation.
//!
//! A fixed-order, fail-fast pipeline run on user-submitted key material
//! before it is accepted: armor normalization, parse, longid derivation,
//! public/private type check, duplicate and expected-longid checks,
//! decrypt/encrypt reconciliation, and capability checks. Every failure
//! carries guidance text meant to be shown to the user as-is.

use crate::armor::BlockType;
use crate::error::{Error, Result};
use crate::expiry;
use crate::internal::has_valid_self_cert;
use crate::mnemonic::mnemonic;
use crate::parse::{self, ParsedKey};
use crate::protect;

/// Successful private-key import: the normalized armor plus both key
/// handles, one left decrypted for immediate use and one encrypted for
/// storage.
pub struct CheckedPrv {
    pub normalized: String,
    pub longid: String,
    pub fingerprint: String,
    pub passphrase: String,
    pub decrypted: ParsedKey,
    pub encrypted: ParsedKey,
}

/// Import validator for pasted or uploaded key material.
///
/// Configure once per import dialog, then run [`KeyImport::check_prv`] or
/// [`KeyImport::check_pub`] per submission.
#[derive(Default)]
pub struct KeyImport {
    expect_longid: Option<String>,
    known_longids: Vec<String>,
    reject_known: bool,
    check_encryption: bool,
    check_signing: bool,
    on_bad_passphrase: Option<Box<dyn Fn()>>,
}

impl KeyImport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Require the imported key's longid to match `longid`.
    pub fn expect_longid(mut self, longid: &str) -> Self {
        self.expect_longid = Some(longid.to_uppercase());
        self
    }

    /// Reject keys whose longid is already present in the user's key set.
    pub fn reject_known(mut self, known_longids: &[String]) -> Self {
        self.reject_known = true;
        self.known_longids = known_longids.iter().map(|l| l.to_uppercase()).collect();
        self
    }

    /// Require a valid encryption capability.
    pub fn check_encryption(mut self) -> Self {
        self.check_encryption = true;
        self
    }

    /// Require a valid signing capability.
    pub fn check_signing(mut self) -> Self {
        self.check_signing = true;
        self
    }

    /// Callback fired when the supplied passphrase does not match, before
    /// the mismatch error is returned. Used for UI feedback.
    pub fn on_bad_passphrase(mut self, f: impl Fn() + 'static) -> Self {
        self.on_bad_passphrase = Some(Box::new(f));
        self
    }

    /// Validate a private key submission.
    ///
    /// On success the decrypted handle reports fully decrypted and the
    /// encrypted handle fully encrypted, regardless of the state the key
    /// arrived in.
    pub fn check_prv(&self, armored: &str, passphrase: &str) -> Result<CheckedPrv> {
        let normalized = normalize_step(BlockType::PrivateKey, armored)?;
        let mut decrypted = read_step(BlockType::PrivateKey, &normalized)?;
        let mut encrypted = read_step(BlockType::PrivateKey, &normalized)?;
        let longid = longid_step(&decrypted)?;
        reject_if_not(BlockType::PrivateKey, &decrypted)?;
        self.reject_known_if_selected(&longid)?;
        self.reject_if_different_from_expected(&longid)?;
        self.decrypt_and_encrypt_as_needed(&mut decrypted, &mut encrypted, passphrase)?;
        self.check_encryption_prv_if_selected(&decrypted, &encrypted)?;
        self.check_signing_if_selected(&decrypted)?;
        let fingerprint = decrypted.fingerprint();
        Ok(CheckedPrv {
            normalized,
            longid,
            fingerprint,
            passphrase: passphrase.to_string(),
            decrypted,
            encrypted,
        })
    }

    /// Validate a public key submission; returns the normalized armor.
    pub fn check_pub(&self, armored: &str) -> Result<String> {
        let normalized = normalize_step(BlockType::PublicKey, armored)?;
        let parsed = read_step(BlockType::PublicKey, &normalized)?;
        longid_step(&parsed)?;
        reject_if_not(BlockType::PublicKey, &parsed)?;
        if self.check_encryption && !expiry::usable_for_encryption(&normalized) {
            return Err(Error::Unsupported(
                "This public key looks correctly formatted, but cannot be used for encryption. \
                 Please reach out to support; there may be a way to fix it."
                    .to_string(),
            ));
        }
        Ok(normalized)
    }

    fn reject_known_if_selected(&self, longid: &str) -> Result<()> {
        if self.reject_known && self.known_longids.iter().any(|l| l == longid) {
            return Err(Error::DuplicateKey(
                "This is one of your current keys, try another one.".to_string(),
            ));
        }
        Ok(())
    }

    fn reject_if_different_from_expected(&self, longid: &str) -> Result<()> {
        if let Some(expected) = &self.expect_longid {
            if longid != expected {
                let words = mnemonic(expected).unwrap_or_default();
                return Err(Error::LongidMismatch(format!(
                    "Key does not match. Looking for key with words {} ({})",
                    words, expected
                )));
            }
        }
        Ok(())
    }

    fn decrypt_and_encrypt_as_needed(
        &self,
        to_decrypt: &mut ParsedKey,
        to_encrypt: &mut ParsedKey,
        passphrase: &str,
    ) -> Result<()> {
        if passphrase.is_empty() {
            return Err(Error::PassphraseRequired(
                "Please enter a pass phrase to use with this key".to_string(),
            ));
        }
        if to_encrypt.is_fully_decrypted() == Some(true) {
            protect::encrypt_key(to_encrypt, passphrase).map_err(unsupported_scheme)?;
        }
        if to_decrypt.is_fully_decrypted() == Some(true) {
            return Ok(());
        }
        let decrypt_result = match protect::decrypt_key(to_decrypt, passphrase, None, false) {
            Ok(ok) => ok,
            Err(e) => return Err(unsupported_scheme(e)),
        };
        if !decrypt_result {
            if let Some(callback) = &self.on_bad_passphrase {
                callback();
            }
            let message = if self.expect_longid.is_some() {
                "This is the right key! However, the pass phrase does not match. Please try \
                 a different pass phrase. Your original pass phrase might have been different \
                 than what you use now."
            } else {
                "The pass phrase does not match. Please try a different pass phrase."
            };
            return Err(Error::PassphraseMismatch(message.to_string()));
        }
        Ok(())
    }

    fn check_encryption_prv_if_selected(
        &self,
        decrypted: &ParsedKey,
        encrypted: &ParsedKey,
    ) -> Result<()> {
        if !self.check_encryption || expiry::can_encrypt_now(decrypted) {
            return Ok(());
        }
        let missing_self_cert = !has_valid_self_cert(&decrypted.public_image());
        if missing_self_cert || expiry::usable_but_expired(decrypted) {
            // fixable: a repair flow can re-certify or extend this key
            return Err(Error::Recoverable {
                message: "This looks like a valid key but it cannot be used for encryption. \
                          It can likely be repaired."
                    .to_string(),
                encrypted: encrypted.armored()?,
            });
        }
        Err(Error::Unsupported(
            "This looks like a valid key but it cannot be used for encryption. Please reach \
             out to support to see why."
                .to_string(),
        ))
    }

    fn check_signing_if_selected(&self, key: &ParsedKey) -> Result<()> {
        if self.check_signing && !expiry::can_sign_now(key) {
            return Err(Error::Unsupported(
                "This looks like a valid key but it cannot be used for signing. Please reach \
                 out to support to see why."
                    .to_string(),
            ));
        }
        Ok(())
    }
}

fn normalize_step(block_type: BlockType, armored: &str) -> Result<String> {
    let normalized = parse::normalize(armored);
    if normalized.normalized.is_empty() {
        return Err(Error::Format(format!(
            "There was an error processing this key, possibly due to bad formatting.\n\
             Please insert the complete key, including \"{}\" and \"{}\"",
            block_type.begin(),
            block_type.end()
        )));
    }
    Ok(normalized.normalized)
}

fn read_step(block_type: BlockType, normalized: &str) -> Result<ParsedKey> {
    parse::read_uncached(normalized).map_err(|_| {
        let kind = match block_type {
            BlockType::PrivateKey => "Private",
            _ => "Public",
        };
        Error::Format(format!(
            "{} key is not correctly formatted. Please insert the complete key, \
             including \"{}\" and \"{}\"",
            kind,
            block_type.begin(),
            block_type.end()
        ))
    })
}

fn longid_step(key: &ParsedKey) -> Result<String> {
    key.longid().ok_or_else(|| {
        Error::Unsupported(
            "This key may not be compatible. Please share which software created it so \
             support can resolve it.\n\n(error: cannot get long id)"
                .to_string(),
        )
    })
}

fn reject_if_not(expected: BlockType, key: &ParsedKey) -> Result<()> {
    match expected {
        BlockType::PrivateKey if !key.is_private() => Err(Error::TypeMismatch(format!(
            "This was a public key. Please insert a private key instead. It's a block of \
             text starting with \"{}\"",
            BlockType::PrivateKey.begin()
        ))),
        BlockType::PublicKey if key.is_private() => Err(Error::TypeMismatch(format!(
            "This was a private key. Please insert a public key instead. It's a block of \
             text starting with \"{}\"",
            BlockType::PublicKey.begin()
        ))),
        _ => Ok(()),
    }
}

fn unsupported_scheme(e: Error) -> Error {
    Error::Unsupported(format!(
        "This key is not supported yet, possibly due to a legacy encryption scheme. \
         (decrypt error: {})",
        e
    ))
}
