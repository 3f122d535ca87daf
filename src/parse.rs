//! Key parsing and normalization.
//!
//! Turns armored or binary input into validated [`ParsedKey`] objects and
//! derives the identifiers everything else keys off: fingerprints,
//! longids, detail snapshots, and self-signature freshness.

use std::io::Cursor;

use pgp::composed::{Deserializable, SignedPublicKey, SignedSecretKey};
use pgp::types::KeyDetails as KeyDetailsTrait;

use crate::armor::{self, BlockType};
use crate::cache::KeyCache;
use crate::error::{Error, Result};
use crate::internal::{
    created_unix_secs, fingerprint_to_hex, get_algorithm_name, get_curve_name, get_key_bits,
    parse_public_key, parse_secret_key, public_key_to_armored, secret_key_to_armored,
};
use crate::report;
use crate::types::{KeyAlgoInfo, KeyDetails, KeyIds};

/// A parsed OpenPGP key, public or private.
#[derive(Debug, Clone)]
pub enum ParsedKey {
    Public(Box<SignedPublicKey>),
    Private(Box<SignedSecretKey>),
}

impl ParsedKey {
    /// Whether this key carries secret material.
    pub fn is_private(&self) -> bool {
        matches!(self, ParsedKey::Private(_))
    }

    /// Primary key fingerprint, 40 uppercase hex characters.
    pub fn fingerprint(&self) -> String {
        match self {
            ParsedKey::Public(k) => fingerprint_to_hex(&k.primary_key),
            ParsedKey::Private(k) => fingerprint_to_hex(&k.primary_key),
        }
    }

    /// Primary key longid: the trailing 16 hex characters of the
    /// fingerprint, never independently assigned.
    pub fn longid(&self) -> Option<String> {
        longid(&self.fingerprint())
    }

    /// Primary key creation time, unix seconds.
    pub fn created(&self) -> i64 {
        match self {
            ParsedKey::Public(k) => created_unix_secs(&k.primary_key),
            ParsedKey::Private(k) => created_unix_secs(k.primary_key.public_key()),
        }
    }

    /// User id strings (name/email claims).
    pub fn user_ids(&self) -> Vec<String> {
        self.public_image()
            .details
            .users
            .iter()
            .map(|u| String::from_utf8_lossy(u.id.id()).to_string())
            .collect()
    }

    /// The public image of this key; clones for private keys.
    pub fn public_image(&self) -> SignedPublicKey {
        match self {
            ParsedKey::Public(k) => (**k).clone(),
            ParsedKey::Private(k) => k.signed_public_key(),
        }
    }

    /// Armor this key in its own form (private keys armor as private).
    pub fn armored(&self) -> Result<String> {
        match self {
            ParsedKey::Public(k) => public_key_to_armored(k),
            ParsedKey::Private(k) => secret_key_to_armored(k),
        }
    }

    /// Armor the public image of this key.
    pub fn public_armored(&self) -> Result<String> {
        public_key_to_armored(&self.public_image())
    }

    /// Whether every secret packet is decrypted. None for public keys.
    pub fn is_fully_decrypted(&self) -> Option<bool> {
        match self {
            ParsedKey::Public(_) => None,
            ParsedKey::Private(k) => {
                let (plain, total) = crate::protect::count_plaintext_packets(k);
                Some(plain == total)
            }
        }
    }

    /// Whether every secret packet is encrypted. None for public keys.
    pub fn is_fully_encrypted(&self) -> Option<bool> {
        match self {
            ParsedKey::Public(_) => None,
            ParsedKey::Private(k) => {
                let (plain, _) = crate::protect::count_plaintext_packets(k);
                Some(plain == 0)
            }
        }
    }
}

/// Parse a single armored key, consulting the injected cache first.
///
/// On a cache miss the armor is parsed and, when the result is a private
/// key, stored under the exact input string so repeated reads of the
/// same stored armor skip the expensive parse.
pub fn read(cache: &KeyCache, armored: &str) -> Result<ParsedKey> {
    if let Some(key) = cache.get(armored) {
        return Ok(key);
    }
    let key = read_uncached(armored)?;
    if key.is_private() {
        cache.set(armored, key.clone());
    }
    Ok(key)
}

/// Parse a single armored key without touching any cache.
pub fn read_uncached(armored: &str) -> Result<ParsedKey> {
    match armor::detect_type(armored) {
        Some(BlockType::PublicKey) => {
            let (key, _headers) = SignedPublicKey::from_armor_single(Cursor::new(armored.as_bytes()))
                .map_err(|e| Error::Format(e.to_string()))?;
            Ok(ParsedKey::Public(Box::new(key)))
        }
        Some(BlockType::PrivateKey) => {
            let (key, _headers) = SignedSecretKey::from_armor_single(Cursor::new(armored.as_bytes()))
                .map_err(|e| Error::Format(e.to_string()))?;
            Ok(ParsedKey::Private(Box::new(key)))
        }
        Some(BlockType::Message) | None => Err(Error::Format(
            "Key armor begin marker not found".to_string(),
        )),
    }
}

/// Outcome of a multi-key read: successes and per-block failures side by
/// side.
#[derive(Debug, Default)]
pub struct ReadManyResult {
    pub keys: Vec<ParsedKey>,
    pub errs: Vec<Error>,
}

/// Read any number of keys from a buffer.
///
/// The buffer may hold concatenated armored blocks or a single binary
/// keyring. When armored key markers are present each block is parsed
/// independently and failures are collected per block; otherwise the
/// whole buffer is treated as a binary keyring. Never fails wholesale
/// while at least one block parses.
pub fn read_many(data: &[u8]) -> ReadManyResult {
    let mut result = ReadManyResult::default();
    let text = String::from_utf8_lossy(data);
    let key_blocks: Vec<_> = armor::detect_blocks(&text)
        .into_iter()
        .filter(|b| matches!(b.block_type, BlockType::PublicKey | BlockType::PrivateKey))
        .collect();
    if !key_blocks.is_empty() {
        for block in key_blocks {
            match read_uncached(&block.content) {
                Ok(key) => result.keys.push(key),
                Err(e) => result.errs.push(e),
            }
        }
        return result;
    }
    read_binary_keyring(data)
}

/// Parse a binary keyring, trying public certificates first and falling
/// back to secret ones.
fn read_binary_keyring(data: &[u8]) -> ReadManyResult {
    let public = collect_many::<SignedPublicKey>(data, |k| ParsedKey::Public(Box::new(k)));
    if !public.keys.is_empty() {
        return public;
    }
    let secret = collect_many::<SignedSecretKey>(data, |k| ParsedKey::Private(Box::new(k)));
    if !secret.keys.is_empty() {
        return secret;
    }
    public
}

fn collect_many<T: Deserializable>(data: &[u8], wrap: impl Fn(T) -> ParsedKey) -> ReadManyResult {
    let mut result = ReadManyResult::default();
    match T::from_reader_many(Cursor::new(data)) {
        Ok((iter, _headers)) => {
            for item in iter {
                match item {
                    Ok(key) => result.keys.push(wrap(key)),
                    Err(e) => result.errs.push(Error::Format(e.to_string())),
                }
            }
        }
        Err(e) => result.errs.push(Error::Format(e.to_string())),
    }
    result
}

/// Outcome of armor normalization.
#[derive(Debug, Default)]
pub struct Normalized {
    /// Re-armored canonical text, all keys joined; empty on failure
    pub normalized: String,
    pub keys: Vec<ParsedKey>,
}

/// Canonicalize armor framing and strip certification bloat.
///
/// Detects whether the input is a public key, a private key, or key
/// material wrapped in a message envelope, and parses accordingly.
/// Third-party certifications on user ids are dropped to keep stored
/// keys small. Fails soft: any parse failure is reported through the
/// observability funnel and yields an empty result instead of an error.
pub fn normalize(armored: &str) -> Normalized {
    match normalize_inner(armored) {
        Ok(n) => n,
        Err(e) => {
            report::report_err("parse::normalize", &e);
            Normalized::default()
        }
    }
}

fn normalize_inner(armored: &str) -> Result<Normalized> {
    let framed = armor::normalize(armored);
    let mut keys: Vec<ParsedKey> = Vec::new();
    match armor::detect_type(&framed) {
        Some(BlockType::PublicKey) | Some(BlockType::PrivateKey) => {
            for block in armor::detect_blocks(&framed)
                .into_iter()
                .filter(|b| matches!(b.block_type, BlockType::PublicKey | BlockType::PrivateKey))
            {
                keys.push(read_uncached(&block.content)?);
            }
        }
        Some(BlockType::Message) => {
            // key material hiding inside a message envelope
            let bytes = dearmor_message(&framed)?;
            keys.push(read_binary_key(&bytes)?);
        }
        None => {
            return Err(Error::Format(
                "Key armor begin marker not found".to_string(),
            ));
        }
    }
    for key in &mut keys {
        strip_third_party_certs(key);
    }
    let mut armors = Vec::with_capacity(keys.len());
    for key in &keys {
        armors.push(key.armored()?);
    }
    Ok(Normalized {
        normalized: armors.join("\n"),
        keys,
    })
}

fn dearmor_message(armored: &str) -> Result<Vec<u8>> {
    use std::io::Read;

    let cursor = Cursor::new(armored.as_bytes());
    let mut dearmor = pgp::armor::Dearmor::new(cursor);
    let mut bytes = Vec::new();
    dearmor
        .read_to_end(&mut bytes)
        .map_err(|e| Error::Format(e.to_string()))?;
    Ok(bytes)
}

fn read_binary_key(bytes: &[u8]) -> Result<ParsedKey> {
    if let Ok(key) = parse_secret_key(bytes) {
        return Ok(ParsedKey::Private(Box::new(key)));
    }
    parse_public_key(bytes).map(|k| ParsedKey::Public(Box::new(k)))
}

/// Drop certifications on user ids that were not issued by the key
/// owner. Self-certifications and issuer-less signatures survive.
fn strip_third_party_certs(key: &mut ParsedKey) {
    match key {
        ParsedKey::Public(k) => {
            let primary_id = k.primary_key.key_id();
            for user in &mut k.details.users {
                user.signatures.retain(|sig| {
                    let issuers = sig.issuer();
                    issuers.is_empty() || issuers.iter().any(|id| **id == primary_id)
                });
            }
        }
        ParsedKey::Private(k) => {
            let primary_id = k.primary_key.key_id();
            for user in &mut k.details.users {
                user.signatures.retain(|sig| {
                    let issuers = sig.issuer();
                    issuers.is_empty() || issuers.iter().any(|id| **id == primary_id)
                });
            }
        }
    }
}

/// Derive a fingerprint from a string input.
///
/// A 40-hex-char string is already canonical and returned uppercased;
/// anything else is parsed as armored key material. This is a query, not
/// a validator: malformed input yields None, never an error.
pub fn fingerprint(input: &str) -> Option<String> {
    let trimmed = input.trim();
    if trimmed.len() == 40 && trimmed.chars().all(|c| c.is_ascii_hexdigit()) {
        return Some(trimmed.to_uppercase());
    }
    read_uncached(trimmed).ok().map(|k| k.fingerprint())
}

/// Derive a longid from any of its known shapes.
///
/// Accepts an 8-byte raw key id, a 16-hex longid (passthrough), a 40-char
/// fingerprint (trailing 16), a 49-char spaced fingerprint display form,
/// or armored key material. Returns None on anything else.
pub fn longid(input: &str) -> Option<String> {
    if input.is_empty() {
        return None;
    }
    if input.len() == 8 && !input.chars().all(|c| c.is_ascii_hexdigit()) {
        return Some(hex::encode_upper(input.as_bytes()));
    }
    if input.len() == 16 && input.chars().all(|c| c.is_ascii_hexdigit()) {
        return Some(input.to_uppercase());
    }
    if input.len() == 40 && input.chars().all(|c| c.is_ascii_hexdigit()) {
        return Some(input[24..].to_uppercase());
    }
    if input.len() == 49 {
        let compact = input.replace(' ', "");
        if compact.len() == 40 && compact.chars().all(|c| c.is_ascii_hexdigit()) {
            return Some(compact[24..].to_uppercase());
        }
    }
    longid(&fingerprint(input)?)
}

/// Derive a longid from raw 8-byte key id material.
pub fn longid_from_bytes(bytes: &[u8]) -> Option<String> {
    if bytes.len() != 8 {
        return None;
    }
    Some(hex::encode_upper(bytes))
}

/// Produce the public snapshot of a key: armors, secret-material state,
/// per-packet ids, user ids, creation time, and algorithm descriptor.
///
/// This is the canonical record written into contact storage.
pub fn details(key: &ParsedKey) -> Result<KeyDetails> {
    let public = key.public_image();
    let mut ids = Vec::with_capacity(1 + public.public_subkeys.len());
    push_ids(&mut ids, fingerprint_to_hex(&public.primary_key));
    for subkey in &public.public_subkeys {
        push_ids(&mut ids, fingerprint_to_hex(&subkey.key));
    }
    let algo = KeyAlgoInfo {
        algorithm: get_algorithm_name(&public.primary_key),
        bits: get_key_bits(&public.primary_key),
        curve: get_curve_name(&public.primary_key),
    };
    Ok(KeyDetails {
        private: match key {
            ParsedKey::Private(_) => Some(key.armored()?),
            ParsedKey::Public(_) => None,
        },
        public: public_key_to_armored(&public)?,
        is_fully_encrypted: key.is_fully_encrypted(),
        is_fully_decrypted: key.is_fully_decrypted(),
        ids,
        users: key.user_ids(),
        created: key.created(),
        algo,
    })
}

fn push_ids(ids: &mut Vec<KeyIds>, fingerprint: String) {
    if fingerprint.len() < 16 {
        return;
    }
    let longid = fingerprint[fingerprint.len() - 16..].to_string();
    let shortid = longid[8..].to_string();
    ids.push(KeyIds {
        fingerprint,
        longid,
        shortid,
    });
}

/// Longids of all key packets, primary first.
pub fn all_longids(key: &ParsedKey) -> Result<Vec<String>> {
    Ok(details(key)?.ids.into_iter().map(|id| id.longid).collect())
}

/// Most recent verified self-signature timestamp, unix millis.
///
/// Scans user self-certifications and subkey binding signatures, keeping
/// only those that verify against the primary key. Used to decide which
/// of two copies of the same key is newer. A key with no verifiable
/// signature at all is not well formed for freshness comparison.
pub fn last_sig(key: &ParsedKey) -> Result<i64> {
    let public = key.public_image();
    let mut newest: Option<i64> = None;
    for user in &public.details.users {
        if user.verify(&public.primary_key).is_err() {
            continue;
        }
        for sig in &user.signatures {
            if let Some(created) = sig.created() {
                let millis = created.timestamp_millis();
                newest = Some(newest.map_or(millis, |n: i64| n.max(millis)));
            }
        }
    }
    for subkey in &public.public_subkeys {
        if subkey.verify(&public.primary_key).is_err() {
            continue;
        }
        for sig in &subkey.signatures {
            if let Some(created) = sig.created() {
                let millis = created.timestamp_millis();
                newest = Some(newest.map_or(millis, |n: i64| n.max(millis)));
            }
        }
    }
    newest.ok_or_else(|| Error::Structural("No valid signature found in key".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_longid_shapes() {
        let fp = "5520CACE2EB61C96EC29049466AC6C8CCA7019A2";
        assert_eq!(longid(fp).as_deref(), Some("66AC6C8CCA7019A2"));
        assert_eq!(longid("66AC6C8CCA7019A2").as_deref(), Some("66AC6C8CCA7019A2"));
        assert_eq!(longid("66ac6c8cca7019a2").as_deref(), Some("66AC6C8CCA7019A2"));
        let spaced = "5520 CACE 2EB6 1C96 EC29  0494 66AC 6C8C CA70 19A2";
        assert_eq!(spaced.len(), 49);
        assert_eq!(longid(spaced).as_deref(), Some("66AC6C8CCA7019A2"));
        assert_eq!(longid(""), None);
        // an 8-char non-hex string is treated as raw key id bytes
        assert_eq!(longid("tooshort").as_deref(), Some("746F6F73686F7274"));
    }

    #[test]
    fn test_longid_from_bytes() {
        assert_eq!(
            longid_from_bytes(&[0x66, 0xAC, 0x6C, 0x8C, 0xCA, 0x70, 0x19, 0xA2]).as_deref(),
            Some("66AC6C8CCA7019A2")
        );
        assert_eq!(longid_from_bytes(&[1, 2, 3]), None);
    }

    #[test]
    fn test_fingerprint_passthrough() {
        let fp = "5520cace2eb61c96ec29049466ac6c8cca7019a2";
        assert_eq!(
            fingerprint(fp).as_deref(),
            Some("5520CACE2EB61C96EC29049466AC6C8CCA7019A2")
        );
        assert_eq!(fingerprint("not a key"), None);
    }
}
