//! Public type definitions for the mailkeys library.
//!
//! This module contains the data structures used for key snapshots and
//! contact records. Contact types are serializable because they cross
//! the store-access relay channel unchanged.

use serde::{Deserialize, Serialize};

/// Key generation variants offered to users.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum KeyAlgo {
    /// Curve25519 (EdDSA primary, ECDH encryption subkey); fast
    #[default]
    Curve25519,
    /// RSA with 2048-bit keys
    Rsa2048,
    /// RSA with 4096-bit keys
    Rsa4096,
}

impl std::str::FromStr for KeyAlgo {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "curve25519" | "cv25519" | "ed25519" => Ok(KeyAlgo::Curve25519),
            "rsa2048" | "rsa2k" => Ok(KeyAlgo::Rsa2048),
            "rsa4096" | "rsa4k" => Ok(KeyAlgo::Rsa4096),
            _ => Err(format!("unknown key algo: {}", s)),
        }
    }
}

/// Identifiers of one key packet (primary key or subkey).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyIds {
    /// Full fingerprint, 40 uppercase hex characters
    pub fingerprint: String,
    /// Trailing 16 hex characters of the fingerprint
    pub longid: String,
    /// Trailing 8 hex characters, display-only
    pub shortid: String,
}

/// Algorithm descriptor of a primary key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyAlgoInfo {
    /// Algorithm family name (e.g., "RSA", "EdDSA", "ECDH")
    pub algorithm: String,
    /// Key size in bits, when meaningful for the algorithm
    pub bits: Option<usize>,
    /// Curve name for ECC keys
    pub curve: Option<String>,
}

/// Public snapshot of a parsed key.
///
/// This is both the display record and the canonical form written into
/// contact storage: only flat armored strings, never engine objects.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeyDetails {
    /// Private key armor; None for public-only keys
    pub private: Option<String>,
    /// Public key armor
    pub public: String,
    /// Whether every secret packet is encrypted; None for public keys
    pub is_fully_encrypted: Option<bool>,
    /// Whether every secret packet is decrypted; None for public keys
    pub is_fully_decrypted: Option<bool>,
    /// One id record per key packet, primary key first
    pub ids: Vec<KeyIds>,
    /// User id strings (name/email claims)
    pub users: Vec<String>,
    /// Primary key creation time, unix seconds
    pub created: i64,
    /// Primary key algorithm descriptor
    pub algo: KeyAlgoInfo,
}

/// A durable contact record, keyed by normalized email.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Contact {
    pub email: String,
    pub name: Option<String>,
    /// Normalized armored public key, None when no key is known yet
    pub pubkey: Option<String>,
    /// 1 iff `pubkey` is present and parseable; numeric for index sorting
    pub has_pgp: u8,
    /// Lowercase diacritic-stripped prefix tokens, each tagged `t:`/`f:`
    /// by key presence
    pub searchable: Vec<String>,
    /// Provenance tag, canonicalized to `pgp` or `cryptup`
    pub client: Option<String>,
    pub fingerprint: Option<String>,
    /// Primary key longid
    pub longid: Option<String>,
    /// Longids of all key packets, primary first
    pub longids: Vec<String>,
    /// 1 when inserted as a placeholder awaiting remote key discovery
    pub pending_lookup: u8,
    /// When this contact was last used to send mail, unix millis
    pub last_use: Option<i64>,
    /// Most recent verified self-signature on the key, unix millis
    pub pubkey_last_sig: Option<i64>,
    /// When the local key copy was last refreshed from a remote source,
    /// unix millis
    pub pubkey_last_check: Option<i64>,
    /// Encryption-capability expiration, unix seconds; None = never
    pub expires_on: Option<i64>,
}

/// Arguments for constructing a [`Contact`] via `ContactStore::obj`.
///
/// All key-derived fields are computed from `pubkey`; the caller only
/// supplies what it knows.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ContactObj {
    pub email: String,
    pub name: Option<String>,
    pub client: Option<String>,
    pub pubkey: Option<String>,
    pub pending_lookup: bool,
    pub last_use: Option<i64>,
    pub last_sig: Option<i64>,
    pub last_check: Option<i64>,
}

impl ContactObj {
    /// Shorthand for a key-less placeholder for the given address.
    pub fn email_only(email: &str) -> Self {
        ContactObj {
            email: email.to_string(),
            ..Default::default()
        }
    }
}

/// Partial update merged field-by-field onto an existing contact.
///
/// Unset fields survive from the stored record; `searchable` is
/// recomputed automatically when `name` or `has_pgp` changes and no
/// explicit override is given.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ContactUpdate {
    pub name: Option<Option<String>>,
    pub pubkey: Option<String>,
    pub has_pgp: Option<u8>,
    pub searchable: Option<Vec<String>>,
    pub client: Option<Option<String>>,
    pub fingerprint: Option<Option<String>>,
    pub longid: Option<Option<String>>,
    pub longids: Option<Vec<String>>,
    pub pending_lookup: Option<u8>,
    pub last_use: Option<Option<i64>>,
    pub pubkey_last_sig: Option<Option<i64>>,
    pub pubkey_last_check: Option<Option<i64>>,
    pub expires_on: Option<Option<i64>>,
}

/// Query filter for `ContactStore::search`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ContactFilter {
    pub has_pgp: Option<bool>,
    pub substring: Option<String>,
    pub limit: Option<usize>,
}
