//! Memoization of parsed private keys.
//!
//! Parsing armored key material is expensive, and the same private key
//! armor is read over and over during a session (every compose window,
//! every passphrase prompt). The cache is an explicit object owned by the
//! hosting process/session and injected into [`crate::parse::read`]; it
//! is keyed by the exact armored text, has no eviction and no size bound.
//! Only private keys are cached, and churn is low: at most one entry per
//! key the user owns.

use std::collections::HashMap;
use std::sync::Mutex;

use crate::parse::ParsedKey;

/// Session-scoped cache of parsed private keys, keyed by armored text.
#[derive(Default)]
pub struct KeyCache {
    inner: Mutex<HashMap<String, ParsedKey>>,
}

impl KeyCache {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up a previously parsed key by its exact armored text.
    pub fn get(&self, armored: &str) -> Option<ParsedKey> {
        self.lock().get(armored).cloned()
    }

    /// Store a parsed key under its exact armored text.
    ///
    /// Callers that decrypt a cached key and want the decrypted state
    /// visible to later [`crate::parse::read`] calls re-set the entry
    /// with the mutated key.
    pub fn set(&self, armored: &str, key: ParsedKey) {
        self.lock().insert(armored.to_string(), key);
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, ParsedKey>> {
        // a poisoned lock still holds valid cache state
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Number of cached entries.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Whether the cache holds no entries.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
