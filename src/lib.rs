//! # mailkeys
//!
//! Key-management core for an end-to-end encrypted webmail client,
//! built on [rpgp](https://docs.rs/pgp).
//!
//! The crate covers the hard middle of such a client: parsing,
//! normalizing, validating, protecting and fingerprinting asymmetric key
//! material, plus the durable contact/pubkey store that indexes it for
//! compose and search flows. Rendering, dialogs and webmail plumbing are
//! the caller's problem; this crate only hands back validated keys,
//! user-facing error text, and contact records.
//!
//! ## Importing a private key
//!
//! ```no_run
//! use mailkeys::KeyImport;
//!
//! # fn show_modal(_: &str) {}
//! # let armored_input = "";
//! let validator = KeyImport::new().check_encryption();
//! match validator.check_prv(armored_input, "correct horse") {
//!     Ok(checked) => {
//!         // checked.decrypted is ready to use, checked.encrypted is
//!         // what gets stored
//!         println!("imported {}", checked.longid);
//!     }
//!     Err(e) if e.is_user_facing() => show_modal(&e.to_string()),
//!     Err(e) => panic!("bug: {}", e),
//! }
//! ```
//!
//! ## Looking up a contact while composing
//!
//! ```no_run
//! use mailkeys::contacts::ContactStore;
//! use mailkeys::types::ContactFilter;
//!
//! let store = ContactStore::open("contacts.db").unwrap();
//! let matches = store.search(&ContactFilter {
//!     substring: Some("ali".to_string()),
//!     limit: Some(10),
//!     ..Default::default()
//! }).unwrap();
//! // contacts with a key come first
//! ```

pub mod armor;
pub mod cache;
pub mod contacts;
pub mod expiry;
pub mod generate;
pub mod import;
pub mod mnemonic;
pub mod parse;
pub mod protect;
pub mod relay;
pub mod report;
pub mod types;

mod error;
mod internal;

// Re-export error types
pub use error::{Error, Result};

// Re-export the types most callers touch
pub use cache::KeyCache;
pub use contacts::ContactStore;
pub use generate::{generate_key, GeneratedKeyPair};
pub use import::{CheckedPrv, KeyImport};
pub use parse::{ParsedKey, ReadManyResult};
pub use relay::{RelayChannel, StoreAccess, StoreRequest, StoreResponse};
pub use types::{Contact, ContactFilter, ContactObj, ContactUpdate, KeyAlgo, KeyDetails};
