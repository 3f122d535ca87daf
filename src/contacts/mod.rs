//! SQLite-backed contact and public-key storage.
//!
//! Each contact is a durable record keyed by normalized email, holding
//! the contact's public key (when known) plus metadata derived from it
//! at write time: fingerprint, longids, expiration, and a precomputed
//! search-token index that makes prefix search cheap while the user is
//! typing a recipient.
//!
//! # Semantics worth knowing
//!
//! - Records are never handed out by reference: every read deserializes
//!   a fresh [`crate::types::Contact`].
//! - Updates merge field-by-field onto the stored record; unspecified
//!   fields survive. The read and write halves of an update are separate
//!   transactions, so a concurrent writer can interleave between them.
//!   This is an accepted gap, not an invariant.
//! - A contact is logically deleted by overwriting it with a key-less
//!   record for the same email, never by physical deletion.
//! - Search results with a key always precede results without one.
//!
//! # Basic usage
//!
//! ```no_run
//! use mailkeys::contacts::ContactStore;
//! use mailkeys::types::{ContactObj, ContactFilter};
//!
//! let store = ContactStore::open("contacts.db").unwrap();
//!
//! // store a contact without a key yet
//! let contact = ContactStore::obj(&ContactObj::email_only("alice@example.com")).unwrap();
//! store.save(&contact).unwrap();
//!
//! // prefix search while the user types
//! let found = store
//!     .search(&ContactFilter { substring: Some("ali".to_string()), limit: Some(10), ..Default::default() })
//!     .unwrap();
//! assert_eq!(found.len(), 1);
//! ```

mod schema;
mod store;

pub use store::ContactStore;
