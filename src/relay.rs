//! Store-access relay.
//!
//! Some execution contexts have no direct database or OpenPGP engine
//! access (e.g. a sandboxed frame). Store operations from such contexts
//! are forwarded, as typed request/response pairs, over a message
//! channel to a privileged process that owns the store. Callers hold a
//! [`StoreAccess`] capability saying which side they are on; there is no
//! runtime probing of globals and no stringly-typed dispatch.
//!
//! The relay itself has no retry and no timeout. Callers that need a
//! bounded wait implement it themselves and treat expiry as "user
//! abandoned", not as an error.

use serde::{Deserialize, Serialize};

use crate::contacts::ContactStore;
use crate::error::{Error, Result};
use crate::types::{Contact, ContactFilter, ContactObj, ContactUpdate};

/// One store operation, ready to cross a message channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum StoreRequest {
    Obj { arg: ContactObj },
    Save { contacts: Vec<Contact> },
    Update { emails: Vec<String>, update: ContactUpdate },
    Get { ids: Vec<String> },
    Search { filter: ContactFilter },
}

/// Result of a relayed store operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum StoreResponse {
    Done,
    Contact { contact: Contact },
    Contacts { contacts: Vec<Option<Contact>> },
    Found { contacts: Vec<Contact> },
}

/// Category of a failure that crossed the relay channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreErrorKind {
    ConnectionBlocked,
    BadRequest,
    Engine,
}

/// Serializable, categorized error carrier for the relay channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreError {
    pub kind: StoreErrorKind,
    pub message: String,
}

impl From<&Error> for StoreError {
    fn from(e: &Error) -> Self {
        let kind = match e {
            Error::ConnectionBlocked => StoreErrorKind::ConnectionBlocked,
            Error::InvalidInput(_) => StoreErrorKind::BadRequest,
            e if e.is_user_facing() => StoreErrorKind::BadRequest,
            _ => StoreErrorKind::Engine,
        };
        StoreError {
            kind,
            message: e.to_string(),
        }
    }
}

impl From<StoreError> for Error {
    fn from(e: StoreError) -> Self {
        match e.kind {
            StoreErrorKind::ConnectionBlocked => Error::ConnectionBlocked,
            StoreErrorKind::BadRequest => Error::InvalidInput(e.message),
            StoreErrorKind::Engine => Error::Engine(e.message),
        }
    }
}

/// A message channel to the privileged process that owns the store.
///
/// One fire-and-await round trip per operation.
pub trait RelayChannel {
    fn roundtrip(&self, request: StoreRequest) -> std::result::Result<StoreResponse, StoreError>;
}

/// Execute one relayed request against an in-process store.
///
/// This is the privileged side of the channel: deserialize the request,
/// run it, categorize any failure.
pub fn serve(
    store: &ContactStore,
    request: StoreRequest,
) -> std::result::Result<StoreResponse, StoreError> {
    let outcome: Result<StoreResponse> = match request {
        StoreRequest::Obj { arg } => {
            ContactStore::obj(&arg).map(|contact| StoreResponse::Contact { contact })
        }
        StoreRequest::Save { contacts } => {
            store.save_many(&contacts).map(|()| StoreResponse::Done)
        }
        StoreRequest::Update { emails, update } => {
            let emails: Vec<&str> = emails.iter().map(String::as_str).collect();
            store
                .update_many(&emails, &update)
                .map(|()| StoreResponse::Done)
        }
        StoreRequest::Get { ids } => {
            let ids: Vec<&str> = ids.iter().map(String::as_str).collect();
            store
                .get(&ids)
                .map(|contacts| StoreResponse::Contacts { contacts })
        }
        StoreRequest::Search { filter } => store
            .search(&filter)
            .map(|contacts| StoreResponse::Found { contacts }),
    };
    outcome.map_err(|e| StoreError::from(&e))
}

/// Capability deciding how store operations execute: against an
/// in-process store, or forwarded over a relay channel.
pub enum StoreAccess<'a> {
    Direct(&'a ContactStore),
    Relay(&'a dyn RelayChannel),
}

impl StoreAccess<'_> {
    /// Construct a contact, locally or on the privileged side.
    pub fn obj(&self, arg: &ContactObj) -> Result<Contact> {
        match self {
            StoreAccess::Direct(_) => ContactStore::obj(arg),
            StoreAccess::Relay(channel) => {
                match channel.roundtrip(StoreRequest::Obj { arg: arg.clone() })? {
                    StoreResponse::Contact { contact } => Ok(contact),
                    other => Err(unexpected_response(&other)),
                }
            }
        }
    }

    /// Upsert contacts by email.
    pub fn save(&self, contacts: &[Contact]) -> Result<()> {
        match self {
            StoreAccess::Direct(store) => store.save_many(contacts),
            StoreAccess::Relay(channel) => {
                match channel.roundtrip(StoreRequest::Save {
                    contacts: contacts.to_vec(),
                })? {
                    StoreResponse::Done => Ok(()),
                    other => Err(unexpected_response(&other)),
                }
            }
        }
    }

    /// Merge a partial update onto the stored records.
    pub fn update(&self, emails: &[&str], update: &ContactUpdate) -> Result<()> {
        match self {
            StoreAccess::Direct(store) => store.update_many(emails, update),
            StoreAccess::Relay(channel) => {
                match channel.roundtrip(StoreRequest::Update {
                    emails: emails.iter().map(|e| e.to_string()).collect(),
                    update: update.clone(),
                })? {
                    StoreResponse::Done => Ok(()),
                    other => Err(unexpected_response(&other)),
                }
            }
        }
    }

    /// Look up contacts by email or longid.
    pub fn get(&self, ids: &[&str]) -> Result<Vec<Option<Contact>>> {
        match self {
            StoreAccess::Direct(store) => store.get(ids),
            StoreAccess::Relay(channel) => {
                match channel.roundtrip(StoreRequest::Get {
                    ids: ids.iter().map(|i| i.to_string()).collect(),
                })? {
                    StoreResponse::Contacts { contacts } => Ok(contacts),
                    other => Err(unexpected_response(&other)),
                }
            }
        }
    }

    /// Search contacts.
    pub fn search(&self, filter: &ContactFilter) -> Result<Vec<Contact>> {
        match self {
            StoreAccess::Direct(store) => store.search(filter),
            StoreAccess::Relay(channel) => {
                match channel.roundtrip(StoreRequest::Search {
                    filter: filter.clone(),
                })? {
                    StoreResponse::Found { contacts } => Ok(contacts),
                    other => Err(unexpected_response(&other)),
                }
            }
        }
    }
}

fn unexpected_response(response: &StoreResponse) -> Error {
    Error::Structural(format!(
        "Relay returned a response of the wrong shape: {:?}",
        response
    ))
}
