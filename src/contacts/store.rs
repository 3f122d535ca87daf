//! ContactStore implementation.

use std::path::{Path, PathBuf};

use rusqlite::{params, Connection};

use crate::armor::BlockType;
use crate::error::{Error, Result};
use crate::expiry;
use crate::internal::parse_email;
use crate::parse;
use crate::report;
use crate::types::{Contact, ContactFilter, ContactObj, ContactUpdate};

use super::schema::init_schema;

/// SQLite-backed contact and pubkey storage.
///
/// Contacts are keyed by normalized email and indexed by has-pgp flag,
/// primary longid, the full subkey longid set, and a multi-valued
/// search-token index. All failures are categorized before surfacing;
/// raw engine errors never reach callers.
///
/// Not `Sync` due to the underlying SQLite connection; use one store per
/// thread or external synchronization.
pub struct ContactStore {
    conn: Connection,
    path: Option<PathBuf>,
}

impl ContactStore {
    /// Open or create a contact store at the given path.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let conn = Connection::open(path)?;
        conn.execute("PRAGMA foreign_keys = ON", [])?;
        init_schema(&conn)?;
        Ok(Self {
            conn,
            path: Some(path.to_path_buf()),
        })
    }

    /// Create an in-memory contact store, for tests and ephemeral use.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute("PRAGMA foreign_keys = ON", [])?;
        init_schema(&conn)?;
        Ok(Self { conn, path: None })
    }

    /// Database path; None for in-memory stores.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Construct a contact, deriving every key-dependent field.
    ///
    /// Pure with respect to the store, but requires OpenPGP engine
    /// access; callers running in a context without it go through the
    /// store-access relay instead ([`crate::relay::StoreAccess`]).
    pub fn obj(arg: &ContactObj) -> Result<Contact> {
        let email = parse_email(&arg.email).ok_or_else(|| {
            Error::InvalidInput(format!(
                "Cannot save contact because email is not valid: {}",
                arg.email
            ))
        })?;
        let Some(pubkey_armored) = arg.pubkey.as_deref() else {
            return Ok(Contact {
                email: email.clone(),
                name: arg.name.clone(),
                pubkey: None,
                has_pgp: 0,
                searchable: create_search_index(&email, arg.name.as_deref(), false),
                client: None,
                fingerprint: None,
                longid: None,
                longids: Vec::new(),
                pending_lookup: arg.pending_lookup as u8,
                last_use: arg.last_use,
                pubkey_last_sig: None,
                pubkey_last_check: None,
                expires_on: None,
            });
        };
        let key = parse::read_uncached(pubkey_armored).map_err(|_| {
            Error::InvalidInput(format!(
                "Could not read pubkey as valid OpenPGP key for: {}",
                email
            ))
        })?;
        let details = parse::details(&key)?;
        let primary_ids = details
            .ids
            .first()
            .ok_or_else(|| Error::Structural("Parsed key has no id records".to_string()))?;
        let last_sig = match arg.last_sig {
            Some(v) => Some(v),
            None => match parse::last_sig(&key) {
                Ok(v) => Some(v),
                Err(e) => {
                    report::report_err("contacts::obj last_sig", &e);
                    None
                }
            },
        };
        Ok(Contact {
            email: email.clone(),
            name: arg.name.clone(),
            pubkey: Some(details.public.clone()),
            has_pgp: 1,
            searchable: create_search_index(&email, arg.name.as_deref(), true),
            client: Some(storable_client(arg.client.as_deref())),
            fingerprint: Some(primary_ids.fingerprint.clone()),
            longid: Some(primary_ids.longid.clone()),
            longids: details.ids.iter().map(|id| id.longid.clone()).collect(),
            pending_lookup: 0,
            last_use: arg.last_use,
            pubkey_last_sig: last_sig,
            pubkey_last_check: arg.last_check,
            expires_on: expiry::expiration(&key).map(|d| d.timestamp()),
        })
    }

    /// Upsert one contact by email: full replace of the record and its
    /// index rows, in a single transaction.
    pub fn save(&self, contact: &Contact) -> Result<()> {
        let tx = self.conn.unchecked_transaction()?;
        tx.execute(
            "INSERT OR REPLACE INTO contacts
             (email, name, pubkey, has_pgp, fingerprint, longid, client,
              pending_lookup, last_use, pubkey_last_sig, pubkey_last_check, expires_on)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
            params![
                contact.email,
                contact.name,
                contact.pubkey,
                contact.has_pgp as i64,
                contact.fingerprint,
                contact.longid,
                contact.client,
                contact.pending_lookup as i64,
                contact.last_use,
                contact.pubkey_last_sig,
                contact.pubkey_last_check,
                contact.expires_on,
            ],
        )?;
        tx.execute(
            "DELETE FROM contact_longids WHERE email = ?1",
            [&contact.email],
        )?;
        for (position, longid) in contact.longids.iter().enumerate() {
            tx.execute(
                "INSERT OR IGNORE INTO contact_longids (email, longid, position)
                 VALUES (?1, ?2, ?3)",
                params![contact.email, longid, position as i64],
            )?;
        }
        tx.execute(
            "DELETE FROM contact_search WHERE email = ?1",
            [&contact.email],
        )?;
        for term in &contact.searchable {
            tx.execute(
                "INSERT OR IGNORE INTO contact_search (email, term) VALUES (?1, ?2)",
                params![contact.email, term],
            )?;
        }
        tx.commit()?;
        Ok(())
    }

    /// Upsert several contacts, one transaction each.
    pub fn save_many(&self, contacts: &[Contact]) -> Result<()> {
        for contact in contacts {
            self.save(contact)?;
        }
        Ok(())
    }

    /// Merge a partial update onto the stored record for `email`.
    ///
    /// A missing record is first synthesized as a key-less placeholder so
    /// the update is never silently dropped. A private key supplied in
    /// the pubkey field is converted to its public counterpart before
    /// storing. `searchable` is recomputed when `name` or `has_pgp`
    /// changes without an explicit override. The read and the write are
    /// separate transactions; see the module docs.
    pub fn update(&self, email: &str, update: &ContactUpdate) -> Result<()> {
        let existing = match self.get_one(email)? {
            Some(contact) => contact,
            None => {
                self.save(&Self::obj(&ContactObj::email_only(email))?)?;
                self.get_one(email)?.ok_or_else(|| {
                    Error::Structural("contact not found right after inserting it".to_string())
                })?
            }
        };
        let mut update = update.clone();
        if let Some(pubkey) = &update.pubkey {
            if pubkey.contains(BlockType::PrivateKey.begin()) {
                report::report_err(
                    "contacts::update",
                    &"private key supplied as contact pubkey, converting to public",
                );
                let key = parse::read_uncached(pubkey)?;
                update.pubkey = Some(key.public_armored()?);
            }
        }
        self.save(&merge_contact(&existing, &update))
    }

    /// Apply the same partial update to several emails.
    pub fn update_many(&self, emails: &[&str], update: &ContactUpdate) -> Result<()> {
        for email in emails {
            self.update(email, update)?;
        }
        Ok(())
    }

    /// Look up contacts by email or longid, preserving input order.
    ///
    /// Each entry resolves independently; the output always has the same
    /// length as the input, with None for unresolved entries. A
    /// 16-hex-char input is treated as a longid: first against the
    /// primary-longid index, then against the all-subkey-longids index
    /// (records written before that index existed only carry the
    /// primary). Anything else is an email lookup.
    pub fn get(&self, ids: &[&str]) -> Result<Vec<Option<Contact>>> {
        let mut results = Vec::with_capacity(ids.len());
        for id in ids {
            results.push(self.get_one(id)?);
        }
        Ok(results)
    }

    fn get_one(&self, id: &str) -> Result<Option<Contact>> {
        if is_longid_shape(id) {
            let longid = id.to_uppercase();
            let by_primary = self.query_contacts(
                "SELECT * FROM contacts WHERE longid = ?1",
                &[&longid],
                None,
            )?;
            if let Some(contact) = by_primary.into_iter().next() {
                return Ok(Some(contact));
            }
            let by_any = self.query_contacts(
                "SELECT c.* FROM contacts c JOIN contact_longids l ON c.email = l.email
                 WHERE l.longid = ?1",
                &[&longid],
                None,
            )?;
            return Ok(by_any.into_iter().next());
        }
        let email = id.trim().to_lowercase();
        let by_email =
            self.query_contacts("SELECT * FROM contacts WHERE email = ?1", &[&email], None)?;
        Ok(by_email.into_iter().next())
    }

    /// Search contacts.
    ///
    /// Four query shapes: substring search without a has_pgp constraint
    /// runs twice with keyed contacts first, the limit quota consumed by
    /// the keyed pass before the rest; a has_pgp constraint with a
    /// substring uses the tagged search-token index; has_pgp alone uses
    /// the flag index; neither falls back to a full scan.
    pub fn search(&self, filter: &ContactFilter) -> Result<Vec<Contact>> {
        let substring = normalize_string(filter.substring.as_deref().unwrap_or(""));
        if filter.has_pgp.is_none() && !substring.is_empty() {
            let with_pgp = self.search(&ContactFilter {
                has_pgp: Some(true),
                substring: Some(substring.clone()),
                limit: filter.limit,
            })?;
            if let Some(limit) = filter.limit {
                if with_pgp.len() >= limit {
                    return Ok(with_pgp);
                }
            }
            let leftover = filter.limit.map(|limit| limit - with_pgp.len());
            let without_pgp = self.search(&ContactFilter {
                has_pgp: Some(false),
                substring: Some(substring),
                limit: leftover,
            })?;
            return Ok(with_pgp.into_iter().chain(without_pgp).collect());
        }
        match (filter.has_pgp, substring.is_empty()) {
            (None, _) => self.query_contacts(
                "SELECT * FROM contacts ORDER BY email",
                &[],
                filter.limit,
            ),
            (Some(has_pgp), false) => self.query_contacts(
                "SELECT DISTINCT c.* FROM contacts c JOIN contact_search s ON c.email = s.email
                 WHERE s.term = ?1 ORDER BY c.email",
                &[&db_index(has_pgp, &substring)],
                filter.limit,
            ),
            (Some(has_pgp), true) => self.query_contacts(
                "SELECT * FROM contacts WHERE has_pgp = ?1 ORDER BY email",
                &[&(has_pgp as i64)],
                filter.limit,
            ),
        }
    }

    fn query_contacts(
        &self,
        sql: &str,
        query_params: &[&dyn rusqlite::ToSql],
        limit: Option<usize>,
    ) -> Result<Vec<Contact>> {
        let sql = match limit {
            Some(n) => format!("{} LIMIT {}", sql, n),
            None => sql.to_string(),
        };
        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query(query_params)?;
        let mut contacts = Vec::new();
        while let Some(row) = rows.next()? {
            let mut contact = row_to_contact(row)?;
            self.load_index_lists(&mut contact)?;
            contacts.push(contact);
        }
        Ok(contacts)
    }

    fn load_index_lists(&self, contact: &mut Contact) -> Result<()> {
        let mut stmt = self
            .conn
            .prepare("SELECT longid FROM contact_longids WHERE email = ?1 ORDER BY position")?;
        contact.longids = stmt
            .query_map([&contact.email], |row| row.get(0))?
            .collect::<rusqlite::Result<Vec<String>>>()?;
        let mut stmt = self
            .conn
            .prepare("SELECT term FROM contact_search WHERE email = ?1")?;
        contact.searchable = stmt
            .query_map([&contact.email], |row| row.get(0))?
            .collect::<rusqlite::Result<Vec<String>>>()?;
        Ok(())
    }
}

fn row_to_contact(row: &rusqlite::Row<'_>) -> rusqlite::Result<Contact> {
    Ok(Contact {
        email: row.get("email")?,
        name: row.get("name")?,
        pubkey: row.get("pubkey")?,
        has_pgp: row.get::<_, i64>("has_pgp")? as u8,
        searchable: Vec::new(),
        client: row.get("client")?,
        fingerprint: row.get("fingerprint")?,
        longid: row.get("longid")?,
        longids: Vec::new(),
        pending_lookup: row.get::<_, i64>("pending_lookup")? as u8,
        last_use: row.get("last_use")?,
        pubkey_last_sig: row.get("pubkey_last_sig")?,
        pubkey_last_check: row.get("pubkey_last_check")?,
        expires_on: row.get("expires_on")?,
    })
}

/// Build a new record from the stored record plus a patch; unset patch
/// fields survive from the stored record.
fn merge_contact(existing: &Contact, patch: &ContactUpdate) -> Contact {
    let name = patch
        .name
        .clone()
        .unwrap_or_else(|| existing.name.clone());
    let has_pgp = patch.has_pgp.unwrap_or(existing.has_pgp);
    let searchable = match &patch.searchable {
        Some(explicit) => explicit.clone(),
        None if name != existing.name || has_pgp != existing.has_pgp => {
            create_search_index(&existing.email, name.as_deref(), has_pgp == 1)
        }
        None => existing.searchable.clone(),
    };
    Contact {
        email: existing.email.clone(),
        name,
        pubkey: patch.pubkey.clone().or_else(|| existing.pubkey.clone()),
        has_pgp,
        searchable,
        client: patch.client.clone().unwrap_or_else(|| existing.client.clone()),
        fingerprint: patch
            .fingerprint
            .clone()
            .unwrap_or_else(|| existing.fingerprint.clone()),
        longid: patch.longid.clone().unwrap_or_else(|| existing.longid.clone()),
        longids: patch.longids.clone().unwrap_or_else(|| existing.longids.clone()),
        pending_lookup: patch.pending_lookup.unwrap_or(existing.pending_lookup),
        last_use: patch.last_use.unwrap_or(existing.last_use),
        pubkey_last_sig: patch.pubkey_last_sig.unwrap_or(existing.pubkey_last_sig),
        pubkey_last_check: patch
            .pubkey_last_check
            .unwrap_or(existing.pubkey_last_check),
        expires_on: patch.expires_on.unwrap_or(existing.expires_on),
    }
}

fn is_longid_shape(id: &str) -> bool {
    id.len() == 16 && id.chars().all(|c| c.is_ascii_hexdigit())
}

/// Lowercase and strip diacritics so search input and indexed tokens
/// compare equal regardless of accents.
fn normalize_string(input: &str) -> String {
    input
        .to_lowercase()
        .chars()
        .map(|c| match c {
            'à' | 'á' | 'â' | 'ã' | 'ä' | 'å' => 'a',
            'è' | 'é' | 'ê' | 'ë' => 'e',
            'ì' | 'í' | 'î' | 'ï' => 'i',
            'ò' | 'ó' | 'ô' | 'õ' | 'ö' => 'o',
            'ù' | 'ú' | 'û' | 'ü' => 'u',
            'ý' | 'ÿ' => 'y',
            'ç' => 'c',
            'ñ' => 'n',
            other => other,
        })
        .collect()
}

/// Tag a normalized substring with the has-pgp marker used by the
/// search-token index.
fn db_index(has_pgp: bool, substring: &str) -> String {
    format!("{}:{}", if has_pgp { 't' } else { 'f' }, substring)
}

/// Precompute the search-token index for a contact: every prefix of
/// email and name and of their alphanumeric fragments, normalized and
/// tagged with the has-pgp marker.
fn create_search_index(email: &str, name: Option<&str>, has_pgp: bool) -> Vec<String> {
    let email = email.to_lowercase();
    let name = name.map(|n| n.to_lowercase()).unwrap_or_default();
    let mut parts: Vec<String> = vec![email.clone(), name.clone()];
    parts.extend(split_alphanumeric(&email));
    parts.extend(split_alphanumeric(&name));
    let mut index: Vec<String> = Vec::new();
    for part in parts {
        if part.is_empty() {
            continue;
        }
        let mut prefix = String::new();
        for letter in part.chars() {
            prefix.push(letter);
            let tagged = db_index(has_pgp, &normalize_string(&prefix));
            if !index.contains(&tagged) {
                index.push(tagged);
            }
        }
    }
    index
}

fn split_alphanumeric(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string())
        .collect()
}

/// Canonicalize provenance labels: our own client names collapse to
/// the legacy `cryptup` tag, generic OpenPGP clients to `pgp`.
fn storable_client(client: Option<&str>) -> String {
    match client.unwrap_or("pgp") {
        "mailkeys" | "cryptup" => "cryptup".to_string(),
        "pgp-other" | "pgp" => "pgp".to_string(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_search_index_tags_and_prefixes() {
        let index = create_search_index("a@x.com", None, true);
        assert!(index.contains(&"t:a".to_string()));
        assert!(index.contains(&"t:a@x.com".to_string()));
        assert!(index.contains(&"t:x".to_string()));
        assert!(index.contains(&"t:com".to_string()));
        assert!(!index.iter().any(|t| t.starts_with("f:")));
    }

    #[test]
    fn test_create_search_index_includes_name_tokens() {
        let index = create_search_index("bob@x.com", Some("Bób Builder"), false);
        assert!(index.contains(&"f:bob".to_string()));
        assert!(index.contains(&"f:builder".to_string()));
    }

    #[test]
    fn test_normalize_string_strips_diacritics() {
        assert_eq!(normalize_string("Renée"), "renee");
        assert_eq!(normalize_string("ASCII"), "ascii");
    }

    #[test]
    fn test_storable_client() {
        assert_eq!(storable_client(Some("mailkeys")), "cryptup");
        assert_eq!(storable_client(Some("pgp-other")), "pgp");
        assert_eq!(storable_client(None), "pgp");
    }

    #[test]
    fn test_is_longid_shape() {
        assert!(is_longid_shape("66AC6C8CCA7019A2"));
        assert!(is_longid_shape("66ac6c8cca7019a2"));
        assert!(!is_longid_shape("alice@example.com"));
        assert!(!is_longid_shape("66AC6C8C"));
    }
}
