//! Database schema and migrations for the contact store.

use rusqlite::Connection;

/// Current schema version.
pub const SCHEMA_VERSION: u32 = 3;

/// Initialize the database schema.
pub fn init_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY
        )",
        [],
    )?;

    let current_version: u32 = conn
        .query_row(
            "SELECT COALESCE(MAX(version), 0) FROM schema_version",
            [],
            |row| row.get(0),
        )
        .unwrap_or(0);

    if current_version < SCHEMA_VERSION {
        migrate(conn, current_version)?;
    }

    Ok(())
}

/// Run migrations from current version to latest.
fn migrate(conn: &Connection, from_version: u32) -> rusqlite::Result<()> {
    if from_version < 1 {
        migrate_v1(conn)?;
    }
    if from_version < 2 {
        migrate_v2(conn)?;
    }
    if from_version < 3 {
        migrate_v3(conn)?;
    }

    conn.execute("DELETE FROM schema_version", [])?;
    conn.execute(
        "INSERT INTO schema_version (version) VALUES (?1)",
        [SCHEMA_VERSION],
    )?;

    Ok(())
}

/// Version 1 - contacts table with has-pgp and search-token indexes.
fn migrate_v1(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS contacts (
            email TEXT PRIMARY KEY,
            name TEXT,
            pubkey TEXT,
            has_pgp INTEGER NOT NULL DEFAULT 0,
            fingerprint TEXT,
            longid TEXT,
            client TEXT,
            pending_lookup INTEGER NOT NULL DEFAULT 0,
            last_use INTEGER,
            pubkey_last_sig INTEGER,
            pubkey_last_check INTEGER,
            expires_on INTEGER
        )",
        [],
    )?;

    // multi-valued search-token index: one row per has-pgp-tagged prefix
    conn.execute(
        "CREATE TABLE IF NOT EXISTS contact_search (
            email TEXT NOT NULL,
            term TEXT NOT NULL,
            FOREIGN KEY (email) REFERENCES contacts(email) ON DELETE CASCADE,
            UNIQUE(email, term)
        )",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_contacts_has_pgp ON contacts(has_pgp)",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_contact_search_term ON contact_search(term)",
        [],
    )?;

    Ok(())
}

/// Version 2 - primary-longid index.
fn migrate_v2(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_contacts_longid ON contacts(longid)",
        [],
    )?;
    Ok(())
}

/// Version 3 - all-subkey-longids index. Contacts written before this
/// version only have their primary longid recorded; lookups fall back
/// accordingly.
fn migrate_v3(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS contact_longids (
            email TEXT NOT NULL,
            longid TEXT NOT NULL,
            position INTEGER NOT NULL DEFAULT 0,
            FOREIGN KEY (email) REFERENCES contacts(email) ON DELETE CASCADE,
            UNIQUE(email, longid)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_contact_longids_longid ON contact_longids(longid)",
        [],
    )?;
    Ok(())
}
