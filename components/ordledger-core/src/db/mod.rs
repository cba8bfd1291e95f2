pub mod fingerprint;
pub mod ledger;
pub mod queries;

use std::{path::PathBuf, time::Duration};

use rusqlite::{Connection, OpenFlags, Row, ToSql};

use crate::utils::Context;

use self::fingerprint::{install_fingerprint_triggers, register_fingerprint_functions};

pub fn get_default_ordledger_db_file_path(base_dir: &PathBuf) -> PathBuf {
    let mut destination_path = base_dir.clone();
    destination_path.push(crate::config::DEFAULT_DB_FILE_NAME);
    destination_path
}

/// Opens (creating if needed) the ledger database. `None` opens a private
/// in-memory database, used by tests and dry runs.
pub fn create_or_open_readwrite_db(
    db_path: Option<&PathBuf>,
    ctx: &Context,
) -> Result<Connection, String> {
    let conn = match db_path {
        Some(path) => {
            if let Some(dirp) = path.parent() {
                std::fs::create_dir_all(dirp).map_err(|e| {
                    format!("unable to create directory {}: {}", dirp.display(), e)
                })?;
            }
            let open_flags = OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_CREATE;
            let conn = Connection::open_with_flags(path, open_flags)
                .map_err(|e| format!("unable to open {}: {}", path.display(), e))?;
            // Readers get a consistent snapshot while the writer holds a block transaction.
            let journal_mode: String = conn
                .pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))
                .map_err(|e| format!("unable to enable WAL on {}: {}", path.display(), e))?;
            try_debug!(ctx, "Opened {} (journal_mode={})", path.display(), journal_mode);
            conn
        }
        None => Connection::open_in_memory()
            .map_err(|e| format!("unable to open in-memory database: {}", e))?,
    };
    conn.busy_timeout(Duration::from_secs(5))
        .map_err(|e| format!("unable to set busy timeout: {}", e))?;
    register_fingerprint_functions(&conn)
        .map_err(|e| format!("unable to register sqlite functions: {}", e))?;
    Ok(conn)
}

pub fn open_readonly_ordledger_db_conn(
    db_path: &PathBuf,
    ctx: &Context,
) -> Result<Connection, String> {
    if let Err(e) = std::fs::metadata(db_path) {
        return Err(format!("could not find {}: {}", db_path.display(), e));
    }
    let conn = Connection::open_with_flags(db_path, OpenFlags::SQLITE_OPEN_READ_ONLY)
        .map_err(|e| {
            try_error!(ctx, "Unable to open {}: {}", db_path.display(), e);
            format!("unable to open {}: {}", db_path.display(), e)
        })?;
    conn.busy_timeout(Duration::from_secs(5))
        .map_err(|e| format!("unable to set busy timeout: {}", e))?;
    Ok(conn)
}

const SCHEMA_TABLES: &[(&str, &str)] = &[
    (
        "blocks",
        "CREATE TABLE IF NOT EXISTS blocks (
            block_height INTEGER NOT NULL PRIMARY KEY,
            block_hash TEXT NOT NULL UNIQUE,
            parent_block_hash TEXT,
            timestamp INTEGER NOT NULL
        )",
    ),
    (
        "inscriptions",
        "CREATE TABLE IF NOT EXISTS inscriptions (
            genesis_id TEXT NOT NULL PRIMARY KEY,
            number INTEGER NOT NULL UNIQUE,
            content_type TEXT NOT NULL,
            mime_type TEXT NOT NULL,
            content_length INTEGER NOT NULL,
            content BLOB NOT NULL,
            fee INTEGER NOT NULL,
            sat_ordinal INTEGER NOT NULL,
            sat_rarity TEXT NOT NULL,
            sat_coinbase_height INTEGER NOT NULL,
            sat_coinbase_offset INTEGER NOT NULL,
            curse_type TEXT,
            genesis_block_height INTEGER NOT NULL,
            genesis_block_hash TEXT NOT NULL,
            genesis_tx_id TEXT NOT NULL,
            genesis_tx_index INTEGER NOT NULL,
            genesis_block_index INTEGER NOT NULL,
            genesis_address TEXT,
            timestamp INTEGER NOT NULL
        )",
    ),
    (
        "locations",
        "CREATE TABLE IF NOT EXISTS locations (
            id INTEGER PRIMARY KEY,
            genesis_id TEXT NOT NULL,
            block_height INTEGER NOT NULL,
            block_hash TEXT NOT NULL,
            block_index INTEGER NOT NULL,
            tx_id TEXT NOT NULL,
            tx_index INTEGER NOT NULL,
            satpoint_tx_id TEXT NOT NULL,
            output_index INTEGER NOT NULL,
            output_offset INTEGER NOT NULL,
            address TEXT,
            value INTEGER,
            genesis INTEGER NOT NULL,
            timestamp INTEGER NOT NULL,
            UNIQUE (genesis_id, block_hash, block_index)
        )",
    ),
    (
        "current_locations",
        "CREATE TABLE IF NOT EXISTS current_locations (
            genesis_id TEXT NOT NULL PRIMARY KEY,
            location_id INTEGER NOT NULL,
            block_height INTEGER NOT NULL,
            block_index INTEGER NOT NULL,
            address TEXT
        )",
    ),
    (
        "fingerprints",
        "CREATE TABLE IF NOT EXISTS fingerprints (
            resource TEXT NOT NULL PRIMARY KEY,
            digest INTEGER NOT NULL
        )",
    ),
];

const SCHEMA_INDEXES: &[&str] = &[
    "CREATE INDEX IF NOT EXISTS index_inscriptions_on_sat_ordinal ON inscriptions(sat_ordinal);",
    "CREATE INDEX IF NOT EXISTS index_inscriptions_on_genesis_block_height ON inscriptions(genesis_block_height);",
    "CREATE INDEX IF NOT EXISTS index_inscriptions_on_genesis_block_hash ON inscriptions(genesis_block_hash);",
    "CREATE INDEX IF NOT EXISTS index_inscriptions_on_mime_type ON inscriptions(mime_type);",
    "CREATE INDEX IF NOT EXISTS index_inscriptions_on_sat_rarity ON inscriptions(sat_rarity);",
    "CREATE INDEX IF NOT EXISTS index_inscriptions_on_genesis_address ON inscriptions(genesis_address);",
    "CREATE INDEX IF NOT EXISTS index_locations_on_genesis_id ON locations(genesis_id, block_height, block_index);",
    "CREATE INDEX IF NOT EXISTS index_locations_on_block_hash ON locations(block_hash);",
    "CREATE INDEX IF NOT EXISTS index_locations_on_block_height ON locations(block_height);",
    "CREATE INDEX IF NOT EXISTS index_current_locations_on_address ON current_locations(address);",
];

/// Opens the ledger and makes sure its schema, indexes and fingerprint
/// triggers exist.
pub fn initialize_ordledger_db(
    db_path: Option<&PathBuf>,
    ctx: &Context,
) -> Result<Connection, String> {
    let conn = create_or_open_readwrite_db(db_path, ctx)?;
    for (table, statement) in SCHEMA_TABLES.iter() {
        if let Err(e) = conn.execute(statement, []) {
            try_error!(ctx, "Unable to create table {}: {}", table, e.to_string());
            return Err(format!("unable to create table {}: {}", table, e));
        }
    }
    for statement in SCHEMA_INDEXES.iter() {
        if let Err(e) = conn.execute(statement, []) {
            try_warn!(ctx, "Unable to create index: {}", e.to_string());
        }
    }
    install_fingerprint_triggers(&conn)
        .map_err(|e| format!("unable to install fingerprint triggers: {}", e))?;
    Ok(conn)
}

pub fn perform_query_one<F, T>(
    query: &str,
    args: &[&dyn ToSql],
    conn: &Connection,
    mapping_func: F,
) -> Result<Option<T>, rusqlite::Error>
where
    F: Fn(&Row<'_>) -> Result<T, rusqlite::Error>,
{
    let mut stmt = conn.prepare_cached(query)?;
    let mut rows = stmt.query(args)?;
    match rows.next()? {
        Some(row) => Ok(Some(mapping_func(row)?)),
        None => Ok(None),
    }
}

pub fn perform_query_exists(
    query: &str,
    args: &[&dyn ToSql],
    conn: &Connection,
) -> Result<bool, rusqlite::Error> {
    let mut stmt = conn.prepare_cached(query)?;
    let mut rows = stmt.query(args)?;
    Ok(rows.next()?.is_some())
}

pub fn perform_query_set<F, T>(
    query: &str,
    args: &[&dyn ToSql],
    conn: &Connection,
    mapping_func: F,
) -> Result<Vec<T>, rusqlite::Error>
where
    F: Fn(&Row<'_>) -> Result<T, rusqlite::Error>,
{
    let mut stmt = conn.prepare_cached(query)?;
    let mut rows = stmt.query(args)?;
    let mut results = vec![];
    while let Some(row) = rows.next()? {
        results.push(mapping_func(row)?);
    }
    Ok(results)
}
