//! Change fingerprints served as cache validators by the read API.
//!
//! Every row of `inscriptions`, `locations` and `blocks` contributes a 64 bit
//! digest of its contents to a per-table accumulator, folded in with XOR by
//! triggers on insert, update and delete. The accumulators therefore live in
//! the same transaction as the rows they summarize: a rolled back unit of
//! work leaves them untouched, and retracting then re-applying identical rows
//! restores the previous value. Single-inscription reads use a digest of the
//! rows they actually return instead.

use std::fmt::{Display, Formatter};

use rusqlite::{
    functions::FunctionFlags, types::ValueRef, Connection, OptionalExtension, ToSql,
};
use sha2::{Digest, Sha256};

use super::perform_query_set;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Fingerprint(pub u64);

impl Display for Fingerprint {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

impl Fingerprint {
    /// Accepts the bare form as well as a quoted or weak HTTP entity tag.
    pub fn matches_entity_tag(&self, tag: &str) -> bool {
        let tag = tag.trim();
        let tag = tag.strip_prefix("W/").unwrap_or(tag);
        tag.trim_matches('"') == self.to_string()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FingerprintResource {
    Inscriptions,
    Locations,
    Blocks,
}

impl FingerprintResource {
    pub fn table(&self) -> &'static str {
        match self {
            FingerprintResource::Inscriptions => "inscriptions",
            FingerprintResource::Locations => "locations",
            FingerprintResource::Blocks => "blocks",
        }
    }

    fn columns(&self) -> &'static [&'static str] {
        match self {
            FingerprintResource::Inscriptions => &[
                "genesis_id",
                "number",
                "content_type",
                "mime_type",
                "content_length",
                "content",
                "fee",
                "sat_ordinal",
                "sat_rarity",
                "sat_coinbase_height",
                "sat_coinbase_offset",
                "curse_type",
                "genesis_block_height",
                "genesis_block_hash",
                "genesis_tx_id",
                "genesis_tx_index",
                "genesis_block_index",
                "genesis_address",
                "timestamp",
            ],
            // `id` is a storage detail, left out so that re-applied rows hash the same.
            FingerprintResource::Locations => &[
                "genesis_id",
                "block_height",
                "block_hash",
                "block_index",
                "tx_id",
                "tx_index",
                "satpoint_tx_id",
                "output_index",
                "output_offset",
                "address",
                "value",
                "genesis",
                "timestamp",
            ],
            FingerprintResource::Blocks => {
                &["block_height", "block_hash", "parent_block_hash", "timestamp"]
            }
        }
    }

    const ALL: [FingerprintResource; 3] = [
        FingerprintResource::Inscriptions,
        FingerprintResource::Locations,
        FingerprintResource::Blocks,
    ];
}

fn hash_value(hasher: &mut Sha256, value: ValueRef<'_>) {
    match value {
        ValueRef::Null => hasher.update([0u8]),
        ValueRef::Integer(i) => {
            hasher.update([1u8]);
            hasher.update(i.to_be_bytes());
        }
        ValueRef::Real(f) => {
            hasher.update([2u8]);
            hasher.update(f.to_be_bytes());
        }
        ValueRef::Text(bytes) => {
            hasher.update([3u8]);
            hasher.update((bytes.len() as u64).to_be_bytes());
            hasher.update(bytes);
        }
        ValueRef::Blob(bytes) => {
            hasher.update([4u8]);
            hasher.update((bytes.len() as u64).to_be_bytes());
            hasher.update(bytes);
        }
    }
}

fn truncate_digest(hasher: Sha256) -> u64 {
    let digest = hasher.finalize();
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&digest[..8]);
    u64::from_be_bytes(bytes)
}

/// Registers `fold_digest(accumulator, values...)`, returning the accumulator
/// XORed with the digest of the values. Must be present on every connection
/// that writes to the ledger, since the fingerprint triggers call it.
pub fn register_fingerprint_functions(conn: &Connection) -> Result<(), rusqlite::Error> {
    conn.create_scalar_function(
        "fold_digest",
        -1,
        FunctionFlags::SQLITE_UTF8 | FunctionFlags::SQLITE_DETERMINISTIC,
        |ctx| {
            let accumulator: i64 = ctx.get(0)?;
            let mut hasher = Sha256::new();
            for i in 1..ctx.len() {
                hash_value(&mut hasher, ctx.get_raw(i));
            }
            Ok(accumulator ^ truncate_digest(hasher) as i64)
        },
    )
}

fn row_values(prefix: &str, columns: &[&str]) -> String {
    columns
        .iter()
        .map(|column| format!("{}.{}", prefix, column))
        .collect::<Vec<_>>()
        .join(", ")
}

pub fn install_fingerprint_triggers(conn: &Connection) -> Result<(), rusqlite::Error> {
    let mut statements = String::new();
    for resource in FingerprintResource::ALL.iter() {
        let table = resource.table();
        let old_values = row_values("OLD", resource.columns());
        let new_values = row_values("NEW", resource.columns());
        statements.push_str(&format!(
            "INSERT OR IGNORE INTO fingerprints (resource, digest) VALUES ('{table}', 0);
            CREATE TRIGGER IF NOT EXISTS {table}_fingerprint_on_insert AFTER INSERT ON {table} BEGIN
                UPDATE fingerprints SET digest = fold_digest(digest, {new_values}) WHERE resource = '{table}';
            END;
            CREATE TRIGGER IF NOT EXISTS {table}_fingerprint_on_delete AFTER DELETE ON {table} BEGIN
                UPDATE fingerprints SET digest = fold_digest(digest, {old_values}) WHERE resource = '{table}';
            END;
            CREATE TRIGGER IF NOT EXISTS {table}_fingerprint_on_update AFTER UPDATE ON {table} BEGIN
                UPDATE fingerprints SET digest = fold_digest(fold_digest(digest, {old_values}), {new_values}) WHERE resource = '{table}';
            END;
            "
        ));
    }
    conn.execute_batch(&statements)
}

/// Fingerprint of one or more whole tables, for listings and aggregates.
pub fn get_resources_fingerprint(
    resources: &[FingerprintResource],
    conn: &Connection,
) -> Result<Fingerprint, rusqlite::Error> {
    let mut hasher = Sha256::new();
    for resource in resources.iter() {
        let digest: i64 = conn
            .query_row(
                "SELECT digest FROM fingerprints WHERE resource = ?",
                [resource.table()],
                |row| row.get(0),
            )
            .optional()?
            .unwrap_or(0);
        hasher.update(resource.table().as_bytes());
        hasher.update(digest.to_be_bytes());
    }
    Ok(Fingerprint(truncate_digest(hasher)))
}

/// Fingerprint of a single inscription: its row plus its location history.
/// `None` when the inscription is unknown.
pub fn get_inscription_fingerprint(
    genesis_id: &str,
    conn: &Connection,
) -> Result<Option<Fingerprint>, rusqlite::Error> {
    let mut hasher = Sha256::new();
    let columns = FingerprintResource::Inscriptions.columns().join(", ");
    let args: &[&dyn ToSql] = &[&genesis_id];
    let mut stmt = conn.prepare_cached(&format!(
        "SELECT {} FROM inscriptions WHERE genesis_id = ?",
        columns
    ))?;
    let mut rows = stmt.query(args)?;
    let Some(row) = rows.next()? else {
        return Ok(None);
    };
    for i in 0..FingerprintResource::Inscriptions.columns().len() {
        hash_value(&mut hasher, row.get_ref(i)?);
    }

    let columns = FingerprintResource::Locations.columns();
    let digests = perform_query_set(
        &format!(
            "SELECT {} FROM locations WHERE genesis_id = ? ORDER BY block_height ASC, block_index ASC",
            columns.join(", ")
        ),
        args,
        conn,
        |row| {
            let mut location_hasher = Sha256::new();
            for i in 0..columns.len() {
                hash_value(&mut location_hasher, row.get_ref(i)?);
            }
            Ok(truncate_digest(location_hasher))
        },
    )?;
    for digest in digests {
        hasher.update(digest.to_be_bytes());
    }
    Ok(Some(Fingerprint(truncate_digest(hasher))))
}

#[cfg(test)]
mod tests {
    use rusqlite::params;

    use super::*;
    use crate::db::tests::initialize_test_db;

    fn insert_block(conn: &Connection, height: u64, hash: &str) {
        conn.execute(
            "INSERT INTO blocks (block_height, block_hash, parent_block_hash, timestamp) VALUES (?, ?, NULL, 0)",
            params![height, hash],
        )
        .unwrap();
    }

    #[test]
    fn table_fingerprint_follows_rows() {
        let conn = initialize_test_db();
        let empty = get_resources_fingerprint(&[FingerprintResource::Blocks], &conn).unwrap();

        insert_block(&conn, 1, "aa");
        let one = get_resources_fingerprint(&[FingerprintResource::Blocks], &conn).unwrap();
        assert_ne!(empty, one);

        insert_block(&conn, 2, "bb");
        let two = get_resources_fingerprint(&[FingerprintResource::Blocks], &conn).unwrap();
        assert_ne!(one, two);

        conn.execute("DELETE FROM blocks WHERE block_height = 2", [])
            .unwrap();
        assert_eq!(
            get_resources_fingerprint(&[FingerprintResource::Blocks], &conn).unwrap(),
            one
        );

        conn.execute("UPDATE blocks SET timestamp = 5 WHERE block_height = 1", [])
            .unwrap();
        let updated = get_resources_fingerprint(&[FingerprintResource::Blocks], &conn).unwrap();
        assert_ne!(updated, one);

        conn.execute("UPDATE blocks SET timestamp = 0 WHERE block_height = 1", [])
            .unwrap();
        assert_eq!(
            get_resources_fingerprint(&[FingerprintResource::Blocks], &conn).unwrap(),
            one
        );
    }

    #[test]
    fn aborted_transactions_leave_fingerprints_untouched() {
        let mut conn = initialize_test_db();
        let before = get_resources_fingerprint(&[FingerprintResource::Blocks], &conn).unwrap();
        {
            let db_tx = conn.transaction().unwrap();
            insert_block(&db_tx, 1, "aa");
            // dropped without commit
        }
        assert_eq!(
            get_resources_fingerprint(&[FingerprintResource::Blocks], &conn).unwrap(),
            before
        );
    }

    #[test]
    fn resources_are_distinguished() {
        let conn = initialize_test_db();
        let inscriptions =
            get_resources_fingerprint(&[FingerprintResource::Inscriptions], &conn).unwrap();
        let locations = get_resources_fingerprint(&[FingerprintResource::Locations], &conn).unwrap();
        assert_ne!(inscriptions, locations);
    }

    #[test]
    fn entity_tags() {
        let fingerprint = Fingerprint(0xab);
        assert_eq!(fingerprint.to_string(), "00000000000000ab");
        assert!(fingerprint.matches_entity_tag("00000000000000ab"));
        assert!(fingerprint.matches_entity_tag("\"00000000000000ab\""));
        assert!(fingerprint.matches_entity_tag("W/\"00000000000000ab\""));
        assert!(!fingerprint.matches_entity_tag("\"00000000000000ac\""));
    }

    #[test]
    fn unknown_inscription_has_no_fingerprint() {
        let conn = initialize_test_db();
        assert_eq!(get_inscription_fingerprint("missing", &conn).unwrap(), None);
    }
}
