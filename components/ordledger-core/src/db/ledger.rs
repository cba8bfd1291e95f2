use rusqlite::{params, Connection, ToSql, Transaction};

use crate::{
    chainhook::BlockIdentifier,
    ord::{rarity::Rarity, sat_point::SatPoint},
};

use super::{perform_query_exists, perform_query_one, perform_query_set};

#[derive(Debug, Clone, PartialEq)]
pub struct InscriptionRecord {
    pub genesis_id: String,
    pub number: i64,
    pub content_type: String,
    pub mime_type: String,
    pub content_length: u64,
    pub content: Vec<u8>,
    pub fee: u64,
    pub sat_ordinal: u64,
    pub sat_rarity: Rarity,
    pub sat_coinbase_height: u64,
    pub sat_coinbase_offset: u64,
    pub curse_type: Option<String>,
    pub genesis_block_height: u64,
    pub genesis_block_hash: String,
    pub genesis_tx_id: String,
    pub genesis_tx_index: u32,
    pub genesis_block_index: u32,
    pub genesis_address: Option<String>,
    pub timestamp: i64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LocationRecord {
    pub genesis_id: String,
    pub block_height: u64,
    pub block_hash: String,
    pub block_index: u32,
    pub tx_id: String,
    pub tx_index: u32,
    pub sat_point: SatPoint,
    pub address: Option<String>,
    pub value: Option<u64>,
    pub genesis: bool,
    pub timestamp: i64,
}

/// A location row as persisted, with its surrogate id.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredLocation {
    pub id: i64,
    pub location: LocationRecord,
}

const LOCATION_COLUMNS: &str = "id, genesis_id, block_height, block_hash, block_index, tx_id, tx_index, satpoint_tx_id, output_index, output_offset, address, value, genesis, timestamp";

fn map_stored_location(row: &rusqlite::Row<'_>) -> Result<StoredLocation, rusqlite::Error> {
    Ok(StoredLocation {
        id: row.get(0)?,
        location: LocationRecord {
            genesis_id: row.get(1)?,
            block_height: row.get(2)?,
            block_hash: row.get(3)?,
            block_index: row.get(4)?,
            tx_id: row.get(5)?,
            tx_index: row.get(6)?,
            sat_point: SatPoint {
                tx_id: row.get(7)?,
                output_index: row.get(8)?,
                offset: row.get(9)?,
            },
            address: row.get(10)?,
            value: row.get(11)?,
            genesis: row.get(12)?,
            timestamp: row.get(13)?,
        },
    })
}

// Blocks

pub fn insert_block(
    block_identifier: &BlockIdentifier,
    parent_block_hash: Option<&str>,
    timestamp: i64,
    db_tx: &Transaction,
) -> Result<(), rusqlite::Error> {
    db_tx.execute(
        "INSERT INTO blocks (block_height, block_hash, parent_block_hash, timestamp) VALUES (?, ?, ?, ?)",
        params![
            block_identifier.index,
            block_identifier.hash,
            parent_block_hash,
            timestamp
        ],
    )?;
    Ok(())
}

pub fn delete_block(block_hash: &str, db_tx: &Transaction) -> Result<usize, rusqlite::Error> {
    db_tx.execute("DELETE FROM blocks WHERE block_hash = ?", [block_hash])
}

pub fn find_block_height_with_hash(
    block_hash: &str,
    conn: &Connection,
) -> Result<Option<u64>, rusqlite::Error> {
    let args: &[&dyn ToSql] = &[&block_hash];
    perform_query_one(
        "SELECT block_height FROM blocks WHERE block_hash = ?",
        args,
        conn,
        |row| row.get(0),
    )
}

/// Highest committed block, i.e. where ingestion resumes from.
pub fn find_chain_tip(conn: &Connection) -> Result<Option<BlockIdentifier>, rusqlite::Error> {
    perform_query_one(
        "SELECT block_height, block_hash FROM blocks ORDER BY block_height DESC LIMIT 1",
        &[],
        conn,
        |row| {
            Ok(BlockIdentifier {
                index: row.get(0)?,
                hash: row.get(1)?,
            })
        },
    )
}

// Inscriptions

pub fn insert_inscription(
    inscription: &InscriptionRecord,
    db_tx: &Transaction,
) -> Result<(), rusqlite::Error> {
    db_tx.execute(
        "INSERT INTO inscriptions (
            genesis_id, number, content_type, mime_type, content_length, content, fee,
            sat_ordinal, sat_rarity, sat_coinbase_height, sat_coinbase_offset, curse_type,
            genesis_block_height, genesis_block_hash, genesis_tx_id, genesis_tx_index,
            genesis_block_index, genesis_address, timestamp
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        params![
            inscription.genesis_id,
            inscription.number,
            inscription.content_type,
            inscription.mime_type,
            inscription.content_length,
            inscription.content,
            inscription.fee,
            inscription.sat_ordinal,
            inscription.sat_rarity.as_str(),
            inscription.sat_coinbase_height,
            inscription.sat_coinbase_offset,
            inscription.curse_type,
            inscription.genesis_block_height,
            inscription.genesis_block_hash,
            inscription.genesis_tx_id,
            inscription.genesis_tx_index,
            inscription.genesis_block_index,
            inscription.genesis_address,
            inscription.timestamp,
        ],
    )?;
    Ok(())
}

/// Removes an inscription along with its whole location history.
pub fn delete_inscription(genesis_id: &str, db_tx: &Transaction) -> Result<usize, rusqlite::Error> {
    db_tx.execute("DELETE FROM current_locations WHERE genesis_id = ?", [genesis_id])?;
    db_tx.execute("DELETE FROM locations WHERE genesis_id = ?", [genesis_id])?;
    db_tx.execute("DELETE FROM inscriptions WHERE genesis_id = ?", [genesis_id])
}

#[derive(Debug, Clone, PartialEq)]
pub struct InscriptionGenesis {
    pub number: i64,
    pub genesis_block_hash: String,
    pub genesis_block_index: u32,
}

pub fn find_inscription_genesis(
    genesis_id: &str,
    conn: &Connection,
) -> Result<Option<InscriptionGenesis>, rusqlite::Error> {
    let args: &[&dyn ToSql] = &[&genesis_id];
    perform_query_one(
        "SELECT number, genesis_block_hash, genesis_block_index FROM inscriptions WHERE genesis_id = ?",
        args,
        conn,
        |row| {
            Ok(InscriptionGenesis {
                number: row.get(0)?,
                genesis_block_hash: row.get(1)?,
                genesis_block_index: row.get(2)?,
            })
        },
    )
}

pub fn find_highest_blessed_number(conn: &Connection) -> Result<Option<i64>, rusqlite::Error> {
    perform_query_one(
        "SELECT MAX(number) FROM inscriptions WHERE number >= 0",
        &[],
        conn,
        |row| row.get::<_, Option<i64>>(0),
    )
    .map(|number| number.flatten())
}

pub fn find_lowest_cursed_number(conn: &Connection) -> Result<Option<i64>, rusqlite::Error> {
    perform_query_one(
        "SELECT MIN(number) FROM inscriptions WHERE number < 0",
        &[],
        conn,
        |row| row.get::<_, Option<i64>>(0),
    )
    .map(|number| number.flatten())
}

pub fn is_inscription_number_assigned(
    number: i64,
    conn: &Connection,
) -> Result<bool, rusqlite::Error> {
    let args: &[&dyn ToSql] = &[&number];
    perform_query_exists("SELECT 1 FROM inscriptions WHERE number = ?", args, conn)
}

// Locations

pub fn insert_location(
    location: &LocationRecord,
    db_tx: &Transaction,
) -> Result<i64, rusqlite::Error> {
    db_tx.execute(
        "INSERT INTO locations (
            genesis_id, block_height, block_hash, block_index, tx_id, tx_index,
            satpoint_tx_id, output_index, output_offset, address, value, genesis, timestamp
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        params![
            location.genesis_id,
            location.block_height,
            location.block_hash,
            location.block_index,
            location.tx_id,
            location.tx_index,
            location.sat_point.tx_id,
            location.sat_point.output_index,
            location.sat_point.offset,
            location.address,
            location.value,
            location.genesis,
            location.timestamp,
        ],
    )?;
    Ok(db_tx.last_insert_rowid())
}

pub fn find_location_in_block(
    genesis_id: &str,
    block_hash: &str,
    block_index: u32,
    conn: &Connection,
) -> Result<Option<StoredLocation>, rusqlite::Error> {
    let args: &[&dyn ToSql] = &[&genesis_id, &block_hash, &block_index];
    perform_query_one(
        &format!(
            "SELECT {} FROM locations WHERE genesis_id = ? AND block_hash = ? AND block_index = ?",
            LOCATION_COLUMNS
        ),
        args,
        conn,
        map_stored_location,
    )
}

/// Chronologically latest location of an inscription, read from the location
/// history itself rather than from the `current_locations` projection.
pub fn find_latest_location(
    genesis_id: &str,
    conn: &Connection,
) -> Result<Option<StoredLocation>, rusqlite::Error> {
    let args: &[&dyn ToSql] = &[&genesis_id];
    perform_query_one(
        &format!(
            "SELECT {} FROM locations WHERE genesis_id = ? ORDER BY block_height DESC, block_index DESC LIMIT 1",
            LOCATION_COLUMNS
        ),
        args,
        conn,
        map_stored_location,
    )
}

pub fn find_current_location(
    genesis_id: &str,
    conn: &Connection,
) -> Result<Option<StoredLocation>, rusqlite::Error> {
    let args: &[&dyn ToSql] = &[&genesis_id];
    perform_query_one(
        &format!(
            "SELECT {} FROM locations WHERE id = (SELECT location_id FROM current_locations WHERE genesis_id = ?)",
            LOCATION_COLUMNS
        ),
        args,
        conn,
        map_stored_location,
    )
}

pub fn find_location_history(
    genesis_id: &str,
    conn: &Connection,
) -> Result<Vec<StoredLocation>, rusqlite::Error> {
    let args: &[&dyn ToSql] = &[&genesis_id];
    perform_query_set(
        &format!(
            "SELECT {} FROM locations WHERE genesis_id = ? ORDER BY block_height ASC, block_index ASC",
            LOCATION_COLUMNS
        ),
        args,
        conn,
        map_stored_location,
    )
}

pub fn delete_location(location_id: i64, db_tx: &Transaction) -> Result<usize, rusqlite::Error> {
    db_tx.execute("DELETE FROM locations WHERE id = ?", [location_id])
}

/// Re-derives the current location of an inscription from its history.
pub fn refresh_current_location(
    genesis_id: &str,
    db_tx: &Transaction,
) -> Result<Option<StoredLocation>, rusqlite::Error> {
    match find_latest_location(genesis_id, db_tx)? {
        Some(latest) => {
            db_tx.execute(
                "INSERT INTO current_locations (genesis_id, location_id, block_height, block_index, address)
                VALUES (?, ?, ?, ?, ?)
                ON CONFLICT(genesis_id) DO UPDATE SET
                    location_id = excluded.location_id,
                    block_height = excluded.block_height,
                    block_index = excluded.block_index,
                    address = excluded.address",
                params![
                    genesis_id,
                    latest.id,
                    latest.location.block_height,
                    latest.location.block_index,
                    latest.location.address,
                ],
            )?;
            Ok(Some(latest))
        }
        None => {
            db_tx.execute("DELETE FROM current_locations WHERE genesis_id = ?", [genesis_id])?;
            Ok(None)
        }
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct BlockFootprint {
    pub inscriptions: u64,
    pub locations: u64,
}

/// Rows still attributed to a block; empty once the block is rolled back.
pub fn count_rows_in_block(
    block_hash: &str,
    conn: &Connection,
) -> Result<BlockFootprint, rusqlite::Error> {
    let args: &[&dyn ToSql] = &[&block_hash];
    let inscriptions = perform_query_one(
        "SELECT COUNT(*) FROM inscriptions WHERE genesis_block_hash = ?",
        args,
        conn,
        |row| row.get(0),
    )?
    .unwrap_or(0);
    let locations = perform_query_one(
        "SELECT COUNT(*) FROM locations WHERE block_hash = ?",
        args,
        conn,
        |row| row.get(0),
    )?
    .unwrap_or(0);
    Ok(BlockFootprint {
        inscriptions,
        locations,
    })
}

/// Audits the ledger invariants, returning a description of every breach.
pub fn check_ledger_integrity(conn: &Connection) -> Result<Vec<String>, rusqlite::Error> {
    let mut violations = vec![];

    for (class, condition) in [("blessed", "number >= 0"), ("cursed", "number < 0")] {
        let (count, min, max): (i64, Option<i64>, Option<i64>) = conn.query_row(
            &format!(
                "SELECT COUNT(*), MIN(number), MAX(number) FROM inscriptions WHERE {}",
                condition
            ),
            [],
            |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
        )?;
        if let (Some(min), Some(max)) = (min, max) {
            if max - min + 1 != count {
                violations.push(format!(
                    "{} numbers {}..={} are not dense ({} assigned)",
                    class, min, max, count
                ));
            }
        }
    }

    let unordered = perform_query_set(
        "SELECT a.genesis_id, b.genesis_id FROM inscriptions AS a
        INNER JOIN inscriptions AS b ON (a.number >= 0) = (b.number >= 0)
            AND ABS(a.number) < ABS(b.number)
            AND (a.genesis_block_height > b.genesis_block_height
                OR (a.genesis_block_height = b.genesis_block_height AND a.genesis_block_index > b.genesis_block_index))
        LIMIT 10",
        &[],
        conn,
        |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)),
    )?;
    for (first, second) in unordered {
        violations.push(format!(
            "inscription {} is numbered before {} but was revealed after it",
            first, second
        ));
    }

    let stale = perform_query_set(
        "SELECT i.genesis_id FROM inscriptions AS i
        LEFT JOIN current_locations AS c ON c.genesis_id = i.genesis_id
        WHERE c.location_id IS NULL OR c.location_id != (
            SELECT l.id FROM locations AS l WHERE l.genesis_id = i.genesis_id
            ORDER BY l.block_height DESC, l.block_index DESC LIMIT 1
        )",
        &[],
        conn,
        |row| row.get::<_, String>(0),
    )?;
    for genesis_id in stale {
        violations.push(format!(
            "current location of inscription {} is not its latest location",
            genesis_id
        ));
    }

    let genesis_rows = perform_query_set(
        "SELECT i.genesis_id, COUNT(l.id) FROM inscriptions AS i
        LEFT JOIN locations AS l ON l.genesis_id = i.genesis_id AND l.genesis = 1
        GROUP BY i.genesis_id HAVING COUNT(l.id) != 1",
        &[],
        conn,
        |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?)),
    )?;
    for (genesis_id, count) in genesis_rows {
        violations.push(format!(
            "inscription {} has {} genesis locations",
            genesis_id, count
        ));
    }

    let orphans = perform_query_set(
        "SELECT DISTINCT l.block_hash FROM locations AS l
        LEFT JOIN blocks AS b ON b.block_hash = l.block_hash
        WHERE b.block_hash IS NULL
        UNION
        SELECT DISTINCT l.genesis_id FROM locations AS l
        LEFT JOIN inscriptions AS i ON i.genesis_id = l.genesis_id
        WHERE i.genesis_id IS NULL",
        &[],
        conn,
        |row| row.get::<_, String>(0),
    )?;
    for orphan in orphans {
        violations.push(format!("locations reference unknown block or inscription {}", orphan));
    }

    Ok(violations)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{
        pipeline::InscriptionIndexer,
        test_utils::{
            get_test_ctx, test_block_hash, txid, TestBlockBuilder, TestPayloadBuilder,
            TestRevealBuilder, TestTransferBuilder, TEST_INSCRIPTION_ID,
        },
    };
    use crate::db::tests::initialize_test_db;

    fn location(height: u64, block_index: u32, tx_byte: u8) -> LocationRecord {
        LocationRecord {
            genesis_id: TEST_INSCRIPTION_ID.to_string(),
            block_height: height,
            block_hash: test_block_hash(height, 0),
            block_index,
            tx_id: txid(tx_byte),
            tx_index: 1,
            sat_point: SatPoint {
                tx_id: txid(tx_byte),
                output_index: 0,
                offset: 0,
            },
            address: None,
            value: Some(546),
            genesis: false,
            timestamp: 1677803510,
        }
    }

    fn seeded_indexer() -> InscriptionIndexer {
        let mut indexer = InscriptionIndexer::new(initialize_test_db(), false, &get_test_ctx());
        let report = indexer.process_payload(
            &TestPayloadBuilder::new()
                .apply(
                    TestBlockBuilder::new(775617)
                        .add_transaction(TestRevealBuilder::new().build_transaction())
                        .add_transaction(
                            TestRevealBuilder::from_tx(2)
                                .inscription_number(-1)
                                .ordinal_number(1676913207)
                                .build_transaction(),
                        )
                        .build(),
                )
                .apply(
                    TestBlockBuilder::new(775618)
                        .add_transaction(TestTransferBuilder::new().build_transaction())
                        .build(),
                )
                .build(),
        );
        assert!(report.is_success(), "{:?}", report.error);
        indexer
    }

    #[test]
    fn tracks_chain_tip() {
        let mut conn = initialize_test_db();
        assert_eq!(find_chain_tip(&conn).unwrap(), None);

        let db_tx = conn.transaction().unwrap();
        for height in [10, 12, 11] {
            let block = BlockIdentifier {
                index: height,
                hash: test_block_hash(height, 0),
            };
            insert_block(&block, None, 0, &db_tx).unwrap();
        }
        db_tx.commit().unwrap();
        assert_eq!(
            find_chain_tip(&conn).unwrap().map(|tip| tip.index),
            Some(12)
        );
        assert_eq!(
            find_block_height_with_hash(&test_block_hash(11, 0), &conn).unwrap(),
            Some(11)
        );
        assert_eq!(
            find_block_height_with_hash(&test_block_hash(11, 1), &conn).unwrap(),
            None
        );
    }

    #[test]
    fn current_location_is_the_latest_one() {
        let mut conn = initialize_test_db();
        let db_tx = conn.transaction().unwrap();
        let mut genesis = location(100, 0, 1);
        genesis.genesis = true;
        insert_location(&genesis, &db_tx).unwrap();
        insert_location(&location(101, 3, 3), &db_tx).unwrap();
        let latest_id = insert_location(&location(101, 5, 5), &db_tx).unwrap();
        // Out of order insertion of an older row must not win.
        insert_location(&location(100, 7, 7), &db_tx).unwrap();

        let current = refresh_current_location(TEST_INSCRIPTION_ID, &db_tx)
            .unwrap()
            .unwrap();
        assert_eq!(current.id, latest_id);
        assert_eq!(
            find_current_location(TEST_INSCRIPTION_ID, &db_tx).unwrap(),
            Some(current)
        );

        delete_location(latest_id, &db_tx).unwrap();
        let current = refresh_current_location(TEST_INSCRIPTION_ID, &db_tx)
            .unwrap()
            .unwrap();
        assert_eq!(
            (current.location.block_height, current.location.block_index),
            (101, 3)
        );

        let history = find_location_history(TEST_INSCRIPTION_ID, &db_tx).unwrap();
        assert_eq!(
            history
                .iter()
                .map(|l| (l.location.block_height, l.location.block_index))
                .collect::<Vec<_>>(),
            vec![(100, 0), (100, 7), (101, 3)]
        );

        db_tx
            .execute("DELETE FROM locations WHERE genesis_id = ?", [TEST_INSCRIPTION_ID])
            .unwrap();
        assert_eq!(refresh_current_location(TEST_INSCRIPTION_ID, &db_tx).unwrap(), None);
        assert_eq!(find_current_location(TEST_INSCRIPTION_ID, &db_tx).unwrap(), None);
    }

    #[test]
    fn reads_numbering_bounds_and_footprints() {
        let indexer = seeded_indexer();
        let conn = indexer.db_conn();
        assert_eq!(find_highest_blessed_number(conn).unwrap(), Some(7));
        assert_eq!(find_lowest_cursed_number(conn).unwrap(), Some(-1));
        assert!(is_inscription_number_assigned(-1, conn).unwrap());
        assert!(!is_inscription_number_assigned(8, conn).unwrap());

        assert_eq!(
            count_rows_in_block(&test_block_hash(775617, 0), conn).unwrap(),
            BlockFootprint {
                inscriptions: 2,
                locations: 2
            }
        );
        assert_eq!(
            count_rows_in_block(&test_block_hash(775618, 0), conn).unwrap(),
            BlockFootprint {
                inscriptions: 0,
                locations: 1
            }
        );
    }

    #[test]
    fn integrity_check_reports_breaches() {
        let indexer = seeded_indexer();
        let conn = indexer.db_conn();
        assert_eq!(check_ledger_integrity(conn).unwrap(), Vec::<String>::new());

        conn.execute(
            "UPDATE inscriptions SET number = -3 WHERE number = -1",
            [],
        )
        .unwrap();
        conn.execute(
            "INSERT INTO inscriptions SELECT 'x' || genesis_id, -1, content_type, mime_type,
                content_length, content, fee, sat_ordinal, sat_rarity, sat_coinbase_height,
                sat_coinbase_offset, curse_type, genesis_block_height, genesis_block_hash,
                genesis_tx_id, genesis_tx_index, genesis_block_index, genesis_address, timestamp
            FROM inscriptions WHERE number = -3",
            [],
        )
        .unwrap();
        conn.execute(
            "DELETE FROM current_locations WHERE genesis_id = ?",
            [TEST_INSCRIPTION_ID],
        )
        .unwrap();

        let violations = check_ledger_integrity(conn).unwrap();
        assert!(violations.iter().any(|v| v.starts_with("cursed numbers -3..=-1")));
        assert!(violations
            .iter()
            .any(|v| v.contains(TEST_INSCRIPTION_ID) && v.contains("current location")));
        // The copied row has neither a location nor a genesis row.
        assert!(violations.iter().any(|v| v.contains("has 0 genesis locations")));
    }
}
