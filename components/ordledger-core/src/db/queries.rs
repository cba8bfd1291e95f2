//! Read side of the ledger.
//!
//! Every function reads inside a single transaction, so the data it returns
//! and the fingerprint attached to it come from the same snapshot. Callers
//! are expected to hold their own connection (see
//! `open_readonly_ordledger_db_conn`); the writer never blocks them under WAL.

use std::{collections::BTreeMap, str::FromStr};

use rusqlite::{Connection, Row, ToSql};
use serde_json::Value as JsonValue;

use crate::{
    chainhook::BlockIdentifier,
    ord::{inscription_id::InscriptionId, parse_txid, rarity::Rarity, sat::Sat, DIFFCHANGE_INTERVAL},
};

use super::{
    fingerprint::{get_inscription_fingerprint, get_resources_fingerprint, Fingerprint, FingerprintResource},
    ledger::find_chain_tip,
    perform_query_one, perform_query_set,
};

pub const DEFAULT_PAGE_LIMIT: u64 = 20;
pub const MAX_PAGE_LIMIT: u64 = 60;

const LISTING: &[FingerprintResource] = &[
    FingerprintResource::Inscriptions,
    FingerprintResource::Locations,
];
const STATUS: &[FingerprintResource] = &[
    FingerprintResource::Inscriptions,
    FingerprintResource::Locations,
    FingerprintResource::Blocks,
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InscriptionLookup {
    Id(String),
    Number(i64),
}

impl FromStr for InscriptionLookup {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Ok(number) = s.parse::<i64>() {
            return Ok(InscriptionLookup::Number(number));
        }
        InscriptionId::from_str(s)
            .map(|id| InscriptionLookup::Id(id.to_string()))
            .map_err(|e| format!("invalid inscription id or number {}: {}", s, e))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BlockSelector {
    Height(u64),
    Hash(String),
}

impl FromStr for BlockSelector {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Ok(height) = s.parse::<u64>() {
            return Ok(BlockSelector::Height(height));
        }
        parse_txid(s)
            .map(BlockSelector::Hash)
            .map_err(|e| format!("invalid block height or hash {}: {}", s, e))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub offset: u64,
    pub limit: u64,
}

impl Default for Page {
    fn default() -> Self {
        Page {
            offset: 0,
            limit: DEFAULT_PAGE_LIMIT,
        }
    }
}

impl Page {
    pub fn new(offset: Option<u64>, limit: Option<u64>) -> Result<Page, String> {
        let limit = limit.unwrap_or(DEFAULT_PAGE_LIMIT);
        if limit == 0 || limit > MAX_PAGE_LIMIT {
            return Err(format!("limit must be between 1 and {}", MAX_PAGE_LIMIT));
        }
        Ok(Page {
            offset: offset.unwrap_or(0),
            limit,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Paginated<T> {
    pub limit: u64,
    pub offset: u64,
    pub total: u64,
    pub results: Vec<T>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OrderBy {
    #[default]
    Number,
    GenesisBlockHeight,
    Ordinal,
}

impl FromStr for OrderBy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "number" => Ok(OrderBy::Number),
            "genesis_block_height" => Ok(OrderBy::GenesisBlockHeight),
            "ordinal" => Ok(OrderBy::Ordinal),
            _ => Err(format!("unsupported order_by {}", s)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Order {
    Asc,
    #[default]
    Desc,
}

impl FromStr for Order {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "asc" => Ok(Order::Asc),
            "desc" => Ok(Order::Desc),
            _ => Err(format!("unsupported order {}", s)),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct InscriptionFilters {
    pub genesis_id: Vec<String>,
    pub number: Vec<i64>,
    pub address: Vec<String>,
    pub genesis_address: Vec<String>,
    pub mime_type: Vec<String>,
    pub rarity: Vec<Rarity>,
    pub from_genesis_block_height: Option<u64>,
    pub to_genesis_block_height: Option<u64>,
    pub from_number: Option<i64>,
    pub to_number: Option<i64>,
    pub cursed: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InscriptionResponse {
    pub id: String,
    pub number: i64,
    pub address: Option<String>,
    pub genesis_address: Option<String>,
    pub genesis_block_height: u64,
    pub genesis_block_hash: String,
    pub genesis_tx_id: String,
    pub genesis_fee: String,
    pub genesis_timestamp: i64,
    pub tx_id: String,
    pub location: String,
    pub output: String,
    pub value: Option<String>,
    pub offset: String,
    pub sat_ordinal: String,
    pub sat_rarity: String,
    pub sat_coinbase_height: u64,
    pub mime_type: String,
    pub content_type: String,
    pub content_length: u64,
    pub timestamp: i64,
    pub curse_type: JsonValue,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LocationResponse {
    pub block_height: u64,
    pub block_hash: String,
    pub address: Option<String>,
    pub tx_id: String,
    pub location: String,
    pub output: String,
    pub value: Option<String>,
    pub offset: String,
    pub timestamp: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BlockTransferResponse {
    pub id: String,
    pub number: i64,
    pub from: LocationResponse,
    pub to: LocationResponse,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InscriptionContent {
    pub content_type: String,
    pub content: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BlockInscriptionStats {
    pub block_height: u64,
    pub block_hash: String,
    pub timestamp: i64,
    pub inscription_count: u64,
    pub inscription_count_accum: u64,
    pub blessed_count: u64,
    pub cursed_count: u64,
    pub rarity_counts: BTreeMap<Rarity, u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SatResponse {
    pub ordinal: String,
    pub coinbase_height: u64,
    pub cycle: u64,
    pub epoch: u32,
    pub period: u64,
    pub offset: u64,
    pub decimal: String,
    pub degree: String,
    pub name: String,
    pub rarity: Rarity,
    pub percentile: String,
    pub inscriptions: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatusResponse {
    pub server_version: String,
    pub status: String,
    pub block_height: Option<u64>,
    pub block_hash: Option<String>,
    pub max_inscription_number: Option<i64>,
    pub max_cursed_inscription_number: Option<i64>,
    pub total_inscriptions: u64,
    pub total_locations: u64,
}

/// Seconds since epoch, as stored, to the milliseconds served by the API.
fn to_millis(timestamp: i64) -> i64 {
    timestamp.saturating_mul(1000)
}

fn decode_curse_type(raw: Option<String>) -> JsonValue {
    match raw {
        None => JsonValue::Null,
        Some(raw) => serde_json::from_str(&raw).unwrap_or(JsonValue::String(raw)),
    }
}

const INSCRIPTION_COLUMNS: &str = "i.genesis_id, i.number, l.address, i.genesis_address, i.genesis_block_height,
    i.genesis_block_hash, i.genesis_tx_id, i.fee, i.timestamp, l.tx_id, l.satpoint_tx_id, l.output_index,
    l.output_offset, l.value, i.sat_ordinal, i.sat_rarity, i.sat_coinbase_height, i.mime_type,
    i.content_type, i.content_length, l.timestamp, i.curse_type";

const INSCRIPTION_JOIN: &str = "FROM inscriptions AS i
    INNER JOIN current_locations AS c ON c.genesis_id = i.genesis_id
    INNER JOIN locations AS l ON l.id = c.location_id";

fn map_inscription_response(row: &Row<'_>) -> Result<InscriptionResponse, rusqlite::Error> {
    let output = format!("{}:{}", row.get::<_, String>(10)?, row.get::<_, u32>(11)?);
    let offset: u64 = row.get(12)?;
    Ok(InscriptionResponse {
        id: row.get(0)?,
        number: row.get(1)?,
        address: row.get(2)?,
        genesis_address: row.get(3)?,
        genesis_block_height: row.get(4)?,
        genesis_block_hash: row.get(5)?,
        genesis_tx_id: row.get(6)?,
        genesis_fee: row.get::<_, u64>(7)?.to_string(),
        genesis_timestamp: to_millis(row.get(8)?),
        tx_id: row.get(9)?,
        location: format!("{}:{}", output, offset),
        output,
        value: row.get::<_, Option<u64>>(13)?.map(|v| v.to_string()),
        offset: offset.to_string(),
        sat_ordinal: row.get::<_, u64>(14)?.to_string(),
        sat_rarity: row.get(15)?,
        sat_coinbase_height: row.get(16)?,
        mime_type: row.get(17)?,
        content_type: row.get(18)?,
        content_length: row.get(19)?,
        timestamp: to_millis(row.get(20)?),
        curse_type: decode_curse_type(row.get(21)?),
    })
}

fn location_columns(alias: &str) -> String {
    [
        "block_height",
        "block_hash",
        "address",
        "tx_id",
        "satpoint_tx_id",
        "output_index",
        "output_offset",
        "value",
        "timestamp",
    ]
    .iter()
    .map(|column| format!("{}.{}", alias, column))
    .collect::<Vec<_>>()
    .join(", ")
}

/// Reads the 9 columns produced by `location_columns`, starting at `start`.
fn map_location_response(row: &Row<'_>, start: usize) -> Result<LocationResponse, rusqlite::Error> {
    let output = format!(
        "{}:{}",
        row.get::<_, String>(start + 4)?,
        row.get::<_, u32>(start + 5)?
    );
    let offset: u64 = row.get(start + 6)?;
    Ok(LocationResponse {
        block_height: row.get(start)?,
        block_hash: row.get(start + 1)?,
        address: row.get(start + 2)?,
        tx_id: row.get(start + 3)?,
        location: format!("{}:{}", output, offset),
        output,
        value: row.get::<_, Option<u64>>(start + 7)?.map(|v| v.to_string()),
        offset: offset.to_string(),
        timestamp: to_millis(row.get(start + 8)?),
    })
}

/// Runs `f` inside a read transaction.
fn read_snapshot<T, F>(conn: &Connection, f: F) -> Result<T, rusqlite::Error>
where
    F: FnOnce(&Connection) -> Result<T, rusqlite::Error>,
{
    let db_tx = conn.unchecked_transaction()?;
    let result = f(&*db_tx);
    // Nothing to commit, dropping ends the snapshot.
    drop(db_tx);
    result
}

fn resolve_genesis_id(
    lookup: &InscriptionLookup,
    conn: &Connection,
) -> Result<Option<String>, rusqlite::Error> {
    match lookup {
        InscriptionLookup::Id(genesis_id) => {
            let args: &[&dyn ToSql] = &[genesis_id];
            perform_query_one(
                "SELECT genesis_id FROM inscriptions WHERE genesis_id = ?",
                args,
                conn,
                |row| row.get(0),
            )
        }
        InscriptionLookup::Number(number) => {
            let args: &[&dyn ToSql] = &[number];
            perform_query_one(
                "SELECT genesis_id FROM inscriptions WHERE number = ?",
                args,
                conn,
                |row| row.get(0),
            )
        }
    }
}

/// An inscription with its current location. Looking it up by id or by
/// number yields the same payload and fingerprint.
pub fn find_inscription(
    lookup: &InscriptionLookup,
    conn: &Connection,
) -> Result<Option<(InscriptionResponse, Fingerprint)>, rusqlite::Error> {
    read_snapshot(conn, |conn| {
        let Some(genesis_id) = resolve_genesis_id(lookup, conn)? else {
            return Ok(None);
        };
        let args: &[&dyn ToSql] = &[&genesis_id];
        let inscription = perform_query_one(
            &format!("SELECT {} {} WHERE i.genesis_id = ?", INSCRIPTION_COLUMNS, INSCRIPTION_JOIN),
            args,
            conn,
            map_inscription_response,
        )?;
        let fingerprint = get_inscription_fingerprint(&genesis_id, conn)?;
        Ok(inscription.zip(fingerprint))
    })
}

pub fn find_inscription_content(
    lookup: &InscriptionLookup,
    conn: &Connection,
) -> Result<Option<(InscriptionContent, Fingerprint)>, rusqlite::Error> {
    read_snapshot(conn, |conn| {
        let Some(genesis_id) = resolve_genesis_id(lookup, conn)? else {
            return Ok(None);
        };
        let args: &[&dyn ToSql] = &[&genesis_id];
        let content = perform_query_one(
            "SELECT content_type, content FROM inscriptions WHERE genesis_id = ?",
            args,
            conn,
            |row| {
                Ok(InscriptionContent {
                    content_type: row.get(0)?,
                    content: row.get(1)?,
                })
            },
        )?;
        let fingerprint = get_inscription_fingerprint(&genesis_id, conn)?;
        Ok(content.zip(fingerprint))
    })
}

fn push_in_clause<T: ToSql + Clone + 'static>(
    column: &str,
    values: &[T],
    clauses: &mut Vec<String>,
    args: &mut Vec<Box<dyn ToSql>>,
) {
    if values.is_empty() {
        return;
    }
    let placeholders = vec!["?"; values.len()].join(", ");
    clauses.push(format!("{} IN ({})", column, placeholders));
    for value in values.iter() {
        args.push(Box::new(value.clone()));
    }
}

fn build_filters(filters: &InscriptionFilters) -> (String, Vec<Box<dyn ToSql>>) {
    let mut clauses = vec![];
    let mut args: Vec<Box<dyn ToSql>> = vec![];
    push_in_clause("i.genesis_id", &filters.genesis_id, &mut clauses, &mut args);
    push_in_clause("i.number", &filters.number, &mut clauses, &mut args);
    push_in_clause("l.address", &filters.address, &mut clauses, &mut args);
    push_in_clause(
        "i.genesis_address",
        &filters.genesis_address,
        &mut clauses,
        &mut args,
    );
    push_in_clause("i.mime_type", &filters.mime_type, &mut clauses, &mut args);
    let rarities: Vec<String> = filters
        .rarity
        .iter()
        .map(|r| r.as_str().to_string())
        .collect();
    push_in_clause("i.sat_rarity", &rarities, &mut clauses, &mut args);
    if let Some(height) = filters.from_genesis_block_height {
        clauses.push("i.genesis_block_height >= ?".into());
        args.push(Box::new(height));
    }
    if let Some(height) = filters.to_genesis_block_height {
        clauses.push("i.genesis_block_height <= ?".into());
        args.push(Box::new(height));
    }
    if let Some(number) = filters.from_number {
        clauses.push("i.number >= ?".into());
        args.push(Box::new(number));
    }
    if let Some(number) = filters.to_number {
        clauses.push("i.number <= ?".into());
        args.push(Box::new(number));
    }
    match filters.cursed {
        Some(true) => clauses.push("i.number < 0".into()),
        Some(false) => clauses.push("i.number >= 0".into()),
        None => {}
    }
    let where_clause = match clauses.is_empty() {
        true => String::new(),
        false => format!("WHERE {}", clauses.join(" AND ")),
    };
    (where_clause, args)
}

pub fn list_inscriptions(
    filters: &InscriptionFilters,
    order_by: OrderBy,
    order: Order,
    page: &Page,
    conn: &Connection,
) -> Result<(Paginated<InscriptionResponse>, Fingerprint), rusqlite::Error> {
    read_snapshot(conn, |conn| {
        let (where_clause, mut args) = build_filters(filters);
        let direction = match order {
            Order::Asc => "ASC",
            Order::Desc => "DESC",
        };
        let order_clause = match order_by {
            OrderBy::Number => format!("i.number {}", direction),
            OrderBy::GenesisBlockHeight => format!(
                "i.genesis_block_height {d}, i.genesis_block_index {d}",
                d = direction
            ),
            OrderBy::Ordinal => format!("i.sat_ordinal {d}, i.number {d}", d = direction),
        };

        let refs: Vec<&dyn ToSql> = args.iter().map(|a| a.as_ref()).collect();
        let total: u64 = perform_query_one(
            &format!("SELECT COUNT(*) {} {}", INSCRIPTION_JOIN, where_clause),
            &refs,
            conn,
            |row| row.get(0),
        )?
        .unwrap_or(0);

        args.push(Box::new(page.limit));
        args.push(Box::new(page.offset));
        let refs: Vec<&dyn ToSql> = args.iter().map(|a| a.as_ref()).collect();
        let results = perform_query_set(
            &format!(
                "SELECT {} {} {} ORDER BY {} LIMIT ? OFFSET ?",
                INSCRIPTION_COLUMNS, INSCRIPTION_JOIN, where_clause, order_clause
            ),
            &refs,
            conn,
            map_inscription_response,
        )?;
        let fingerprint = get_resources_fingerprint(LISTING, conn)?;
        Ok((
            Paginated {
                limit: page.limit,
                offset: page.offset,
                total,
                results,
            },
            fingerprint,
        ))
    })
}

/// Every location of an inscription, oldest first.
pub fn find_location_history(
    lookup: &InscriptionLookup,
    page: &Page,
    conn: &Connection,
) -> Result<Option<(Paginated<LocationResponse>, Fingerprint)>, rusqlite::Error> {
    read_snapshot(conn, |conn| {
        let Some(genesis_id) = resolve_genesis_id(lookup, conn)? else {
            return Ok(None);
        };
        let args: &[&dyn ToSql] = &[&genesis_id];
        let total: u64 = perform_query_one(
            "SELECT COUNT(*) FROM locations WHERE genesis_id = ?",
            args,
            conn,
            |row| row.get(0),
        )?
        .unwrap_or(0);
        let args: &[&dyn ToSql] = &[&genesis_id, &page.limit, &page.offset];
        let results = perform_query_set(
            &format!(
                "SELECT {} FROM locations AS l WHERE l.genesis_id = ?
                ORDER BY l.block_height ASC, l.block_index ASC LIMIT ? OFFSET ?",
                location_columns("l")
            ),
            args,
            conn,
            |row| map_location_response(row, 0),
        )?;
        let Some(fingerprint) = get_inscription_fingerprint(&genesis_id, conn)? else {
            return Ok(None);
        };
        Ok(Some((
            Paginated {
                limit: page.limit,
                offset: page.offset,
                total,
                results,
            },
            fingerprint,
        )))
    })
}

/// Transfers recorded in one block, each with the location it moved from.
pub fn find_block_transfers(
    block: &BlockSelector,
    page: &Page,
    conn: &Connection,
) -> Result<(Paginated<BlockTransferResponse>, Fingerprint), rusqlite::Error> {
    read_snapshot(conn, |conn| {
        let (block_clause, block_arg): (&str, Box<dyn ToSql>) = match block {
            BlockSelector::Height(height) => ("l.block_height = ?", Box::new(*height)),
            BlockSelector::Hash(hash) => ("l.block_hash = ?", Box::new(hash.clone())),
        };
        let total: u64 = perform_query_one(
            &format!(
                "SELECT COUNT(*) FROM locations AS l WHERE l.genesis = 0 AND {}",
                block_clause
            ),
            &[block_arg.as_ref()],
            conn,
            |row| row.get(0),
        )?
        .unwrap_or(0);
        let args: &[&dyn ToSql] = &[block_arg.as_ref(), &page.limit, &page.offset];
        let results = perform_query_set(
            &format!(
                "SELECT i.genesis_id, i.number, {}, {}
                FROM locations AS l
                INNER JOIN inscriptions AS i ON i.genesis_id = l.genesis_id
                INNER JOIN locations AS p ON p.id = (
                    SELECT p2.id FROM locations AS p2
                    WHERE p2.genesis_id = l.genesis_id
                        AND (p2.block_height < l.block_height
                            OR (p2.block_height = l.block_height AND p2.block_index < l.block_index))
                    ORDER BY p2.block_height DESC, p2.block_index DESC LIMIT 1
                )
                WHERE l.genesis = 0 AND {}
                ORDER BY l.block_index ASC LIMIT ? OFFSET ?",
                location_columns("p"),
                location_columns("l"),
                block_clause
            ),
            args,
            conn,
            |row| {
                Ok(BlockTransferResponse {
                    id: row.get(0)?,
                    number: row.get(1)?,
                    from: map_location_response(row, 2)?,
                    to: map_location_response(row, 11)?,
                })
            },
        )?;
        let fingerprint = get_resources_fingerprint(LISTING, conn)?;
        Ok((
            Paginated {
                limit: page.limit,
                offset: page.offset,
                total,
                results,
            },
            fingerprint,
        ))
    })
}

/// Inscription counts per genesis block, newest first.
pub fn find_inscriptions_per_block(
    from_block_height: Option<u64>,
    to_block_height: Option<u64>,
    page: &Page,
    conn: &Connection,
) -> Result<(Paginated<BlockInscriptionStats>, Fingerprint), rusqlite::Error> {
    read_snapshot(conn, |conn| {
        let from = from_block_height.unwrap_or(0);
        let to = to_block_height.unwrap_or(i64::MAX as u64);
        let args: &[&dyn ToSql] = &[&from, &to];
        let total: u64 = perform_query_one(
            "SELECT COUNT(DISTINCT genesis_block_height) FROM inscriptions
            WHERE genesis_block_height >= ? AND genesis_block_height <= ?",
            args,
            conn,
            |row| row.get(0),
        )?
        .unwrap_or(0);

        let args: &[&dyn ToSql] = &[&from, &to, &page.limit, &page.offset];
        let mut results = perform_query_set(
            "SELECT i.genesis_block_height, i.genesis_block_hash, COALESCE(b.timestamp, MAX(i.timestamp)),
                COUNT(*), SUM(CASE WHEN i.number >= 0 THEN 1 ELSE 0 END),
                (SELECT COUNT(*) FROM inscriptions AS a WHERE a.genesis_block_height <= i.genesis_block_height)
            FROM inscriptions AS i
            LEFT JOIN blocks AS b ON b.block_height = i.genesis_block_height
            WHERE i.genesis_block_height >= ? AND i.genesis_block_height <= ?
            GROUP BY i.genesis_block_height
            ORDER BY i.genesis_block_height DESC LIMIT ? OFFSET ?",
            args,
            conn,
            |row| {
                let inscription_count: u64 = row.get(3)?;
                let blessed_count: u64 = row.get(4)?;
                Ok(BlockInscriptionStats {
                    block_height: row.get(0)?,
                    block_hash: row.get(1)?,
                    timestamp: to_millis(row.get(2)?),
                    inscription_count,
                    inscription_count_accum: row.get(5)?,
                    blessed_count,
                    cursed_count: inscription_count - blessed_count,
                    rarity_counts: BTreeMap::new(),
                })
            },
        )?;
        for stats in results.iter_mut() {
            let args: &[&dyn ToSql] = &[&stats.block_height];
            let counts = perform_query_set(
                "SELECT sat_rarity, COUNT(*) FROM inscriptions WHERE genesis_block_height = ? GROUP BY sat_rarity",
                args,
                conn,
                |row| Ok((row.get::<_, String>(0)?, row.get::<_, u64>(1)?)),
            )?;
            for (rarity, count) in counts {
                if let Ok(rarity) = Rarity::from_str(&rarity) {
                    stats.rarity_counts.insert(rarity, count);
                }
            }
        }
        let fingerprint = get_resources_fingerprint(
            &[FingerprintResource::Inscriptions, FingerprintResource::Blocks],
            conn,
        )?;
        Ok((
            Paginated {
                limit: page.limit,
                offset: page.offset,
                total,
                results,
            },
            fingerprint,
        ))
    })
}

/// `None` for ordinals past the last sat.
pub fn find_sat(
    ordinal: u64,
    conn: &Connection,
) -> Result<Option<(SatResponse, Fingerprint)>, rusqlite::Error> {
    let sat = Sat(ordinal);
    if !sat.is_valid() {
        return Ok(None);
    }
    read_snapshot(conn, |conn| {
        let args: &[&dyn ToSql] = &[&ordinal];
        let inscriptions = perform_query_set(
            "SELECT genesis_id FROM inscriptions WHERE sat_ordinal = ?
            ORDER BY genesis_block_height ASC, genesis_block_index ASC",
            args,
            conn,
            |row| row.get(0),
        )?;
        let height = sat.height().n();
        let response = SatResponse {
            ordinal: ordinal.to_string(),
            coinbase_height: height,
            cycle: sat.cycle(),
            epoch: sat.epoch().0,
            period: height / DIFFCHANGE_INTERVAL,
            offset: sat.third(),
            decimal: format!("{}.{}", height, sat.third()),
            degree: sat.degree().to_string(),
            name: sat.name(),
            rarity: sat.rarity(),
            percentile: sat.percentile(),
            inscriptions,
        };
        let fingerprint = get_resources_fingerprint(LISTING, conn)?;
        Ok(Some((response, fingerprint)))
    })
}

pub fn find_status(conn: &Connection) -> Result<(StatusResponse, Fingerprint), rusqlite::Error> {
    read_snapshot(conn, |conn| {
        let tip: Option<BlockIdentifier> = find_chain_tip(conn)?;
        let (max_blessed, min_cursed, total_inscriptions): (Option<i64>, Option<i64>, u64) = conn
            .query_row(
                "SELECT MAX(CASE WHEN number >= 0 THEN number END), MIN(CASE WHEN number < 0 THEN number END), COUNT(*)
                FROM inscriptions",
                [],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )?;
        let total_locations: u64 =
            conn.query_row("SELECT COUNT(*) FROM locations", [], |row| row.get(0))?;
        let fingerprint = get_resources_fingerprint(STATUS, conn)?;
        Ok((
            StatusResponse {
                server_version: format!("ordledger v{}", env!("CARGO_PKG_VERSION")),
                status: "ready".into(),
                block_height: tip.as_ref().map(|t| t.index),
                block_hash: tip.map(|t| t.hash),
                max_inscription_number: max_blessed,
                max_cursed_inscription_number: min_cursed,
                total_inscriptions,
                total_locations,
            },
            fingerprint,
        ))
    })
}
