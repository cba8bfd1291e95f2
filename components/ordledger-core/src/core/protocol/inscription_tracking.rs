use rusqlite::Connection;

use crate::{
    chainhook::BlockIdentifier,
    db::ledger::{
        find_inscription_genesis, find_latest_location, find_location_in_block, LocationRecord,
        StoredLocation,
    },
    error::IndexerError,
};

use super::inscription_parsing::{InscriptionReveal, InscriptionTransfer};

pub fn build_genesis_location(
    reveal: &InscriptionReveal,
    block_identifier: &BlockIdentifier,
    timestamp: i64,
) -> LocationRecord {
    LocationRecord {
        genesis_id: reveal.inscription_id.to_string(),
        block_height: block_identifier.index,
        block_hash: block_identifier.hash.clone(),
        block_index: reveal.block_index,
        tx_id: reveal.tx_id.clone(),
        tx_index: reveal.tx_index,
        sat_point: reveal.sat_point.clone(),
        address: reveal.inscriber_address.clone(),
        value: Some(reveal.output_value),
        genesis: true,
        timestamp,
    }
}

pub fn build_transfer_location(
    transfer: &InscriptionTransfer,
    block_identifier: &BlockIdentifier,
    timestamp: i64,
) -> LocationRecord {
    LocationRecord {
        genesis_id: transfer.inscription_id.to_string(),
        block_height: block_identifier.index,
        block_hash: block_identifier.hash.clone(),
        block_index: transfer.block_index,
        tx_id: transfer.tx_id.clone(),
        tx_index: transfer.tx_index,
        sat_point: transfer.sat_point_post_transfer.clone(),
        address: transfer.updated_address.clone(),
        value: transfer.post_transfer_output_value,
        genesis: false,
        timestamp,
    }
}

/// Checks that a transfer spends the output currently holding the inscription,
/// and that it happens after the inscription's latest known movement.
/// Returns the location being moved from.
pub fn resolve_transfer_origin(
    transfer: &InscriptionTransfer,
    block_identifier: &BlockIdentifier,
    db_conn: &Connection,
) -> Result<StoredLocation, IndexerError> {
    let genesis_id = transfer.inscription_id.to_string();
    let Some(latest) = find_latest_location(&genesis_id, db_conn)? else {
        return Err(IndexerError::UnknownInscription {
            inscription_id: genesis_id,
            block_height: block_identifier.index,
        });
    };
    if latest.location.sat_point != transfer.sat_point_pre_transfer {
        return Err(IndexerError::MalformedEvent(format!(
            "transfer of {} spends {} but the inscription sits at {}",
            genesis_id, transfer.sat_point_pre_transfer, latest.location.sat_point
        )));
    }
    let moved_after_latest = (block_identifier.index, transfer.block_index)
        > (latest.location.block_height, latest.location.block_index);
    if !moved_after_latest {
        return Err(IndexerError::MalformedEvent(format!(
            "transfer of {} at block #{} index {} does not follow its latest location (block #{} index {})",
            genesis_id,
            block_identifier.index,
            transfer.block_index,
            latest.location.block_height,
            latest.location.block_index
        )));
    }
    Ok(latest)
}

/// Finds the location row written by a transfer that is being retracted.
/// Retractions walk history backwards, so that row must be the latest one.
pub fn resolve_transfer_to_retract(
    transfer: &InscriptionTransfer,
    block_identifier: &BlockIdentifier,
    db_conn: &Connection,
) -> Result<StoredLocation, IndexerError> {
    let genesis_id = transfer.inscription_id.to_string();
    let Some(stored) = find_location_in_block(
        &genesis_id,
        &block_identifier.hash,
        transfer.block_index,
        db_conn,
    )?
    else {
        if find_inscription_genesis(&genesis_id, db_conn)?.is_none() {
            return Err(IndexerError::UnknownInscription {
                inscription_id: genesis_id,
                block_height: block_identifier.index,
            });
        }
        return Err(IndexerError::MalformedEvent(format!(
            "no transfer of {} recorded at block #{} index {}",
            genesis_id, block_identifier.index, transfer.block_index
        )));
    };
    if stored.location.genesis {
        return Err(IndexerError::MalformedEvent(format!(
            "location of {} at block #{} index {} is a genesis, not a transfer",
            genesis_id, block_identifier.index, transfer.block_index
        )));
    }
    match find_latest_location(&genesis_id, db_conn)? {
        Some(latest) if latest.id == stored.id => Ok(stored),
        _ => Err(IndexerError::InvariantViolation(format!(
            "retracted transfer of {} at block #{} index {} is not its latest location",
            genesis_id, block_identifier.index, transfer.block_index
        ))),
    }
}
