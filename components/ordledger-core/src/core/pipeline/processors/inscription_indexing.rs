use rusqlite::Transaction;

use crate::{
    chainhook::BlockIdentifier,
    core::protocol::{
        inscription_parsing::{BlockEvent, InscriptionOperation, InscriptionReveal, InscriptionTransfer},
        inscription_sequencing::{sequence_inscription, SequenceCursor},
        inscription_tracking::{
            build_genesis_location, build_transfer_location, resolve_transfer_origin,
            resolve_transfer_to_retract,
        },
    },
    db::ledger::{
        delete_inscription, delete_location, find_inscription_genesis, insert_inscription,
        insert_location, refresh_current_location, InscriptionRecord,
    },
    error::IndexerError,
    utils::Context,
};

/// What a block's operations did to the ledger.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct BlockActivity {
    pub reveals: u64,
    pub cursed_reveals: u64,
    pub transfers: u64,
}

/// Applies, or retracts, the operations of one block inside the caller's
/// transaction. Any error leaves the transaction to be dropped by the caller.
pub fn process_block_operations(
    block: &BlockEvent,
    db_tx: &Transaction,
    ctx: &Context,
) -> Result<BlockActivity, IndexerError> {
    let mut activity = BlockActivity::default();
    let mut sequence_cursor = SequenceCursor::new(db_tx);

    for operation in block.operations.iter() {
        match operation {
            InscriptionOperation::Reveal(reveal) => {
                let cursed = apply_reveal(
                    reveal,
                    &block.block_identifier,
                    block.timestamp,
                    &mut sequence_cursor,
                    db_tx,
                    ctx,
                )?;
                activity.reveals += 1;
                if cursed {
                    activity.cursed_reveals += 1;
                }
            }
            InscriptionOperation::Transfer(transfer) => {
                apply_transfer(transfer, &block.block_identifier, block.timestamp, db_tx, ctx)?;
                activity.transfers += 1;
            }
            InscriptionOperation::RevealUndo(reveal) => {
                retract_reveal(reveal, &block.block_identifier, db_tx, ctx)?;
                activity.reveals += 1;
            }
            InscriptionOperation::TransferUndo(transfer) => {
                retract_transfer(transfer, &block.block_identifier, db_tx, ctx)?;
                activity.transfers += 1;
            }
        }
    }
    Ok(activity)
}

/// Returns whether the inscription was cursed.
fn apply_reveal(
    reveal: &InscriptionReveal,
    block_identifier: &BlockIdentifier,
    timestamp: i64,
    sequence_cursor: &mut SequenceCursor,
    db_tx: &Transaction,
    ctx: &Context,
) -> Result<bool, IndexerError> {
    let genesis_id = reveal.inscription_id.to_string();
    if let Some(existing) = find_inscription_genesis(&genesis_id, db_tx)? {
        if existing.genesis_block_hash == block_identifier.hash
            && existing.genesis_block_index == reveal.block_index
        {
            try_debug!(ctx, "Inscription {} already revealed, skipping", genesis_id);
            return Ok(existing.number < 0);
        }
        return Err(IndexerError::MalformedEvent(format!(
            "inscription {} was already revealed in block {}",
            genesis_id, existing.genesis_block_hash
        )));
    }

    let (number, classification) =
        sequence_inscription(reveal, sequence_cursor, ctx)?;
    let sat_rarity = reveal.sat.rarity();
    let curse_type = match classification.curse_type() {
        Some(curse_type) => Some(serde_json::to_string(curse_type).map_err(|e| {
            IndexerError::MalformedEvent(format!("unable to encode curse type: {}", e))
        })?),
        None => None,
    };

    insert_inscription(
        &InscriptionRecord {
            genesis_id: genesis_id.clone(),
            number,
            content_type: reveal.content_type.clone(),
            mime_type: reveal.mime_type.clone(),
            content_length: reveal.content_length,
            content: reveal.content.clone(),
            fee: reveal.fee,
            sat_ordinal: reveal.sat.n(),
            sat_rarity,
            sat_coinbase_height: reveal.sat_coinbase_height,
            sat_coinbase_offset: reveal.sat_coinbase_offset,
            curse_type,
            genesis_block_height: block_identifier.index,
            genesis_block_hash: block_identifier.hash.clone(),
            genesis_tx_id: reveal.tx_id.clone(),
            genesis_tx_index: reveal.tx_index,
            genesis_block_index: reveal.block_index,
            genesis_address: reveal.inscriber_address.clone(),
            timestamp,
        },
        db_tx,
    )?;
    insert_location(
        &build_genesis_location(reveal, block_identifier, timestamp),
        db_tx,
    )?;
    refresh_current_location(&genesis_id, db_tx)?;
    sequence_cursor.increment(number);

    try_debug!(
        ctx,
        "Inscription {} revealed as #{} on sat {} ({})",
        genesis_id,
        number,
        reveal.sat.n(),
        sat_rarity
    );
    Ok(classification.is_cursed())
}

fn apply_transfer(
    transfer: &InscriptionTransfer,
    block_identifier: &BlockIdentifier,
    timestamp: i64,
    db_tx: &Transaction,
    ctx: &Context,
) -> Result<(), IndexerError> {
    let origin = resolve_transfer_origin(transfer, block_identifier, db_tx)?;
    insert_location(
        &build_transfer_location(transfer, block_identifier, timestamp),
        db_tx,
    )?;
    refresh_current_location(&origin.location.genesis_id, db_tx)?;
    try_debug!(
        ctx,
        "Inscription {} moved from {} to {}",
        origin.location.genesis_id,
        origin.location.sat_point,
        transfer.sat_point_post_transfer
    );
    Ok(())
}

fn retract_reveal(
    reveal: &InscriptionReveal,
    block_identifier: &BlockIdentifier,
    db_tx: &Transaction,
    ctx: &Context,
) -> Result<(), IndexerError> {
    let genesis_id = reveal.inscription_id.to_string();
    let Some(existing) = find_inscription_genesis(&genesis_id, db_tx)? else {
        return Err(IndexerError::UnknownInscription {
            inscription_id: genesis_id,
            block_height: block_identifier.index,
        });
    };
    if existing.genesis_block_hash != block_identifier.hash {
        return Err(IndexerError::MalformedEvent(format!(
            "inscription {} was revealed in block {}, not in {}",
            genesis_id, existing.genesis_block_hash, block_identifier.hash
        )));
    }
    delete_inscription(&genesis_id, db_tx)?;
    try_debug!(
        ctx,
        "Inscription {} (#{}) retracted",
        genesis_id,
        existing.number
    );
    Ok(())
}

fn retract_transfer(
    transfer: &InscriptionTransfer,
    block_identifier: &BlockIdentifier,
    db_tx: &Transaction,
    ctx: &Context,
) -> Result<(), IndexerError> {
    let retracted = resolve_transfer_to_retract(transfer, block_identifier, db_tx)?;
    delete_location(retracted.id, db_tx)?;
    let current = refresh_current_location(&retracted.location.genesis_id, db_tx)?;
    try_debug!(
        ctx,
        "Transfer of {} to {} retracted, back at {}",
        retracted.location.genesis_id,
        retracted.location.sat_point,
        current
            .map(|c| c.location.sat_point.to_string())
            .unwrap_or_default()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        chainhook::OrdinalOperation,
        core::{
            protocol::inscription_parsing::{parse_block_event, BlockDirection},
            test_utils::{get_test_ctx, TestBlockBuilder, TestRevealBuilder, TestTransferBuilder},
        },
        db::{
            ledger::{find_current_location, find_location_history},
            tests::initialize_test_db,
        },
        ord::rarity::Rarity,
    };

    #[test]
    fn reveal_then_transfer_in_one_block() {
        let mut conn = initialize_test_db();
        let ctx = get_test_ctx();
        let reveal = TestRevealBuilder::new().build();
        let transfer = TestTransferBuilder::new().build();
        let block = TestBlockBuilder::new(775617)
            .transaction(
                &reveal.inscription_id[..64],
                vec![OrdinalOperation::InscriptionRevealed(reveal.clone())],
            )
            .transaction(
                &"bb".repeat(32),
                vec![OrdinalOperation::InscriptionTransferred(transfer)],
            )
            .build();
        let event = parse_block_event(&block, BlockDirection::Apply).unwrap();

        let db_tx = conn.transaction().unwrap();
        let activity = process_block_operations(&event, &db_tx, &ctx).unwrap();
        assert_eq!(
            activity,
            BlockActivity {
                reveals: 1,
                cursed_reveals: 0,
                transfers: 1
            }
        );

        let history = find_location_history(&reveal.inscription_id, &db_tx).unwrap();
        assert_eq!(history.len(), 2);
        assert!(history[0].location.genesis);
        let current = find_current_location(&reveal.inscription_id, &db_tx).unwrap().unwrap();
        assert_eq!(current.id, history[1].id);

        let (number, rarity): (i64, String) = db_tx
            .query_row(
                "SELECT number, sat_rarity FROM inscriptions WHERE genesis_id = ?",
                [&reveal.inscription_id],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .unwrap();
        assert_eq!(number, 7);
        assert_eq!(rarity, Rarity::Common.as_str());
    }

    #[test]
    fn retracting_a_block_walks_it_backwards() {
        let mut conn = initialize_test_db();
        let ctx = get_test_ctx();
        let reveal = TestRevealBuilder::new().build();
        let block = TestBlockBuilder::new(775617)
            .transaction(
                &reveal.inscription_id[..64],
                vec![OrdinalOperation::InscriptionRevealed(reveal.clone())],
            )
            .transaction(
                &"bb".repeat(32),
                vec![OrdinalOperation::InscriptionTransferred(
                    TestTransferBuilder::new().build(),
                )],
            )
            .build();

        let db_tx = conn.transaction().unwrap();
        let applied = parse_block_event(&block, BlockDirection::Apply).unwrap();
        process_block_operations(&applied, &db_tx, &ctx).unwrap();
        let reverted = parse_block_event(&block, BlockDirection::Rollback).unwrap();
        process_block_operations(&reverted, &db_tx, &ctx).unwrap();

        let remaining: i64 = db_tx
            .query_row(
                "SELECT (SELECT COUNT(*) FROM inscriptions) + (SELECT COUNT(*) FROM locations) + (SELECT COUNT(*) FROM current_locations)",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(remaining, 0);
    }

    #[test]
    fn reveal_claimed_by_two_blocks_is_rejected() {
        let mut conn = initialize_test_db();
        let ctx = get_test_ctx();
        let reveal = TestRevealBuilder::new().build();
        let first = TestBlockBuilder::new(10)
            .transaction(
                &reveal.inscription_id[..64],
                vec![OrdinalOperation::InscriptionRevealed(reveal.clone())],
            )
            .build();
        let second = TestBlockBuilder::new(11)
            .transaction(
                &reveal.inscription_id[..64],
                vec![OrdinalOperation::InscriptionRevealed(reveal.clone())],
            )
            .build();

        let db_tx = conn.transaction().unwrap();
        let event = parse_block_event(&first, BlockDirection::Apply).unwrap();
        process_block_operations(&event, &db_tx, &ctx).unwrap();
        // Same block again is a no-op.
        process_block_operations(&event, &db_tx, &ctx).unwrap();
        let event = parse_block_event(&second, BlockDirection::Apply).unwrap();
        let err = process_block_operations(&event, &db_tx, &ctx).unwrap_err();
        assert!(matches!(err, IndexerError::MalformedEvent(_)));
    }

    #[test]
    fn retracting_an_unknown_reveal_fails() {
        let mut conn = initialize_test_db();
        let reveal = TestRevealBuilder::new().build();
        let block = TestBlockBuilder::new(10)
            .transaction(
                &reveal.inscription_id[..64],
                vec![OrdinalOperation::InscriptionRevealed(reveal.clone())],
            )
            .build();
        let db_tx = conn.transaction().unwrap();
        let event = parse_block_event(&block, BlockDirection::Rollback).unwrap();
        let err = process_block_operations(&event, &db_tx, &get_test_ctx()).unwrap_err();
        assert!(matches!(err, IndexerError::UnknownInscription { .. }));
    }
}
