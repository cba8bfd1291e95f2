use std::str::FromStr;

use crate::{
    chainhook::{
        BitcoinBlockEvent, BlockIdentifier, ChainhookPayload, OrdinalInscriptionCurseType,
        OrdinalInscriptionRevealData, OrdinalInscriptionTransferData, OrdinalOperation,
    },
    error::IndexerError,
    ord::{inscription_id::InscriptionId, parse_txid, sat::Sat, sat_point::SatPoint},
    utils::{decode_prefixed_hex, normalize_hex_identifier},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockDirection {
    Apply,
    Rollback,
}

/// One block of a payload, decoded and ready for the event applier.
#[derive(Debug, Clone, PartialEq)]
pub struct BlockEvent {
    pub direction: BlockDirection,
    pub block_identifier: BlockIdentifier,
    pub parent_block_identifier: Option<BlockIdentifier>,
    pub timestamp: i64,
    pub operations: Vec<InscriptionOperation>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum InscriptionOperation {
    Reveal(InscriptionReveal),
    Transfer(InscriptionTransfer),
    RevealUndo(InscriptionReveal),
    TransferUndo(InscriptionTransfer),
}

#[derive(Debug, Clone, PartialEq)]
pub struct InscriptionReveal {
    pub inscription_id: InscriptionId,
    pub tx_id: String,
    pub tx_index: u32,
    pub block_index: u32,
    pub content: Vec<u8>,
    pub content_type: String,
    pub mime_type: String,
    pub content_length: u64,
    pub number_hint: i64,
    pub fee: u64,
    pub output_value: u64,
    pub inscriber_address: Option<String>,
    pub sat: Sat,
    pub sat_coinbase_height: u64,
    pub sat_coinbase_offset: u64,
    pub sat_point: SatPoint,
    pub curse_type: Option<OrdinalInscriptionCurseType>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct InscriptionTransfer {
    pub inscription_id: InscriptionId,
    pub tx_id: String,
    pub tx_index: u32,
    pub block_index: u32,
    pub updated_address: Option<String>,
    pub sat_point_pre_transfer: SatPoint,
    pub sat_point_post_transfer: SatPoint,
    pub post_transfer_output_value: Option<u64>,
}

/// `image/svg+xml; charset=utf-8` -> `image/svg+xml`
pub fn get_mime_type(content_type: &str) -> String {
    content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase()
}

pub fn parse_payload_bytes(bytes: &[u8]) -> Result<ChainhookPayload, IndexerError> {
    serde_json::from_slice(bytes)
        .map_err(|e| IndexerError::MalformedEvent(format!("unable to decode payload: {}", e)))
}

/// Decodes a payload into the ordered list of block events to process:
/// rollbacks first, from the highest block down, then applies from the
/// lowest block up.
pub fn parse_chainhook_payload(payload: &ChainhookPayload) -> Result<Vec<BlockEvent>, IndexerError> {
    let mut rollback = payload
        .rollback
        .iter()
        .map(|block| parse_block_event(block, BlockDirection::Rollback))
        .collect::<Result<Vec<_>, _>>()?;
    rollback.sort_by(|a, b| b.block_identifier.index.cmp(&a.block_identifier.index));

    let mut apply = payload
        .apply
        .iter()
        .map(|block| parse_block_event(block, BlockDirection::Apply))
        .collect::<Result<Vec<_>, _>>()?;
    apply.sort_by(|a, b| a.block_identifier.index.cmp(&b.block_identifier.index));

    rollback.extend(apply);
    Ok(rollback)
}

pub fn parse_block_event(
    block: &BitcoinBlockEvent,
    direction: BlockDirection,
) -> Result<BlockEvent, IndexerError> {
    let block_identifier = parse_block_identifier(&block.block_identifier)?;
    let parent_block_identifier = match &block.parent_block_identifier {
        Some(parent) => Some(parse_block_identifier(parent)?),
        None => None,
    };

    let mut operations = vec![];
    let mut block_index = 0u32;
    for (position, tx) in block.transactions.iter().enumerate() {
        let tx_id = parse_txid(&tx.transaction_identifier.hash).map_err(|e| {
            IndexerError::MalformedEvent(format!(
                "block #{}: {}",
                block_identifier.index, e
            ))
        })?;
        let default_tx_index = tx.metadata.index.unwrap_or(position as u32);
        for operation in tx.metadata.ordinal_operations.iter() {
            let decoded = match operation {
                OrdinalOperation::InscriptionRevealed(data) => InscriptionOperation::Reveal(
                    parse_reveal(data, &tx_id, default_tx_index, block_index)?,
                ),
                OrdinalOperation::InscriptionTransferred(data) => InscriptionOperation::Transfer(
                    parse_transfer(data, &tx_id, default_tx_index, block_index)?,
                ),
            };
            operations.push(decoded);
            block_index += 1;
        }
    }

    // Undo walks the block backwards, so that the last movement is retracted first.
    if direction == BlockDirection::Rollback {
        operations = operations
            .into_iter()
            .rev()
            .map(|operation| match operation {
                InscriptionOperation::Reveal(reveal) => InscriptionOperation::RevealUndo(reveal),
                InscriptionOperation::Transfer(transfer) => {
                    InscriptionOperation::TransferUndo(transfer)
                }
                undo => undo,
            })
            .collect();
    }

    Ok(BlockEvent {
        direction,
        block_identifier,
        parent_block_identifier,
        timestamp: block.timestamp,
        operations,
    })
}

fn parse_block_identifier(block_identifier: &BlockIdentifier) -> Result<BlockIdentifier, IndexerError> {
    let hash = normalize_hex_identifier(&block_identifier.hash);
    if hash.is_empty() || !hash.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(IndexerError::MalformedEvent(format!(
            "block #{} has an invalid hash {}",
            block_identifier.index, block_identifier.hash
        )));
    }
    Ok(BlockIdentifier {
        index: block_identifier.index,
        hash,
    })
}

fn malformed<E: std::fmt::Display>(field: &str, value: &str, e: E) -> IndexerError {
    IndexerError::MalformedEvent(format!("invalid {} {}: {}", field, value, e))
}

pub fn parse_reveal(
    data: &OrdinalInscriptionRevealData,
    tx_id: &str,
    default_tx_index: u32,
    block_index: u32,
) -> Result<InscriptionReveal, IndexerError> {
    let inscription_id = InscriptionId::from_str(&data.inscription_id)
        .map_err(|e| malformed("inscription id", &data.inscription_id, e))?;
    let sat_point = SatPoint::from_str(&data.satpoint_post_inscription)
        .map_err(|e| malformed("satpoint", &data.satpoint_post_inscription, e))?;
    let content = decode_prefixed_hex(&data.content_bytes)
        .map_err(|e| malformed("content bytes of", &data.inscription_id, e))?;
    let sat = Sat(data.ordinal_number);
    if !sat.is_valid() {
        return Err(malformed(
            "ordinal number",
            &data.ordinal_number.to_string(),
            "beyond the last sat",
        ));
    }
    Ok(InscriptionReveal {
        inscription_id,
        tx_id: tx_id.to_string(),
        tx_index: data.tx_index.unwrap_or(default_tx_index),
        block_index,
        content,
        mime_type: get_mime_type(&data.content_type),
        content_type: data.content_type.clone(),
        content_length: data.content_length,
        number_hint: data.inscription_number.classic(),
        fee: data.inscription_fee,
        output_value: data.inscription_output_value,
        inscriber_address: data.inscriber_address.clone(),
        sat,
        sat_coinbase_height: data.ordinal_block_height,
        sat_coinbase_offset: data.ordinal_offset,
        sat_point,
        curse_type: data.curse_type.clone(),
    })
}

pub fn parse_transfer(
    data: &OrdinalInscriptionTransferData,
    tx_id: &str,
    default_tx_index: u32,
    block_index: u32,
) -> Result<InscriptionTransfer, IndexerError> {
    let inscription_id = InscriptionId::from_str(&data.inscription_id)
        .map_err(|e| malformed("inscription id", &data.inscription_id, e))?;
    let sat_point_pre_transfer = SatPoint::from_str(&data.satpoint_pre_transfer)
        .map_err(|e| malformed("satpoint", &data.satpoint_pre_transfer, e))?;
    let sat_point_post_transfer = SatPoint::from_str(&data.satpoint_post_transfer)
        .map_err(|e| malformed("satpoint", &data.satpoint_post_transfer, e))?;
    Ok(InscriptionTransfer {
        inscription_id,
        tx_id: tx_id.to_string(),
        tx_index: data.tx_index.unwrap_or(default_tx_index),
        block_index,
        updated_address: data.updated_address.clone(),
        sat_point_pre_transfer,
        sat_point_post_transfer,
        post_transfer_output_value: data.post_transfer_output_value,
    })
}

#[cfg(test)]
mod tests {
    use test_case::test_case;

    use super::*;
    use crate::core::test_utils::{
        TestBlockBuilder, TestPayloadBuilder, TestRevealBuilder, TestTransferBuilder,
    };

    #[test_case("text/plain;charset=utf-8" => "text/plain".to_string(); "with parameters")]
    #[test_case("image/PNG" => "image/png".to_string(); "upper case")]
    #[test_case("" => "".to_string(); "empty")]
    fn extracts_mime_types(content_type: &str) -> String {
        get_mime_type(content_type)
    }

    #[test]
    fn orders_rollbacks_before_applies() {
        let payload = TestPayloadBuilder::new()
            .apply(TestBlockBuilder::new(12).build())
            .apply(TestBlockBuilder::new(11).build())
            .rollback(TestBlockBuilder::new(10).hash_seed(1).build())
            .rollback(TestBlockBuilder::new(11).hash_seed(1).build())
            .build();
        let events = parse_chainhook_payload(&payload).unwrap();
        let order: Vec<_> = events
            .iter()
            .map(|e| (e.direction, e.block_identifier.index))
            .collect();
        assert_eq!(
            order,
            vec![
                (BlockDirection::Rollback, 11),
                (BlockDirection::Rollback, 10),
                (BlockDirection::Apply, 11),
                (BlockDirection::Apply, 12),
            ]
        );
    }

    #[test]
    fn normalizes_identifiers() {
        let payload = TestPayloadBuilder::new()
            .apply(
                TestBlockBuilder::new(775617)
                    .transaction("0x38C46A8BF7EC90BC7F6B797E7DC84BAA97F4E5FD4286B92FE1B50176D03B18DC", vec![
                        OrdinalOperation::InscriptionRevealed(TestRevealBuilder::new().build()),
                    ])
                    .build(),
            )
            .build();
        let events = parse_chainhook_payload(&payload).unwrap();
        assert!(!events[0].block_identifier.hash.starts_with("0x"));
        let InscriptionOperation::Reveal(reveal) = &events[0].operations[0] else {
            panic!("expected a reveal");
        };
        assert_eq!(
            reveal.tx_id,
            "38c46a8bf7ec90bc7f6b797e7dc84baa97f4e5fd4286b92fe1b50176d03b18dc"
        );
        assert_eq!(reveal.content, b"Hello".to_vec());
        assert_eq!(reveal.sat_point.output_index, 0);
    }

    #[test]
    fn rollbacks_are_reversed_into_undos() {
        let reveal = TestRevealBuilder::new().build();
        let transfer = TestTransferBuilder::new().build();
        let block = TestBlockBuilder::new(5)
            .transaction(
                &"aa".repeat(32),
                vec![
                    OrdinalOperation::InscriptionRevealed(reveal),
                    OrdinalOperation::InscriptionTransferred(transfer),
                ],
            )
            .build();

        let applied = parse_block_event(&block, BlockDirection::Apply).unwrap();
        assert!(matches!(applied.operations[0], InscriptionOperation::Reveal(ref r) if r.block_index == 0));
        assert!(matches!(applied.operations[1], InscriptionOperation::Transfer(ref t) if t.block_index == 1));

        let reverted = parse_block_event(&block, BlockDirection::Rollback).unwrap();
        assert!(matches!(reverted.operations[0], InscriptionOperation::TransferUndo(ref t) if t.block_index == 1));
        assert!(matches!(reverted.operations[1], InscriptionOperation::RevealUndo(ref r) if r.block_index == 0));
    }

    #[test]
    fn rejects_malformed_fields() {
        let mut reveal = TestRevealBuilder::new().build();
        reveal.satpoint_post_inscription = "nope".into();
        let err = parse_reveal(&reveal, &"aa".repeat(32), 0, 0).unwrap_err();
        assert!(matches!(err, IndexerError::MalformedEvent(_)));

        let mut reveal = TestRevealBuilder::new().build();
        reveal.content_bytes = "48656C6C6F".into();
        assert!(parse_reveal(&reveal, &"aa".repeat(32), 0, 0).is_err());

        let mut reveal = TestRevealBuilder::new().build();
        reveal.ordinal_number = Sat::SUPPLY;
        assert!(parse_reveal(&reveal, &"aa".repeat(32), 0, 0).is_err());

        let mut transfer = TestTransferBuilder::new().build();
        transfer.inscription_id = "xyz".into();
        assert!(parse_transfer(&transfer, &"aa".repeat(32), 0, 0).is_err());
    }

    #[test]
    fn rejects_unknown_operation_tags() {
        let raw = br#"{"apply":[{"block_identifier":{"index":1,"hash":"0xaa"},"parent_block_identifier":null,"timestamp":0,
            "transactions":[{"transaction_identifier":{"hash":"0xaa"},"operations":[],
            "metadata":{"ordinal_operations":[{"inscription_burned":{}}]}}],"metadata":{}}],"rollback":[]}"#;
        assert!(matches!(
            parse_payload_bytes(raw),
            Err(IndexerError::MalformedEvent(_))
        ));
    }
}
