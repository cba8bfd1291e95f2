//! Wire types of the payloads posted by the chain-event forwarder for an
//! `ordinals_protocol` / `inscription_feed` predicate.
//!
//! These mirror the JSON as sent. Identifiers, satpoints and content stay
//! strings here; `core::protocol::inscription_parsing` turns them into
//! structured values and rejects the payload if any of them is malformed.

pub mod registration;

use serde_json::Value as JsonValue;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Deserialize, Serialize)]
pub struct BlockIdentifier {
    pub index: u64,
    pub hash: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Deserialize, Serialize)]
pub struct TransactionIdentifier {
    pub hash: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ChainhookPayload {
    #[serde(default)]
    pub apply: Vec<BitcoinBlockEvent>,
    #[serde(default)]
    pub rollback: Vec<BitcoinBlockEvent>,
    pub chainhook: Option<ChainhookOccurrence>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ChainhookOccurrence {
    pub uuid: String,
    #[serde(default)]
    pub predicate: JsonValue,
    #[serde(default)]
    pub is_streaming_blocks: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BitcoinBlockEvent {
    pub block_identifier: BlockIdentifier,
    pub parent_block_identifier: Option<BlockIdentifier>,
    pub timestamp: i64,
    #[serde(default)]
    pub transactions: Vec<BitcoinTransactionEvent>,
    #[serde(default)]
    pub metadata: JsonValue,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BitcoinTransactionEvent {
    pub transaction_identifier: TransactionIdentifier,
    #[serde(default)]
    pub operations: Vec<JsonValue>,
    #[serde(default)]
    pub metadata: BitcoinTransactionMetadata,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct BitcoinTransactionMetadata {
    #[serde(default)]
    pub ordinal_operations: Vec<OrdinalOperation>,
    pub fee: Option<u64>,
    pub index: Option<u32>,
}

/// Unknown operation tags fail deserialization, rejecting the whole payload.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OrdinalOperation {
    InscriptionRevealed(OrdinalInscriptionRevealData),
    InscriptionTransferred(OrdinalInscriptionTransferData),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum OrdinalInscriptionNumber {
    Classic(i64),
    Dual { classic: i64, jubilee: i64 },
}

impl OrdinalInscriptionNumber {
    pub fn classic(&self) -> i64 {
        match self {
            Self::Classic(number) => *number,
            Self::Dual { classic, .. } => *classic,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OrdinalInscriptionCurseType {
    DuplicateField,
    IncompleteField,
    NotAtOffsetZero,
    NotInFirstInput,
    Pointer,
    Pushnum,
    Reinscription,
    Stutter,
    UnrecognizedEvenField,
    Generic,
    Tag(u8),
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct OrdinalInscriptionRevealData {
    pub content_bytes: String,
    pub content_type: String,
    pub content_length: u64,
    pub inscription_number: OrdinalInscriptionNumber,
    pub inscription_fee: u64,
    pub inscription_id: String,
    pub inscription_output_value: u64,
    pub inscriber_address: Option<String>,
    pub ordinal_number: u64,
    pub ordinal_block_height: u64,
    pub ordinal_offset: u64,
    pub satpoint_post_inscription: String,
    pub curse_type: Option<OrdinalInscriptionCurseType>,
    pub tx_index: Option<u32>,
    pub inscription_input_index: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct OrdinalInscriptionTransferData {
    pub inscription_id: String,
    pub updated_address: Option<String>,
    pub satpoint_pre_transfer: String,
    pub satpoint_post_transfer: String,
    pub post_transfer_output_value: Option<u64>,
    pub tx_index: Option<u32>,
}
