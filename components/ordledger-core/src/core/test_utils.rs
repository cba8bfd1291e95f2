use serde_json::json;

use crate::{
    chainhook::{
        BitcoinBlockEvent, BitcoinTransactionEvent, BitcoinTransactionMetadata, BlockIdentifier,
        ChainhookOccurrence, ChainhookPayload, OrdinalInscriptionCurseType,
        OrdinalInscriptionNumber, OrdinalInscriptionRevealData, OrdinalInscriptionTransferData,
        OrdinalOperation, TransactionIdentifier,
    },
    utils::Context,
};

pub const TEST_INSCRIPTION_ID: &str =
    "38c46a8bf7ec90bc7f6b797e7dc84baa97f4e5fd4286b92fe1b50176d03b18dci0";
pub const TEST_SATPOINT: &str =
    "38c46a8bf7ec90bc7f6b797e7dc84baa97f4e5fd4286b92fe1b50176d03b18dc:0:0";
pub const TEST_INSCRIBER_ADDRESS: &str =
    "bc1p3cyx5e2hgh53w7kpxcvm8s4kkega9gv5wfw7c4qxsvxl0u8x834qf0u2td";

pub fn get_test_ctx() -> Context {
    let logger = hiro_system_kit::log::setup_logger();
    let _guard = hiro_system_kit::log::setup_global_logger(logger.clone());
    Context {
        logger: Some(logger),
        tracer: false,
    }
}

/// `<n repeated 32 times>` as a 64 chars txid, e.g. `txid(0xab)`.
pub fn txid(byte: u8) -> String {
    format!("{:02x}", byte).repeat(32)
}

pub struct TestRevealBuilder {
    pub inscription_id: String,
    pub inscription_number: i64,
    pub ordinal_number: u64,
    pub satpoint: Option<String>,
    pub inscriber_address: Option<String>,
    pub content_type: String,
    pub content_bytes: String,
    pub curse_type: Option<OrdinalInscriptionCurseType>,
}

impl TestRevealBuilder {
    pub fn new() -> Self {
        TestRevealBuilder {
            inscription_id: TEST_INSCRIPTION_ID.to_string(),
            inscription_number: 7,
            ordinal_number: 257418248345364,
            satpoint: None,
            inscriber_address: Some(TEST_INSCRIBER_ADDRESS.to_string()),
            content_type: "image/png".to_string(),
            content_bytes: "0x48656C6C6F".to_string(),
            curse_type: None,
        }
    }

    /// Reveal of `<txid(byte)>i0`, sitting on the first output of its reveal tx.
    pub fn from_tx(byte: u8) -> Self {
        TestRevealBuilder::new().inscription_id(&format!("{}i0", txid(byte)))
    }

    pub fn inscription_id(mut self, val: &str) -> Self {
        self.inscription_id = val.to_string();
        self
    }

    pub fn inscription_number(mut self, val: i64) -> Self {
        self.inscription_number = val;
        self
    }

    pub fn ordinal_number(mut self, val: u64) -> Self {
        self.ordinal_number = val;
        self
    }

    pub fn satpoint(mut self, val: &str) -> Self {
        self.satpoint = Some(val.to_string());
        self
    }

    pub fn inscriber_address(mut self, val: Option<String>) -> Self {
        self.inscriber_address = val;
        self
    }

    pub fn content_type(mut self, val: &str) -> Self {
        self.content_type = val.to_string();
        self
    }

    pub fn curse_type(mut self, val: Option<OrdinalInscriptionCurseType>) -> Self {
        self.curse_type = val;
        self
    }

    pub fn tx_id(&self) -> String {
        self.inscription_id
            .split('i')
            .next()
            .unwrap_or_default()
            .to_string()
    }

    pub fn build(self) -> OrdinalInscriptionRevealData {
        let satpoint = self
            .satpoint
            .clone()
            .unwrap_or_else(|| format!("{}:0:0", self.tx_id()));
        OrdinalInscriptionRevealData {
            content_length: ((self.content_bytes.len() - 2) / 2) as u64,
            content_bytes: self.content_bytes,
            content_type: self.content_type,
            inscription_number: OrdinalInscriptionNumber::Classic(self.inscription_number),
            inscription_fee: 2805,
            inscription_id: self.inscription_id,
            inscription_output_value: 10000,
            inscriber_address: self.inscriber_address,
            ordinal_number: self.ordinal_number,
            ordinal_block_height: 650000,
            ordinal_offset: 0,
            satpoint_post_inscription: satpoint,
            curse_type: self.curse_type,
            tx_index: None,
            inscription_input_index: None,
        }
    }

    /// The operation, wrapped in its own transaction.
    pub fn build_transaction(self) -> BitcoinTransactionEvent {
        let tx_id = self.tx_id();
        build_transaction(
            &tx_id,
            vec![OrdinalOperation::InscriptionRevealed(self.build())],
        )
    }
}

pub struct TestTransferBuilder {
    pub inscription_id: String,
    pub updated_address: Option<String>,
    pub satpoint_pre_transfer: String,
    pub satpoint_post_transfer: String,
    pub post_transfer_output_value: Option<u64>,
}

impl TestTransferBuilder {
    pub fn new() -> Self {
        TestTransferBuilder {
            inscription_id: TEST_INSCRIPTION_ID.to_string(),
            updated_address: Some(
                "bc1qcf3dgqkdq3pn4lkqtxnxkrmhm3ysr6ff3w7mvu".to_string(),
            ),
            satpoint_pre_transfer: TEST_SATPOINT.to_string(),
            satpoint_post_transfer: format!("{}:0:0", txid(0xbb)),
            post_transfer_output_value: Some(102),
        }
    }

    pub fn inscription_id(mut self, val: &str) -> Self {
        self.inscription_id = val.to_string();
        self
    }

    pub fn updated_address(mut self, val: Option<String>) -> Self {
        self.updated_address = val;
        self
    }

    pub fn satpoint_pre_transfer(mut self, val: &str) -> Self {
        self.satpoint_pre_transfer = val.to_string();
        self
    }

    pub fn satpoint_post_transfer(mut self, val: &str) -> Self {
        self.satpoint_post_transfer = val.to_string();
        self
    }

    pub fn build(self) -> OrdinalInscriptionTransferData {
        OrdinalInscriptionTransferData {
            inscription_id: self.inscription_id,
            updated_address: self.updated_address,
            satpoint_pre_transfer: self.satpoint_pre_transfer,
            satpoint_post_transfer: self.satpoint_post_transfer,
            post_transfer_output_value: self.post_transfer_output_value,
            tx_index: None,
        }
    }

    /// The operation, wrapped in the transaction named by the post-transfer satpoint.
    pub fn build_transaction(self) -> BitcoinTransactionEvent {
        let tx_id = self
            .satpoint_post_transfer
            .split(':')
            .next()
            .unwrap_or_default()
            .to_string();
        build_transaction(
            &tx_id,
            vec![OrdinalOperation::InscriptionTransferred(self.build())],
        )
    }
}

pub fn build_transaction(tx_id: &str, operations: Vec<OrdinalOperation>) -> BitcoinTransactionEvent {
    BitcoinTransactionEvent {
        transaction_identifier: TransactionIdentifier {
            hash: tx_id.to_string(),
        },
        operations: vec![],
        metadata: BitcoinTransactionMetadata {
            ordinal_operations: operations,
            fee: None,
            index: None,
        },
    }
}

pub fn test_block_hash(height: u64, seed: u64) -> String {
    format!("{:032x}{:032x}", seed, height)
}

pub struct TestBlockBuilder {
    pub height: u64,
    pub seed: u64,
    pub timestamp: i64,
    pub transactions: Vec<BitcoinTransactionEvent>,
}

impl TestBlockBuilder {
    pub fn new(height: u64) -> Self {
        TestBlockBuilder {
            height,
            seed: 0,
            timestamp: 1677803510,
            transactions: vec![],
        }
    }

    /// Blocks built with different seeds are competing forks of one another.
    pub fn hash_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn timestamp(mut self, val: i64) -> Self {
        self.timestamp = val;
        self
    }

    pub fn transaction(mut self, tx_id: &str, operations: Vec<OrdinalOperation>) -> Self {
        self.transactions.push(build_transaction(tx_id, operations));
        self
    }

    pub fn add_transaction(mut self, transaction: BitcoinTransactionEvent) -> Self {
        self.transactions.push(transaction);
        self
    }

    pub fn block_identifier(&self) -> BlockIdentifier {
        BlockIdentifier {
            index: self.height,
            hash: test_block_hash(self.height, self.seed),
        }
    }

    pub fn build(self) -> BitcoinBlockEvent {
        BitcoinBlockEvent {
            block_identifier: BlockIdentifier {
                index: self.height,
                hash: format!("0x{}", test_block_hash(self.height, self.seed)),
            },
            parent_block_identifier: Some(BlockIdentifier {
                index: self.height.saturating_sub(1),
                hash: format!("0x{}", test_block_hash(self.height.saturating_sub(1), 0)),
            }),
            timestamp: self.timestamp,
            transactions: self.transactions,
            metadata: json!({}),
        }
    }
}

pub struct TestPayloadBuilder {
    pub apply: Vec<BitcoinBlockEvent>,
    pub rollback: Vec<BitcoinBlockEvent>,
}

impl TestPayloadBuilder {
    pub fn new() -> Self {
        TestPayloadBuilder {
            apply: vec![],
            rollback: vec![],
        }
    }

    pub fn apply(mut self, block: BitcoinBlockEvent) -> Self {
        self.apply.push(block);
        self
    }

    pub fn rollback(mut self, block: BitcoinBlockEvent) -> Self {
        self.rollback.push(block);
        self
    }

    pub fn build(self) -> ChainhookPayload {
        ChainhookPayload {
            apply: self.apply,
            rollback: self.rollback,
            chainhook: Some(ChainhookOccurrence {
                uuid: "1".to_string(),
                predicate: json!({ "scope": "ordinals_protocol", "operation": "inscription_feed" }),
                is_streaming_blocks: true,
            }),
        }
    }
}
