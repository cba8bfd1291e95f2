use thiserror::Error;

/// Failures surfaced by a block unit of work. None of them leaves state behind:
/// the block's transaction is dropped before the error reaches the caller.
#[derive(Debug, Error)]
pub enum IndexerError {
    #[error("malformed event: {0}")]
    MalformedEvent(String),

    #[error("inscription {inscription_id} referenced in block #{block_height} is unknown")]
    UnknownInscription {
        inscription_id: String,
        block_height: u64,
    },

    #[error("block #{block_height} ({block_hash}) is out of sequence: {reason}")]
    OutOfSequence {
        block_height: u64,
        block_hash: String,
        reason: String,
    },

    #[error("storage failure: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("invariant violation: {0}")]
    InvariantViolation(String),
}

impl IndexerError {
    /// Storage failures abort the unit of work and can be retried as-is.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Storage(_))
    }

    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::InvariantViolation(_))
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::MalformedEvent(_) => "malformed_event",
            Self::UnknownInscription { .. } => "unknown_inscription",
            Self::OutOfSequence { .. } => "out_of_sequence",
            Self::Storage(_) => "storage_failure",
            Self::InvariantViolation(_) => "invariant_violation",
        }
    }
}
