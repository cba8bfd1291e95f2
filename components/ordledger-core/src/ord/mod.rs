pub mod degree;
pub mod epoch;
pub mod height;
pub mod inscription_id;
pub mod rarity;
pub mod sat;
pub mod sat_point;

use std::fmt::{Display, Formatter};

pub const DIFFCHANGE_INTERVAL: u64 = 2016;
pub const SUBSIDY_HALVING_INTERVAL: u64 = 210_000;
pub const CYCLE_EPOCHS: u64 = 6;
pub const COIN_VALUE: u64 = 100_000_000;

const TXID_LEN: usize = 64;

#[derive(Debug)]
pub enum ParseError {
    Character(char),
    Length(usize),
    Separator(char),
    Txid(String),
    Index(std::num::ParseIntError),
    Offset(std::num::ParseIntError),
}

impl Display for ParseError {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        match self {
            Self::Character(c) => write!(f, "invalid character: '{c}'"),
            Self::Length(len) => write!(f, "invalid length: {len}"),
            Self::Separator(c) => write!(f, "invalid separator: `{c}`"),
            Self::Txid(txid) => write!(f, "invalid txid: {txid}"),
            Self::Index(err) => write!(f, "invalid index: {err}"),
            Self::Offset(err) => write!(f, "invalid offset: {err}"),
        }
    }
}

impl std::error::Error for ParseError {}

/// Validates a transaction id and returns its canonical (lowercase, unprefixed) form.
pub fn parse_txid(value: &str) -> Result<String, ParseError> {
    let txid = value.strip_prefix("0x").unwrap_or(value);
    if txid.len() != TXID_LEN || !txid.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(ParseError::Txid(value.to_string()));
    }
    Ok(txid.to_ascii_lowercase())
}
