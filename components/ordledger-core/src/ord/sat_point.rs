use std::{
    fmt::{Display, Formatter},
    str::FromStr,
};

use super::{parse_txid, ParseError};

/// Where a sat sits: `<tx_id>:<output_index>:<offset>`.
#[derive(Debug, PartialEq, Eq, Clone, Hash)]
pub struct SatPoint {
    pub tx_id: String,
    pub output_index: u32,
    pub offset: u64,
}

impl SatPoint {
    /// The `<tx_id>:<output_index>` part.
    pub fn output(&self) -> String {
        format!("{}:{}", self.tx_id, self.output_index)
    }
}

impl Display for SatPoint {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "{}:{}:{}", self.tx_id, self.output_index, self.offset)
    }
}

impl FromStr for SatPoint {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.split(':');
        let (Some(tx_id), Some(output_index), Some(offset), None) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return Err(ParseError::Length(s.split(':').count()));
        };
        Ok(SatPoint {
            tx_id: parse_txid(tx_id)?,
            output_index: output_index.parse().map_err(ParseError::Index)?,
            offset: offset.parse().map_err(ParseError::Offset)?,
        })
    }
}
