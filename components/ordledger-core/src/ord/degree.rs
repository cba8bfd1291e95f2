use std::fmt::{Display, Formatter};

use super::{sat::Sat, CYCLE_EPOCHS, DIFFCHANGE_INTERVAL, SUBSIDY_HALVING_INTERVAL};

/// Position of a sat in the halving cycle, the halving epoch, the difficulty
/// period and its block.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub struct Degree {
    pub hour: u64,
    pub minute: u64,
    pub second: u64,
    pub third: u64,
}

impl Display for Degree {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "{}°{}′{}″{}‴",
            self.hour, self.minute, self.second, self.third
        )
    }
}

impl From<Sat> for Degree {
    fn from(sat: Sat) -> Self {
        let height = sat.height().n();
        Degree {
            hour: height / (CYCLE_EPOCHS * SUBSIDY_HALVING_INTERVAL),
            minute: height % SUBSIDY_HALVING_INTERVAL,
            second: height % DIFFCHANGE_INTERVAL,
            third: sat.third(),
        }
    }
}
