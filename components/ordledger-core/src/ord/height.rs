use std::ops::{Add, Sub};

use super::{epoch::Epoch, sat::Sat, DIFFCHANGE_INTERVAL};

#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Height(pub u64);

impl Height {
    pub fn n(self) -> u64 {
        self.0
    }

    pub fn subsidy(self) -> u64 {
        Epoch::from(self).subsidy()
    }

    pub fn starting_sat(self) -> Sat {
        let epoch = Epoch::from(self);
        let epoch_starting_sat = epoch.starting_sat();
        let epoch_starting_height = epoch.starting_height();
        epoch_starting_sat + (self - epoch_starting_height.n()).n() * epoch.subsidy()
    }

    pub fn period_offset(self) -> u64 {
        self.0 % DIFFCHANGE_INTERVAL
    }
}

impl Add<u64> for Height {
    type Output = Self;

    fn add(self, other: u64) -> Height {
        Self(self.0 + other)
    }
}

impl Sub<u64> for Height {
    type Output = Self;

    fn sub(self, other: u64) -> Height {
        Self(self.0 - other)
    }
}

impl PartialEq<u64> for Height {
    fn eq(&self, other: &u64) -> bool {
        self.0 == *other
    }
}

#[cfg(test)]
mod tests {
    use super::super::*;
    use super::*;

    #[test]
    fn subsidy() {
        assert_eq!(Height(0).subsidy(), 5000000000);
        assert_eq!(Height(SUBSIDY_HALVING_INTERVAL - 1).subsidy(), 5000000000);
        assert_eq!(Height(SUBSIDY_HALVING_INTERVAL).subsidy(), 2500000000);
        assert_eq!(Height(SUBSIDY_HALVING_INTERVAL * 33).subsidy(), 0);
    }

    #[test]
    fn starting_sat() {
        assert_eq!(Height(0).starting_sat(), 0);
        assert_eq!(Height(1).starting_sat(), 5000000000);
        assert_eq!(
            Height(SUBSIDY_HALVING_INTERVAL - 1).starting_sat(),
            (SUBSIDY_HALVING_INTERVAL - 1) * 5000000000
        );
        assert_eq!(
            Height(SUBSIDY_HALVING_INTERVAL).starting_sat(),
            SUBSIDY_HALVING_INTERVAL * 5000000000
        );
        assert_eq!(
            Height(SUBSIDY_HALVING_INTERVAL + 1).starting_sat(),
            SUBSIDY_HALVING_INTERVAL * 5000000000 + 2500000000
        );
    }

    #[test]
    fn period_offset() {
        assert_eq!(Height(0).period_offset(), 0);
        assert_eq!(Height(1).period_offset(), 1);
        assert_eq!(Height(DIFFCHANGE_INTERVAL - 1).period_offset(), 2015);
        assert_eq!(Height(DIFFCHANGE_INTERVAL).period_offset(), 0);
        assert_eq!(Height(DIFFCHANGE_INTERVAL + 1).period_offset(), 1);
    }
}
