use super::{height::Height, sat::Sat, COIN_VALUE, SUBSIDY_HALVING_INTERVAL};

lazy_static! {
    static ref STARTING_SATS: Vec<Sat> = {
        let mut starting_sats = Vec::with_capacity(Epoch::FIRST_POST_SUBSIDY.0 as usize + 1);
        let mut sat = 0;
        for epoch in 0..=Epoch::FIRST_POST_SUBSIDY.0 {
            starting_sats.push(Sat(sat));
            sat += Epoch(epoch).subsidy() * SUBSIDY_HALVING_INTERVAL;
        }
        starting_sats
    };
}

#[derive(Copy, Clone, Eq, PartialEq, Debug, Ord, PartialOrd)]
pub struct Epoch(pub u32);

impl Epoch {
    pub const FIRST_POST_SUBSIDY: Epoch = Self(33);

    pub fn subsidy(self) -> u64 {
        if self < Self::FIRST_POST_SUBSIDY {
            (50 * COIN_VALUE) >> self.0
        } else {
            0
        }
    }

    pub fn starting_sat(self) -> Sat {
        let index = self.0.min(Self::FIRST_POST_SUBSIDY.0) as usize;
        STARTING_SATS
            .get(index)
            .copied()
            .unwrap_or(Sat(Sat::SUPPLY))
    }

    pub fn starting_height(self) -> Height {
        Height(self.0 as u64 * SUBSIDY_HALVING_INTERVAL)
    }
}

impl PartialEq<u32> for Epoch {
    fn eq(&self, other: &u32) -> bool {
        self.0 == *other
    }
}

impl From<Sat> for Epoch {
    fn from(sat: Sat) -> Self {
        let position = STARTING_SATS.partition_point(|starting_sat| *starting_sat <= sat);
        Epoch(position.saturating_sub(1) as u32)
    }
}

impl From<Height> for Epoch {
    fn from(height: Height) -> Self {
        Self((height.0 / SUBSIDY_HALVING_INTERVAL) as u32)
    }
}

#[cfg(test)]
mod tests {
    use super::super::*;
    use super::*;

    #[test]
    fn starting_sat() {
        assert_eq!(Epoch(0).starting_sat(), 0);
        assert_eq!(
            Epoch(1).starting_sat(),
            Epoch(0).subsidy() * SUBSIDY_HALVING_INTERVAL
        );
        assert_eq!(
            Epoch(2).starting_sat(),
            (Epoch(0).subsidy() + Epoch(1).subsidy()) * SUBSIDY_HALVING_INTERVAL
        );
        assert_eq!(Epoch(33).starting_sat(), Sat(Sat::SUPPLY));
        assert_eq!(Epoch(34).starting_sat(), Sat(Sat::SUPPLY));
    }

    #[test]
    fn subsidy() {
        assert_eq!(Epoch(0).subsidy(), 5000000000);
        assert_eq!(Epoch(1).subsidy(), 2500000000);
        assert_eq!(Epoch(32).subsidy(), 1);
        assert_eq!(Epoch(33).subsidy(), 0);
    }

    #[test]
    fn starting_height() {
        assert_eq!(Epoch(0).starting_height(), 0);
        assert_eq!(Epoch(1).starting_height(), SUBSIDY_HALVING_INTERVAL);
        assert_eq!(Epoch(2).starting_height(), SUBSIDY_HALVING_INTERVAL * 2);
    }

    #[test]
    fn from_height() {
        assert_eq!(Epoch::from(Height(0)), 0);
        assert_eq!(Epoch::from(Height(SUBSIDY_HALVING_INTERVAL)), 1);
        assert_eq!(Epoch::from(Height(SUBSIDY_HALVING_INTERVAL) + 1), 1);
    }

    #[test]
    fn from_sat() {
        for (epoch, starting_sat) in STARTING_SATS.iter().enumerate() {
            if epoch > 0 {
                assert_eq!(
                    Epoch::from(Sat(starting_sat.n() - 1)),
                    Epoch(epoch as u32 - 1)
                );
            }
            assert_eq!(Epoch::from(*starting_sat), Epoch(epoch as u32));
            assert_eq!(Epoch::from(*starting_sat + 1), Epoch(epoch as u32));
        }
        assert_eq!(Epoch::from(Sat(0)), 0);
        assert_eq!(Epoch::from(Sat(1)), 0);
        assert_eq!(Epoch::from(Epoch(1).starting_sat()), 1);
        assert_eq!(Epoch::from(Epoch(1).starting_sat() + 1), 1);
    }
}
