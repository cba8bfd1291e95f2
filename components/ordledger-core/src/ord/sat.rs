use std::ops::{Add, AddAssign};

use super::{degree::Degree, epoch::Epoch, height::Height, rarity::Rarity, CYCLE_EPOCHS};

#[derive(Copy, Clone, Eq, PartialEq, Debug, Ord, PartialOrd, Deserialize, Serialize)]
#[serde(transparent)]
pub struct Sat(pub u64);

impl Sat {
    pub const LAST: Self = Self(Self::SUPPLY - 1);
    pub const SUPPLY: u64 = 2099999997690000;

    pub fn n(self) -> u64 {
        self.0
    }

    /// Ordinals past the last mined sat do not designate anything.
    pub fn is_valid(self) -> bool {
        self.0 < Self::SUPPLY
    }

    /// Height of the block whose coinbase created this sat.
    pub fn height(self) -> Height {
        let epoch = self.epoch();
        match self.epoch_position().checked_div(epoch.subsidy()) {
            Some(blocks) => epoch.starting_height() + blocks,
            None => epoch.starting_height(),
        }
    }

    pub fn cycle(self) -> u64 {
        Epoch::from(self).0 as u64 / CYCLE_EPOCHS
    }

    pub fn percentile(self) -> String {
        format!("{}%", (self.0 as f64 / Self::LAST.0 as f64) * 100.0)
    }

    pub fn epoch(self) -> Epoch {
        self.into()
    }

    /// Position of the sat within its block's subsidy.
    pub fn third(self) -> u64 {
        self.epoch_position()
            .checked_rem(self.epoch().subsidy())
            .unwrap_or(0)
    }

    pub fn epoch_position(self) -> u64 {
        self.0 - self.epoch().starting_sat().0
    }

    pub fn degree(self) -> Degree {
        self.into()
    }

    pub fn rarity(self) -> Rarity {
        self.into()
    }

    /// Cheaper than `rarity()` when only commonness matters.
    pub fn is_common(self) -> bool {
        self.third() != 0
    }

    pub fn name(self) -> String {
        let mut x = Self::SUPPLY.saturating_sub(self.0);
        let mut name = Vec::new();
        while x > 0 {
            name.push(b'a' + ((x - 1) % 26) as u8);
            x = (x - 1) / 26;
        }
        name.iter().rev().map(|c| *c as char).collect()
    }
}

impl PartialEq<u64> for Sat {
    fn eq(&self, other: &u64) -> bool {
        self.0 == *other
    }
}

impl PartialOrd<u64> for Sat {
    fn partial_cmp(&self, other: &u64) -> Option<std::cmp::Ordering> {
        self.0.partial_cmp(other)
    }
}

impl Add<u64> for Sat {
    type Output = Self;

    fn add(self, other: u64) -> Sat {
        Sat(self.0 + other)
    }
}

impl AddAssign<u64> for Sat {
    fn add_assign(&mut self, other: u64) {
        *self = Sat(self.0 + other);
    }
}
