use std::{
    fmt::{Display, Formatter},
    str::FromStr,
};

use super::{degree::Degree, sat::Sat};

#[derive(Debug, PartialEq, PartialOrd, Eq, Ord, Copy, Clone, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Rarity {
    Common,
    Uncommon,
    Rare,
    Epic,
    Legendary,
    Mythic,
}

impl Rarity {
    pub const ALL: [Rarity; 6] = [
        Rarity::Common,
        Rarity::Uncommon,
        Rarity::Rare,
        Rarity::Epic,
        Rarity::Legendary,
        Rarity::Mythic,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Common => "common",
            Self::Uncommon => "uncommon",
            Self::Rare => "rare",
            Self::Epic => "epic",
            Self::Legendary => "legendary",
            Self::Mythic => "mythic",
        }
    }
}

impl Display for Rarity {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl From<Sat> for Rarity {
    fn from(sat: Sat) -> Self {
        let Degree {
            hour,
            minute,
            second,
            third,
        } = sat.degree();

        if hour == 0 && minute == 0 && second == 0 && third == 0 {
            Self::Mythic
        } else if minute == 0 && second == 0 && third == 0 {
            Self::Legendary
        } else if minute == 0 && third == 0 {
            Self::Epic
        } else if second == 0 && third == 0 {
            Self::Rare
        } else if third == 0 {
            Self::Uncommon
        } else {
            Self::Common
        }
    }
}

impl FromStr for Rarity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Rarity::ALL
            .iter()
            .find(|rarity| rarity.as_str() == s)
            .copied()
            .ok_or_else(|| format!("invalid rarity: {}", s))
    }
}

#[cfg(test)]
mod tests {
    use test_case::test_case;

    use super::super::{
        epoch::Epoch, height::Height, CYCLE_EPOCHS, DIFFCHANGE_INTERVAL, SUBSIDY_HALVING_INTERVAL,
        COIN_VALUE,
    };
    use super::*;

    #[test_case(Sat(0) => Rarity::Mythic; "first sat")]
    #[test_case(Sat(1) => Rarity::Common; "second sat")]
    #[test_case(Sat(50 * COIN_VALUE - 1) => Rarity::Common; "last sat of genesis block")]
    #[test_case(Sat(50 * COIN_VALUE) => Rarity::Uncommon; "first sat of block 1")]
    #[test_case(Sat(50 * COIN_VALUE + 1) => Rarity::Common; "second sat of block 1")]
    #[test_case(Height(DIFFCHANGE_INTERVAL).starting_sat() => Rarity::Rare; "difficulty adjustment")]
    #[test_case(Epoch(1).starting_sat() => Rarity::Epic; "first halving")]
    #[test_case(Height(CYCLE_EPOCHS * SUBSIDY_HALVING_INTERVAL).starting_sat() => Rarity::Legendary; "first conjunction")]
    #[test_case(Sat(257418248345364) => Rarity::Common; "inscribed sat")]
    #[test_case(Sat(1676913207) => Rarity::Common; "early sat")]
    fn classifies_sats(sat: Sat) -> Rarity {
        sat.rarity()
    }

    #[test]
    fn rarity_is_ordered() {
        assert!(Rarity::Common < Rarity::Uncommon);
        assert!(Rarity::Legendary < Rarity::Mythic);
    }

    #[test]
    fn parses_names() {
        for rarity in Rarity::ALL {
            assert_eq!(rarity.to_string().parse::<Rarity>(), Ok(rarity));
        }
        assert!("shiny".parse::<Rarity>().is_err());
    }
}
