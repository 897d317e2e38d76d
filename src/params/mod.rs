//! Randomized request parameters.
//!
//! Modifier purchases draw a kind and a value from fixed weighted tables;
//! random auction participation draws a number uniformly from 1 to 100 and
//! seals it in a [`Commitment`].

mod commitment;
mod weighted;

use std::fmt;

use rand::Rng;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use commitment::Commitment;
pub use weighted::WeightedTable;

pub const AUCTION_NUMBER_MIN: u32 = 1;
pub const AUCTION_NUMBER_MAX: u32 = 100;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParamError {
    #[error("weighted table must have a positive total weight")]
    ZeroTotalWeight,

    #[error("unknown modifier kind: {0}")]
    UnknownModifierKind(u8),
}

/// Arithmetic a modifier NFT applies to a bid. On the wire it is the
/// contract's `uint8` index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum ModifierKind {
    Decimal,
    Division,
    Subtraction,
    Addition,
    Multiplication,
}

impl ModifierKind {
    pub fn index(self) -> u8 {
        match self {
            ModifierKind::Decimal => 0,
            ModifierKind::Division => 1,
            ModifierKind::Subtraction => 2,
            ModifierKind::Addition => 3,
            ModifierKind::Multiplication => 4,
        }
    }
}

impl TryFrom<u8> for ModifierKind {
    type Error = ParamError;

    fn try_from(index: u8) -> Result<Self, Self::Error> {
        match index {
            0 => Ok(ModifierKind::Decimal),
            1 => Ok(ModifierKind::Division),
            2 => Ok(ModifierKind::Subtraction),
            3 => Ok(ModifierKind::Addition),
            4 => Ok(ModifierKind::Multiplication),
            other => Err(ParamError::UnknownModifierKind(other)),
        }
    }
}

impl From<ModifierKind> for u8 {
    fn from(kind: ModifierKind) -> Self {
        kind.index()
    }
}

impl fmt::Display for ModifierKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModifierKind::Decimal => write!(f, "DECIMAL"),
            ModifierKind::Division => write!(f, "DIVISION"),
            ModifierKind::Subtraction => write!(f, "SUBTRACTION"),
            ModifierKind::Addition => write!(f, "ADDITION"),
            ModifierKind::Multiplication => write!(f, "MULTIPLICATION"),
        }
    }
}

/// Weighted table for modifier values.
pub fn modifier_value_table() -> Result<WeightedTable<u8>, ParamError> {
    WeightedTable::new(vec![
        (2, 25),
        (3, 20),
        (4, 15),
        (5, 10),
        (6, 8),
        (7, 5),
        (8, 3),
        (9, 2),
        (10, 1),
    ])
}

/// Weighted table for modifier kinds.
pub fn modifier_kind_table() -> Result<WeightedTable<ModifierKind>, ParamError> {
    WeightedTable::new(vec![
        (ModifierKind::Decimal, 20),
        (ModifierKind::Division, 5),
        (ModifierKind::Subtraction, 30),
        (ModifierKind::Addition, 25),
        (ModifierKind::Multiplication, 20),
    ])
}

/// Samples request parameters. Holds only immutable tables.
#[derive(Debug, Clone)]
pub struct ParameterGenerator {
    kinds: WeightedTable<ModifierKind>,
    values: WeightedTable<u8>,
}

impl ParameterGenerator {
    pub fn new() -> Result<Self, ParamError> {
        Ok(Self {
            kinds: modifier_kind_table()?,
            values: modifier_value_table()?,
        })
    }

    pub fn modifier<R: Rng + ?Sized>(&self, rng: &mut R) -> (ModifierKind, u8) {
        (self.kinds.sample(rng), self.values.sample(rng))
    }

    pub fn auction_number<R: Rng + ?Sized>(&self, rng: &mut R) -> u32 {
        rng.gen_range(AUCTION_NUMBER_MIN..=AUCTION_NUMBER_MAX)
    }
}

/// Random `rrggbb` color, as used for NFT background colors.
pub fn random_color<R: Rng + ?Sized>(rng: &mut R) -> String {
    let [r, g, b]: [u8; 3] = rng.gen();
    format!("{:02x}{:02x}{:02x}", r, g, b)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn modifier_kind_index_round_trip() {
        for i in 0..5u8 {
            assert_eq!(ModifierKind::try_from(i).unwrap().index(), i);
        }
        assert_eq!(
            ModifierKind::try_from(5).unwrap_err(),
            ParamError::UnknownModifierKind(5)
        );
    }

    #[test]
    fn modifier_kind_serializes_as_index() {
        assert_eq!(serde_json::to_string(&ModifierKind::Addition).unwrap(), "3");
        let kind: ModifierKind = serde_json::from_str("1").unwrap();
        assert_eq!(kind, ModifierKind::Division);
        assert!(serde_json::from_str::<ModifierKind>("7").is_err());
    }

    #[test]
    fn modifier_kind_display() {
        assert_eq!(ModifierKind::Subtraction.to_string(), "SUBTRACTION");
        assert_eq!(ModifierKind::Multiplication.to_string(), "MULTIPLICATION");
    }

    #[test]
    fn auction_number_stays_in_range() {
        let gen = ParameterGenerator::new().unwrap();
        let mut rng = StdRng::seed_from_u64(1);
        for _ in 0..10_000 {
            let n = gen.auction_number(&mut rng);
            assert!((AUCTION_NUMBER_MIN..=AUCTION_NUMBER_MAX).contains(&n));
        }
    }

    #[test]
    fn random_color_is_six_hex_digits() {
        let mut rng = StdRng::seed_from_u64(3);
        let color = random_color(&mut rng);
        assert_eq!(color.len(), 6);
        assert!(color.chars().all(|c| c.is_ascii_hexdigit()));
    }
}
