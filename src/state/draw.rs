//! Value types describing a single draw outcome and the admin override.

use std::fmt;

use rand::Rng;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Wire and storage encoding of [`PendingTarget::Random`].
pub const RANDOM_TARGET: i8 = -1;
/// Largest value a draw can resolve to.
pub const MAX_DRAW_VALUE: u8 = 9;

/// Raised when a target outside `-1..=9` is submitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("target must be between -1 and 9 (got {0})")]
pub struct InvalidTarget(pub i64);

/// Outcome of one draw, guaranteed to lie in `0..=9`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DrawValue(u8);

impl DrawValue {
    /// Validate a raw integer as a draw value.
    pub fn new(raw: i64) -> Result<Self, InvalidTarget> {
        u8::try_from(raw)
            .ok()
            .filter(|value| *value <= MAX_DRAW_VALUE)
            .map(Self)
            .ok_or(InvalidTarget(raw))
    }

    /// Numeric value of the draw.
    pub fn get(self) -> u8 {
        self.0
    }
}

impl fmt::Display for DrawValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Admin override consumed by the next draw.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PendingTarget {
    /// No override: the next draw is uniformly random.
    #[default]
    Random,
    /// The next draw resolves to this value.
    Pinned(DrawValue),
}

impl PendingTarget {
    /// Decode the `-1..=9` representation used on the wire and in storage.
    pub fn from_raw(raw: i64) -> Result<Self, InvalidTarget> {
        if raw == i64::from(RANDOM_TARGET) {
            return Ok(Self::Random);
        }
        DrawValue::new(raw).map(Self::Pinned)
    }

    /// Encode as `-1` for random or the pinned value.
    pub fn as_raw(self) -> i8 {
        match self {
            Self::Random => RANDOM_TARGET,
            Self::Pinned(value) => value.get() as i8,
        }
    }
}

/// Why a draw resolved to its value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DrawSource {
    /// Value pinned by an administrator.
    Pinned,
    /// Value drawn uniformly at random.
    Random,
}

/// Resolve the value of a draw from the pending target.
pub fn pick_value<R: Rng + ?Sized>(target: PendingTarget, rng: &mut R) -> (DrawValue, DrawSource) {
    match target {
        PendingTarget::Pinned(value) => (value, DrawSource::Pinned),
        PendingTarget::Random => (
            DrawValue(rng.random_range(0..=MAX_DRAW_VALUE)),
            DrawSource::Random,
        ),
    }
}

#[cfg(test)]
mod tests {
    use rand::{SeedableRng, rngs::StdRng};

    use super::*;

    #[test]
    fn target_range_is_enforced() {
        for raw in -1..=9 {
            let target = PendingTarget::from_raw(raw).unwrap();
            assert_eq!(i64::from(target.as_raw()), raw);
        }
        assert_eq!(PendingTarget::from_raw(-1).unwrap(), PendingTarget::Random);
        for raw in [-2, 10, 42, i64::MIN, i64::MAX] {
            assert_eq!(PendingTarget::from_raw(raw), Err(InvalidTarget(raw)));
        }
    }

    #[test]
    fn draw_value_rejects_random_marker() {
        assert!(DrawValue::new(-1).is_err());
        assert_eq!(DrawValue::new(0).unwrap().get(), 0);
        assert_eq!(DrawValue::new(9).unwrap().get(), 9);
    }

    #[test]
    fn pinned_target_always_wins() {
        let mut rng = StdRng::seed_from_u64(7);
        let pinned = PendingTarget::Pinned(DrawValue::new(5).unwrap());
        for _ in 0..100 {
            let (value, source) = pick_value(pinned, &mut rng);
            assert_eq!(value.get(), 5);
            assert_eq!(source, DrawSource::Pinned);
        }
    }

    #[test]
    fn random_draw_is_uniform() {
        const TRIALS: usize = 10_000;
        let mut rng = StdRng::seed_from_u64(0x5eed);
        let mut counts = [0usize; 10];
        for _ in 0..TRIALS {
            let (value, source) = pick_value(PendingTarget::Random, &mut rng);
            assert_eq!(source, DrawSource::Random);
            counts[value.get() as usize] += 1;
        }

        let expected = TRIALS as f64 / 10.0;
        let chi_square: f64 = counts
            .iter()
            .map(|&observed| {
                let diff = observed as f64 - expected;
                diff * diff / expected
            })
            .sum();
        // 9 degrees of freedom, p = 0.001
        assert!(chi_square < 27.88, "chi-square {chi_square} for {counts:?}");
    }
}
