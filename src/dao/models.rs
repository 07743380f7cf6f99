use serde::{Deserialize, Serialize};
use std::time::SystemTime;
use uuid::Uuid;

use crate::state::draw::{DrawSource, DrawValue};

/// One resolved draw appended to the history.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DrawResultEntity {
    /// Stable identifier of the history entry.
    pub id: Uuid,
    /// Resolved value. Legacy rows may carry values outside `0..=9`.
    pub value: i8,
    /// Whether the value was pinned by an admin or drawn at random.
    pub source: DrawSource,
    /// Time the draw was resolved.
    pub resolved_at: SystemTime,
}

impl DrawResultEntity {
    /// Build a fresh history entry for a resolved value.
    pub fn new(value: DrawValue, source: DrawSource, resolved_at: SystemTime) -> Self {
        Self {
            id: Uuid::new_v4(),
            value: value.get() as i8,
            source,
            resolved_at,
        }
    }

    /// Whether the stored value is a real draw outcome.
    pub fn is_valid(&self) -> bool {
        DrawValue::new(i64::from(self.value)).is_ok()
    }
}

/// Payout settings edited from the admin console.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RewardSettingsEntity {
    /// Coin multiplier applied to winning bets.
    pub multiplier: u32,
    /// Win probability, in percent.
    pub probability: u8,
    /// Kind of reward handed out (e.g. "coins").
    pub reward_type: String,
    /// Number considered the winning one for reward computation.
    pub winning_number: u8,
}

impl Default for RewardSettingsEntity {
    fn default() -> Self {
        Self {
            multiplier: 2,
            probability: 50,
            reward_type: "coins".into(),
            winning_number: 0,
        }
    }
}

/// Whether a player account can be used.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum PlayerStatus {
    /// May take part in draws.
    #[default]
    Active,
    /// Disabled by an administrator.
    Inactive,
}

/// Player account managed by administrators.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PlayerEntity {
    /// Stable identifier for the player.
    pub id: Uuid,
    /// Sequential number shown in the admin console.
    pub serial_no: u32,
    /// Display name.
    pub full_name: String,
    /// Unique login name.
    pub username: String,
    /// Account status.
    pub status: PlayerStatus,
    /// Creation timestamp.
    pub created_at: SystemTime,
}

/// Coin balance attached to a player.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct WalletEntity {
    /// Owner of the wallet.
    pub player_id: Uuid,
    /// Current balance, never negative.
    pub coins: u64,
    /// Last time the balance changed.
    pub updated_at: SystemTime,
}

impl WalletEntity {
    /// Empty wallet for a newly created player.
    pub fn empty(player_id: Uuid, now: SystemTime) -> Self {
        Self {
            player_id,
            coins: 0,
            updated_at: now,
        }
    }
}

/// Player joined with its wallet balance (0 when the wallet is missing).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PlayerWithCoinsEntity {
    /// Player record.
    pub player: PlayerEntity,
    /// Balance, `0` when no wallet exists.
    pub coins: u64,
}

/// Apply a signed delta to a balance, clamping at zero.
pub fn apply_coin_delta(coins: u64, delta: i64) -> u64 {
    if delta >= 0 {
        coins.saturating_add(delta.unsigned_abs())
    } else {
        coins.saturating_sub(delta.unsigned_abs())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn coin_delta_clamps_at_zero() {
        assert_eq!(apply_coin_delta(10, 5), 15);
        assert_eq!(apply_coin_delta(10, -4), 6);
        assert_eq!(apply_coin_delta(10, -40), 0);
        assert_eq!(apply_coin_delta(0, i64::MIN), 0);
        assert_eq!(apply_coin_delta(u64::MAX, 1), u64::MAX);
    }

    #[test]
    fn legacy_marker_rows_are_invalid() {
        let mut entry = DrawResultEntity::new(
            DrawValue::new(3).unwrap(),
            DrawSource::Random,
            SystemTime::UNIX_EPOCH,
        );
        assert!(entry.is_valid());
        entry.value = -1;
        assert!(!entry.is_valid());
    }
}
