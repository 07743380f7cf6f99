use mongodb::bson::{DateTime, Document, doc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::error::{MongoDaoError, MongoResult};
use crate::{
    dao::models::{
        DrawResultEntity, PlayerEntity, PlayerStatus, PlayerWithCoinsEntity,
        RewardSettingsEntity, WalletEntity,
    },
    state::draw::{DrawSource, PendingTarget, RANDOM_TARGET},
};

/// Identifier of the singleton settings document.
pub const SETTINGS_ID: &str = "draw";

fn random_target() -> i32 {
    i32::from(RANDOM_TARGET)
}

fn default_multiplier() -> i64 {
    i64::from(RewardSettingsEntity::default().multiplier)
}

fn default_probability() -> i32 {
    i32::from(RewardSettingsEntity::default().probability)
}

fn default_reward_type() -> String {
    RewardSettingsEntity::default().reward_type
}

/// Singleton document holding the pending target and reward settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoSettingsDocument {
    #[serde(rename = "_id")]
    id: String,
    #[serde(default = "random_target")]
    pending_target: i32,
    #[serde(default = "default_multiplier")]
    multiplier: i64,
    #[serde(default = "default_probability")]
    probability: i32,
    #[serde(default = "default_reward_type")]
    reward_type: String,
    #[serde(default)]
    winning_number: i32,
}

impl MongoSettingsDocument {
    pub fn pending_target(&self) -> MongoResult<PendingTarget> {
        PendingTarget::from_raw(i64::from(self.pending_target)).map_err(|err| {
            MongoDaoError::Malformed {
                collection: "draw_settings",
                reason: err.to_string(),
            }
        })
    }

    pub fn reward_settings(&self) -> RewardSettingsEntity {
        let defaults = RewardSettingsEntity::default();
        RewardSettingsEntity {
            multiplier: u32::try_from(self.multiplier).unwrap_or(defaults.multiplier),
            probability: u8::try_from(self.probability).unwrap_or(defaults.probability),
            reward_type: self.reward_type.clone(),
            winning_number: u8::try_from(self.winning_number).unwrap_or(defaults.winning_number),
        }
    }
}

/// `$set` payload for the reward part of the settings document.
pub fn reward_settings_update(settings: &RewardSettingsEntity) -> Document {
    doc! {
        "$set": {
            "multiplier": i64::from(settings.multiplier),
            "probability": i32::from(settings.probability),
            "reward_type": settings.reward_type.clone(),
            "winning_number": i32::from(settings.winning_number),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoDrawResultDocument {
    #[serde(rename = "_id")]
    id: String,
    value: i32,
    source: DrawSource,
    resolved_at: DateTime,
}

impl From<DrawResultEntity> for MongoDrawResultDocument {
    fn from(value: DrawResultEntity) -> Self {
        Self {
            id: value.id.to_string(),
            value: i32::from(value.value),
            source: value.source,
            resolved_at: DateTime::from_system_time(value.resolved_at),
        }
    }
}

impl TryFrom<MongoDrawResultDocument> for DrawResultEntity {
    type Error = MongoDaoError;

    fn try_from(value: MongoDrawResultDocument) -> Result<Self, Self::Error> {
        Ok(Self {
            id: parse_id("draw_results", &value.id)?,
            value: i8::try_from(value.value).map_err(|_| MongoDaoError::Malformed {
                collection: "draw_results",
                reason: format!("value {} out of range", value.value),
            })?,
            source: value.source,
            resolved_at: value.resolved_at.to_system_time(),
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoPlayerDocument {
    #[serde(rename = "_id")]
    id: String,
    serial_no: i64,
    full_name: String,
    username: String,
    status: PlayerStatus,
    created_at: DateTime,
}

impl From<PlayerEntity> for MongoPlayerDocument {
    fn from(value: PlayerEntity) -> Self {
        Self {
            id: value.id.to_string(),
            serial_no: i64::from(value.serial_no),
            full_name: value.full_name,
            username: value.username,
            status: value.status,
            created_at: DateTime::from_system_time(value.created_at),
        }
    }
}

impl TryFrom<MongoPlayerDocument> for PlayerEntity {
    type Error = MongoDaoError;

    fn try_from(value: MongoPlayerDocument) -> Result<Self, Self::Error> {
        Ok(Self {
            id: parse_id("players", &value.id)?,
            serial_no: u32::try_from(value.serial_no).map_err(|_| MongoDaoError::Malformed {
                collection: "players",
                reason: format!("serial number {} out of range", value.serial_no),
            })?,
            full_name: value.full_name,
            username: value.username,
            status: value.status,
            created_at: value.created_at.to_system_time(),
        })
    }
}

/// Wallet keyed by the owning player's identifier.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoWalletDocument {
    #[serde(rename = "_id")]
    player_id: String,
    coins: i64,
    updated_at: DateTime,
}

impl From<WalletEntity> for MongoWalletDocument {
    fn from(value: WalletEntity) -> Self {
        Self {
            player_id: value.player_id.to_string(),
            coins: i64::try_from(value.coins).unwrap_or(i64::MAX),
            updated_at: DateTime::from_system_time(value.updated_at),
        }
    }
}

impl TryFrom<MongoWalletDocument> for WalletEntity {
    type Error = MongoDaoError;

    fn try_from(value: MongoWalletDocument) -> Result<Self, Self::Error> {
        Ok(Self {
            player_id: parse_id("wallets", &value.player_id)?,
            coins: u64::try_from(value.coins).unwrap_or(0),
            updated_at: value.updated_at.to_system_time(),
        })
    }
}

/// Row produced by the player/wallet `$lookup` aggregation.
#[derive(Debug, Clone, Deserialize)]
pub struct MongoPlayerRow {
    #[serde(rename = "_id")]
    id: String,
    serial_no: i64,
    full_name: String,
    username: String,
    status: PlayerStatus,
    created_at: DateTime,
    #[serde(default)]
    coins: i64,
}

impl TryFrom<MongoPlayerRow> for PlayerWithCoinsEntity {
    type Error = MongoDaoError;

    fn try_from(value: MongoPlayerRow) -> Result<Self, Self::Error> {
        let player = MongoPlayerDocument {
            id: value.id,
            serial_no: value.serial_no,
            full_name: value.full_name,
            username: value.username,
            status: value.status,
            created_at: value.created_at,
        };
        Ok(Self {
            player: player.try_into()?,
            coins: u64::try_from(value.coins).unwrap_or(0),
        })
    }
}

fn parse_id(collection: &'static str, raw: &str) -> MongoResult<Uuid> {
    Uuid::parse_str(raw).map_err(|err| MongoDaoError::Malformed {
        collection,
        reason: format!("invalid identifier `{raw}`: {err}"),
    })
}

pub fn doc_id(id: Uuid) -> Document {
    doc! {"_id": id.to_string()}
}

/// Filter matching only real draw outcomes.
pub fn valid_value_filter() -> Document {
    doc! {"value": {"$gte": 0, "$lte": 9}}
}
