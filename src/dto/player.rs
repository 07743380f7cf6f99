//! DTOs for player and wallet administration.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::{
    dao::models::{PlayerEntity, PlayerStatus, PlayerWithCoinsEntity},
    dto::{
        format_system_time,
        validation::{validate_not_blank, validate_username},
    },
};

/// Account status as exposed over HTTP.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum PlayerStatusDto {
    /// Account enabled.
    Active,
    /// Account disabled.
    Inactive,
}

impl From<PlayerStatus> for PlayerStatusDto {
    fn from(value: PlayerStatus) -> Self {
        match value {
            PlayerStatus::Active => Self::Active,
            PlayerStatus::Inactive => Self::Inactive,
        }
    }
}

impl From<PlayerStatusDto> for PlayerStatus {
    fn from(value: PlayerStatusDto) -> Self {
        match value {
            PlayerStatusDto::Active => Self::Active,
            PlayerStatusDto::Inactive => Self::Inactive,
        }
    }
}

/// Payload used to register a new player.
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreatePlayerRequest {
    /// Display name, 1 to 100 characters.
    #[validate(length(min = 1, max = 100), custom(function = "validate_not_blank"))]
    pub full_name: String,
    /// Lowercase login name.
    #[validate(custom(function = "validate_username"))]
    pub username: String,
    /// Defaults to `active`.
    #[serde(default)]
    pub status: Option<PlayerStatusDto>,
}

/// Payload changing a player's status.
#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdatePlayerStatusRequest {
    /// New status.
    pub status: PlayerStatusDto,
}

/// Signed coin adjustment; the balance never drops below zero.
#[derive(Debug, Deserialize, ToSchema)]
pub struct AdjustCoinsRequest {
    /// Coins to add, negative to remove.
    pub delta: i64,
}

/// Player as listed in the admin console.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PlayerSummary {
    /// Player identifier.
    pub id: Uuid,
    /// Sequential number, starting at 1.
    pub serial_no: u32,
    /// Display name.
    pub full_name: String,
    /// Unique login name.
    pub username: String,
    /// Account status.
    pub status: PlayerStatusDto,
    /// Current balance.
    pub coins: u64,
    /// RFC 3339 creation time.
    pub created_at: String,
}

impl PlayerSummary {
    /// Combine a player with its balance.
    pub fn new(player: PlayerEntity, coins: u64) -> Self {
        Self {
            id: player.id,
            serial_no: player.serial_no,
            full_name: player.full_name,
            username: player.username,
            status: player.status.into(),
            coins,
            created_at: format_system_time(player.created_at),
        }
    }
}

impl From<PlayerWithCoinsEntity> for PlayerSummary {
    fn from(value: PlayerWithCoinsEntity) -> Self {
        Self::new(value.player, value.coins)
    }
}

/// Result of a coin adjustment.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct WalletUpdateResponse {
    /// Player whose wallet changed.
    pub player_id: Uuid,
    /// Display name.
    pub full_name: String,
    /// Login name.
    pub username: String,
    /// Balance after the update.
    pub coins: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_request_defaults_status_and_validates() {
        let request: CreatePlayerRequest =
            serde_json::from_str(r#"{"full_name":"Ada L","username":"ada"}"#).unwrap();
        assert!(request.status.is_none());
        assert!(request.validate().is_ok());

        let request: CreatePlayerRequest =
            serde_json::from_str(r#"{"full_name":"  ","username":"Ada"}"#).unwrap();
        let errors = request.validate().unwrap_err();
        let fields = errors.field_errors();
        assert!(fields.contains_key("full_name"));
        assert!(fields.contains_key("username"));
    }

    #[test]
    fn status_uses_snake_case() {
        let request: UpdatePlayerStatusRequest =
            serde_json::from_str(r#"{"status":"inactive"}"#).unwrap();
        assert_eq!(PlayerStatus::from(request.status), PlayerStatus::Inactive);
    }
}
