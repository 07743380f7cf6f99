use serde::Serialize;
use utoipa::ToSchema;

use crate::dto::{
    draw::{DrawResultSummary, RewardSettingsPayload},
    player::{PlayerSummary, WalletUpdateResponse},
};

#[derive(Clone, Debug)]
/// Dispatched payload carried across SSE channels.
pub struct ServerEvent {
    /// SSE event name.
    pub event: Option<String>,
    /// Serialised JSON payload.
    pub data: String,
}

impl ServerEvent {
    /// Convenience wrapper that serialises `payload` into the SSE data field.
    pub fn json<E, T>(event: E, payload: &T) -> serde_json::Result<Self>
    where
        E: Into<Option<String>>,
        T: Serialize,
    {
        Ok(Self {
            event: event.into(),
            data: serde_json::to_string(payload)?,
        })
    }
}

#[derive(Debug, Serialize, ToSchema)]
/// First event on the admin stream carrying the token for `X-Admin-Token`.
pub struct AdminHandshake {
    /// Token for the `X-Admin-Token` header.
    pub token: String,
}

#[derive(Debug, Serialize, ToSchema)]
/// Broadcast on the public stream whenever a draw resolves.
pub struct DrawResolvedEvent {
    /// The resolved draw.
    pub result: DrawResultSummary,
    /// RFC 3339 timestamp of the following draw.
    pub next_draw_at: String,
}

#[derive(Debug, Serialize, ToSchema)]
/// Broadcast to admins when the pending target changes.
pub struct TargetUpdatedEvent {
    /// New target, `-1` for random.
    pub pending_target: i8,
}

/// Broadcast to admins when a player is registered.
#[derive(Debug, Serialize, ToSchema)]
pub struct PlayerCreatedEvent {
    /// The new player.
    pub player: PlayerSummary,
}

/// Broadcast to admins when a player's status changes.
#[derive(Debug, Serialize, ToSchema)]
pub struct PlayerUpdatedEvent {
    /// The updated player.
    pub player: PlayerSummary,
}

/// Broadcast to admins when a balance changes.
#[derive(Debug, Serialize, ToSchema)]
pub struct WalletUpdatedEvent {
    /// Updated balance.
    pub wallet: WalletUpdateResponse,
}

/// Broadcast to admins when reward settings change.
#[derive(Debug, Serialize, ToSchema)]
pub struct RewardSettingsUpdatedEvent {
    /// Stored settings.
    pub settings: RewardSettingsPayload,
}

#[derive(Debug, Serialize, ToSchema)]
/// Broadcast when the backend enters or leaves degraded mode.
pub struct SystemStatus {
    /// `true` while no store is installed.
    pub degraded: bool,
}

