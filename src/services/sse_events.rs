use serde::Serialize;
use tracing::warn;

use crate::{
    dto::{
        draw::{DrawResultSummary, RewardSettingsPayload},
        format_system_time,
        player::{PlayerSummary, WalletUpdateResponse},
        sse::{
            DrawResolvedEvent, PlayerCreatedEvent, PlayerUpdatedEvent, RewardSettingsUpdatedEvent,
            ServerEvent, SystemStatus, TargetUpdatedEvent, WalletUpdatedEvent,
        },
    },
    dao::models::DrawResultEntity,
    state::{SharedState, draw::PendingTarget},
};

/// Public: a draw resolved.
pub const EVENT_DRAW_RESOLVED: &str = "draw.resolved";
/// Admin: the pending target changed.
pub const EVENT_TARGET_UPDATED: &str = "target.updated";
/// Admin: a player was registered.
pub const EVENT_PLAYER_CREATED: &str = "player.created";
/// Admin: a player's status changed.
pub const EVENT_PLAYER_UPDATED: &str = "player.updated";
/// Admin: a balance changed.
pub const EVENT_WALLET_UPDATED: &str = "wallet.updated";
/// Admin: reward settings changed.
pub const EVENT_SETTINGS_UPDATED: &str = "settings.updated";
/// Both streams: degraded mode toggled.
pub const EVENT_SYSTEM_STATUS: &str = "system_status";

/// Broadcast a freshly resolved draw to every stream.
pub fn broadcast_draw_resolved(state: &SharedState, result: DrawResultEntity) {
    let payload = DrawResolvedEvent {
        result: DrawResultSummary::from(result),
        next_draw_at: format_system_time(state.scheduler().next_deadline()),
    };
    send_public_event(state, EVENT_DRAW_RESOLVED, &payload);
    send_admin_event(state, EVENT_DRAW_RESOLVED, &payload);
}

/// Tell admins which value the next draw will use.
pub fn broadcast_target_updated(state: &SharedState, target: PendingTarget) {
    let payload = TargetUpdatedEvent {
        pending_target: target.as_raw(),
    };
    send_admin_event(state, EVENT_TARGET_UPDATED, &payload);
}

/// Notify admins of a new player.
pub fn broadcast_player_created(state: &SharedState, player: PlayerSummary) {
    send_admin_event(state, EVENT_PLAYER_CREATED, &PlayerCreatedEvent { player });
}

/// Notify admins of a status change.
pub fn broadcast_player_updated(state: &SharedState, player: PlayerSummary) {
    send_admin_event(state, EVENT_PLAYER_UPDATED, &PlayerUpdatedEvent { player });
}

/// Notify admins of a balance change.
pub fn broadcast_wallet_updated(state: &SharedState, wallet: WalletUpdateResponse) {
    send_admin_event(state, EVENT_WALLET_UPDATED, &WalletUpdatedEvent { wallet });
}

/// Notify admins of new reward settings.
pub fn broadcast_settings_updated(state: &SharedState, settings: RewardSettingsPayload) {
    send_admin_event(
        state,
        EVENT_SETTINGS_UPDATED,
        &RewardSettingsUpdatedEvent { settings },
    );
}

/// Broadcast a degraded mode change on both streams.
pub fn broadcast_system_status(state: &SharedState, degraded: bool) {
    let payload = SystemStatus { degraded };
    send_public_event(state, EVENT_SYSTEM_STATUS, &payload);
    send_admin_event(state, EVENT_SYSTEM_STATUS, &payload);
}

fn send_public_event(state: &SharedState, event: &str, payload: &impl Serialize) {
    match ServerEvent::json(Some(event.to_string()), payload) {
        Ok(event) => state.public_sse().broadcast(event),
        Err(err) => warn!(event, error = %err, "failed to serialize public SSE payload"),
    }
}

fn send_admin_event(state: &SharedState, event: &str, payload: &impl Serialize) {
    match ServerEvent::json(Some(event.to_string()), payload) {
        Ok(event) => state.admin_sse().broadcast(event),
        Err(err) => warn!(event, error = %err, "failed to serialize admin SSE payload"),
    }
}
