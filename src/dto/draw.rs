//! DTOs for the draw countdown, history and reward settings.

use std::time::SystemTime;

use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

use crate::{
    dao::models::{DrawResultEntity, RewardSettingsEntity},
    dto::{format_system_time, unix_millis},
    state::{
        draw::{DrawSource, PendingTarget},
        draw_scheduler::DrawStatus,
    },
};

/// Countdown snapshot polled by the spin UI.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct DrawStatusResponse {
    /// RFC 3339 timestamp of the next draw.
    pub next_draw_at: String,
    /// Next draw as Unix milliseconds.
    pub next_draw_at_ms: u64,
    /// Whole seconds until the next draw, between 0 and the interval length.
    pub seconds_remaining: u64,
    /// `-1` for a random draw, otherwise the value pinned by an admin.
    pub pending_target: i8,
    /// Server clock when the snapshot was taken.
    pub server_time_ms: u64,
    /// `true` when the pending target could not be read from storage.
    pub degraded: bool,
}

impl DrawStatusResponse {
    /// Render a scheduler snapshot taken at `now`.
    pub fn new(status: DrawStatus, now: SystemTime, degraded: bool) -> Self {
        Self {
            next_draw_at: format_system_time(status.next_deadline),
            next_draw_at_ms: unix_millis(status.next_deadline),
            seconds_remaining: status.seconds_remaining,
            pending_target: status.pending_target.as_raw(),
            server_time_ms: unix_millis(now),
            degraded,
        }
    }
}

/// Admin request pinning the next draw (`-1` restores a random draw).
#[derive(Debug, Deserialize, ToSchema)]
pub struct SetTargetRequest {
    /// `-1..=9`.
    pub target: i64,
}

/// Pending target after an update.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct TargetResponse {
    /// `-1` for a random draw, otherwise the pinned value.
    pub pending_target: i8,
}

impl From<PendingTarget> for TargetResponse {
    fn from(value: PendingTarget) -> Self {
        Self {
            pending_target: value.as_raw(),
        }
    }
}

/// Latest resolved number shown by the spin wheel.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct TargetNumberResponse {
    /// `0` until the first draw resolves.
    pub target_number: i8,
}

/// Whether a result was pinned or drawn at random.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ResultSource {
    /// Value set by an admin.
    Pinned,
    /// Uniform random draw.
    Random,
}

impl From<DrawSource> for ResultSource {
    fn from(value: DrawSource) -> Self {
        match value {
            DrawSource::Pinned => Self::Pinned,
            DrawSource::Random => Self::Random,
        }
    }
}

/// One entry of the draw history.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct DrawResultSummary {
    /// Drawn number, `0..=9`.
    pub value: i8,
    /// How the value was chosen.
    pub source: ResultSource,
    /// RFC 3339 resolution time.
    pub resolved_at: String,
}

impl From<DrawResultEntity> for DrawResultSummary {
    fn from(value: DrawResultEntity) -> Self {
        Self {
            value: value.value,
            source: value.source.into(),
            resolved_at: format_system_time(value.resolved_at),
        }
    }
}

/// Query string of the history routes.
#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct HistoryQuery {
    /// Number of entries to return, clamped to `1..=50`.
    pub limit: Option<usize>,
}

/// Reward configuration, used both as request body and response.
#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct RewardSettingsPayload {
    /// Payout multiplier, `1..=1000`.
    #[validate(range(min = 1, max = 1000))]
    pub multiplier: u32,
    /// Win probability in percent.
    #[validate(range(max = 100))]
    pub probability: u8,
    /// Reward currency label.
    #[validate(length(min = 1, max = 32))]
    pub reward_type: String,
    /// Number that wins, `0..=9`.
    #[validate(range(max = 9))]
    pub winning_number: u8,
}

impl From<RewardSettingsEntity> for RewardSettingsPayload {
    fn from(value: RewardSettingsEntity) -> Self {
        Self {
            multiplier: value.multiplier,
            probability: value.probability,
            reward_type: value.reward_type,
            winning_number: value.winning_number,
        }
    }
}

impl From<RewardSettingsPayload> for RewardSettingsEntity {
    fn from(value: RewardSettingsPayload) -> Self {
        Self {
            multiplier: value.multiplier,
            probability: value.probability,
            reward_type: value.reward_type.trim().to_string(),
            winning_number: value.winning_number,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::{Duration, UNIX_EPOCH};

    use super::*;
    use crate::state::draw::DrawValue;

    #[test]
    fn status_response_encodes_random_as_minus_one() {
        let now = UNIX_EPOCH + Duration::from_secs(100);
        let status = DrawStatus {
            next_deadline: UNIX_EPOCH + Duration::from_secs(120),
            seconds_remaining: 20,
            pending_target: PendingTarget::Random,
        };
        let response = DrawStatusResponse::new(status, now, false);
        assert_eq!(response.pending_target, -1);
        assert_eq!(response.next_draw_at_ms, 120_000);
        assert_eq!(response.server_time_ms, 100_000);
        assert_eq!(response.next_draw_at, "1970-01-01T00:02:00Z");
    }

    #[test]
    fn history_entry_serializes_source_in_snake_case() {
        let entity = DrawResultEntity::new(
            DrawValue::new(3).unwrap(),
            DrawSource::Pinned,
            UNIX_EPOCH,
        );
        let json = serde_json::to_value(DrawResultSummary::from(entity)).unwrap();
        assert_eq!(json["value"], 3);
        assert_eq!(json["source"], "pinned");
    }

    #[test]
    fn reward_settings_are_validated() {
        let mut payload = RewardSettingsPayload::from(RewardSettingsEntity::default());
        assert!(payload.validate().is_ok());
        payload.probability = 101;
        assert!(payload.validate().is_err());
        payload.probability = 100;
        payload.winning_number = 10;
        assert!(payload.validate().is_err());
    }
}
