use std::time::SystemTime;

use tracing::{debug, warn};

use crate::{
    dao::models::DrawResultEntity,
    dto::draw::{
        DrawResultSummary, DrawStatusResponse, RewardSettingsPayload, TargetNumberResponse,
        TargetResponse,
    },
    error::ServiceError,
    services::sse_events,
    state::{SharedState, draw::PendingTarget},
};

/// Resolve the draw if its deadline has passed.
pub async fn tick(state: &SharedState) -> Result<Option<DrawResultEntity>, ServiceError> {
    tick_at(state, SystemTime::now()).await
}

/// [`tick`] against an explicit clock reading.
///
/// A draw that falls due while no store is installed is skipped like any other
/// failed resolution.
pub async fn tick_at(
    state: &SharedState,
    now: SystemTime,
) -> Result<Option<DrawResultEntity>, ServiceError> {
    let scheduler = state.scheduler();
    let Some(guard) = scheduler.try_begin(now) else {
        return Ok(None);
    };

    let Some(store) = state.store().await else {
        warn!(due = ?guard.due(), "draw due in degraded mode; interval skipped");
        drop(guard);
        return Err(ServiceError::Degraded);
    };

    let result = scheduler.resolve(guard, store.as_ref(), now).await?;
    sse_events::broadcast_draw_resolved(state, result.clone());
    Ok(Some(result))
}

/// Countdown snapshot. Resolves a due draw first so pollers never see a stale deadline.
pub async fn status(state: &SharedState) -> DrawStatusResponse {
    status_at(state, SystemTime::now()).await
}

/// [`status`] against an explicit clock reading.
pub async fn status_at(state: &SharedState, now: SystemTime) -> DrawStatusResponse {
    if let Err(err) = tick_at(state, now).await {
        debug!(error = %err, "tick from status request failed");
    }

    let (pending_target, degraded) = match state.store().await {
        Some(store) => match store.read_pending_target().await {
            Ok(target) => (target, false),
            Err(err) => {
                warn!(error = %err, "failed to read pending target; reporting a random draw");
                (PendingTarget::Random, true)
            }
        },
        None => (PendingTarget::Random, true),
    };

    DrawStatusResponse::new(
        state.scheduler().status(now, pending_target),
        now,
        degraded,
    )
}

/// Pin the next draw to `raw` (`-1` restores a random draw).
pub async fn set_pending_target(state: &SharedState, raw: i64) -> Result<TargetResponse, ServiceError> {
    let store = state.require_store().await?;
    let target = state
        .scheduler()
        .set_pending_target(store.as_ref(), raw)
        .await?;
    sse_events::broadcast_target_updated(state, target);
    Ok(target.into())
}

/// Newest results first, `limit` clamped by the configuration.
pub async fn recent_history(
    state: &SharedState,
    limit: Option<usize>,
) -> Result<Vec<DrawResultSummary>, ServiceError> {
    let limit = state.config().history_limit(limit);
    let store = state.require_store().await?;
    let history = state
        .scheduler()
        .recent_history(store.as_ref(), limit)
        .await?;
    Ok(history.into_iter().map(DrawResultSummary::from).collect())
}

/// Latest resolved value, `0` when there is none or storage fails.
pub async fn latest_target(state: &SharedState) -> TargetNumberResponse {
    let latest = match state.store().await {
        Some(store) => match store.latest_result().await {
            Ok(latest) => latest.filter(DrawResultEntity::is_valid),
            Err(err) => {
                warn!(error = %err, "failed to read latest draw result");
                None
            }
        },
        None => None,
    };

    TargetNumberResponse {
        target_number: latest.map_or(0, |result| result.value),
    }
}

/// Stored reward settings.
pub async fn reward_settings(state: &SharedState) -> Result<RewardSettingsPayload, ServiceError> {
    let store = state.require_store().await?;
    Ok(store.read_reward_settings().await?.into())
}

/// Replace the reward settings; the payload must already be validated.
pub async fn update_reward_settings(
    state: &SharedState,
    payload: RewardSettingsPayload,
) -> Result<RewardSettingsPayload, ServiceError> {
    let store = state.require_store().await?;
    let settings = payload.into();
    store.write_reward_settings(settings).await?;
    let stored: RewardSettingsPayload = store.read_reward_settings().await?.into();
    sse_events::broadcast_settings_updated(state, stored.clone());
    Ok(stored)
}

#[cfg(test)]
mod tests {
    use std::{sync::Arc, time::Duration};

    use super::*;
    use crate::{
        config::AppConfig,
        dao::{
            draw_store::{DrawStore, memory::MemoryStore},
            models::RewardSettingsEntity,
        },
        dto::draw::ResultSource,
        state::AppState,
    };

    async fn setup() -> (SharedState, MemoryStore, SystemTime) {
        let state = AppState::new(AppConfig::with_draw_interval(Duration::from_secs(60)));
        let store = MemoryStore::new();
        state.install_store(Arc::new(store.clone())).await;
        let start = state.scheduler().next_deadline() - Duration::from_secs(60);
        (state, store, start)
    }

    #[tokio::test]
    async fn status_before_deadline_does_not_draw() {
        let (state, store, start) = setup().await;
        let status = status_at(&state, start + Duration::from_secs(15)).await;
        assert_eq!(status.seconds_remaining, 45);
        assert_eq!(status.pending_target, -1);
        assert!(!status.degraded);
        assert!(store.results().await.is_empty());
    }

    #[tokio::test]
    async fn status_after_deadline_resolves_once_and_broadcasts() {
        let (state, store, start) = setup().await;
        let mut public = state.public_sse().subscribe();
        set_pending_target(&state, 7).await.unwrap();

        let now = start + Duration::from_secs(61);
        let status = status_at(&state, now).await;
        let again = status_at(&state, now).await;

        let results = store.results().await;
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].value, 7);
        assert_eq!(status.pending_target, -1);
        assert_eq!(status.seconds_remaining, 59);
        assert_eq!(again.next_draw_at_ms, status.next_draw_at_ms);

        let event = public.recv().await.unwrap();
        assert_eq!(event.event.as_deref(), Some(sse_events::EVENT_DRAW_RESOLVED));
        assert!(event.data.contains("\"value\":7"));
    }

    #[tokio::test]
    async fn saved_draw_is_broadcast_when_clearing_the_pin_fails() {
        let (state, store, start) = setup().await;
        let mut public = state.public_sse().subscribe();
        set_pending_target(&state, 7).await.unwrap();

        store.fail_next_resets(1);
        let result = tick_at(&state, start + Duration::from_secs(61))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(result.value, 7);

        let event = public.recv().await.unwrap();
        assert_eq!(event.event.as_deref(), Some(sse_events::EVENT_DRAW_RESOLVED));
        assert_eq!(store.read_pending_target().await.unwrap(), PendingTarget::Random);
    }

    #[tokio::test]
    async fn status_degrades_when_target_read_fails() {
        let (state, store, start) = setup().await;
        store.set_fail_reads(true);
        let status = status_at(&state, start + Duration::from_secs(5)).await;
        assert!(status.degraded);
        assert_eq!(status.pending_target, -1);
    }

    #[tokio::test]
    async fn due_draw_without_store_is_skipped() {
        let state = AppState::new(AppConfig::with_draw_interval(Duration::from_secs(60)));
        let due = state.scheduler().next_deadline();
        let err = tick_at(&state, due).await.unwrap_err();
        assert!(matches!(err, ServiceError::Degraded));
        assert_eq!(state.scheduler().next_deadline(), due + Duration::from_secs(60));
        assert!(!state.scheduler().is_resolving());

        let status = status_at(&state, due).await;
        assert!(status.degraded);
    }

    #[tokio::test]
    async fn invalid_target_is_rejected_without_mutation() {
        let (state, store, _) = setup().await;
        set_pending_target(&state, 3).await.unwrap();
        let err = set_pending_target(&state, 10).await.unwrap_err();
        assert!(matches!(err, ServiceError::InvalidInput(_)));
        assert_eq!(
            store.read_pending_target().await.unwrap().as_raw(),
            3
        );
    }

    #[tokio::test]
    async fn history_limit_is_clamped_and_newest_first() {
        let (state, _store, start) = setup().await;
        for minute in 1..=3u64 {
            set_pending_target(&state, minute as i64).await.unwrap();
            tick_at(&state, start + Duration::from_secs(60 * minute))
                .await
                .unwrap()
                .unwrap();
        }

        let history = recent_history(&state, Some(0)).await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].value, 3);
        assert_eq!(history[0].source, ResultSource::Pinned);

        let history = recent_history(&state, None).await.unwrap();
        let values: Vec<i8> = history.iter().map(|entry| entry.value).collect();
        assert_eq!(values, vec![3, 2, 1]);
    }

    #[tokio::test]
    async fn latest_target_defaults_to_zero() {
        let (state, store, start) = setup().await;
        assert_eq!(latest_target(&state).await.target_number, 0);

        set_pending_target(&state, 8).await.unwrap();
        tick_at(&state, start + Duration::from_secs(60)).await.unwrap();
        assert_eq!(latest_target(&state).await.target_number, 8);

        store.set_fail_reads(true);
        assert_eq!(latest_target(&state).await.target_number, 0);
    }

    #[tokio::test]
    async fn reward_settings_round_trip_through_store() {
        let (state, _store, _) = setup().await;
        let mut admin = state.admin_sse().subscribe();
        let defaults = reward_settings(&state).await.unwrap();
        assert_eq!(defaults.multiplier, RewardSettingsEntity::default().multiplier);

        let updated = update_reward_settings(
            &state,
            RewardSettingsPayload {
                multiplier: 5,
                probability: 30,
                reward_type: " coins ".into(),
                winning_number: 4,
            },
        )
        .await
        .unwrap();
        assert_eq!(updated.reward_type, "coins");
        assert_eq!(reward_settings(&state).await.unwrap().winning_number, 4);

        let event = admin.recv().await.unwrap();
        assert_eq!(event.event.as_deref(), Some(sse_events::EVENT_SETTINGS_UPDATED));
    }
}
