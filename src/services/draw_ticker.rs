//! Background task resolving draws when no client is polling.

use std::time::SystemTime;

use tokio::time::{self, MissedTickBehavior};
use tracing::{debug, info};

use crate::{dao::models::DrawResultEntity, services::draw_service, state::SharedState};

/// Tick the draw scheduler forever at the configured cadence.
///
/// Failures are logged by the scheduler and the loop keeps going.
pub async fn run(state: SharedState) {
    let period = state.config().tick_interval();
    let mut ticker = time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    info!(
        tick_ms = period.as_millis() as u64,
        draw_interval_ms = state.scheduler().interval().as_millis() as u64,
        "draw ticker started"
    );

    loop {
        ticker.tick().await;
        tick_once(&state, SystemTime::now()).await;
    }
}

/// One ticker iteration against an explicit clock reading.
pub async fn tick_once(state: &SharedState, now: SystemTime) -> Option<DrawResultEntity> {
    match draw_service::tick_at(state, now).await {
        Ok(result) => result,
        Err(err) => {
            debug!(error = %err, "scheduled tick did not produce a draw");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use std::{sync::Arc, time::Duration};

    use super::*;
    use crate::{config::AppConfig, dao::draw_store::memory::MemoryStore, state::AppState};

    const INTERVAL: Duration = Duration::from_secs(60);

    async fn setup() -> (SharedState, MemoryStore) {
        let state = AppState::new(AppConfig::with_draw_interval(INTERVAL));
        let store = MemoryStore::new();
        state.install_store(Arc::new(store.clone())).await;
        (state, store)
    }

    #[tokio::test]
    async fn ticker_and_status_request_share_one_draw() {
        let (state, store) = setup().await;
        store
            .set_append_delay(Some(Duration::from_millis(50)))
            .await;
        let due = state.scheduler().next_deadline();

        let (_, status) = tokio::join!(
            tick_once(&state, due),
            draw_service::status_at(&state, due)
        );

        assert_eq!(store.results().await.len(), 1);
        assert_eq!(state.scheduler().next_deadline(), due + INTERVAL);
        assert_eq!(status.seconds_remaining, INTERVAL.as_secs());
        assert!(!state.scheduler().is_resolving());

        assert!(tick_once(&state, due).await.is_none());
        assert!(draw_service::status_at(&state, due).await.seconds_remaining > 0);
        assert_eq!(store.results().await.len(), 1);
    }

    #[tokio::test]
    async fn ticker_survives_a_failed_draw() {
        let (state, store) = setup().await;
        let due = state.scheduler().next_deadline();

        store.set_fail_writes(true);
        assert!(tick_once(&state, due).await.is_none());
        assert!(!state.scheduler().is_resolving());

        store.set_fail_writes(false);
        assert!(tick_once(&state, due + INTERVAL).await.is_some());
        assert_eq!(store.results().await.len(), 1);
    }
}
