use std::{future::Future, sync::Arc, time::Duration};

use tokio::time::sleep;
use tracing::{info, warn};

use crate::{
    dao::{draw_store::SpinStore, storage::StorageError},
    services::sse_events,
    state::SharedState,
};

const INITIAL_DELAY: Duration = Duration::from_millis(1_000);
const MAX_DELAY: Duration = Duration::from_secs(10);
const HEALTH_POLL_INTERVAL: Duration = Duration::from_secs(5);
const MAX_RECONNECT_ATTEMPTS: u32 = 3;

/// Keep a storage backend installed, falling back to degraded mode while it is unreachable.
///
/// `connect` builds a fresh backend; it is called again whenever in-place
/// reconnection attempts are exhausted.
pub async fn run<F, Fut>(state: SharedState, mut connect: F)
where
    F: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = Result<Arc<dyn SpinStore>, StorageError>> + Send,
{
    let mut delay = INITIAL_DELAY;

    loop {
        match connect().await {
            Ok(store) => {
                install(&state, store.clone()).await;
                info!("storage connection established; leaving degraded mode");
                delay = INITIAL_DELAY;

                supervise(&state, store).await;
                warn!("exhausted storage reconnect attempts; rebuilding the connection");

                sleep(delay).await;
                delay = (delay * 2).min(MAX_DELAY);
            }
            Err(err) => {
                warn!(error = %err, "storage connection attempt failed");
                sleep(delay).await;
                delay = (delay * 2).min(MAX_DELAY);
            }
        }
    }
}

/// Poll `store` until it fails and cannot be revived in place.
async fn supervise(state: &SharedState, store: Arc<dyn SpinStore>) {
    loop {
        match store.health_check().await {
            Ok(()) => sleep(HEALTH_POLL_INTERVAL).await,
            Err(err) => {
                warn!(error = %err, "storage health check failed; entering degraded mode");
                clear(state).await;

                if !reconnect(store.as_ref()).await {
                    return;
                }
                install(state, store.clone()).await;
                info!("storage reconnection succeeded; leaving degraded mode");
                sleep(HEALTH_POLL_INTERVAL).await;
            }
        }
    }
}

async fn reconnect(store: &dyn SpinStore) -> bool {
    let mut reconnect_delay = INITIAL_DELAY;
    for attempt in 1..=MAX_RECONNECT_ATTEMPTS {
        match store.try_reconnect().await {
            Ok(()) => return true,
            Err(err) => {
                warn!(attempt, error = %err, "storage reconnect attempt failed");
                sleep(reconnect_delay).await;
                reconnect_delay = (reconnect_delay * 2).min(MAX_DELAY);
            }
        }
    }
    false
}

async fn install(state: &SharedState, store: Arc<dyn SpinStore>) {
    let was_degraded = state.is_degraded().await;
    state.install_store(store).await;
    if was_degraded {
        sse_events::broadcast_system_status(state, false);
    }
}

async fn clear(state: &SharedState) {
    let was_degraded = state.is_degraded().await;
    state.clear_store().await;
    if !was_degraded {
        sse_events::broadcast_system_status(state, true);
    }
}
