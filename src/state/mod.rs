pub mod draw;
pub mod draw_scheduler;
mod sse;

use std::{sync::Arc, time::SystemTime};

use tokio::sync::{RwLock, watch};

use crate::{config::AppConfig, dao::draw_store::SpinStore, error::ServiceError};

pub use self::sse::SseHub;
use self::{draw_scheduler::DrawScheduler, sse::SseState};

/// Handle to [`AppState`] shared across handlers and tasks.
pub type SharedState = Arc<AppState>;

/// Capacity of each SSE broadcast channel.
const SSE_CHANNEL_CAPACITY: usize = 32;

/// Central application state: storage handle, draw scheduler and SSE hubs.
pub struct AppState {
    store: RwLock<Option<Arc<dyn SpinStore>>>,
    scheduler: DrawScheduler,
    config: AppConfig,
    sse: SseState,
    degraded: watch::Sender<bool>,
}

impl AppState {
    /// Construct a new [`AppState`] wrapped in an [`Arc`] so it can be cloned cheaply.
    ///
    /// The first draw is due one interval after construction. The application
    /// starts in degraded mode until a storage backend is installed.
    pub fn new(config: AppConfig) -> SharedState {
        let (degraded_tx, _rx) = watch::channel(true);
        Arc::new(Self {
            store: RwLock::new(None),
            scheduler: DrawScheduler::new(config.draw_interval(), SystemTime::now()),
            config,
            sse: SseState::new(SSE_CHANNEL_CAPACITY, SSE_CHANNEL_CAPACITY),
            degraded: degraded_tx,
        })
    }

    /// Obtain a handle to the current store, if one is installed.
    pub async fn store(&self) -> Option<Arc<dyn SpinStore>> {
        let guard = self.store.read().await;
        guard.as_ref().cloned()
    }

    /// Like [`AppState::store`] but fails with [`ServiceError::Degraded`] when none is installed.
    pub async fn require_store(&self) -> Result<Arc<dyn SpinStore>, ServiceError> {
        self.store().await.ok_or(ServiceError::Degraded)
    }

    /// Install a new store implementation and leave degraded mode.
    pub async fn install_store(&self, store: Arc<dyn SpinStore>) {
        {
            let mut guard = self.store.write().await;
            *guard = Some(store);
        }
        self.update_degraded(false);
    }

    /// Remove the current store and enter degraded mode.
    pub async fn clear_store(&self) {
        {
            let mut guard = self.store.write().await;
            guard.take();
        }
        self.update_degraded(true);
    }

    /// Current degraded flag.
    pub async fn is_degraded(&self) -> bool {
        let guard = self.store.read().await;
        guard.is_none()
    }

    /// Subscribe to degraded mode updates.
    pub fn degraded_watcher(&self) -> watch::Receiver<bool> {
        self.degraded.subscribe()
    }

    /// Process-wide draw scheduler.
    pub fn scheduler(&self) -> &DrawScheduler {
        &self.scheduler
    }

    /// Configuration loaded at startup.
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Broadcast hub used for the public SSE stream.
    pub fn public_sse(&self) -> &SseHub {
        self.sse.public()
    }

    /// Broadcast hub used for the admin SSE stream.
    pub fn admin_sse(&self) -> &SseHub {
        self.sse.admin().hub()
    }

    /// Reserve the single admin token; `None` if another admin already holds it.
    pub async fn claim_admin_token(&self) -> Option<String> {
        self.sse.admin().claim().await
    }

    /// Release the admin token so the next admin connection gets a fresh one.
    pub async fn release_admin_token(&self) {
        self.sse.admin().release().await;
    }

    /// Whether `candidate` matches the admin token currently handed out.
    pub async fn admin_token_matches(&self, candidate: &str) -> bool {
        self.sse.admin().matches(candidate).await
    }

    /// Publish the degraded flag, notifying watchers only when it flips.
    fn update_degraded(&self, value: bool) {
        self.degraded.send_if_modified(|current| {
            if *current == value {
                return false;
            }
            *current = value;
            true
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dao::draw_store::memory::MemoryStore;

    #[tokio::test]
    async fn starts_degraded_until_a_store_is_installed() {
        let state = AppState::new(AppConfig::default());
        let mut watcher = state.degraded_watcher();
        assert!(state.is_degraded().await);
        assert!(matches!(state.require_store().await, Err(ServiceError::Degraded)));

        state.install_store(Arc::new(MemoryStore::new())).await;
        assert!(!state.is_degraded().await);
        assert!(watcher.has_changed().unwrap());
        assert!(!*watcher.borrow_and_update());

        state.clear_store().await;
        assert!(state.is_degraded().await);
        assert!(*watcher.borrow_and_update());
    }

    #[tokio::test]
    async fn admin_token_is_exclusive() {
        let state = AppState::new(AppConfig::default());
        let token = state.claim_admin_token().await.unwrap();
        assert!(state.claim_admin_token().await.is_none());
        assert!(state.admin_token_matches(&token).await);
        assert!(!state.admin_token_matches("nope").await);

        state.release_admin_token().await;
        assert!(!state.admin_token_matches(&token).await);
        assert!(state.claim_admin_token().await.is_some());
    }
}
