use tokio::sync::{Mutex, broadcast};
use uuid::Uuid;

use crate::dto::sse::ServerEvent;

/// Public and admin broadcast hubs.
pub struct SseState {
    public: SseHub,
    admin: AdminSseState,
}

impl SseState {
    /// Create both hubs with the given channel capacities.
    pub fn new(public_capacity: usize, admin_capacity: usize) -> Self {
        Self {
            public: SseHub::new(public_capacity),
            admin: AdminSseState::new(admin_capacity),
        }
    }

    /// Hub behind `/sse/public`.
    pub fn public(&self) -> &SseHub {
        &self.public
    }

    /// Hub and token behind `/sse/admin`.
    pub fn admin(&self) -> &AdminSseState {
        &self.admin
    }
}

/// Admin hub plus the token handed to the single admin subscriber.
///
/// The same token authorises the `X-Admin-Token` protected routes.
pub struct AdminSseState {
    hub: SseHub,
    token: Mutex<Option<String>>,
}

impl AdminSseState {
    fn new(capacity: usize) -> Self {
        Self {
            hub: SseHub::new(capacity),
            token: Mutex::new(None),
        }
    }

    /// Broadcast hub for admin events.
    pub fn hub(&self) -> &SseHub {
        &self.hub
    }

    /// Generate a token when none is held.
    pub async fn claim(&self) -> Option<String> {
        let mut guard = self.token.lock().await;
        if guard.is_some() {
            return None;
        }
        let token = Uuid::new_v4().simple().to_string();
        *guard = Some(token.clone());
        Some(token)
    }

    /// Drop the current token so another admin can connect.
    pub async fn release(&self) {
        self.token.lock().await.take();
    }

    /// Whether `candidate` is the token currently held.
    pub async fn matches(&self, candidate: &str) -> bool {
        self.token.lock().await.as_deref() == Some(candidate)
    }
}

/// Broadcast hub backed by a Tokio broadcast channel.
pub struct SseHub {
    sender: broadcast::Sender<ServerEvent>,
}

impl SseHub {
    /// Hub whose channel keeps up to `capacity` unread events.
    pub fn new(capacity: usize) -> Self {
        let (sender, _receiver) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Register a new subscriber that will receive subsequent events.
    pub fn subscribe(&self) -> broadcast::Receiver<ServerEvent> {
        self.sender.subscribe()
    }

    /// Send an event to all current subscribers; events without listeners are dropped.
    pub fn broadcast(&self, event: ServerEvent) {
        let _ = self.sender.send(event);
    }

    /// Number of currently attached subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}
