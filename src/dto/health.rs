use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Health payload returned by the `/healthcheck` route.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct HealthResponse {
    /// Health status ("ok" or "degraded").
    pub status: String,
    /// Whether a draw resolution is currently in flight.
    pub resolving: bool,
    /// Number of clients attached to the public SSE stream.
    pub public_subscribers: usize,
}

impl HealthResponse {
    /// Summarise backend health.
    pub fn new(degraded: bool, resolving: bool, public_subscribers: usize) -> Self {
        Self {
            status: if degraded { "degraded" } else { "ok" }.to_string(),
            resolving,
            public_subscribers,
        }
    }
}
