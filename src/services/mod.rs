/// OpenAPI documentation generation.
pub mod documentation;
/// Countdown, target, history and reward settings operations.
pub mod draw_service;
/// Background task resolving due draws.
pub mod draw_ticker;
/// Health check service.
pub mod health_service;
/// Player accounts and wallets.
pub mod player_service;
/// Server-Sent Events message generation.
pub mod sse_events;
/// Server-Sent Events broadcasting service.
pub mod sse_service;
/// Storage connection supervisor toggling degraded mode.
pub mod storage_supervisor;
