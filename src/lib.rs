//! Library crate for spin-draw-back, exposing modules for binaries and tests.

/// Configuration loaded from disk.
pub mod config;
/// Storage traits, entities and backends.
pub mod dao;
/// Request and response payloads.
pub mod dto;
/// Service and HTTP error types.
pub mod error;
/// Axum routers.
pub mod routes;
/// Business logic behind the routes.
pub mod services;
/// Shared application state and the draw scheduler.
pub mod state;
