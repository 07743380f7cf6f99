/// Draw history, settings and player persistence.
pub mod draw_store;
/// Database model definitions.
pub mod models;
/// Storage abstraction layer for database operations.
pub mod storage;
