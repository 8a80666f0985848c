/// Database model definitions.
pub mod models;
/// Phase snapshot storage and retrieval operations.
pub mod phase_store;
/// Storage abstraction layer for database operations.
pub mod storage;
