pub mod game_store;
pub mod keyed_store;
/// Stored record types.
pub mod models;
/// Errors shared by every storage backend.
pub mod storage;
