//! Library crate for wikirace-back, exposing modules for binaries and tests.

mod config;
/// Game records and the stores that keep them.
pub mod dao;
mod dto;
mod error;
/// HTTP and WebSocket routes.
pub mod routes;
/// Business logic behind the routes.
pub mod services;
/// Shared in-memory state: games, realtime fanout and codecs.
pub mod state;
