use serde::Serialize;
use utoipa::ToSchema;

/// Simple health response returned by the `/healthcheck` route.
#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    /// Health status ("ok" or "degraded").
    pub status: String,
    /// Games currently held in memory.
    pub active_games: usize,
}

impl HealthResponse {
    /// Create a health response indicating the game store is reachable.
    pub fn ok(active_games: usize) -> Self {
        Self {
            status: "ok".to_string(),
            active_games,
        }
    }

    /// Create a health response indicating the game store failed its check.
    pub fn degraded(active_games: usize) -> Self {
        Self {
            status: "degraded".to_string(),
            active_games,
        }
    }
}
