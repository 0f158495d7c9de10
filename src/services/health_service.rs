use tracing::warn;

use crate::{dto::health::HealthResponse, state::SharedState};

/// Report whether the game store answers, logging the failure when it does not.
pub async fn health_status(state: &SharedState) -> HealthResponse {
    let games = state.games();
    match games.keyed_store().health_check().await {
        Ok(()) => HealthResponse::ok(games.active_count()),
        Err(err) => {
            warn!(error = %err, "storage health check failed");
            HealthResponse::degraded(games.active_count())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::state::test_support::memory_state;

    #[tokio::test]
    async fn memory_store_is_healthy() {
        let status = health_status(&memory_state()).await;
        assert_eq!(status.status, "ok");
        assert_eq!(status.active_games, 0);
    }
}
