use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;

use crate::api::AppState;

pub async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({"status": "ok"}))
}

/// Ready once an account is selected and the current market has a snapshot.
pub async fn ready(State(state): State<AppState>) -> (StatusCode, Json<serde_json::Value>) {
    let account = state.session.wallet.selected().await;
    let market_synced = state.session.markets.snapshot().await.is_some();

    if account.is_some() && market_synced {
        (StatusCode::OK, Json(serde_json::json!({"status": "ready"})))
    } else {
        (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(serde_json::json!({
                "status": "starting",
                "accountSelected": account.is_some(),
                "marketSynced": market_synced,
            })),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_health_returns_ok() {
        let Json(body) = health().await;
        assert_eq!(body["status"], "ok");
    }
}
