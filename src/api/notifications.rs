use axum::extract::{Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::api::AppState;
use crate::orchestration::Notification;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationsQuery {
    /// Only notifications with a larger id.
    pub after_id: Option<u64>,
}

#[derive(Debug, Serialize)]
pub struct NotificationsResponse {
    pub notifications: Vec<Notification>,
}

pub async fn get_notifications(
    Query(params): Query<NotificationsQuery>,
    State(state): State<AppState>,
) -> Json<NotificationsResponse> {
    let after = params.after_id.unwrap_or(0);
    let notifications = state
        .session
        .notifier
        .recent()
        .into_iter()
        .filter(|n| n.id > after)
        .collect();
    Json(NotificationsResponse { notifications })
}
