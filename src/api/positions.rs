use axum::extract::{Path, State};
use axum::Json;
use serde::Serialize;

use crate::api::AppState;
use crate::chain::TxReceipt;
use crate::error::AppError;
use crate::orchestration::PositionView;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PositionsResponse {
    pub loading: bool,
    pub positions: Vec<PositionView>,
}

pub async fn get_positions(State(state): State<AppState>) -> Json<PositionsResponse> {
    let book = &state.session.positions;
    Json(PositionsResponse {
        loading: book.is_loading().await,
        positions: book.views().await,
    })
}

pub async fn close_position(
    Path(id): Path<u64>,
    State(state): State<AppState>,
) -> Result<Json<TxReceipt>, AppError> {
    let receipt = state.session.positions.close_pos(id).await?;
    Ok(Json(receipt))
}
