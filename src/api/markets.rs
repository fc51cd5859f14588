use axum::extract::State;
use axum::Json;
use serde::Deserialize;

use crate::api::AppState;
use crate::domain::{Market, MarketIdx};
use crate::error::AppError;
use crate::orchestration::MarketView;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectMarketRequest {
    pub market_idx: u32,
}

pub async fn get_current(State(state): State<AppState>) -> Json<MarketView> {
    let session = &state.session;
    let market = session.markets.current().await;
    let price = session.prices.price(market.idx()).await;
    Json(session.markets.view(price).await)
}

pub async fn put_current(
    State(state): State<AppState>,
    Json(body): Json<SelectMarketRequest>,
) -> Result<Json<MarketView>, AppError> {
    let market = Market::from_idx(MarketIdx(body.market_idx))
        .ok_or_else(|| AppError::BadRequest(format!("Unknown market {}", body.market_idx)))?;

    state.session.select_market(market).await;
    Ok(get_current(State(state)).await)
}
