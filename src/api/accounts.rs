use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::api::AppState;
use crate::domain::Address;
use crate::error::AppError;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountsResponse {
    pub accounts: Vec<Address>,
    pub selected: Option<Address>,
}

#[derive(Debug, Deserialize)]
pub struct SelectAccountRequest {
    pub account: String,
}

pub async fn get_accounts(State(state): State<AppState>) -> Json<AccountsResponse> {
    let wallet = &state.session.wallet;
    Json(AccountsResponse {
        accounts: wallet.accounts().await,
        selected: wallet.selected().await,
    })
}

pub async fn put_selected(
    State(state): State<AppState>,
    Json(body): Json<SelectAccountRequest>,
) -> Result<Json<AccountsResponse>, AppError> {
    let account = Address::from_str(&body.account)
        .map_err(|e| AppError::BadRequest(format!("Invalid account address: {}", e)))?;

    state.session.select_account(&account).await?;
    Ok(get_accounts(State(state)).await)
}
