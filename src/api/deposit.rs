use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::api::AppState;
use crate::chain::TxReceipt;
use crate::domain::{Decimal, PositionType};
use crate::engine::DepositQuote;
use crate::error::AppError;
use crate::orchestration::{DraftUpdate, SubmitStatus};

/// Draft patch. Absent fields are left alone; an empty string clears the field.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DepositPatch {
    #[serde(rename = "type")]
    pub deposit_type: Option<PositionType>,
    pub leverage: Option<String>,
    pub slippage: Option<String>,
    pub collateral: Option<String>,
    pub position: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DepositResponse {
    pub quote: DepositQuote,
    pub status: SubmitStatus,
}

pub async fn get_deposit(State(state): State<AppState>) -> Json<DepositResponse> {
    let desk = &state.session.deposit;
    Json(DepositResponse {
        quote: desk.quote().await,
        status: desk.status().await,
    })
}

pub async fn patch_deposit(
    State(state): State<AppState>,
    Json(patch): Json<DepositPatch>,
) -> Result<Json<DepositResponse>, AppError> {
    if patch.collateral.is_some() && patch.position.is_some() {
        return Err(AppError::BadRequest(
            "Set either collateral or position, not both".into(),
        ));
    }

    let update = DraftUpdate {
        deposit_type: patch.deposit_type,
        leverage: parse_field("leverage", patch.leverage)?,
        slippage: parse_field("slippage", patch.slippage)?,
        collateral: parse_field("collateral", patch.collateral)?,
        position: parse_field("position", patch.position)?,
    };
    state.session.deposit.update(update).await;
    Ok(get_deposit(State(state)).await)
}

pub async fn submit(State(state): State<AppState>) -> Result<Json<TxReceipt>, AppError> {
    let receipt = state.session.deposit.submit().await?;
    Ok(Json(receipt))
}

fn parse_field(name: &str, raw: Option<String>) -> Result<Option<Option<Decimal>>, AppError> {
    let Some(raw) = raw else {
        return Ok(None);
    };
    if raw.trim().is_empty() {
        return Ok(Some(None));
    }
    match Decimal::parse_input(&raw) {
        Some(value) if !value.is_negative() => Ok(Some(Some(value))),
        _ => Err(AppError::BadRequest(format!("Invalid {}: {}", name, raw))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_field() {
        assert!(matches!(parse_field("leverage", None), Ok(None)));
        assert!(matches!(parse_field("leverage", Some(" ".into())), Ok(Some(None))));
        assert_eq!(
            parse_field("leverage", Some("2.5".into())).unwrap(),
            Some(Some(Decimal::from_scaled(25, 1)))
        );
        assert!(parse_field("leverage", Some("-1".into())).is_err());
        assert!(parse_field("leverage", Some("ten".into())).is_err());
    }
}
