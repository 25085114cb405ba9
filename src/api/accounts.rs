use axum::extract::{Path, Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};

use super::AppState;
use crate::domain::{AccountId, Instrument, Trade};
use crate::engine::Summary;
use crate::error::AppError;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SummaryQuery {
    pub instrument: Option<String>,
}

pub async fn get_summary(
    Path(account_id): Path<String>,
    Query(params): Query<SummaryQuery>,
    State(state): State<AppState>,
) -> Result<Json<Summary>, AppError> {
    let instrument = params
        .instrument
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(Instrument::new);

    let summary = state
        .desk
        .account_summary(&AccountId::new(account_id), instrument)
        .await?;
    Ok(Json(summary))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TradesResponse {
    pub account_id: AccountId,
    pub trades: Vec<Trade>,
}

pub async fn get_trades(
    Path(account_id): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<TradesResponse>, AppError> {
    let account_id = AccountId::new(account_id);
    let trades = state.desk.trade_history(&account_id).await?;
    Ok(Json(TradesResponse { account_id, trades }))
}
