use axum::extract::{Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};

use super::AppState;
use crate::domain::{Instrument, Quote};
use crate::error::AppError;

#[derive(Debug, Deserialize)]
pub struct RateQuery {
    pub instrument: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct RateResponse {
    pub instrument: Instrument,
    pub quote: Quote,
}

pub async fn get_rate(
    Query(params): Query<RateQuery>,
    State(state): State<AppState>,
) -> Result<Json<RateResponse>, AppError> {
    let instrument = params
        .instrument
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(Instrument::new)
        .unwrap_or_else(|| state.desk.settings().default_instrument.clone());

    let quote = state.desk.rate(&instrument).await?;
    Ok(Json(RateResponse { instrument, quote }))
}
