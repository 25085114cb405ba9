use axum::extract::{Query, State};
use axum::Json;
use serde::Deserialize;

use super::AppState;
use crate::engine::RankEntry;
use crate::error::AppError;

const MAX_LIMIT: usize = 1000;

#[derive(Debug, Deserialize)]
pub struct RankingQuery {
    pub worst: Option<bool>,
    pub limit: Option<usize>,
}

pub async fn get_ranking(
    Query(params): Query<RankingQuery>,
    State(state): State<AppState>,
) -> Result<Json<Vec<RankEntry>>, AppError> {
    let limit = match params.limit {
        Some(0) => return Err(AppError::BadRequest("limit must be positive".to_string())),
        Some(n) => Some(n.min(MAX_LIMIT)),
        None => None,
    };

    let entries = state
        .desk
        .ranking(params.worst.unwrap_or(false), limit)
        .await?;
    Ok(Json(entries))
}
