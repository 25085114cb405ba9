use axum::extract::State;
use axum::Json;

use super::AppState;
use crate::domain::Command;
use crate::error::AppError;
use crate::orchestration::CommandOutcome;

/// Execute one structured command for one account.
pub async fn post_command(
    State(state): State<AppState>,
    Json(command): Json<Command>,
) -> Result<Json<CommandOutcome>, AppError> {
    if command.account_id.as_str().trim().is_empty() {
        return Err(AppError::BadRequest("account_id must not be empty".to_string()));
    }
    Ok(Json(state.desk.execute(command).await?))
}
