use axum::{
    extract::{Path, State},
    Json,
};

use crate::{error::ServerError, extract::AuthSession, models::RunResponse, AppState};

pub async fn get_run(
    State(state): State<AppState>,
    _auth: AuthSession,
    Path(run_id): Path<String>,
) -> Result<Json<RunResponse>, ServerError> {
    let record = state
        .queue
        .get(&run_id)
        .await
        .ok_or_else(|| ServerError::NotFound(format!("Unknown run: {}", run_id)))?;

    Ok(Json(RunResponse::from(record)))
}
