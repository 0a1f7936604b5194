use axum::{body::Bytes, extract::State, Json};
use serde_json::Value;

use crate::{
    error::ServerError,
    extract::AuthSession,
    models::{CheckRequest, CheckResponse},
    services::find_uploaded_ids,
    AppState,
};

/// Report which of the posted photo ids are already in storage.
pub async fn check_photos(
    State(state): State<AppState>,
    _auth: AuthSession,
    body: Bytes,
) -> Result<Json<CheckResponse>, ServerError> {
    let body: Value = serde_json::from_slice(&body).unwrap_or(Value::Null);
    let request = CheckRequest::from_value(&body)
        .ok_or_else(|| ServerError::BadRequest("Invalid photoIds".to_string()))?;

    if request.photo_ids.is_empty() {
        return Ok(Json(CheckResponse {
            uploaded_ids: Vec::new(),
        }));
    }

    let uploaded_ids = find_uploaded_ids(state.blobs.as_ref(), &request.photo_ids).await?;
    tracing::info!(
        requested = request.photo_ids.len(),
        uploaded = uploaded_ids.len(),
        "Checked photos"
    );
    Ok(Json(CheckResponse { uploaded_ids }))
}
