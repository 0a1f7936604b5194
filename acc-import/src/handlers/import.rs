use axum::{body::Bytes, extract::State, Json};
use serde_json::Value;
use tracing::Instrument;

use crate::{
    error::ServerError,
    extract::AuthSession,
    models::{BatchReport, ImportRequest},
    AppState,
};

/// Schedule an import run for each new photo and report per-photo outcomes.
pub async fn import_from_acc(
    State(state): State<AppState>,
    _auth: AuthSession,
    body: Bytes,
) -> Result<Json<BatchReport>, ServerError> {
    let body: Value = serde_json::from_slice(&body).unwrap_or(Value::Null);
    let request =
        ImportRequest::from_value(&body).map_err(|e| ServerError::BadRequest(e.to_string()))?;

    let span = tracing::info_span!(
        "import_from_acc",
        hub_id = %request.hub_id,
        project_id = %request.project_id,
        photos = request.photos.len()
    );
    let report = state.importer.import_batch(&request).instrument(span).await;

    Ok(Json(report))
}
