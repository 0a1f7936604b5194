use axum::{
    extract::{Path, State},
    Json,
};

use crate::{error::ServerError, extract::AuthSession, models::DeleteImageResponse, AppState};

/// Remove a stored image and its search record.
pub async fn delete_image(
    State(state): State<AppState>,
    _auth: AuthSession,
    Path(pathname): Path<String>,
) -> Result<Json<DeleteImageResponse>, ServerError> {
    let pathname = pathname.trim_matches('/');
    if pathname.is_empty() {
        return Err(ServerError::BadRequest("Missing pathname".to_string()));
    }

    state.blobs.delete(pathname).await?;
    state.index.delete(pathname).await?;

    tracing::info!(pathname = %pathname, "Image deleted");
    Ok(Json(DeleteImageResponse { success: true }))
}
