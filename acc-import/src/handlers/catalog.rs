use acc_api::Request;
use axum::{
    extract::{Query, State},
    Json,
};
use tracing::Instrument;

use crate::{
    error::ServerError,
    extract::AuthSession,
    models::{HubsResponse, PhotosParams, PhotosResponse, ProjectsParams, ProjectsResponse},
    AppState,
};

pub async fn list_hubs(
    State(state): State<AppState>,
    auth: AuthSession,
) -> Result<Json<HubsResponse>, ServerError> {
    let client = auth.catalog(&state.settings.acc_api_base_url);

    let hubs = client
        .send(Request::hubs().list())
        .instrument(tracing::info_span!("list_hubs"))
        .await
        .map_err(|e| ServerError::upstream("Failed to fetch hubs", e))?
        .into_named();

    tracing::info!(count = hubs.len(), "Listed hubs");
    Ok(Json(HubsResponse { hubs }))
}

pub async fn list_projects(
    State(state): State<AppState>,
    auth: AuthSession,
    Query(params): Query<ProjectsParams>,
) -> Result<Json<ProjectsResponse>, ServerError> {
    let hub_id = params
        .hub_id
        .filter(|id| !id.is_empty())
        .ok_or_else(|| ServerError::BadRequest("Missing hubId".to_string()))?;

    let client = auth.catalog(&state.settings.acc_api_base_url);
    let projects = client
        .send(Request::projects().with_hub(&hub_id).list())
        .instrument(tracing::info_span!("list_projects", hub_id = %hub_id))
        .await
        .map_err(|e| ServerError::upstream("Failed to fetch projects", e))?
        .into_named();

    tracing::info!(hub_id = %hub_id, count = projects.len(), "Listed projects");
    Ok(Json(ProjectsResponse { projects }))
}

pub async fn list_photos(
    State(state): State<AppState>,
    auth: AuthSession,
    Query(params): Query<PhotosParams>,
) -> Result<Json<PhotosResponse>, ServerError> {
    let limit = params.limit();
    let project_id = params
        .project_id
        .filter(|id| !id.is_empty())
        .ok_or_else(|| ServerError::BadRequest("Missing projectId".to_string()))?;

    let client = auth.catalog(&state.settings.acc_api_base_url);
    let photos = client
        .photos(Request::photos().with_project(&project_id).filter().limit(limit))
        .instrument(tracing::info_span!("list_photos", project_id = %project_id))
        .await
        .map_err(|e| ServerError::upstream("Failed to fetch photos", e))?;

    tracing::info!(project_id = %project_id, count = photos.len(), "Listed photos");
    Ok(Json(PhotosResponse { photos }))
}
