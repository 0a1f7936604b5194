mod auth;
mod catalog;
mod check;
mod images;
mod import;
mod runs;

pub use auth::{login, logout, oauth_callback};
pub use catalog::{list_hubs, list_photos, list_projects};
pub use check::check_photos;
pub use images::delete_image;
pub use import::import_from_acc;
pub use runs::get_run;

use crate::models::HealthResponse;
use axum::Json;

pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}
