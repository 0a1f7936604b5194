use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum_extra::extract::cookie::CookieJar;
use chrono::Utc;

use crate::cookies;
use crate::error::ServerError;
use crate::models::Session;
use crate::AppState;

/// Signed-in caller, resolved (and refreshed when due) from the session cookie.
///
/// Rejects with `401` when there is no session, or when it has expired and
/// cannot be refreshed. A session whose refresh just failed is let through so
/// the upstream call reports the real authorization error.
#[derive(Debug, Clone)]
pub struct AuthSession {
    pub session_id: String,
    pub session: Session,
}

impl AuthSession {
    /// Catalog client authorized with this session's bearer token.
    pub fn catalog(&self, base_url: &str) -> acc_api::Client {
        acc_api::Client::new(&self.session.access_token).with_base_url(base_url)
    }
}

impl FromRequestParts<AppState> for AuthSession {
    type Rejection = ServerError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let jar = CookieJar::from_headers(&parts.headers);
        let session_id = cookies::session_id(&jar).ok_or(ServerError::Unauthorized)?;

        let session = state
            .sessions
            .get_session(&session_id)
            .await?
            .ok_or(ServerError::Unauthorized)?;

        if session.is_expired(Utc::now()) && !session.can_refresh() {
            tracing::debug!("Rejecting expired session");
            return Err(ServerError::Unauthorized);
        }

        Ok(Self {
            session_id,
            session,
        })
    }
}
