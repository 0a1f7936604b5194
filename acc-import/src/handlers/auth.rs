use axum::{
    extract::{Query, State},
    response::Redirect,
};
use axum_extra::extract::cookie::CookieJar;

use crate::{
    cookies,
    error::ServerError,
    models::CallbackParams,
    services::{OAuthClient, SessionManager},
    AppState,
};

/// Start the three-legged flow: remember a fresh state token and send the
/// browser to the identity provider.
pub async fn login(State(state): State<AppState>, jar: CookieJar) -> (CookieJar, Redirect) {
    let csrf_state = OAuthClient::generate_state_token();
    let authorize_url = state.tokens.authorization_url(&csrf_state);

    tracing::info!("Redirecting to identity provider");

    let jar = jar.add(cookies::state_cookie(&csrf_state, state.settings.production));
    (jar, Redirect::temporary(&authorize_url))
}

pub async fn oauth_callback(
    State(state): State<AppState>,
    jar: CookieJar,
    Query(params): Query<CallbackParams>,
) -> Result<(CookieJar, Redirect), ServerError> {
    let expected = cookies::oauth_state(&jar);
    let state_matches = match (expected.as_deref(), params.state.as_deref()) {
        (Some(expected), Some(returned)) => !returned.is_empty() && expected == returned,
        _ => false,
    };
    if !state_matches {
        tracing::warn!(
            has_cookie = expected.is_some(),
            has_param = params.state.is_some(),
            "OAuth state mismatch"
        );
        return Err(ServerError::InvalidState);
    }

    let code = params
        .code
        .filter(|code| !code.is_empty())
        .ok_or(ServerError::MissingCode)?;

    let grant = state.tokens.exchange_code(&code).await?;
    let session = SessionManager::session_from_grant(grant);
    let session_id = state.sessions.create_session(&session).await?;

    tracing::info!("OAuth callback successful");

    let secure = state.settings.production;
    let jar = jar
        .add(cookies::session_cookie(&session_id, secure))
        .add(cookies::clear_state_cookie(secure));
    Ok((jar, Redirect::temporary(&state.settings.import_redirect())))
}

/// Drop the session (if any) and always clear the cookie.
pub async fn logout(
    State(state): State<AppState>,
    jar: CookieJar,
) -> Result<(CookieJar, Redirect), ServerError> {
    if let Some(session_id) = cookies::session_id(&jar) {
        state.sessions.delete_session(&session_id).await?;
        tracing::info!("Logged out");
    }

    let jar = jar.add(cookies::clear_session_cookie(state.settings.production));
    Ok((jar, Redirect::temporary(&state.settings.public_url)))
}
