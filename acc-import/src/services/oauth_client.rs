use async_trait::async_trait;
use chrono::Duration;
use oauth2::{
    basic::{BasicClient, BasicTokenResponse, BasicTokenType},
    AuthUrl, AuthorizationCode, ClientId, ClientSecret, CsrfToken, HttpRequest, HttpResponse,
    RedirectUrl, RefreshToken, Scope, TokenResponse, TokenUrl,
};
use rand::Rng;

use crate::config::OAuthConfiguration;
use crate::error::ServerError;

// Simple async HTTP client for OAuth2
async fn http_client(request: HttpRequest) -> Result<HttpResponse, reqwest::Error> {
    let client = reqwest::Client::new();
    let mut builder = client
        .request(request.method().clone(), request.uri().to_string())
        .body(request.body().clone());

    for (name, value) in request.headers() {
        builder = builder.header(name.as_str(), value.as_bytes());
    }

    let response = builder.send().await?;
    let status = response.status();
    let body = response.bytes().await?.to_vec();

    let mut http_response = HttpResponse::new(body);
    *http_response.status_mut() = status;

    Ok(http_response)
}

/// Tokens handed out by the identity provider, before they become a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenGrant {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_in: Duration,
    pub token_type: String,
}

/// The identity provider's side of the three-legged flow.
#[async_trait]
pub trait TokenProvider: Send + Sync {
    /// Authorization URL carrying `state` and the configured scopes.
    fn authorization_url(&self, state: &str) -> String;

    async fn exchange_code(&self, code: &str) -> Result<TokenGrant, ServerError>;

    async fn refresh(&self, refresh_token: &str) -> Result<TokenGrant, ServerError>;
}

pub struct OAuthClient {
    client_id: String,
    client_secret: String,
    auth_url: AuthUrl,
    token_url: TokenUrl,
    redirect_url: RedirectUrl,
    scopes: Vec<String>,
}

impl OAuthClient {
    pub fn new(config: &OAuthConfiguration) -> Result<Self, ServerError> {
        let auth_url = AuthUrl::new(config.authorize_url.clone())
            .map_err(|e| ServerError::Configuration(format!("Invalid auth URL: {}", e)))?;

        let token_url = TokenUrl::new(config.token_url.clone())
            .map_err(|e| ServerError::Configuration(format!("Invalid token URL: {}", e)))?;

        let redirect_url = RedirectUrl::new(config.redirect_uri.clone())
            .map_err(|e| ServerError::Configuration(format!("Invalid redirect URI: {}", e)))?;

        Ok(Self {
            client_id: config.client_id.clone(),
            client_secret: config.client_secret.clone(),
            auth_url,
            token_url,
            redirect_url,
            scopes: config.scopes.clone(),
        })
    }

    fn grant_from(token_result: &BasicTokenResponse) -> Result<TokenGrant, ServerError> {
        let expires_in = token_result
            .expires_in()
            .ok_or_else(|| ServerError::OAuthError("No expiration time in response".to_string()))?;
        let expires_in = Duration::from_std(expires_in)
            .map_err(|e| ServerError::OAuthError(format!("Invalid expiration time: {}", e)))?;

        let token_type = match token_result.token_type() {
            BasicTokenType::Bearer => "Bearer".to_string(),
            BasicTokenType::Mac => "MAC".to_string(),
            BasicTokenType::Extension(other) => other.clone(),
        };

        Ok(TokenGrant {
            access_token: token_result.access_token().secret().to_string(),
            refresh_token: token_result
                .refresh_token()
                .map(|token| token.secret().to_string()),
            expires_in,
            token_type,
        })
    }

    /// Generate a random CSRF state token, safe to place in a cookie
    pub fn generate_state_token() -> String {
        use base64::Engine;
        let mut rng = rand::rng();
        let random_bytes: Vec<u8> = (0..32).map(|_| rng.random()).collect();
        base64::prelude::BASE64_URL_SAFE_NO_PAD.encode(&random_bytes)
    }
}

#[async_trait]
impl TokenProvider for OAuthClient {
    fn authorization_url(&self, state: &str) -> String {
        let csrf_token = CsrfToken::new(state.to_string());
        let (auth_url, _) = BasicClient::new(ClientId::new(self.client_id.clone()))
            .set_client_secret(ClientSecret::new(self.client_secret.clone()))
            .set_auth_uri(self.auth_url.clone())
            .set_token_uri(self.token_url.clone())
            .set_redirect_uri(self.redirect_url.clone())
            .authorize_url(|| csrf_token)
            .add_scopes(self.scopes.iter().cloned().map(Scope::new))
            .url();
        auth_url.to_string()
    }

    /// Exchange authorization code for access and refresh tokens
    async fn exchange_code(&self, code: &str) -> Result<TokenGrant, ServerError> {
        let token_result = BasicClient::new(ClientId::new(self.client_id.clone()))
            .set_client_secret(ClientSecret::new(self.client_secret.clone()))
            .set_auth_uri(self.auth_url.clone())
            .set_token_uri(self.token_url.clone())
            .set_redirect_uri(self.redirect_url.clone())
            .exchange_code(AuthorizationCode::new(code.to_string()))
            .request_async(&http_client)
            .await?;

        let grant = Self::grant_from(&token_result)?;
        tracing::debug!(
            expires_in_secs = grant.expires_in.num_seconds(),
            "Exchanged code for tokens"
        );
        Ok(grant)
    }

    /// Refresh an access token. The response may omit a new refresh token.
    async fn refresh(&self, refresh_token: &str) -> Result<TokenGrant, ServerError> {
        let token_result = BasicClient::new(ClientId::new(self.client_id.clone()))
            .set_client_secret(ClientSecret::new(self.client_secret.clone()))
            .set_auth_uri(self.auth_url.clone())
            .set_token_uri(self.token_url.clone())
            .set_redirect_uri(self.redirect_url.clone())
            .exchange_refresh_token(&RefreshToken::new(refresh_token.to_string()))
            .add_scopes(self.scopes.iter().cloned().map(Scope::new))
            .request_async(&http_client)
            .await?;

        let grant = Self::grant_from(&token_result)?;
        tracing::debug!(
            expires_in_secs = grant.expires_in.num_seconds(),
            "Refreshed tokens"
        );
        Ok(grant)
    }
}
