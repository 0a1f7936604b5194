pub mod endpoints;
mod error;
mod macros;
pub mod repositories;

pub use crate::error::AccApiError;
use repositories::*;
use reqwest::header::AUTHORIZATION;
use secrecy::{ExposeSecret, SecretString};
use tower_api_client::{Client as ApiClient, Request as ApiRequest};

pub const BASE_URL: &str = "https://developer.api.autodesk.com";

pub struct Client {
    inner: ApiClient,
    // Cursor hops go to absolute URLs outside the base
    http: reqwest::Client,
    base_url: String,
    access_token: SecretString,
}

impl Client {
    pub fn new(access_token: &str) -> Self {
        Self {
            inner: ApiClient::new(BASE_URL).bearer_auth(access_token),
            http: reqwest::Client::new(),
            base_url: BASE_URL.to_string(),
            access_token: SecretString::from(access_token.to_string()),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self.inner = ApiClient::new(self.base_url.as_str())
            .bearer_auth(self.access_token.expose_secret());
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub async fn send<R>(&self, request: R) -> Result<R::Response, AccApiError>
    where
        R: ApiRequest,
    {
        self.inner.send(request).await.map_err(From::from)
    }

    /// POST a JSON body to an absolute URL handed out by the server.
    pub(crate) async fn post_absolute(
        &self,
        url: &str,
        body: &serde_json::Value,
    ) -> Result<serde_json::Value, AccApiError> {
        let response = self
            .http
            .post(url)
            .header(
                AUTHORIZATION,
                format!("Bearer {}", self.access_token.expose_secret()),
            )
            .json(body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AccApiError::Upstream {
                status: status.as_u16(),
                body,
            });
        }

        let bytes = response.bytes().await?;
        Ok(serde_json::from_slice(&bytes)?)
    }
}

pub struct Request;

impl Request {
    pub fn hubs() -> HubRepository {
        HubRepository::new()
    }

    pub fn projects() -> ProjectRepository {
        ProjectRepository::new()
    }

    pub fn photos() -> PhotoRepository {
        PhotoRepository::new()
    }
}
