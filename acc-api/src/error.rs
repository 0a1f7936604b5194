use tower_api_client::Error as ApiError;

#[derive(Debug)]
pub enum AccApiError {
    /// Non-2xx answer from the catalog. Status and body are kept verbatim.
    Upstream { status: u16, body: String },
    Api(ApiError),
    Http(reqwest::Error),
    Decode(serde_json::Error),
}

impl AccApiError {
    pub fn status(&self) -> Option<u16> {
        match self {
            AccApiError::Upstream { status, .. } => Some(*status),
            AccApiError::Http(e) => e.status().map(|s| s.as_u16()),
            AccApiError::Api(_) | AccApiError::Decode(_) => None,
        }
    }
}

impl From<ApiError> for AccApiError {
    fn from(value: ApiError) -> Self {
        match value {
            ApiError::ClientError(status, body) | ApiError::ServerError(status, body) => {
                AccApiError::Upstream {
                    status: status.as_u16(),
                    body,
                }
            }
            e => AccApiError::Api(e),
        }
    }
}

impl From<reqwest::Error> for AccApiError {
    fn from(value: reqwest::Error) -> Self {
        AccApiError::Http(value)
    }
}

impl From<serde_json::Error> for AccApiError {
    fn from(value: serde_json::Error) -> Self {
        AccApiError::Decode(value)
    }
}

impl std::fmt::Display for AccApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AccApiError::Upstream { status, body } => write!(f, "({}) {}", status, body),
            AccApiError::Api(e) => write!(f, "Catalog request failed: {}", e),
            AccApiError::Http(e) => write!(f, "HTTP error: {}", e),
            AccApiError::Decode(e) => write!(f, "Invalid response body: {}", e),
        }
    }
}

impl std::error::Error for AccApiError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            AccApiError::Http(e) => Some(e),
            AccApiError::Decode(e) => Some(e),
            AccApiError::Upstream { .. } | AccApiError::Api(_) => None,
        }
    }
}
