use serde::Deserialize;
use std::path::PathBuf;

#[derive(Debug, Deserialize, Clone)]
pub struct Configuration {
    #[serde(default)]
    pub server: ServerConfiguration,
    pub oauth: OAuthConfiguration,
    #[serde(default)]
    pub acc: AccConfiguration,
    #[serde(default)]
    pub worker: WorkerConfiguration,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfiguration {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Marks cookies `secure`.
    #[serde(default)]
    pub production: bool,

    /// Where the browser lands after login, logout and the OAuth callback.
    #[serde(default = "default_public_url")]
    pub public_url: String,

    /// Root of the durable run queue.
    #[serde(default = "default_state_dir")]
    pub state_dir: PathBuf,
}

impl Default for ServerConfiguration {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            production: false,
            public_url: default_public_url(),
            state_dir: default_state_dir(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct OAuthConfiguration {
    pub client_id: String,
    pub client_secret: String,
    pub redirect_uri: String,

    #[serde(default = "default_authorize_url")]
    pub authorize_url: String,

    #[serde(default = "default_token_url")]
    pub token_url: String,

    #[serde(default = "default_scopes")]
    pub scopes: Vec<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AccConfiguration {
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,
}

impl Default for AccConfiguration {
    fn default() -> Self {
        Self {
            api_base_url: default_api_base_url(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct WorkerConfiguration {
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Base delay for re-invoking a step that failed with a generic error.
    #[serde(default = "default_base_retry_delay_ms")]
    pub base_retry_delay_ms: u64,

    /// Completed and failed runs older than this are dropped from the queue.
    #[serde(default = "default_run_retention_hours")]
    pub run_retention_hours: u64,
}

impl Default for WorkerConfiguration {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval_ms(),
            base_retry_delay_ms: default_base_retry_delay_ms(),
            run_retention_hours: default_run_retention_hours(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_public_url() -> String {
    "/".to_string()
}

fn default_state_dir() -> PathBuf {
    PathBuf::from("./data")
}

fn default_authorize_url() -> String {
    "https://developer.api.autodesk.com/authentication/v2/authorize".to_string()
}

fn default_token_url() -> String {
    "https://developer.api.autodesk.com/authentication/v2/token".to_string()
}

fn default_scopes() -> Vec<String> {
    vec!["data:read".to_string(), "account:read".to_string()]
}

fn default_api_base_url() -> String {
    acc_api::BASE_URL.to_string()
}

fn default_poll_interval_ms() -> u64 {
    500
}

fn default_base_retry_delay_ms() -> u64 {
    1000
}

fn default_run_retention_hours() -> u64 {
    24 * 7
}

impl Configuration {
    pub fn new() -> Result<Self, config::ConfigError> {
        let mut builder = config::Config::builder();

        if std::path::Path::new("config.toml").exists() {
            builder = builder.add_source(config::File::with_name("config"));
        }

        builder = builder.add_source(
            config::Environment::with_prefix("ACC_IMPORT")
                .separator("__")
                .list_separator(" ")
                .with_list_parse_key("oauth.scopes")
                .try_parsing(true),
        );

        builder.build()?.try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_fill_optional_sections() {
        let config: Configuration = config::Config::builder()
            .set_override("server.port", 9000)
            .unwrap()
            .set_override("oauth.client_id", "id")
            .unwrap()
            .set_override("oauth.client_secret", "secret")
            .unwrap()
            .set_override("oauth.redirect_uri", "http://localhost:9000/api/auth/callback")
            .unwrap()
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();

        assert_eq!(config.server.port, 9000);
        assert_eq!(config.server.host, "0.0.0.0");
        assert!(!config.server.production);
        assert_eq!(config.oauth.scopes, vec!["data:read", "account:read"]);
        assert_eq!(config.acc.api_base_url, "https://developer.api.autodesk.com");
        assert_eq!(config.worker.base_retry_delay_ms, 1000);
    }
}
