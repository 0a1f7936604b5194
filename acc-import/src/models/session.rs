use chrono::{serde::ts_milliseconds, DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Margin subtracted from `expires_at` before a token counts as fresh.
pub const EXPIRY_SKEW: Duration = Duration::seconds(30);

/// Upstream credentials held for one signed-in browser.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub access_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    #[serde(with = "ts_milliseconds")]
    pub expires_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_type: Option<String>,
}

impl Session {
    /// More than `EXPIRY_SKEW` left before expiry.
    pub fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        self.expires_at > now + EXPIRY_SKEW
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }

    pub fn can_refresh(&self) -> bool {
        self.refresh_token.is_some()
    }
}
