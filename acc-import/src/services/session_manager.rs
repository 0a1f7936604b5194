use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use super::kv_store::{KvError, KvStore};
use super::oauth_client::{TokenGrant, TokenProvider};
use crate::models::Session;

/// Lifetime of a stored session, renewed on every successful refresh.
pub const SESSION_TTL: Duration = Duration::from_secs(60 * 60 * 24 * 15);
const SESSION_KEY_PREFIX: &str = "session:";

fn session_key(session_id: &str) -> String {
    format!("{}{}", SESSION_KEY_PREFIX, session_id)
}

/// Owns session persistence and the refresh lifecycle.
///
/// Concurrent refreshes of one session are not serialized: both calls hit the
/// identity provider and whichever write lands last is kept.
pub struct SessionManager {
    kv: Arc<dyn KvStore>,
    tokens: Arc<dyn TokenProvider>,
}

impl SessionManager {
    pub fn new(kv: Arc<dyn KvStore>, tokens: Arc<dyn TokenProvider>) -> Self {
        Self { kv, tokens }
    }

    /// Build a session from a fresh grant, stamping `expires_at` from now.
    pub fn session_from_grant(grant: TokenGrant) -> Session {
        Session {
            access_token: grant.access_token,
            refresh_token: grant.refresh_token,
            expires_at: Utc::now() + grant.expires_in,
            token_type: Some(grant.token_type),
        }
    }

    /// Resolve a session id.
    ///
    /// Fresh sessions come back untouched. Expired sessions without a refresh
    /// token come back as they are, and callers must treat them as unusable.
    /// Otherwise the token is refreshed and persisted under the same id; if
    /// the refresh fails the stale session is returned instead of an error.
    pub async fn get_session(&self, session_id: &str) -> Result<Option<Session>, KvError> {
        let Some(raw) = self.kv.get(&session_key(session_id)).await? else {
            return Ok(None);
        };

        let stored: Session = match serde_json::from_str(&raw) {
            Ok(stored) => stored,
            Err(e) => {
                tracing::warn!(error = %e, "Discarding unreadable session");
                return Ok(None);
            }
        };

        if stored.is_fresh(Utc::now()) {
            return Ok(Some(stored));
        }

        let Some(refresh_token) = stored.refresh_token.clone() else {
            tracing::debug!("Session expired and cannot be refreshed");
            return Ok(Some(stored));
        };

        let grant = match self.tokens.refresh(&refresh_token).await {
            Ok(grant) => grant,
            Err(e) => {
                tracing::warn!(error = %e, "Token refresh failed, keeping stale session");
                return Ok(Some(stored));
            }
        };

        let mut updated = Self::session_from_grant(grant);
        if updated.refresh_token.is_none() {
            updated.refresh_token = Some(refresh_token);
        }

        if let Err(e) = self.store(session_id, &updated).await {
            tracing::warn!(error = %e, "Could not persist refreshed session");
            return Ok(Some(stored));
        }

        tracing::info!("Session refreshed");
        Ok(Some(updated))
    }

    /// Store a new session under a fresh random id and return the id.
    pub async fn create_session(&self, session: &Session) -> Result<String, KvError> {
        let session_id = Uuid::new_v4().to_string();
        self.store(&session_id, session).await?;
        tracing::debug!("Created session");
        Ok(session_id)
    }

    pub async fn delete_session(&self, session_id: &str) -> Result<(), KvError> {
        self.kv.delete(&session_key(session_id)).await?;
        tracing::debug!("Session deleted");
        Ok(())
    }

    async fn store(&self, session_id: &str, session: &Session) -> Result<(), KvError> {
        let value = serde_json::to_string(session)?;
        self.kv.set(&session_key(session_id), value, SESSION_TTL).await
    }
}
