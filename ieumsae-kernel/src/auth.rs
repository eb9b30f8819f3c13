use crate::config::AuthConf;
use crate::state::{new_state, Shared};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use time::{Duration, OffsetDateTime, PrimitiveDateTime};
use tracing::info;
use uuid::Uuid;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum AuthError {
    #[error("Invalid credentials")]
    InvalidCredentials,
    #[error("Authentication required")]
    MissingToken,
    #[error("Invalid token")]
    InvalidToken,
    #[error("Token expired")]
    Expired,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct UserInfo {
    pub id: u32,
    pub username: String,
    pub is_admin: bool,
}

#[derive(Debug, Clone)]
pub struct Session {
    pub token: String,
    pub user: UserInfo,
    pub issued_at: OffsetDateTime,
    pub expires_at: OffsetDateTime,
}

/// Session registry behind the login gate: set on login, cleared on logout
/// or expiry.
#[derive(Clone)]
pub struct SessionStore {
    sessions: Shared<HashMap<String, Session>>,
    credentials: Arc<AuthConf>,
    ttl: Duration,
}

impl SessionStore {
    pub fn new(conf: AuthConf) -> Self {
        let ttl = Duration::seconds(conf.session_ttl_secs.max(0));
        Self { sessions: new_state(HashMap::new()), credentials: Arc::new(conf), ttl }
    }

    pub fn login(&self, username: &str, password: &str) -> Result<Session, AuthError> {
        if username != self.credentials.username || password != self.credentials.password {
            info!(%username, "login rejected");
            return Err(AuthError::InvalidCredentials);
        }
        let issued_at = OffsetDateTime::now_utc();
        // TTLs past the calendar range saturate instead of overflowing.
        let expires_at = issued_at
            .checked_add(self.ttl)
            .unwrap_or_else(|| PrimitiveDateTime::MAX.assume_utc());
        let session = Session {
            token: Uuid::new_v4().to_string(),
            user: UserInfo { id: 1, username: username.to_string(), is_admin: true },
            issued_at,
            expires_at,
        };
        let mut sessions = self.sessions.lock();
        sessions.retain(|_, s| issued_at < s.expires_at);
        sessions.insert(session.token.clone(), session.clone());
        info!(%username, "session opened");
        Ok(session)
    }

    pub fn check(&self, token: &str) -> Result<Session, AuthError> {
        let mut sessions = self.sessions.lock();
        let expires_at = sessions.get(token).map(|s| s.expires_at).ok_or(AuthError::InvalidToken)?;
        if OffsetDateTime::now_utc() >= expires_at {
            sessions.remove(token);
            return Err(AuthError::Expired);
        }
        sessions.get(token).cloned().ok_or(AuthError::InvalidToken)
    }

    /// Returns whether a session was actually closed.
    pub fn logout(&self, token: &str) -> bool {
        let removed = self.sessions.lock().remove(token);
        if let Some(session) = &removed {
            info!(username = %session.user.username, "session closed");
        }
        removed.is_some()
    }

    /// Live sessions; expired ones are purged on the way.
    pub fn active_count(&self) -> usize {
        let now = OffsetDateTime::now_utc();
        let mut sessions = self.sessions.lock();
        sessions.retain(|_, s| now < s.expires_at);
        sessions.len()
    }
}

/// Token from an `Authorization: Bearer <token>` header value.
pub fn bearer_token(header: Option<&str>) -> Result<&str, AuthError> {
    header
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or(AuthError::MissingToken)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store(ttl_secs: i64) -> SessionStore {
        SessionStore::new(AuthConf { username: "admin".into(), password: "kopo123".into(), session_ttl_secs: ttl_secs })
    }

    #[test]
    fn test_session_lifecycle() {
        let store = store(3600);
        let session = store.login("admin", "kopo123").unwrap();
        assert_eq!(session.user.username, "admin");
        assert!(session.expires_at > session.issued_at);
        assert_eq!(store.active_count(), 1);

        let checked = store.check(&session.token).unwrap();
        assert_eq!(checked.user, session.user);

        assert!(store.logout(&session.token));
        assert!(!store.logout(&session.token));
        assert_eq!(store.check(&session.token).unwrap_err(), AuthError::InvalidToken);
        assert_eq!(store.active_count(), 0);
    }

    #[test]
    fn test_wrong_credentials() {
        let store = store(3600);
        assert_eq!(store.login("admin", "nope").unwrap_err(), AuthError::InvalidCredentials);
        assert_eq!(store.login("root", "kopo123").unwrap_err(), AuthError::InvalidCredentials);
        assert_eq!(store.active_count(), 0);
    }

    #[test]
    fn test_expired_session_is_rejected_and_purged() {
        let store = store(0);
        let session = store.login("admin", "kopo123").unwrap();
        assert_eq!(store.check(&session.token).unwrap_err(), AuthError::Expired);
        assert_eq!(store.check(&session.token).unwrap_err(), AuthError::InvalidToken);
    }

    #[test]
    fn test_huge_ttl_saturates() {
        let store = store(i64::MAX);
        let session = store.login("admin", "kopo123").unwrap();
        assert!(session.expires_at > session.issued_at);
        assert_eq!(store.check(&session.token).unwrap().token, session.token);
        assert_eq!(store.active_count(), 1);
    }

    #[test]
    fn test_login_purges_expired_sessions() {
        let store = store(0);
        for _ in 0..5 {
            store.login("admin", "kopo123").unwrap();
        }
        assert_eq!(store.sessions.lock().len(), 1);
    }

    #[test]
    fn test_tokens_are_unique() {
        let store = store(3600);
        let a = store.login("admin", "kopo123").unwrap();
        let b = store.login("admin", "kopo123").unwrap();
        assert_ne!(a.token, b.token);
        assert_eq!(store.active_count(), 2);
    }

    #[test]
    fn test_bearer_token() {
        assert_eq!(bearer_token(Some("Bearer abc")), Ok("abc"));
        assert_eq!(bearer_token(Some("Basic abc")), Err(AuthError::MissingToken));
        assert_eq!(bearer_token(Some("Bearer ")), Err(AuthError::MissingToken));
        assert_eq!(bearer_token(None), Err(AuthError::MissingToken));
    }
}
