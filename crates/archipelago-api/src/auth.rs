//! Caller identity.
//!
//! Every request carries the `session_id` cookie issued by the login
//! service. The session store maps it to the caller's user id; requests
//! without a live session are rejected with 401.

use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::header::COOKIE;
use axum::http::request::Parts;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use tracing::{debug, warn};
use uuid::Uuid;

use archipelago_core::defaults::SESSION_COOKIE;
use archipelago_core::{Error, IdentityResolver, Result};

use crate::error::ApiError;
use crate::state::AppState;

/// Session lookup against Redis: `GET <session_id>` holds the user id.
pub struct RedisIdentityResolver {
    conn: ConnectionManager,
}

impl RedisIdentityResolver {
    pub async fn connect(url: &str) -> Result<Self> {
        let client = redis::Client::open(url)
            .map_err(|e| Error::Config(format!("Invalid REDIS_URL: {}", e)))?;
        let conn = ConnectionManager::new(client)
            .await
            .map_err(|e| Error::Request(format!("Redis connection failed: {}", e)))?;
        Ok(Self { conn })
    }
}

#[async_trait]
impl IdentityResolver for RedisIdentityResolver {
    async fn resolve(&self, session_id: &str) -> Result<Option<Uuid>> {
        let mut conn = self.conn.clone();
        let value: Option<String> = conn
            .get(session_id)
            .await
            .map_err(|e| Error::Request(format!("Session lookup failed: {}", e)))?;

        let Some(value) = value else {
            return Ok(None);
        };
        match Uuid::parse_str(value.trim()) {
            Ok(user_id) => Ok(Some(user_id)),
            Err(_) => {
                warn!(
                    subsystem = "api",
                    component = "auth",
                    "Session store holds a malformed user id"
                );
                Ok(None)
            }
        }
    }
}

/// Value of `name` in a `Cookie` header.
pub fn cookie_value<'a>(header: &'a str, name: &str) -> Option<&'a str> {
    header
        .split(';')
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value.trim())
        .filter(|value| !value.is_empty())
}

/// The authenticated caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CurrentUser(pub Uuid);

#[async_trait]
impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> std::result::Result<Self, Self::Rejection> {
        let session_id = parts
            .headers
            .get_all(COOKIE)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .find_map(|header| cookie_value(header, SESSION_COOKIE))
            .ok_or_else(|| ApiError::unauthorized("Missing session cookie"))?;

        match state.identity.resolve(session_id).await? {
            Some(user_id) => Ok(CurrentUser(user_id)),
            None => {
                debug!(
                    subsystem = "api",
                    component = "auth",
                    "Unknown or expired session"
                );
                Err(ApiError::unauthorized("Session is not valid"))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cookie_value() {
        let header = "theme=dark; session_id=abc123; lang=ru";
        assert_eq!(cookie_value(header, "session_id"), Some("abc123"));
        assert_eq!(cookie_value(header, "lang"), Some("ru"));
        assert_eq!(cookie_value(header, "missing"), None);
        assert_eq!(cookie_value("session_id=", "session_id"), None);
        assert_eq!(cookie_value("", "session_id"), None);
    }
}
