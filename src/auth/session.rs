//! Server-side sessions bound to an opaque cookie
//!
//! The cookie carries a random 256-bit session id. Stores only ever see the
//! SHA-256 lookup hash of that id, so a leaked session table cannot be replayed.

use crate::{
    auth::{cookie::CookieSpec, token::RefreshTokenIssuer},
    error::AppError,
    models::Role,
};
use async_trait::async_trait;
use axum::http::{HeaderMap, HeaderValue};
use chrono::{DateTime, Duration, Utc};
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

/// Data kept server-side for an authenticated session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SessionPayload {
    pub account_id: Uuid,
    pub role: Role,
}

/// A live session record as returned by a store
#[derive(Debug, Clone)]
pub struct SessionRecord {
    pub payload: SessionPayload,
    pub expires_at: DateTime<Utc>,
}

/// Serialization of session payloads into store bytes
pub trait SessionCodec: Send + Sync {
    fn encode(&self, payload: &SessionPayload) -> Result<Vec<u8>, AppError>;
    fn decode(&self, bytes: &[u8]) -> Result<SessionPayload, AppError>;
}

/// JSON encoding with a strict schema
pub struct JsonSessionCodec;

impl SessionCodec for JsonSessionCodec {
    fn encode(&self, payload: &SessionPayload) -> Result<Vec<u8>, AppError> {
        serde_json::to_vec(payload)
            .map_err(|e| AppError::Session(format!("Failed to encode session: {}", e)))
    }

    fn decode(&self, bytes: &[u8]) -> Result<SessionPayload, AppError> {
        serde_json::from_slice(bytes)
            .map_err(|e| AppError::Session(format!("Failed to decode session: {}", e)))
    }
}

/// Session persistence keyed by the lookup hash of the session id.
///
/// Implementations encode payloads through the codec they were built with.
/// Records that fail to decode are discarded and reported as absent.
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn load(&self, id_hash: &str) -> Result<Option<SessionRecord>, AppError>;

    async fn save(
        &self,
        id_hash: &str,
        payload: &SessionPayload,
        expires_at: DateTime<Utc>,
    ) -> Result<(), AppError>;

    /// Removing an unknown id is not an error
    async fn destroy(&self, id_hash: &str) -> Result<(), AppError>;

    /// Delete every record that expired at or before `now`, returning how many
    async fn purge_expired(&self, now: DateTime<Utc>) -> Result<u64, AppError>;
}

/// Outcome of a non-failing session lookup
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthStatus {
    Unauthenticated,
    Authenticated(SessionPayload),
}

/// Creates, resolves and tears down sessions for HTTP requests
pub struct SessionBinder {
    store: Arc<dyn SessionStore>,
    cookie: CookieSpec,
    ttl_secs: u64,
}

impl SessionBinder {
    pub fn new(store: Arc<dyn SessionStore>, cookie: CookieSpec, ttl_secs: u64) -> Self {
        Self {
            store,
            cookie,
            ttl_secs,
        }
    }

    pub fn cookie_name(&self) -> &str {
        &self.cookie.name
    }

    /// Start a new session and return the `Set-Cookie` value for it
    pub async fn bind(&self, payload: &SessionPayload) -> Result<HeaderValue, AppError> {
        let session_id = RefreshTokenIssuer::issue()?;
        let id_hash = RefreshTokenIssuer::hash(session_id.expose_secret());
        let expires_at = Utc::now() + Duration::seconds(self.ttl_secs as i64);

        self.store.save(&id_hash, payload, expires_at).await?;

        tracing::debug!(account_id = %payload.account_id, "Session bound");
        self.cookie.build(session_id.expose_secret(), self.ttl_secs)
    }

    /// Resolve the session carried by the request cookie.
    ///
    /// Missing cookie, unknown id and expired record all yield `Unauthorized`.
    /// Store failures surface as `Session` errors.
    pub async fn resolve(&self, headers: &HeaderMap) -> Result<SessionPayload, AppError> {
        let session_id = self.cookie.read(headers).ok_or(AppError::Unauthorized)?;
        let id_hash = RefreshTokenIssuer::hash(&session_id);

        let record = self
            .store
            .load(&id_hash)
            .await?
            .ok_or(AppError::Unauthorized)?;

        if record.expires_at <= Utc::now() {
            self.store.destroy(&id_hash).await?;
            return Err(AppError::Unauthorized);
        }

        Ok(record.payload)
    }

    /// Destroy the server record (if any) and return an expiring cookie
    pub async fn invalidate(&self, headers: &HeaderMap) -> Result<HeaderValue, AppError> {
        if let Some(session_id) = self.cookie.read(headers) {
            self.store
                .destroy(&RefreshTokenIssuer::hash(&session_id))
                .await?;
        }
        self.cookie.expire()
    }

    /// Destroy a session handed out by `bind` whose cookie never reached the client
    pub async fn discard(&self, set_cookie: &HeaderValue) -> Result<(), AppError> {
        let session_id = self
            .cookie
            .value_of(set_cookie)
            .ok_or_else(|| AppError::Internal("Not a session cookie".to_string()))?;
        self.store.destroy(&RefreshTokenIssuer::hash(&session_id)).await
    }

    /// Sweep records whose cookie will never come back
    pub async fn purge_expired(&self) -> Result<u64, AppError> {
        let purged = self.store.purge_expired(Utc::now()).await?;
        if purged > 0 {
            tracing::debug!(purged, "Expired sessions purged");
        }
        metrics::counter!("sessions_purged_total").increment(purged);
        Ok(purged)
    }

    pub async fn status(&self, headers: &HeaderMap) -> Result<AuthStatus, AppError> {
        match self.resolve(headers).await {
            Ok(payload) => Ok(AuthStatus::Authenticated(payload)),
            Err(AppError::Unauthorized) => Ok(AuthStatus::Unauthenticated),
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::MemorySessionStore;
    use axum::http::header;

    fn binder() -> (SessionBinder, Arc<MemorySessionStore>) {
        let store = Arc::new(MemorySessionStore::new(Arc::new(JsonSessionCodec)));
        let cookie = CookieSpec {
            name: "session_id".to_string(),
            path: "/".to_string(),
            secure: false,
        };
        (SessionBinder::new(store.clone(), cookie, 3600), store)
    }

    fn payload() -> SessionPayload {
        SessionPayload {
            account_id: Uuid::new_v4(),
            role: Role::User,
        }
    }

    /// Turn a `Set-Cookie` value into the request `Cookie` header a browser would send
    fn request_headers(set_cookie: &HeaderValue) -> HeaderMap {
        let pair = set_cookie.to_str().unwrap().split(';').next().unwrap().to_string();
        let mut headers = HeaderMap::new();
        headers.insert(header::COOKIE, HeaderValue::from_str(&pair).unwrap());
        headers
    }

    #[test]
    fn test_codec_rejects_unknown_fields() {
        let codec = JsonSessionCodec;
        let bytes = codec.encode(&payload()).unwrap();
        assert!(codec.decode(&bytes).is_ok());

        let tampered = br#"{"account_id":"00000000-0000-0000-0000-000000000000","role":"user","admin":true}"#;
        assert!(codec.decode(tampered).is_err());
    }

    #[tokio::test]
    async fn test_bind_then_resolve() {
        let (binder, _) = binder();
        let payload = payload();

        let cookie = binder.bind(&payload).await.unwrap();
        let resolved = binder.resolve(&request_headers(&cookie)).await.unwrap();
        assert_eq!(resolved, payload);
    }

    #[tokio::test]
    async fn test_store_never_sees_raw_session_id() {
        let (binder, store) = binder();
        let cookie = binder.bind(&payload()).await.unwrap();

        let headers = request_headers(&cookie);
        let raw_id = crate::auth::cookie::read_cookie(&headers, "session_id").unwrap();
        assert!(!store.contains(&raw_id));
        assert!(store.contains(&RefreshTokenIssuer::hash(&raw_id)));
    }

    #[tokio::test]
    async fn test_missing_or_unknown_cookie_is_unauthorized() {
        let (binder, _) = binder();
        assert!(matches!(
            binder.resolve(&HeaderMap::new()).await,
            Err(AppError::Unauthorized)
        ));

        let mut headers = HeaderMap::new();
        headers.insert(header::COOKIE, HeaderValue::from_static("session_id=forged"));
        assert!(matches!(
            binder.resolve(&headers).await,
            Err(AppError::Unauthorized)
        ));
    }

    #[tokio::test]
    async fn test_expired_session_is_unauthorized() {
        let (binder, store) = binder();
        let mut headers = HeaderMap::new();
        headers.insert(header::COOKIE, HeaderValue::from_static("session_id=old"));

        store
            .save(
                &RefreshTokenIssuer::hash("old"),
                &payload(),
                Utc::now() - Duration::seconds(1),
            )
            .await
            .unwrap();

        assert!(matches!(
            binder.resolve(&headers).await,
            Err(AppError::Unauthorized)
        ));
    }

    #[tokio::test]
    async fn test_invalidate_then_resolve_fails() {
        let (binder, _) = binder();
        let cookie = binder.bind(&payload()).await.unwrap();
        let headers = request_headers(&cookie);

        let expired = binder.invalidate(&headers).await.unwrap();
        assert!(expired.to_str().unwrap().contains("Max-Age=0"));
        assert!(matches!(
            binder.resolve(&headers).await,
            Err(AppError::Unauthorized)
        ));
    }

    #[tokio::test]
    async fn test_discard_removes_bound_session() {
        let (binder, store) = binder();
        let kept = binder.bind(&payload()).await.unwrap();
        let dropped = binder.bind(&payload()).await.unwrap();

        binder.discard(&dropped).await.unwrap();

        assert_eq!(store.len(), 1);
        assert!(binder.resolve(&request_headers(&kept)).await.is_ok());
        assert!(matches!(
            binder.resolve(&request_headers(&dropped)).await,
            Err(AppError::Unauthorized)
        ));
    }

    #[tokio::test]
    async fn test_status() {
        let (binder, _) = binder();
        assert_eq!(
            binder.status(&HeaderMap::new()).await.unwrap(),
            AuthStatus::Unauthenticated
        );

        let payload = payload();
        let cookie = binder.bind(&payload).await.unwrap();
        assert_eq!(
            binder.status(&request_headers(&cookie)).await.unwrap(),
            AuthStatus::Authenticated(payload)
        );
    }

    #[tokio::test]
    async fn test_purge_sweeps_sessions_never_presented_again() {
        let (binder, store) = binder();
        for i in 0..5 {
            store
                .save(&format!("stale-{}", i), &payload(), Utc::now() - Duration::days(1))
                .await
                .unwrap();
        }
        for _ in 0..6 {
            binder.bind(&payload()).await.unwrap();
        }
        assert_eq!(store.len(), 11);

        assert_eq!(binder.purge_expired().await.unwrap(), 5);
        assert_eq!(store.len(), 6);
    }
}
