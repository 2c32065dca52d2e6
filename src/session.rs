// src/session.rs
//! Server-side sessions.
//!
//! Session state lives in an in-process cache keyed by an opaque id. Clients
//! hold a signed token (cookie or `Authorization: Bearer`) whose subject is
//! that id, so ids cannot be guessed or forged.
use crate::models::Claims;
use actix_web::cookie::{Cookie, SameSite};
use actix_web::dev::Payload;
use actix_web::{FromRequest, HttpRequest, web};
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use moka::future::Cache;
use std::future::Future;
use std::pin::Pin;
use uuid::Uuid;

pub const SESSION_COOKIE: &str = "session";

const MAX_SESSIONS: u64 = 100_000;
const MAX_SESSION_AGE_DAYS: i64 = 30;

#[derive(Clone, Debug)]
pub struct Session {
    id: String,
    user_id: Option<Uuid>,
    email: Option<String>,
    created_at: DateTime<Utc>,
}

impl Session {
    fn new(user_id: Option<Uuid>, email: Option<String>) -> Self {
        Self {
            id: Uuid::new_v4().simple().to_string(),
            user_id,
            email,
            created_at: Utc::now(),
        }
    }

    /// A fresh session with nobody logged in.
    pub fn anonymous() -> Self {
        Self::new(None, None)
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn user_id(&self) -> Option<Uuid> {
        self.user_id
    }

    pub fn email(&self) -> Option<&str> {
        self.email.as_deref()
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn is_logged_in(&self) -> bool {
        self.user_id.is_some()
    }
}

#[derive(Clone)]
pub struct SessionStore {
    sessions: Cache<String, Session>,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
}

impl SessionStore {
    pub fn new(secret: &str, idle_timeout: std::time::Duration) -> Self {
        let sessions = Cache::builder()
            .max_capacity(MAX_SESSIONS)
            .time_to_idle(idle_timeout)
            .build();
        Self {
            sessions,
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
        }
    }

    /// Opens an authenticated session and returns it with its signed token.
    pub async fn start(
        &self,
        user_id: Uuid,
        email: &str,
    ) -> Result<(Session, String), jsonwebtoken::errors::Error> {
        let session = Session::new(Some(user_id), Some(email.to_string()));
        let expiration = session.created_at + Duration::days(MAX_SESSION_AGE_DAYS);
        let claims = Claims {
            sub: session.id.clone(),
            exp: expiration.timestamp() as usize,
        };
        let token = encode(&Header::default(), &claims, &self.encoding_key)?;
        self.sessions
            .insert(session.id.clone(), session.clone())
            .await;
        tracing::debug!("Started session for user {}", user_id);
        Ok((session, token))
    }

    /// Resolves a token to its live session. Bad signatures, expired tokens
    /// and ended sessions all yield `None`.
    pub async fn load(&self, token: &str) -> Option<Session> {
        let data = match decode::<Claims>(token, &self.decoding_key, &Validation::default()) {
            Ok(data) => data,
            Err(e) => {
                tracing::debug!("Rejected session token: {}", e);
                return None;
            }
        };
        self.sessions.get(&data.claims.sub).await
    }

    /// First live session among the request's tokens, or a new anonymous one.
    pub async fn resolve(&self, tokens: &[String]) -> Session {
        for token in tokens {
            if let Some(session) = self.load(token).await {
                return session;
            }
        }
        Session::anonymous()
    }

    pub async fn end(&self, session: &Session) {
        self.sessions.invalidate(session.id()).await;
    }

    pub fn cookie(token: &str) -> Cookie<'static> {
        Cookie::build(SESSION_COOKIE, token.to_string())
            .path("/")
            .http_only(true)
            .same_site(SameSite::Lax)
            .finish()
    }

    pub fn removal_cookie() -> Cookie<'static> {
        let mut cookie = Cookie::build(SESSION_COOKIE, "").path("/").finish();
        cookie.make_removal();
        cookie
    }
}

/// Session tokens carried by the request, in lookup order: the session
/// cookie, then a bearer token.
pub fn request_tokens(req: &HttpRequest) -> Vec<String> {
    let cookie = req.cookie(SESSION_COOKIE).map(|c| c.value().to_string());
    let bearer = req
        .headers()
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::to_string);
    cookie.into_iter().chain(bearer).collect()
}

impl FromRequest for Session {
    type Error = actix_web::Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self, Self::Error>>>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        let store = req.app_data::<web::Data<SessionStore>>().cloned();
        let tokens = request_tokens(req);

        Box::pin(async move {
            let store = store.ok_or_else(|| {
                tracing::error!("SessionStore missing from app data");
                actix_web::error::ErrorInternalServerError("Internal server error")
            })?;
            Ok(store.resolve(&tokens).await)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::test::TestRequest;

    fn store() -> SessionStore {
        SessionStore::new("test-secret", std::time::Duration::from_secs(60))
    }

    #[tokio::test]
    async fn started_session_is_loaded_by_token() {
        let store = store();
        let user_id = Uuid::new_v4();
        let (session, token) = store.start(user_id, "reader@example.com").await.unwrap();

        let loaded = store.load(&token).await.expect("session should be live");
        assert_eq!(loaded.id(), session.id());
        assert_eq!(loaded.user_id(), Some(user_id));
        assert_eq!(loaded.email(), Some("reader@example.com"));
        assert!(loaded.is_logged_in());
    }

    #[tokio::test]
    async fn ended_session_is_gone() {
        let store = store();
        let (session, token) = store.start(Uuid::new_v4(), "a@b.c").await.unwrap();
        store.end(&session).await;
        assert!(store.load(&token).await.is_none());
    }

    #[tokio::test]
    async fn token_signed_with_other_secret_is_rejected() {
        let other = SessionStore::new("other-secret", std::time::Duration::from_secs(60));
        let (_, token) = other.start(Uuid::new_v4(), "a@b.c").await.unwrap();
        assert!(store().load(&token).await.is_none());
    }

    #[tokio::test]
    async fn unknown_token_resolves_to_anonymous_session() {
        let session = store().resolve(&["not-a-token".to_string()]).await;
        assert!(!session.is_logged_in());
        assert!(!session.id().is_empty());

        let session = store().resolve(&[]).await;
        assert!(!session.is_logged_in());
    }

    #[test]
    fn tokens_are_read_from_cookie_then_bearer_header() {
        let req = TestRequest::default()
            .cookie(Cookie::new(SESSION_COOKIE, "from-cookie"))
            .insert_header(("Authorization", "Bearer from-header"))
            .to_http_request();
        assert_eq!(request_tokens(&req), vec!["from-cookie", "from-header"]);

        let req = TestRequest::default()
            .insert_header(("Authorization", "Bearer from-header"))
            .to_http_request();
        assert_eq!(request_tokens(&req), vec!["from-header"]);

        let req = TestRequest::default().to_http_request();
        assert!(request_tokens(&req).is_empty());
    }

    #[tokio::test]
    async fn stale_cookie_does_not_hide_valid_bearer_token() {
        let store = store();
        let (stale, stale_token) = store.start(Uuid::new_v4(), "old@example.com").await.unwrap();
        store.end(&stale).await;
        let user_id = Uuid::new_v4();
        let (_, token) = store.start(user_id, "new@example.com").await.unwrap();

        let req = TestRequest::default()
            .cookie(Cookie::new(SESSION_COOKIE, stale_token))
            .insert_header(("Authorization", format!("Bearer {}", token)))
            .to_http_request();
        let session = store.resolve(&request_tokens(&req)).await;
        assert_eq!(session.user_id(), Some(user_id));
    }

    #[test]
    fn removal_cookie_expires_immediately() {
        let cookie = SessionStore::removal_cookie();
        assert_eq!(cookie.name(), SESSION_COOKIE);
        assert_eq!(cookie.value(), "");
        assert!(cookie.max_age().is_some());
    }
}
