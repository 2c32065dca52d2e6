// src/paywall.rs
//! Request gates. Each gate returns the data the handler needs or a
//! [`Denial`]; handlers propagate it with `?`, which ends the request with the
//! matching JSON envelope before any handler logic runs.
use crate::db;
use crate::error::{AppError, Denial};
use crate::models::User;
use crate::session::Session;
use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

/// Account lookups the gates depend on.
#[async_trait]
pub trait Accounts {
    async fn has_active_subscription(&self, user_id: Uuid) -> Result<bool, sqlx::Error>;
    async fn user_by_id(&self, user_id: Uuid) -> Result<Option<User>, sqlx::Error>;
}

#[async_trait]
impl Accounts for PgPool {
    async fn has_active_subscription(&self, user_id: Uuid) -> Result<bool, sqlx::Error> {
        db::has_active_subscription(self, user_id).await
    }

    async fn user_by_id(&self, user_id: Uuid) -> Result<Option<User>, sqlx::Error> {
        db::get_user_by_id(self, user_id).await
    }
}

pub fn require_login(session: &Session) -> Result<Uuid, AppError> {
    session
        .user_id()
        .ok_or(AppError::Denied(Denial::Unauthorized))
}

pub async fn require_subscription<A>(accounts: &A, session: &Session) -> Result<Uuid, AppError>
where
    A: Accounts + Sync + ?Sized,
{
    let user_id = require_login(session)?;
    if !accounts.has_active_subscription(user_id).await? {
        tracing::info!("User {} denied: no active subscription", user_id);
        return Err(AppError::Denied(Denial::PaymentRequired));
    }
    Ok(user_id)
}

pub async fn require_admin<A>(accounts: &A, session: &Session) -> Result<User, AppError>
where
    A: Accounts + Sync + ?Sized,
{
    let user_id = require_login(session)?;
    match accounts.user_by_id(user_id).await? {
        Some(user) if user.is_admin => Ok(user),
        _ => {
            tracing::warn!("User {} denied admin access", user_id);
            Err(AppError::Denied(Denial::Forbidden))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::SessionStore;
    use chrono::Utc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct StubAccounts {
        subscribed: bool,
        user: Option<User>,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl Accounts for StubAccounts {
        async fn has_active_subscription(&self, _: Uuid) -> Result<bool, sqlx::Error> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.subscribed)
        }

        async fn user_by_id(&self, _: Uuid) -> Result<Option<User>, sqlx::Error> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.user.clone())
        }
    }

    fn user(id: Uuid, is_admin: bool) -> User {
        User {
            id,
            email: "someone@example.com".into(),
            is_admin,
            created_at: Utc::now(),
        }
    }

    async fn logged_in() -> (Session, Uuid) {
        let store = SessionStore::new("secret", std::time::Duration::from_secs(60));
        let user_id = Uuid::new_v4();
        let (session, _) = store.start(user_id, "someone@example.com").await.unwrap();
        (session, user_id)
    }

    fn denial(result: Result<impl std::fmt::Debug, AppError>) -> Denial {
        match result {
            Err(AppError::Denied(denial)) => denial,
            other => panic!("expected a denial, got {:?}", other),
        }
    }

    #[test]
    fn anonymous_session_fails_login_gate() {
        assert_eq!(denial(require_login(&Session::anonymous())), Denial::Unauthorized);
    }

    #[tokio::test]
    async fn subscription_gate_checks_login_first() {
        let accounts = StubAccounts::default();
        let result = require_subscription(&accounts, &Session::anonymous()).await;
        assert_eq!(denial(result), Denial::Unauthorized);
        assert_eq!(accounts.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn subscription_gate_requires_active_subscription() {
        let (session, user_id) = logged_in().await;

        let accounts = StubAccounts::default();
        let result = require_subscription(&accounts, &session).await;
        assert_eq!(denial(result), Denial::PaymentRequired);

        let accounts = StubAccounts {
            subscribed: true,
            ..Default::default()
        };
        assert_eq!(require_subscription(&accounts, &session).await.unwrap(), user_id);
    }

    #[tokio::test]
    async fn admin_gate_without_session_is_unauthorized_not_forbidden() {
        let accounts = StubAccounts::default();
        let result = require_admin(&accounts, &Session::anonymous()).await;
        assert_eq!(denial(result), Denial::Unauthorized);
    }

    #[tokio::test]
    async fn admin_gate_rejects_non_admin_and_missing_user() {
        let (session, user_id) = logged_in().await;

        let accounts = StubAccounts {
            user: Some(user(user_id, false)),
            ..Default::default()
        };
        assert_eq!(denial(require_admin(&accounts, &session).await), Denial::Forbidden);

        let accounts = StubAccounts::default();
        assert_eq!(denial(require_admin(&accounts, &session).await), Denial::Forbidden);
    }

    #[tokio::test]
    async fn admin_gate_returns_admin_user() {
        let (session, user_id) = logged_in().await;
        let accounts = StubAccounts {
            user: Some(user(user_id, true)),
            ..Default::default()
        };
        let admin = require_admin(&accounts, &session).await.unwrap();
        assert_eq!(admin.id, user_id);
    }
}
