// src/auth.rs
use crate::db;
use crate::error::{AppError, Denial};
use crate::models::CredentialsRequest;
use crate::paywall;
use crate::session::{Session, SessionStore};
use actix_web::{HttpResponse, get, post, web};
use bcrypt::verify;
use serde_json::json;
use sqlx::PgPool;

const MIN_PASSWORD_LEN: usize = 8;

pub fn init_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(register);
    cfg.service(login);
    cfg.service(logout);
    cfg.service(check);
}

/// Trimmed, lowercased email and the raw password; both must be present.
fn normalize(req: &CredentialsRequest) -> Result<(String, &str), AppError> {
    let email = req.email.trim().to_lowercase();
    if email.is_empty() || req.password.is_empty() {
        return Err(AppError::BadRequest(
            "Email and password are required".to_string(),
        ));
    }
    Ok((email, req.password.as_str()))
}

#[post("/api/auth/register")]
pub async fn register(
    pool: web::Data<PgPool>,
    store: web::Data<SessionStore>,
    req: web::Json<CredentialsRequest>,
) -> Result<HttpResponse, AppError> {
    let (email, password) = normalize(&req)?;
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(AppError::BadRequest(
            "Password must be at least 8 characters long".to_string(),
        ));
    }
    if db::get_user_by_email(&pool, &email).await?.is_some() {
        return Err(AppError::BadRequest(
            "An account with this email already exists".to_string(),
        ));
    }

    let user_id = db::create_user(&pool, &email, password).await?;
    let (_, token) = store.start(user_id, &email).await?;
    tracing::info!("Registered user {}", user_id);

    Ok(HttpResponse::Ok()
        .cookie(SessionStore::cookie(&token))
        .json(json!({
            "success": true,
            "message": "Registration successful",
            "hasSubscription": false,
            "isAdmin": false,
            "token": token,
        })))
}

#[post("/api/auth/login")]
pub async fn login(
    pool: web::Data<PgPool>,
    store: web::Data<SessionStore>,
    req: web::Json<CredentialsRequest>,
) -> Result<HttpResponse, AppError> {
    let (email, password) = normalize(&req)?;
    let invalid = || AppError::InvalidCredentials("Invalid email or password".to_string());

    let user = db::get_user_by_email(&pool, &email)
        .await?
        .ok_or_else(invalid)?;
    match verify(password, &user.password_hash) {
        Ok(true) => {}
        Ok(false) => return Err(invalid()),
        Err(e) => {
            tracing::warn!("Stored hash for user {} is unreadable: {}", user.id, e);
            return Err(invalid());
        }
    }

    let has_subscription = db::has_active_subscription(&pool, user.id).await?;
    let (_, token) = store.start(user.id, &user.email).await?;
    tracing::info!("User {} logged in", user.id);

    Ok(HttpResponse::Ok()
        .cookie(SessionStore::cookie(&token))
        .json(json!({
            "success": true,
            "message": "Login successful",
            "hasSubscription": has_subscription,
            "isAdmin": user.is_admin,
            "token": token,
        })))
}

#[post("/api/auth/logout")]
pub async fn logout(
    store: web::Data<SessionStore>,
    session: Session,
) -> Result<HttpResponse, AppError> {
    let user_id = paywall::require_login(&session)?;
    store.end(&session).await;
    tracing::info!("User {} logged out", user_id);

    Ok(HttpResponse::Ok()
        .cookie(SessionStore::removal_cookie())
        .json(json!({"success": true, "message": "Logged out successfully"})))
}

#[get("/api/auth/check")]
pub async fn check(pool: web::Data<PgPool>, session: Session) -> Result<HttpResponse, AppError> {
    let user_id = paywall::require_login(&session)?;
    let user = db::get_user_by_id(&pool, user_id)
        .await?
        .ok_or(AppError::Denied(Denial::Unauthorized))?;
    let has_subscription = db::has_active_subscription(&pool, user.id).await?;

    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "user": {
            "id": user.id,
            "email": user.email,
            "is_admin": user.is_admin,
            "has_subscription": has_subscription,
        },
    })))
}
