// src/error.rs
use actix_web::{HttpResponse, ResponseError, http::StatusCode};
use serde_json::json;
use thiserror::Error;

/// Why a gate refused the request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Denial {
    Unauthorized,
    PaymentRequired,
    Forbidden,
}

impl Denial {
    pub fn status(self) -> StatusCode {
        match self {
            Denial::Unauthorized => StatusCode::UNAUTHORIZED,
            Denial::PaymentRequired => StatusCode::PAYMENT_REQUIRED,
            Denial::Forbidden => StatusCode::FORBIDDEN,
        }
    }

    pub fn message(self) -> &'static str {
        match self {
            Denial::Unauthorized => "Authentication required",
            Denial::PaymentRequired => "Active subscription required",
            Denial::Forbidden => "Admin access required",
        }
    }
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error("{}", .0.message())]
    Denied(Denial),

    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    InvalidCredentials(String),

    #[error("{0}")]
    NotFound(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("password hashing error: {0}")]
    Hashing(#[from] bcrypt::BcryptError),

    #[error("session token error: {0}")]
    Token(#[from] jsonwebtoken::errors::Error),

    /// Failure whose message is safe to show the client.
    #[error("{0}")]
    Internal(String),
}

/// `{success: false, message}` body shared by every failure response.
pub fn failure_envelope(message: &str) -> serde_json::Value {
    json!({
        "success": false,
        "message": message,
    })
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::Denied(denial) => denial.status(),
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::InvalidCredentials(_) => StatusCode::UNAUTHORIZED,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Database(_)
            | AppError::Hashing(_)
            | AppError::Token(_)
            | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let message = match self {
            AppError::Database(_) | AppError::Hashing(_) | AppError::Token(_) => {
                tracing::error!("Request failed: {}", self);
                "Internal server error".to_string()
            }
            AppError::Internal(msg) => {
                tracing::error!("Request failed: {}", msg);
                msg.clone()
            }
            other => other.to_string(),
        };
        HttpResponse::build(self.status_code()).json(failure_envelope(&message))
    }
}
