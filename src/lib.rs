// src/lib.rs
use actix_web::{HttpResponse, get, web};
use chrono::Utc;
use serde_json::json;

pub mod admin;
pub mod auth;
pub mod billing;
pub mod config;
pub mod cors;
pub mod db;
pub mod error;
pub mod models;
pub mod paywall;
pub mod session;
pub mod stripe;
pub mod videos;
pub mod youtube;

use error::{AppError, failure_envelope};

/// Registers every route plus the extractor error handlers and 404 fallback.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.app_data(web::JsonConfig::default().error_handler(|err, _req| {
        AppError::BadRequest(format!("Invalid request body: {}", err)).into()
    }))
    .app_data(web::PathConfig::default().error_handler(|err, _req| {
        AppError::NotFound(format!("Not found: {}", err)).into()
    }))
    .service(health)
    .configure(auth::init_routes)
    .configure(videos::init_routes)
    .configure(billing::init_routes)
    .configure(admin::init_routes)
    .default_service(web::to(not_found));
}

#[get("/health")]
pub async fn health() -> HttpResponse {
    HttpResponse::Ok().json(json!({
        "status": "healthy",
        "timestamp": Utc::now(),
    }))
}

async fn not_found() -> HttpResponse {
    HttpResponse::NotFound().json(failure_envelope("Not found"))
}
