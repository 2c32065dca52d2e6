// src/admin.rs
use crate::db;
use crate::error::AppError;
use crate::models::{NewVideoRequest, UpdateVideoRequest};
use crate::paywall;
use crate::session::Session;
use crate::youtube;
use actix_web::{HttpResponse, delete, get, post, put, web};
use serde_json::json;
use sqlx::PgPool;
use uuid::Uuid;

/// Body extractor result; parsed only after the admin gate has passed.
type Body<T> = Result<web::Json<T>, actix_web::Error>;

pub fn init_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(stats);
    cfg.service(list_videos);
    cfg.service(add_video);
    cfg.service(update_video);
    cfg.service(delete_video);
}

fn parse_body<T>(body: Body<T>) -> Result<T, AppError> {
    body.map(web::Json::into_inner)
        .map_err(|e| AppError::BadRequest(e.to_string()))
}

fn parse_video_id(raw: &str) -> Result<Uuid, AppError> {
    Uuid::parse_str(raw).map_err(|_| AppError::NotFound("Video not found".to_string()))
}

#[get("/api/admin/stats")]
pub async fn stats(pool: web::Data<PgPool>, session: Session) -> Result<HttpResponse, AppError> {
    paywall::require_admin(pool.get_ref(), &session).await?;
    let stats = db::admin_stats(&pool).await?;
    Ok(HttpResponse::Ok().json(json!({"success": true, "stats": stats})))
}

/// Every video, including deactivated ones.
#[get("/api/admin/videos")]
pub async fn list_videos(
    pool: web::Data<PgPool>,
    session: Session,
) -> Result<HttpResponse, AppError> {
    paywall::require_admin(pool.get_ref(), &session).await?;
    let videos = db::get_all_videos(&pool).await?;
    Ok(HttpResponse::Ok().json(json!({"success": true, "videos": videos})))
}

#[post("/api/admin/videos")]
pub async fn add_video(
    pool: web::Data<PgPool>,
    session: Session,
    body: Body<NewVideoRequest>,
) -> Result<HttpResponse, AppError> {
    let admin = paywall::require_admin(pool.get_ref(), &session).await?;
    let req = parse_body(body)?;

    let title = req.title.trim();
    let description = req.description.trim();
    let youtube_url = req.youtube_url.trim();
    if title.is_empty() || youtube_url.is_empty() {
        return Err(AppError::BadRequest(
            "Title and YouTube URL are required".to_string(),
        ));
    }
    let video_id = youtube::extract_youtube_video_id(youtube_url)
        .ok_or_else(|| AppError::BadRequest("Invalid YouTube URL".to_string()))?;
    if db::video_exists(&pool, &video_id).await? {
        return Err(AppError::BadRequest(
            "This video has already been added".to_string(),
        ));
    }

    let thumbnail_url = youtube::get_youtube_thumbnail(&video_id);
    let video = db::add_video(
        &pool,
        title,
        (!description.is_empty()).then_some(description),
        youtube_url,
        &video_id,
        Some(&thumbnail_url),
    )
    .await?;
    tracing::info!("Admin {} added video {} ({})", admin.id, video.id, video_id);

    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "message": "Video added successfully",
        "video": {
            "id": video.id,
            "title": video.title,
            "description": video.description,
            "youtube_video_id": video.youtube_video_id,
            "thumbnail_url": video.thumbnail_url,
            "created_at": video.created_at,
        },
    })))
}

#[put("/api/admin/videos/{video_id}")]
pub async fn update_video(
    pool: web::Data<PgPool>,
    session: Session,
    path: web::Path<String>,
    body: Body<UpdateVideoRequest>,
) -> Result<HttpResponse, AppError> {
    paywall::require_admin(pool.get_ref(), &session).await?;
    let video_id = parse_video_id(&path)?;
    let req = parse_body(body)?;

    let title = req.title.as_deref().map(str::trim);
    let description = req.description.as_deref().map(str::trim);
    if !db::update_video(&pool, video_id, title, description, req.is_active).await? {
        return Err(AppError::NotFound("Video not found".to_string()));
    }

    Ok(HttpResponse::Ok().json(json!({"success": true, "message": "Video updated successfully"})))
}

#[delete("/api/admin/videos/{video_id}")]
pub async fn delete_video(
    pool: web::Data<PgPool>,
    session: Session,
    path: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    let admin = paywall::require_admin(pool.get_ref(), &session).await?;
    let video_id = parse_video_id(&path)?;

    if !db::delete_video(&pool, video_id).await? {
        return Err(AppError::NotFound("Video not found".to_string()));
    }
    tracing::info!("Admin {} deleted video {}", admin.id, video_id);

    Ok(HttpResponse::Ok().json(json!({"success": true, "message": "Video deleted successfully"})))
}
