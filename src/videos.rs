// src/videos.rs
use crate::db;
use crate::error::AppError;
use crate::paywall;
use crate::session::Session;
use actix_web::{HttpResponse, get, web};
use serde_json::json;
use sqlx::PgPool;

pub fn init_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(list_videos);
}

/// Feed of active videos for subscribers, newest first.
#[get("/api/videos")]
pub async fn list_videos(
    pool: web::Data<PgPool>,
    session: Session,
) -> Result<HttpResponse, AppError> {
    paywall::require_subscription(pool.get_ref(), &session).await?;
    let videos = db::get_active_videos(&pool).await?;

    let videos: Vec<_> = videos
        .into_iter()
        .map(|video| {
            json!({
                "id": video.id,
                "title": video.title,
                "description": video.description,
                "youtube_url": video.youtube_url,
                "youtube_video_id": video.youtube_video_id,
                "thumbnail_url": video.thumbnail_url,
                "created_at": video.created_at,
            })
        })
        .collect();

    Ok(HttpResponse::Ok().json(json!({"success": true, "videos": videos})))
}
