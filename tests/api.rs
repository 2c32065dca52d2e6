// HTTP-level tests for the routes that answer before touching the database.
//
// The pool is created lazily and never connects, so every request exercised
// here must be decided by a gate, validation, or the middleware. A request
// that does reach the pool fails fast with a database error.

use actix_web::{App, http::StatusCode, test, web};
use chrono::Utc;
use hmac::{Hmac, Mac};
use serde_json::{Value, json};
use sha2::Sha256;
use sqlx::postgres::PgPoolOptions;
use stories_api::config::Config;
use stories_api::cors::JsonCors;
use stories_api::session::SessionStore;
use uuid::Uuid;

fn test_config() -> Config {
    envy::from_iter(vec![(
        "STRIPE_WEBHOOK_SECRET".to_string(),
        "whsec_test".to_string(),
    )])
    .unwrap()
}

fn stripe_signature(payload: &str, secret: &str) -> String {
    let timestamp = Utc::now().timestamp();
    let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes()).unwrap();
    mac.update(format!("{}.{}", timestamp, payload).as_bytes());
    format!("t={},v1={}", timestamp, hex::encode(mac.finalize().into_bytes()))
}

fn session_store() -> SessionStore {
    SessionStore::new("integration-secret", std::time::Duration::from_secs(60))
}

macro_rules! app {
    ($store:expr) => {{
        let pool = PgPoolOptions::new()
            .acquire_timeout(std::time::Duration::from_millis(500))
            .connect_lazy("postgres://nobody@127.0.0.1:1/none")
            .unwrap();
        test::init_service(
            App::new()
                .app_data(web::Data::new(pool))
                .app_data(web::Data::new($store))
                .app_data(web::Data::new(test_config()))
                .wrap(JsonCors)
                .configure(stories_api::configure),
        )
        .await
    }};
}

#[actix_web::test]
async fn admin_route_without_session_is_unauthorized() {
    let app = app!(session_store());
    let req = test::TestRequest::get().uri("/api/admin/stats").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(
        resp.headers().get("Access-Control-Allow-Origin").unwrap(),
        "*"
    );
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body, json!({"success": false, "message": "Authentication required"}));
}

#[actix_web::test]
async fn admin_mutations_check_login_before_parsing_input() {
    let app = app!(session_store());
    let requests = vec![
        test::TestRequest::post()
            .uri("/api/admin/videos")
            .insert_header(("Content-Type", "application/json"))
            .set_payload("not json"),
        test::TestRequest::put()
            .uri("/api/admin/videos/123")
            .set_payload("not json"),
        test::TestRequest::delete().uri("/api/admin/videos/123"),
    ];

    for req in requests {
        let resp = test::call_service(&app, req.to_request()).await;
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body, json!({"success": false, "message": "Authentication required"}));
    }
}

#[actix_web::test]
async fn subscriber_feed_without_session_is_unauthorized() {
    let app = app!(session_store());
    let req = test::TestRequest::get().uri("/api/videos").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

#[actix_web::test]
async fn checkout_without_session_is_unauthorized() {
    let app = app!(session_store());
    let req = test::TestRequest::post()
        .uri("/api/create-checkout-session")
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

#[actix_web::test]
async fn checkout_without_stripe_key_is_a_server_error() {
    let store = session_store();
    let (_, token) = store.start(Uuid::new_v4(), "reader@example.com").await.unwrap();
    let app = app!(store);

    let req = test::TestRequest::post()
        .uri("/api/create-checkout-session")
        .insert_header(("Authorization", format!("Bearer {}", token)))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body, json!({"success": false, "message": "Stripe not configured"}));
}

#[actix_web::test]
async fn forged_token_is_treated_as_anonymous() {
    let app = app!(session_store());
    let req = test::TestRequest::get()
        .uri("/api/auth/check")
        .insert_header(("Authorization", "Bearer forged.token.value"))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

#[actix_web::test]
async fn logout_ends_the_session() {
    let store = session_store();
    let (_, token) = store.start(Uuid::new_v4(), "reader@example.com").await.unwrap();
    let app = app!(store.clone());

    let req = test::TestRequest::post()
        .uri("/api/auth/logout")
        .insert_header(("Authorization", format!("Bearer {}", token)))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["success"], true);

    assert!(store.load(&token).await.is_none());

    let req = test::TestRequest::post()
        .uri("/api/auth/logout")
        .insert_header(("Authorization", format!("Bearer {}", token)))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

#[actix_web::test]
async fn login_requires_email_and_password() {
    let app = app!(session_store());
    let req = test::TestRequest::post()
        .uri("/api/auth/login")
        .set_json(json!({"email": "  "}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["message"], "Email and password are required");
}

#[actix_web::test]
async fn register_rejects_short_password() {
    let app = app!(session_store());
    let req = test::TestRequest::post()
        .uri("/api/auth/register")
        .set_json(json!({"email": "new@example.com", "password": "short"}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["message"], "Password must be at least 8 characters long");
}

#[actix_web::test]
async fn preflight_short_circuits_with_empty_body() {
    let app = app!(session_store());
    let req = test::TestRequest::default()
        .method(actix_web::http::Method::OPTIONS)
        .uri("/api/admin/videos")
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(
        resp.headers().get("Access-Control-Allow-Headers").unwrap(),
        "Content-Type, Authorization"
    );
    assert!(test::read_body(resp).await.is_empty());
}

#[actix_web::test]
async fn webhook_with_bad_signature_is_rejected() {
    let app = app!(session_store());
    let req = test::TestRequest::post()
        .uri("/webhook/stripe")
        .insert_header(("Stripe-Signature", "t=1,v1=deadbeef"))
        .set_payload(r#"{"type":"invoice.payment_failed","data":{"object":{}}}"#)
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[actix_web::test]
async fn webhook_database_failure_is_a_server_error() {
    let app = app!(session_store());
    let payload = r#"{"type":"invoice.payment_failed","data":{"object":{"subscription":"sub_1"}}}"#;
    let req = test::TestRequest::post()
        .uri("/webhook/stripe")
        .insert_header(("Stripe-Signature", stripe_signature(payload, "whsec_test")))
        .set_payload(payload)
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
}

#[actix_web::test]
async fn webhook_ignores_unhandled_event_types() {
    let app = app!(session_store());
    let payload = r#"{"type":"customer.created","data":{"object":{}}}"#;
    let req = test::TestRequest::post()
        .uri("/webhook/stripe")
        .insert_header(("Stripe-Signature", stripe_signature(payload, "whsec_test")))
        .set_payload(payload)
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
}

#[actix_web::test]
async fn health_and_not_found() {
    let app = app!(session_store());

    let req = test::TestRequest::get().uri("/health").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["status"], "healthy");

    let req = test::TestRequest::get().uri("/no/such/route").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body, json!({"success": false, "message": "Not found"}));
}
