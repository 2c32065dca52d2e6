// src/billing.rs
use crate::config::Config;
use crate::db;
use crate::error::AppError;
use crate::paywall;
use crate::session::Session;
use crate::stripe::{
    self, CheckoutSession, Event, Invoice, NewCheckout, StripeClient, StripeError,
    StripeSubscription,
};
use actix_web::{HttpRequest, HttpResponse, get, post, web};
use chrono::Utc;
use serde_json::json;
use sqlx::PgPool;
use uuid::Uuid;

pub fn init_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(subscription_status);
    cfg.service(create_checkout_session);
    cfg.service(stripe_webhook);
}

#[get("/api/user/subscription-status")]
pub async fn subscription_status(
    pool: web::Data<PgPool>,
    session: Session,
) -> Result<HttpResponse, AppError> {
    let user_id = paywall::require_login(&session)?;
    let subscription = db::get_subscription(&pool, user_id).await?;
    let active = subscription
        .as_ref()
        .is_some_and(|sub| sub.is_active_at(Utc::now()));

    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "hasActiveSubscription": active,
        "subscription": subscription.map(|sub| json!({
            "status": sub.status,
            "current_period_end": sub.current_period_end,
        })),
    })))
}

#[post("/api/create-checkout-session")]
pub async fn create_checkout_session(
    pool: web::Data<PgPool>,
    config: web::Data<Config>,
    session: Session,
) -> Result<HttpResponse, AppError> {
    let user_id = paywall::require_login(&session)?;
    let secret_key = config
        .stripe_secret_key
        .as_deref()
        .ok_or_else(|| AppError::Internal("Stripe not configured".to_string()))?;
    let price_id = config
        .stripe_price_id
        .as_deref()
        .ok_or_else(|| AppError::Internal("Stripe price ID not configured".to_string()))?;
    let user = db::get_user_by_id(&pool, user_id)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;

    let base = config.app_url.trim_end_matches('/');
    let success_url = format!("{}/dashboard?success=true", base);
    let cancel_url = format!("{}/subscribe?canceled=true", base);
    let user_id = user.id.to_string();

    let client = StripeClient::new(&config.stripe_api_url, secret_key);
    let checkout = client
        .create_checkout_session(&NewCheckout {
            price_id,
            customer_email: &user.email,
            user_id: &user_id,
            success_url: &success_url,
            cancel_url: &cancel_url,
        })
        .await
        .map_err(|e| AppError::Internal(format!("Stripe error: {}", e)))?;

    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "checkout_url": checkout.url,
    })))
}

#[post("/webhook/stripe")]
pub async fn stripe_webhook(
    pool: web::Data<PgPool>,
    config: web::Data<Config>,
    req: HttpRequest,
    body: web::Bytes,
) -> HttpResponse {
    let Some(secret) = config.stripe_webhook_secret.as_deref() else {
        tracing::error!("Stripe webhook received but STRIPE_WEBHOOK_SECRET is not set");
        return HttpResponse::BadRequest().finish();
    };
    let signature = req
        .headers()
        .get("Stripe-Signature")
        .and_then(|h| h.to_str().ok())
        .unwrap_or_default();

    if let Err(e) = stripe::verify_signature(&body, signature, secret, Utc::now()) {
        tracing::warn!("Rejected Stripe webhook: {}", e);
        return HttpResponse::BadRequest().finish();
    }
    let event = match Event::parse(&body) {
        Ok(event) => event,
        Err(e) => {
            tracing::warn!("Rejected Stripe webhook: {}", e);
            return HttpResponse::BadRequest().finish();
        }
    };

    let client = config
        .stripe_secret_key
        .as_deref()
        .map(|key| StripeClient::new(&config.stripe_api_url, key));

    match handle_event(&pool, client.as_ref(), &event).await {
        Ok(()) => HttpResponse::Ok().finish(),
        Err(e) => {
            tracing::error!("Failed to apply Stripe event {}: {}", event.event_type, e);
            HttpResponse::InternalServerError().finish()
        }
    }
}

#[derive(Debug, thiserror::Error)]
enum WebhookError {
    #[error(transparent)]
    Stripe(#[from] StripeError),
    #[error(transparent)]
    Database(#[from] sqlx::Error),
    #[error("STRIPE_SECRET_KEY is required to fetch subscriptions")]
    MissingClient,
}

async fn fetch_subscription(
    client: Option<&StripeClient>,
    subscription_id: &str,
) -> Result<StripeSubscription, WebhookError> {
    let client = client.ok_or(WebhookError::MissingClient)?;
    Ok(client.retrieve_subscription(subscription_id).await?)
}

async fn handle_event(
    pool: &PgPool,
    client: Option<&StripeClient>,
    event: &Event,
) -> Result<(), WebhookError> {
    match event.event_type.as_str() {
        "checkout.session.completed" => {
            let checkout: CheckoutSession = event.object()?;
            let user_id = checkout
                .metadata
                .get("user_id")
                .and_then(|id| Uuid::parse_str(id).ok());
            let (Some(user_id), Some(customer), Some(subscription_id)) =
                (user_id, checkout.customer, checkout.subscription)
            else {
                tracing::warn!("Checkout session without user, customer or subscription");
                return Ok(());
            };
            if db::get_user_by_id(pool, user_id).await?.is_none() {
                tracing::warn!("Checkout completed for unknown user {}", user_id);
                return Ok(());
            }

            let subscription = fetch_subscription(client, &subscription_id).await?;
            let Some(period_end) = subscription.period_end() else {
                tracing::warn!("Subscription {} has no period end", subscription_id);
                return Ok(());
            };
            db::upsert_subscription(
                pool,
                user_id,
                &customer,
                &subscription_id,
                &subscription.status,
                subscription.period_start(),
                period_end,
            )
            .await?;
            tracing::info!("Subscription {} recorded for user {}", subscription_id, user_id);
        }
        "invoice.payment_succeeded" => {
            let invoice: Invoice = event.object()?;
            let Some(subscription_id) = invoice.subscription else {
                return Ok(());
            };
            let subscription = fetch_subscription(client, &subscription_id).await?;
            db::update_subscription_by_stripe_id(
                pool,
                &subscription_id,
                "active",
                subscription.period_start(),
                subscription.period_end(),
            )
            .await?;
        }
        "invoice.payment_failed" => {
            let invoice: Invoice = event.object()?;
            if let Some(subscription_id) = invoice.subscription {
                db::update_subscription_by_stripe_id(pool, &subscription_id, "past_due", None, None)
                    .await?;
            }
        }
        "customer.subscription.updated" => {
            let subscription: StripeSubscription = event.object()?;
            db::update_subscription_by_stripe_id(
                pool,
                &subscription.id,
                &subscription.status,
                subscription.period_start(),
                subscription.period_end(),
            )
            .await?;
        }
        "customer.subscription.deleted" => {
            let subscription: StripeSubscription = event.object()?;
            db::update_subscription_by_stripe_id(pool, &subscription.id, "canceled", None, None)
                .await?;
        }
        other => tracing::debug!("Ignoring Stripe event {}", other),
    }
    Ok(())
}
