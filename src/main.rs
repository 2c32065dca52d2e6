// src/main.rs
use actix_web::{App, HttpServer, middleware::Logger, web};
use stories_api::{config, cors, db, session::SessionStore};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(EnvFilter::from_default_env())
        .finish();
    tracing::subscriber::set_global_default(subscriber).expect("Failed to set tracing subscriber");

    tracing::info!("Starting stories API");

    dotenv::dotenv().ok();
    let config = config::Config::from_env().expect("Failed to load config from environment");
    if config.is_production() && config.secret_key == "change-me-in-production" {
        tracing::warn!("SECRET_KEY is not set; session tokens use the default key");
    }

    let pool = match db::connect(&config).await {
        Ok(pool) => pool,
        Err(e) => {
            tracing::error!("{}", e);
            println!("{}", e.envelope());
            std::process::exit(1);
        }
    };

    if let Err(e) = db::ensure_schema(&pool).await {
        tracing::error!("Database setup error: {}", e);
    }
    if let Err(e) = db::ensure_admin(&pool, &config.admin_email, &config.admin_password).await {
        tracing::error!("Admin seeding error: {}", e);
    }

    let sessions = SessionStore::new(
        &config.secret_key,
        std::time::Duration::from_secs(config.session_ttl_minutes * 60),
    );
    let bind = (config.host.clone(), config.port);
    tracing::info!("Listening on {}:{}", bind.0, bind.1);

    HttpServer::new(move || {
        App::new()
            .app_data(web::Data::new(pool.clone()))
            .app_data(web::Data::new(sessions.clone()))
            .app_data(web::Data::new(config.clone()))
            .wrap(cors::JsonCors)
            .wrap(Logger::default())
            .configure(stories_api::configure)
    })
    .bind(bind)?
    .run()
    .await
}
