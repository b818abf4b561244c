use anyhow::Context;
use axum::middleware::{from_fn, from_fn_with_state};
use axum::{Extension, Router};
use dotenvy::dotenv;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::signal;
use tokio::sync::broadcast;
use tower_http::cors::CorsLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;
use utoipa_rapidoc::RapiDoc;
use utoipa_swagger_ui::SwaggerUi;

mod api;
mod config;
mod db;
mod middleware;
mod utils;

use crate::api::auth::AuthDoc;
use crate::config::Config;
use crate::db::queries::bookmark::BookmarkDoc;
use crate::db::queries::category::CategoryDoc;
use crate::db::queries::product::ProductDoc;
use crate::db::queries::review::ReviewDoc;
use crate::db::queries::user::UserDoc;
use crate::middleware::auth::{create_user_cache, current_user_middleware, jwt_middleware};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    Config::init();

    std::fs::create_dir_all("logs").context("Failed to create logs directory")?;
    let file_appender = tracing_appender::rolling::daily("logs", "app.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .with_target(true)
        .with_writer(non_blocking)
        .with_ansi(false)
        .init();

    let user_cache = create_user_cache();

    let pool = PgPoolOptions::new()
        .max_connections(10)
        .min_connections(2)
        .idle_timeout(Duration::from_secs(30))
        .connect(&Config::get().database_url)
        .await
        .context("Failed to connect to the database")?;

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .context("Failed to run database migrations")?;

    let merged_doc = AuthDoc::openapi()
        .merge_from(ProductDoc::openapi())
        .merge_from(CategoryDoc::openapi())
        .merge_from(ReviewDoc::openapi())
        .merge_from(BookmarkDoc::openapi())
        .merge_from(UserDoc::openapi());

    // Public routes (catalog browsing, review listing, login/registration)
    let public_routes = Router::new()
        .merge(api::auth::auth_routes())
        .merge(api::product::public_product_routes())
        .merge(api::category::public_category_routes())
        .merge(api::review::public_review_routes());

    // Private routes
    let private_routes = Router::new()
        .merge(api::auth::secure_auth_routes())
        .merge(api::review::review_routes())
        .merge(api::bookmark::bookmark_routes())
        .merge(api::product::admin_product_routes())
        .merge(api::category::admin_category_routes())
        .merge(api::user::user_routes())
        .route_layer(from_fn_with_state(pool.clone(), current_user_middleware))
        .route_layer(from_fn(jwt_middleware));

    let app = Router::new()
        .merge(api::health::health_routes())
        .merge(public_routes)
        .merge(private_routes)
        .merge(SwaggerUi::new("/swagger").url("/api-docs/openapi.json", merged_doc.clone()))
        .merge(RapiDoc::with_openapi("/api-docs/rapidoc.json", merged_doc).path("/rapidoc"))
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(Duration::from_secs(30)))
        .layer(CorsLayer::permissive())
        .layer(Extension(user_cache.clone()))
        .with_state(pool.clone());

    let (shutdown_tx, _shutdown_rx) = broadcast::channel::<()>(1);

    let server_task = tokio::spawn(run_server(app, shutdown_tx.clone(), pool.clone()));
    server_task.await.ok();
    println!("Shutdown complete.");
    Ok(())
}

async fn shutdown_signal(mut shutdown_rx: broadcast::Receiver<()>, pool: PgPool) {
    tokio::select! {
        _ = signal::ctrl_c() => println!("Received Ctrl+C, shutting down..."),
        _ = shutdown_rx.recv() => println!("Received shutdown signal."),
    }
    println!("🛠️ Closing database pool...");
    pool.close().await;
    println!("✅ Database pool closed. Server shutting down.");
}

async fn run_server(app: Router, shutdown_tx: broadcast::Sender<()>, pool: PgPool) {
    let addr = SocketAddr::from(([127, 0, 0, 1], Config::get().server_port));
    println!("Server running at http://{}", addr);

    let listener = TcpListener::bind(&addr).await.expect("Failed to bind listener");

    let shutdown_signal = shutdown_signal(shutdown_tx.subscribe(), pool.clone());

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal)
        .await
        .expect("Server encountered an error");
}
