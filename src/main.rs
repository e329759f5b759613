use std::sync::Arc;

use axum::extract::State;
use axum::{routing::get, Json, Router};
use serde_json::{json, Value};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

mod config;
mod database;
mod error;
mod services;

use database::TenantRouter;
use error::ApiError;
use services::AggregateService;

#[derive(Clone)]
struct AppState {
    router: Arc<TenantRouter>,
    aggregate: Arc<AggregateService>,
}

#[tokio::main]
async fn main() {
    // Load .env if present so cargo run picks up DATABASE_URL etc.
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt::init();

    let config = crate::config::config();
    tracing::info!("Starting Chatdesk API in {:?} mode", config.environment);

    let router = match TenantRouter::connect().await {
        Ok(router) => Arc::new(router),
        Err(e) => {
            eprintln!("failed to initialize tenant router: {}", e);
            std::process::exit(1);
        }
    };
    let aggregate = Arc::new(AggregateService::new(
        Arc::clone(&router),
        config.aggregation.fanout_width,
    ));

    let app = app(AppState { router: Arc::clone(&router), aggregate });

    // Allow tests or deployments to override port via env
    let port = std::env::var("CHATDESK_API_PORT")
        .ok()
        .or_else(|| std::env::var("PORT").ok())
        .and_then(|s| s.parse::<u16>().ok())
        .unwrap_or(3000);

    let bind_addr = format!("0.0.0.0:{}", port);
    let listener = match tokio::net::TcpListener::bind(&bind_addr).await {
        Ok(listener) => listener,
        Err(e) => {
            eprintln!("failed to bind {}: {}", bind_addr, e);
            std::process::exit(1);
        }
    };

    println!("🚀 Chatdesk API server listening on http://{}", bind_addr);

    let serve = axum::serve(listener, app).with_graceful_shutdown(async {
        let _ = tokio::signal::ctrl_c().await;
    });
    if let Err(e) = serve.await {
        eprintln!("server error: {}", e);
    }

    // Drain cached tenant pools before exiting
    router.close_all().await;
}

fn app(state: AppState) -> Router {
    Router::new()
        // Public
        .route("/", get(root))
        .route("/health", get(health))
        // Admin aggregation across tenants
        .route("/admin/agents", get(admin_agents))
        .route("/admin/conversations", get(admin_conversations))
        .route("/admin/sessions", get(admin_sessions))
        .route("/admin/metrics", get(admin_metrics))
        .route("/admin/stats", get(admin_stats))
        // Global middleware
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn root() -> Json<Value> {
    let version = env!("CARGO_PKG_VERSION");

    Json(json!({
        "success": true,
        "data": {
            "name": "Chatdesk API",
            "version": version,
            "description": "Multi-tenant customer service platform backend (Axum)",
            "endpoints": {
                "home": "/ (public)",
                "health": "/health (public)",
                "admin_agents": "/admin/agents (aggregated across tenants)",
                "admin_conversations": "/admin/conversations (aggregated across tenants)",
                "admin_sessions": "/admin/sessions (aggregated across tenants)",
                "admin_metrics": "/admin/metrics (aggregated across tenants)",
                "admin_stats": "/admin/stats (aggregated across tenants)",
            }
        }
    }))
}

async fn health(State(state): State<AppState>) -> impl axum::response::IntoResponse {
    let now = chrono::Utc::now();

    match state.router.health_check().await {
        Ok(_) => (
            axum::http::StatusCode::OK,
            Json(json!({
                "success": true,
                "data": {
                    "status": "ok",
                    "timestamp": now,
                    "registry": "ok",
                    "cached_tenant_stores": state.router.cached_store_count().await,
                }
            })),
        ),
        Err(e) => (
            axum::http::StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({
                "success": false,
                "error": "registry unavailable",
                "data": {
                    "status": "degraded",
                    "timestamp": now,
                    "registry_error": e.to_string()
                }
            })),
        ),
    }
}

async fn admin_agents(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    let agents = state.aggregate.list_agents().await?;
    Ok(Json(json!({ "success": true, "data": agents })))
}

async fn admin_conversations(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    let conversations = state.aggregate.list_conversations().await?;
    Ok(Json(json!({ "success": true, "data": conversations })))
}

async fn admin_sessions(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    let sessions = state.aggregate.list_sessions().await?;
    Ok(Json(json!({ "success": true, "data": sessions })))
}

async fn admin_metrics(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    let metrics = state.aggregate.list_agent_metrics().await?;
    Ok(Json(json!({ "success": true, "data": metrics })))
}

async fn admin_stats(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    let stats = state.aggregate.dashboard_stats().await?;
    Ok(Json(json!({ "success": true, "data": stats })))
}
