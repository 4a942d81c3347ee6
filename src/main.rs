use axum::{
    extract::DefaultBodyLimit, http::StatusCode, middleware::from_fn, response::Json,
    routing::get, Router,
};
use serde_json::{json, Value};
use tower_http::{cors::CorsLayer, services::ServeDir, trace::TraceLayer};

use prompt_market_api::database::manager::DatabaseManager;
use prompt_market_api::handlers;
use prompt_market_api::middleware::auth::jwt_auth_middleware;

#[tokio::main]
async fn main() {
    // Load .env if present so cargo run picks up DATABASE_URL, JWT_SECRET, etc.
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt::init();

    // Initialize configuration (this loads the config singleton)
    let config = prompt_market_api::config::config();
    tracing::info!("Starting prompt market API in {:?} mode", config.environment);

    // Best-effort migrations; the health endpoint reports a degraded state
    // when the database is unreachable.
    if let Err(e) = DatabaseManager::migrate().await {
        tracing::warn!("Migrations not applied at startup: {}", e);
    }

    let app = app();

    // Allow tests or deployments to override port via env
    let port = std::env::var("PMKT_API_PORT")
        .ok()
        .or_else(|| std::env::var("PORT").ok())
        .and_then(|s| s.parse::<u16>().ok())
        .unwrap_or(8000);

    let bind_addr = format!("0.0.0.0:{}", port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .unwrap_or_else(|e| panic!("failed to bind {}: {}", bind_addr, e));

    tracing::info!("Prompt market API listening on http://{}", bind_addr);

    axum::serve(listener, app).await.expect("server");
}

fn app() -> Router {
    Router::new()
        // Public
        .route("/", get(root))
        .route("/health", get(health))
        .merge(auth_routes())
        .merge(prompt_routes())
        .merge(payment_routes())
        .merge(bundle_routes())
        .merge(output_routes())
        .merge(search_routes())
        .merge(tag_routes())
        .merge(dashboard_routes())
        .merge(analytics_routes())
        .merge(upload_routes())
        // Uploaded images
        .nest_service("/static", ServeDir::new("static"))
        // Global middleware
        .layer(DefaultBodyLimit::max(
            prompt_market_api::config::config().api.max_request_size_bytes,
        ))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

/// Wrap a router so every route requires a valid bearer token.
fn protected(router: Router) -> Router {
    router.route_layer(from_fn(jwt_auth_middleware))
}

fn auth_routes() -> Router {
    use axum::routing::post;
    use handlers::auth;

    Router::new()
        .route("/api/auth/register", post(auth::register))
        .route("/api/auth/login", post(auth::login))
        .merge(protected(
            Router::new().route("/api/auth/whoami", get(auth::whoami)),
        ))
}

fn prompt_routes() -> Router {
    use axum::routing::post;
    use handlers::prompts;

    Router::new()
        .route("/api/prompts", get(prompts::list))
        .route("/api/prompts/featured", get(prompts::featured))
        .route("/api/prompts/:id", get(prompts::get))
        .merge(protected(
            Router::new()
                .route("/api/prompts", post(prompts::create))
                .route("/api/prompts/:id/ownership", get(prompts::ownership))
                .route("/api/prompts/:id/full", get(prompts::full)),
        ))
}

fn payment_routes() -> Router {
    use axum::routing::post;
    use handlers::{payments, purchases};

    Router::new()
        // Signature-verified; never behind user auth
        .route("/api/payments/webhook", post(payments::webhook))
        .merge(protected(
            Router::new()
                .route("/api/payments/checkout", post(payments::checkout))
                .route("/api/payments/balance", get(payments::balance))
                .route("/api/payments/payout", post(payments::payout))
                .route("/api/purchases/mine", get(purchases::mine)),
        ))
}

fn bundle_routes() -> Router {
    use axum::routing::{post, put};
    use handlers::bundles;

    Router::new()
        .route("/api/bundles", get(bundles::list))
        .route("/api/bundles/:id", get(bundles::get))
        .merge(protected(
            Router::new()
                .route("/api/bundles", post(bundles::create))
                .route("/api/bundles/mine", get(bundles::mine))
                .route("/api/bundles/:id", put(bundles::update).delete(bundles::delete)),
        ))
}

fn output_routes() -> Router {
    use axum::routing::{post, put};
    use handlers::outputs;

    Router::new()
        .route("/api/outputs/prompt/:id", get(outputs::list_for_prompt))
        .route("/api/outputs/prompt/:id/stats", get(outputs::stats))
        .merge(protected(
            Router::new()
                .route("/api/outputs", post(outputs::create))
                .route("/api/outputs/:id", put(outputs::update).delete(outputs::delete)),
        ))
}

fn search_routes() -> Router {
    use handlers::search;

    Router::new()
        .route("/api/search", get(search::search))
        .route("/api/search/trending", get(search::trending))
        // Optional auth: personalized when a valid token is present
        .route("/api/search/recommendations", get(search::recommendations))
}

fn tag_routes() -> Router {
    use axum::routing::post;
    use handlers::tags;

    Router::new()
        .route("/api/tags", get(tags::list))
        .route("/api/tags/popular", get(tags::popular))
        .merge(protected(
            Router::new().route("/api/tags", post(tags::create)),
        ))
}

fn dashboard_routes() -> Router {
    use handlers::dashboard;

    protected(
        Router::new()
            .route("/api/dashboard/my-prompts", get(dashboard::my_prompts))
            .route("/api/dashboard/my-purchases", get(dashboard::my_purchases))
            .route("/api/dashboard/earnings", get(dashboard::earnings)),
    )
}

fn analytics_routes() -> Router {
    use axum::routing::post;
    use handlers::analytics;

    Router::new()
        // Optional auth: anonymous events carry no user id
        .route("/api/analytics/track", post(analytics::track))
        .route("/api/analytics/marketplace", get(analytics::marketplace))
        .merge(protected(
            Router::new()
                .route("/api/analytics/prompt/:id", get(analytics::prompt_analytics))
                .route("/api/analytics/dashboard", get(analytics::dashboard)),
        ))
}

fn upload_routes() -> Router {
    use axum::routing::post;
    use handlers::uploads;

    protected(Router::new().route("/api/uploads/image", post(uploads::image)))
}

async fn root() -> Json<Value> {
    Json(json!({
        "name": "prompt-market-api",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

async fn health() -> (StatusCode, Json<Value>) {
    match DatabaseManager::health_check().await {
        Ok(()) => (StatusCode::OK, Json(json!({ "status": "ok" }))),
        Err(e) => {
            tracing::warn!("Health check failed: {}", e);
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({ "status": "degraded" })),
            )
        }
    }
}
