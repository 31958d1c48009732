//! Axum router construction for the HTTP API.
//!
//! Assembles all routes (REST + `WebSocket`) into a single [`Router`]
//! with CORS middleware enabled for cross-origin dashboard access.

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post, put};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::state::AppState;
use crate::{accounts, handlers, reports, ws};

/// Build the complete Axum router.
///
/// Guards are applied per handler through the [`AuthUser`] and
/// [`AdminUser`] extractors; see the handler modules for which route
/// needs what.
///
/// CORS allows any origin.
///
/// [`AuthUser`]: crate::auth::AuthUser
/// [`AdminUser`]: crate::auth::AdminUser
pub fn build_router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Status
        .route("/", get(handlers::index))
        .route("/health", get(handlers::health))
        .route("/api/demo", get(handlers::demo))
        // WebSocket
        .route("/ws", get(ws::ws_events))
        // Accounts
        .route("/api/auth/register", post(accounts::register))
        .route("/api/auth/login", post(accounts::login))
        // Monitoring data
        .route(
            "/api/readings",
            get(handlers::list_readings).post(handlers::create_reading),
        )
        .route(
            "/api/alerts",
            get(handlers::list_alerts).post(handlers::create_alert),
        )
        .route("/api/disasters", get(handlers::list_disasters))
        .route("/api/analytics/daily", get(handlers::daily_averages))
        .route("/api/map/sensors", get(handlers::sensor_locations))
        // Citizen reports
        .route(
            "/api/reports",
            get(reports::list_reports).post(reports::create_report),
        )
        .route("/api/reports/{id}", put(reports::update_report_status))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
