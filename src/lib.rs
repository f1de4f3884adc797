pub mod auth;
pub mod booking;
pub mod config;
pub mod dashboard;
pub mod db;
pub mod error;
pub mod extract;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod slots;
pub mod store;

use axum::{
    Router,
    http::{HeaderName, header},
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::middleware::auth_context::LEGACY_TOKEN_HEADERS;
use crate::models::AppState;

/// The full HTTP application: API routes plus CORS and request tracing.
pub fn app(state: AppState) -> Router {
    let mut allowed = vec![header::CONTENT_TYPE, header::AUTHORIZATION, header::ACCEPT];
    allowed.extend(LEGACY_TOKEN_HEADERS.iter().map(|h| HeaderName::from_static(*h)));

    // Browser panels are served from other origins.
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(allowed);

    routes::router(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}
