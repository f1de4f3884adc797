use crate::models::AppState;
use axum::Router;

pub mod admin_routes;
pub mod appointment_routes;
pub mod auth_routes;
pub mod doctor_routes;
pub mod user_routes;

pub fn router(state: AppState) -> Router {
    Router::new()
        .nest("/api/user", user_routes::router())
        .nest("/api/doctor", doctor_routes::router())
        .nest("/api/admin", admin_routes::router())
        .nest("/api/auth", auth_routes::router())
        .with_state(state)
}
