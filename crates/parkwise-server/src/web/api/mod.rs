pub mod auth;
pub mod middleware;
pub mod parking;
pub mod users;

use crate::state::AppState;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::{Json, Router, routing::get, routing::post, routing::put};
use serde_json::json;
use std::sync::Arc;

/// `{"message": ...}` error body with the given status
pub(crate) fn json_error(status: StatusCode, message: &str) -> Response {
    (status, Json(json!({ "message": message }))).into_response()
}

/// GET /api/health
async fn health() -> impl IntoResponse {
    Json(json!({"status": "ok"}))
}

pub fn build_api_routes(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health))
        // Auth routes
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login))
        .route("/auth/logout", post(auth::logout))
        .route("/auth/me", get(auth::me))
        // Account routes
        .route("/users", get(users::list_users).post(users::create_user))
        .route("/users/profile", put(users::update_profile))
        .route("/users/password", put(users::change_password))
        .route(
            "/users/{id}",
            put(users::update_user).delete(users::delete_user),
        )
        .route("/users/{id}/role", put(users::set_role))
        // Parking routes
        .route(
            "/parking/spots",
            get(parking::list_spots).post(parking::create_spot),
        )
        .route(
            "/parking/spots/{id}",
            put(parking::update_spot).delete(parking::delete_spot),
        )
        .route("/parking/spots/{id}/park", post(parking::park))
        .route("/parking/spots/{id}/release", post(parking::release))
        .route("/parking/history", get(parking::history))
        .route("/parking/dashboard", get(parking::dashboard))
        .with_state(state)
}
