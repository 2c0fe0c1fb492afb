use crate::service::AuthError;
use crate::state::AppState;
use crate::web::api::middleware::{ApiJson, AuthUser};
use axum::{
    Json,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub name: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Map an auth failure to its HTTP response. `failure` is the generic
/// message used for internal errors, whose detail is only logged.
pub(crate) fn auth_error_response(err: AuthError, failure: &str) -> Response {
    let status = match &err {
        AuthError::AlreadyExists => StatusCode::BAD_REQUEST,
        AuthError::NotFound => StatusCode::NOT_FOUND,
        AuthError::InvalidCredentials
        | AuthError::TokenExpired
        | AuthError::TokenInvalid => StatusCode::UNAUTHORIZED,
        AuthError::Internal(e) => {
            tracing::error!("{}: {:#}", failure, e);
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({"message": failure, "error": "Internal server error"})),
            )
                .into_response();
        }
    };
    (status, Json(json!({"message": err.to_string()}))).into_response()
}

/// POST /api/auth/register
#[tracing::instrument(skip(state, req))]
pub async fn register(
    State(state): State<Arc<AppState>>,
    ApiJson(req): ApiJson<RegisterRequest>,
) -> impl IntoResponse {
    match state
        .auth
        .register(&req.name, &req.email, &req.password)
        .await
    {
        Ok(session) => (
            StatusCode::CREATED,
            Json(json!({
                "message": "User registered successfully",
                "token": session.token,
                "user": session.user,
            })),
        )
            .into_response(),
        Err(e) => auth_error_response(e, "Registration failed"),
    }
}

/// POST /api/auth/login
#[tracing::instrument(skip(state, req))]
pub async fn login(
    State(state): State<Arc<AppState>>,
    ApiJson(req): ApiJson<LoginRequest>,
) -> impl IntoResponse {
    match state.auth.login(&req.email, &req.password).await {
        Ok(session) => Json(json!({
            "message": "Login successful",
            "token": session.token,
            "user": session.user,
        }))
        .into_response(),
        Err(e) => auth_error_response(e, "Login failed"),
    }
}

/// POST /api/auth/logout
///
/// Tokens are stateless; the client discards its copy.
pub async fn logout() -> impl IntoResponse {
    Json(json!({"message": "Logged out successfully"}))
}

/// GET /api/auth/me
#[tracing::instrument(skip(state))]
pub async fn me(State(state): State<Arc<AppState>>, auth: AuthUser) -> impl IntoResponse {
    match state.auth.current_user(&auth.0).await {
        Ok(user) => Json(user).into_response(),
        Err(e) => auth_error_response(e, "Failed to load user"),
    }
}
