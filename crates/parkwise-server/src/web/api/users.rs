use crate::service::UserUpdate;
use crate::state::AppState;
use crate::web::api::auth::auth_error_response;
use crate::web::api::json_error;
use crate::web::api::middleware::{ApiJson, AuthUser};
use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use parkwise_common::models::auth::{Role, UserSummary};
use parkwise_db::UserRepo;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use uuid::Uuid;

#[derive(Debug, Deserialize)]
pub struct ListUsersQuery {
    #[serde(default = "default_limit")]
    pub limit: i64,
    #[serde(default)]
    pub offset: i64,
}

fn default_limit() -> i64 {
    50
}

#[derive(Debug, Deserialize)]
pub struct UpdateProfileRequest {
    pub name: Option<String>,
    pub email: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ChangePasswordRequest {
    pub current_password: String,
    pub new_password: String,
}

#[derive(Debug, Deserialize)]
pub struct CreateUserRequest {
    pub name: String,
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub role: Role,
}

#[derive(Deserialize)]
pub struct UpdateUserRequest {
    pub name: Option<String>,
    pub email: Option<String>,
    pub role: Option<Role>,
    pub password: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SetRoleRequest {
    pub role: Role,
}

/// GET /api/users - List users (admin only)
#[tracing::instrument(skip(state))]
pub async fn list_users(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Query(query): Query<ListUsersQuery>,
) -> impl IntoResponse {
    if let Err(resp) = auth.require_role(&[Role::Admin]) {
        return resp;
    }

    let users = match UserRepo::list(&state.pool, query.limit, query.offset).await {
        Ok(u) => u,
        Err(e) => {
            tracing::error!("Failed to list users: {:#}", e);
            return json_error(StatusCode::INTERNAL_SERVER_ERROR, "Failed to list users");
        }
    };

    let summaries: Result<Vec<UserSummary>, _> = users.iter().map(|u| u.to_summary()).collect();
    match summaries {
        Ok(items) => Json(json!({
            "items": items,
            "limit": query.limit,
            "offset": query.offset,
        }))
        .into_response(),
        Err(e) => {
            tracing::error!("Failed to map users: {:#}", e);
            json_error(StatusCode::INTERNAL_SERVER_ERROR, "Failed to list users")
        }
    }
}

/// POST /api/users - Create a user with any role (admin only)
#[tracing::instrument(skip(state, req))]
pub async fn create_user(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    ApiJson(req): ApiJson<CreateUserRequest>,
) -> impl IntoResponse {
    if let Err(resp) = auth.require_role(&[Role::Admin]) {
        return resp;
    }

    match state
        .auth
        .create_user(&req.name, &req.email, &req.password, req.role)
        .await
    {
        Ok(user) => (StatusCode::CREATED, Json(user)).into_response(),
        Err(e) => auth_error_response(e, "Failed to create user"),
    }
}

/// PUT /api/users/{id} - Edit another account (admin only)
#[tracing::instrument(skip(state, req))]
pub async fn update_user(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Path(user_id): Path<Uuid>,
    ApiJson(req): ApiJson<UpdateUserRequest>,
) -> impl IntoResponse {
    if let Err(resp) = auth.require_role(&[Role::Admin]) {
        return resp;
    }

    let changes = UserUpdate {
        name: req.name.as_deref(),
        email: req.email.as_deref(),
        role: req.role,
        password: req.password.as_deref(),
    };
    match state.auth.update_user(user_id, changes).await {
        Ok(user) => Json(user).into_response(),
        Err(e) => auth_error_response(e, "Failed to update user"),
    }
}

/// DELETE /api/users/{id} (admin only)
#[tracing::instrument(skip(state))]
pub async fn delete_user(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Path(user_id): Path<Uuid>,
) -> impl IntoResponse {
    if let Err(resp) = auth.require_role(&[Role::Admin]) {
        return resp;
    }
    match auth.user_id() {
        Ok(caller) if caller == user_id => {
            return json_error(StatusCode::BAD_REQUEST, "Cannot delete your own account");
        }
        Ok(_) => {}
        Err(resp) => return resp,
    }

    match state.auth.delete_user(user_id).await {
        Ok(()) => Json(json!({"message": "User deleted successfully"})).into_response(),
        Err(e) => auth_error_response(e, "Failed to delete user"),
    }
}

/// PUT /api/users/{id}/role - Change a user's role (admin only)
#[tracing::instrument(skip(state, req))]
pub async fn set_role(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Path(user_id): Path<Uuid>,
    ApiJson(req): ApiJson<SetRoleRequest>,
) -> impl IntoResponse {
    if let Err(resp) = auth.require_role(&[Role::Admin]) {
        return resp;
    }

    match state.auth.set_role(user_id, req.role).await {
        Ok(user) => Json(user).into_response(),
        Err(e) => auth_error_response(e, "Failed to update role"),
    }
}

/// PUT /api/users/profile - Update the caller's name and/or email
#[tracing::instrument(skip(state, req))]
pub async fn update_profile(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    ApiJson(req): ApiJson<UpdateProfileRequest>,
) -> impl IntoResponse {
    let user_id = match auth.user_id() {
        Ok(id) => id,
        Err(resp) => return resp,
    };

    match state
        .auth
        .update_profile(user_id, req.name.as_deref(), req.email.as_deref())
        .await
    {
        Ok(user) => Json(user).into_response(),
        Err(e) => auth_error_response(e, "Profile update failed"),
    }
}

/// PUT /api/users/password - Change the caller's password
#[tracing::instrument(skip(state, req))]
pub async fn change_password(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    ApiJson(req): ApiJson<ChangePasswordRequest>,
) -> impl IntoResponse {
    let user_id = match auth.user_id() {
        Ok(id) => id,
        Err(resp) => return resp,
    };

    match state
        .auth
        .change_password(user_id, &req.current_password, &req.new_password)
        .await
    {
        Ok(()) => Json(json!({"message": "Password updated successfully"})).into_response(),
        Err(e) => auth_error_response(e, "Password change failed"),
    }
}
