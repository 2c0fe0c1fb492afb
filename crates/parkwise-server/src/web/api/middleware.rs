use crate::state::AppState;
use crate::web::api::json_error;
use axum::{
    Json,
    extract::{FromRequest, FromRequestParts, Request},
    http::{StatusCode, header, request::Parts},
    response::Response,
};
use parkwise_common::models::auth::{Claims, Role};
use serde::de::DeserializeOwned;
use std::sync::Arc;
use uuid::Uuid;

/// Extractor that validates a JWT Bearer token and provides the claims.
/// Use `AuthUser` directly for required auth.
#[derive(Debug)]
pub struct AuthUser(pub Claims);

impl AuthUser {
    pub fn user_id(&self) -> Result<Uuid, Response> {
        self.0.user_id().ok_or_else(|| {
            json_error(StatusCode::UNAUTHORIZED, "Invalid or expired token")
        })
    }

    pub fn role(&self) -> Role {
        self.0.role
    }

    /// 403 unless the token carries one of `roles`
    pub fn require_role(&self, roles: &[Role]) -> Result<(), Response> {
        if roles.contains(&self.0.role) {
            Ok(())
        } else {
            Err(json_error(StatusCode::FORBIDDEN, "Forbidden"))
        }
    }
}

impl FromRequestParts<Arc<AppState>> for AuthUser {
    type Rejection = Response;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let auth_header = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok());

        let token = match auth_header {
            Some(val) => match val.strip_prefix("Bearer ") {
                Some(t) => t,
                None => {
                    return Err(json_error(
                        StatusCode::UNAUTHORIZED,
                        "Invalid authorization header format",
                    ));
                }
            },
            None => {
                return Err(json_error(
                    StatusCode::UNAUTHORIZED,
                    "Missing authorization header",
                ));
            }
        };

        match state.auth.verify_token(token) {
            Ok(claims) => Ok(AuthUser(claims)),
            Err(e) => {
                tracing::debug!(error = %e, "Rejected token");
                Err(json_error(StatusCode::UNAUTHORIZED, "Invalid or expired token"))
            }
        }
    }
}

/// JSON body extractor that turns any body rejection into a 400
/// `{"message": ...}` response. Parse details are only logged.
#[derive(Debug)]
pub struct ApiJson<T>(pub T);

impl<S, T> FromRequest<S> for ApiJson<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = Response;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(ApiJson(value)),
            Err(rejection) => {
                tracing::debug!(error = %rejection, "Rejected request body");
                Err(json_error(StatusCode::BAD_REQUEST, "Invalid request body"))
            }
        }
    }
}
