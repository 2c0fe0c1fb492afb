use crate::state::AppState;
use crate::web::api::json_error;
use crate::web::api::middleware::{ApiJson, AuthUser};
use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use parkwise_common::models::auth::Role;
use parkwise_common::models::parking::{Booking, Slot, SlotStatus};
use parkwise_db::{BookingRepo, SlotRepo, SlotRow, is_unique_violation};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use uuid::Uuid;

const MANAGERS: &[Role] = &[Role::Admin, Role::Manager];

#[derive(Debug, Deserialize)]
pub struct CreateSlotRequest {
    pub slot_number: i32,
    #[serde(default)]
    pub status: SlotStatus,
    pub vehicle_type: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateSlotRequest {
    pub status: Option<SlotStatus>,
    pub vehicle_type: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    #[serde(default = "default_limit")]
    pub limit: i64,
    #[serde(default)]
    pub offset: i64,
}

fn default_limit() -> i64 {
    50
}

fn slot_response(status: StatusCode, row: SlotRow) -> Response {
    match row.into_slot() {
        Ok(slot) => (status, Json(slot)).into_response(),
        Err(e) => {
            tracing::error!("Failed to map slot: {:#}", e);
            json_error(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
        }
    }
}

/// GET /api/parking/spots
#[tracing::instrument(skip(state))]
pub async fn list_spots(State(state): State<Arc<AppState>>, _auth: AuthUser) -> impl IntoResponse {
    let rows = match SlotRepo::list(&state.pool).await {
        Ok(rows) => rows,
        Err(e) => {
            tracing::error!("Failed to list slots: {:#}", e);
            return json_error(StatusCode::INTERNAL_SERVER_ERROR, "Failed to list spots");
        }
    };

    match rows
        .into_iter()
        .map(SlotRow::into_slot)
        .collect::<anyhow::Result<Vec<Slot>>>()
    {
        Ok(slots) => Json(slots).into_response(),
        Err(e) => {
            tracing::error!("Failed to map slots: {:#}", e);
            json_error(StatusCode::INTERNAL_SERVER_ERROR, "Failed to list spots")
        }
    }
}

/// POST /api/parking/spots (admin/manager)
#[tracing::instrument(skip(state, req))]
pub async fn create_spot(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    ApiJson(req): ApiJson<CreateSlotRequest>,
) -> impl IntoResponse {
    if let Err(resp) = auth.require_role(MANAGERS) {
        return resp;
    }

    match SlotRepo::create(
        &state.pool,
        req.slot_number,
        req.status,
        req.vehicle_type.as_deref(),
    )
    .await
    {
        Ok(row) => slot_response(StatusCode::CREATED, row),
        Err(e) if is_unique_violation(&e) => json_error(
            StatusCode::CONFLICT,
            &format!("Spot {} already exists", req.slot_number),
        ),
        Err(e) => {
            tracing::error!("Failed to create slot: {:#}", e);
            json_error(StatusCode::INTERNAL_SERVER_ERROR, "Failed to create spot")
        }
    }
}

/// PUT /api/parking/spots/{id} (admin/manager)
#[tracing::instrument(skip(state, req))]
pub async fn update_spot(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Path(slot_id): Path<Uuid>,
    ApiJson(req): ApiJson<UpdateSlotRequest>,
) -> impl IntoResponse {
    if let Err(resp) = auth.require_role(MANAGERS) {
        return resp;
    }

    match SlotRepo::update(&state.pool, slot_id, req.status, req.vehicle_type.as_deref()).await {
        Ok(Some(row)) => slot_response(StatusCode::OK, row),
        Ok(None) => json_error(StatusCode::NOT_FOUND, "Spot not found"),
        Err(e) => {
            tracing::error!("Failed to update slot: {:#}", e);
            json_error(StatusCode::INTERNAL_SERVER_ERROR, "Failed to update spot")
        }
    }
}

/// DELETE /api/parking/spots/{id} (admin/manager)
#[tracing::instrument(skip(state))]
pub async fn delete_spot(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Path(slot_id): Path<Uuid>,
) -> impl IntoResponse {
    if let Err(resp) = auth.require_role(MANAGERS) {
        return resp;
    }

    match SlotRepo::delete(&state.pool, slot_id).await {
        Ok(true) => Json(json!({"message": "Spot deleted"})).into_response(),
        Ok(false) => json_error(StatusCode::NOT_FOUND, "Spot not found"),
        Err(e) => {
            tracing::error!("Failed to delete slot: {:#}", e);
            json_error(StatusCode::INTERNAL_SERVER_ERROR, "Failed to delete spot")
        }
    }
}

/// POST /api/parking/spots/{id}/park
///
/// Occupies an empty spot and opens a booking for the caller.
#[tracing::instrument(skip(state))]
pub async fn park(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Path(slot_id): Path<Uuid>,
) -> impl IntoResponse {
    let user_id = match auth.user_id() {
        Ok(id) => id,
        Err(resp) => return resp,
    };

    match BookingRepo::start(&state.pool, slot_id, user_id).await {
        Ok(Some(row)) => {
            tracing::info!(slot_id = %slot_id, user_id = %user_id, "Spot occupied");
            (StatusCode::CREATED, Json(Booking::from(row))).into_response()
        }
        Ok(None) => match SlotRepo::get(&state.pool, slot_id).await {
            Ok(Some(_)) => json_error(StatusCode::CONFLICT, "Spot is not available"),
            Ok(None) => json_error(StatusCode::NOT_FOUND, "Spot not found"),
            Err(e) => {
                tracing::error!("Failed to get slot: {:#}", e);
                json_error(StatusCode::INTERNAL_SERVER_ERROR, "Failed to park")
            }
        },
        Err(e) => {
            tracing::error!("Failed to start booking: {:#}", e);
            json_error(StatusCode::INTERNAL_SERVER_ERROR, "Failed to park")
        }
    }
}

/// POST /api/parking/spots/{id}/release
///
/// Closes the open booking on a spot and frees it. Regular users can only
/// release their own booking.
#[tracing::instrument(skip(state))]
pub async fn release(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Path(slot_id): Path<Uuid>,
) -> impl IntoResponse {
    let owner = if auth.role().can_manage_parking() {
        None
    } else {
        match auth.user_id() {
            Ok(id) => Some(id),
            Err(resp) => return resp,
        }
    };

    let hourly_rate = state.config.parking.hourly_rate;
    match BookingRepo::finish(&state.pool, slot_id, owner, hourly_rate).await {
        Ok(Some(row)) => {
            tracing::info!(slot_id = %slot_id, booking_id = %row.booking_id, "Spot released");
            Json(Booking::from(row)).into_response()
        }
        Ok(None) => json_error(StatusCode::NOT_FOUND, "No active booking for this spot"),
        Err(e) => {
            tracing::error!("Failed to finish booking: {:#}", e);
            json_error(StatusCode::INTERNAL_SERVER_ERROR, "Failed to release spot")
        }
    }
}

/// GET /api/parking/history
///
/// Regular users only see their own bookings.
#[tracing::instrument(skip(state))]
pub async fn history(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Query(query): Query<HistoryQuery>,
) -> impl IntoResponse {
    let filter = if auth.role().can_manage_parking() {
        None
    } else {
        match auth.user_id() {
            Ok(id) => Some(id),
            Err(resp) => return resp,
        }
    };

    match BookingRepo::list(&state.pool, filter, query.limit, query.offset).await {
        Ok(rows) => {
            let items: Vec<Booking> = rows.into_iter().map(Booking::from).collect();
            Json(json!({
                "items": items,
                "limit": query.limit,
                "offset": query.offset,
            }))
            .into_response()
        }
        Err(e) => {
            tracing::error!("Failed to list bookings: {:#}", e);
            json_error(StatusCode::INTERNAL_SERVER_ERROR, "Failed to load history")
        }
    }
}

/// GET /api/parking/dashboard
#[tracing::instrument(skip(state))]
pub async fn dashboard(State(state): State<Arc<AppState>>, _auth: AuthUser) -> impl IntoResponse {
    match SlotRepo::stats(&state.pool).await {
        Ok(stats) => Json(stats).into_response(),
        Err(e) => {
            tracing::error!("Failed to compute dashboard stats: {:#}", e);
            json_error(StatusCode::INTERNAL_SERVER_ERROR, "Failed to load dashboard")
        }
    }
}
