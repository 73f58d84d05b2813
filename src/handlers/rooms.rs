// src/handlers/rooms.rs
//
// Exam room registry and the availability read surface. The correctness-
// critical booking path itself lives in the store, inside the allocation
// transaction; these endpoints only manage rooms and answer queries.

use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde_json::json;
use validator::Validate;

use crate::{
    error::AppError,
    models::room::{
        AvailabilityParams, AvailabilityResponse, CreateRoomRequest, RoomListParams,
        UpdateRoomRequest,
    },
    platform::AuditEvent,
    state::AppState,
    store::NewRoom,
    utils::context::TenantContext,
};

pub async fn create_room(
    State(state): State<AppState>,
    Extension(ctx): Extension<TenantContext>,
    Json(payload): Json<CreateRoomRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload
        .validate()
        .map_err(|e| AppError::Validation(e.to_string()))?;

    let room = state
        .store
        .create_room(
            ctx.college_id,
            NewRoom {
                name: payload.name,
                capacity: payload.capacity,
                is_active: payload.is_active,
            },
        )
        .await?;

    state
        .audit
        .record(AuditEvent {
            college_id: ctx.college_id,
            actor_id: ctx.user_id,
            action: "room.created",
            entity: format!("room:{}", room.id),
            detail: json!({ "name": room.name, "capacity": room.capacity }),
        })
        .await;

    Ok((
        StatusCode::CREATED,
        Json(json!({ "data": room, "status": "ok" })),
    ))
}

pub async fn list_rooms(
    State(state): State<AppState>,
    Extension(ctx): Extension<TenantContext>,
    Query(params): Query<RoomListParams>,
) -> Result<impl IntoResponse, AppError> {
    let rooms = state.store.list_rooms(ctx.college_id, params.active).await?;
    Ok(Json(json!({ "data": rooms, "status": "ok" })))
}

pub async fn get_room(
    State(state): State<AppState>,
    Extension(ctx): Extension<TenantContext>,
    Path(room_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let room = state.store.get_room(ctx.college_id, room_id).await?;
    Ok(Json(json!({ "data": room, "status": "ok" })))
}

pub async fn update_room(
    State(state): State<AppState>,
    Extension(ctx): Extension<TenantContext>,
    Path(room_id): Path<i64>,
    Json(payload): Json<UpdateRoomRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload
        .validate()
        .map_err(|e| AppError::Validation(e.to_string()))?;

    let mut room = state.store.get_room(ctx.college_id, room_id).await?;
    if let Some(name) = payload.name {
        room.name = name;
    }
    if let Some(capacity) = payload.capacity {
        room.capacity = capacity;
    }
    if let Some(is_active) = payload.is_active {
        room.is_active = is_active;
    }
    let room = state.store.update_room(ctx.college_id, &room).await?;

    state
        .audit
        .record(AuditEvent {
            college_id: ctx.college_id,
            actor_id: ctx.user_id,
            action: "room.updated",
            entity: format!("room:{}", room_id),
            detail: json!({}),
        })
        .await;

    Ok(Json(json!({ "data": room, "status": "ok" })))
}

pub async fn delete_room(
    State(state): State<AppState>,
    Extension(ctx): Extension<TenantContext>,
    Path(room_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    state.store.delete_room(ctx.college_id, room_id).await?;

    state
        .audit
        .record(AuditEvent {
            college_id: ctx.college_id,
            actor_id: ctx.user_id,
            action: "room.deleted",
            entity: format!("room:{}", room_id),
            detail: json!({}),
        })
        .await;

    Ok(Json(
        json!({ "data": { "id": room_id, "deleted": true }, "status": "ok" }),
    ))
}

pub async fn room_availability(
    State(state): State<AppState>,
    Extension(ctx): Extension<TenantContext>,
    Path(room_id): Path<i64>,
    Query(params): Query<AvailabilityParams>,
) -> Result<impl IntoResponse, AppError> {
    if params.end_time <= params.start_time {
        return Err(AppError::Validation(
            "end_time must be after start_time".to_string(),
        ));
    }
    let available = state
        .store
        .is_room_available(ctx.college_id, room_id, params.start_time, params.end_time)
        .await?;
    let response = AvailabilityResponse {
        room_id,
        start_time: params.start_time,
        end_time: params.end_time,
        available,
    };
    Ok(Json(json!({ "data": response, "status": "ok" })))
}

pub async fn room_bookings(
    State(state): State<AppState>,
    Extension(ctx): Extension<TenantContext>,
    Path(room_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let bookings = state.store.room_bookings(ctx.college_id, room_id).await?;
    Ok(Json(json!({ "data": bookings, "status": "ok" })))
}
