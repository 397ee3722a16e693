//! Reservation lifecycle endpoints

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;
use serde::Deserialize;
use utoipa::ToSchema;
use validator::Validate;

use crate::{
    error::{AppError, AppResult},
    models::{
        reservation::{CreateReservation, Reservation, ReservationFilter, ReturnCondition},
        tenant::Permission,
    },
};

use super::AuthenticatedUser;

/// Return request body
#[derive(Deserialize, ToSchema)]
pub struct ReturnRequest {
    /// Condition of the gear: good, damaged or needs_maintenance
    pub condition: String,
    pub condition_notes: Option<String>,
}

/// List reservations in the caller's agency
#[utoipa::path(
    get,
    path = "/reservations",
    tag = "reservations",
    security(("bearer_auth" = [])),
    params(ReservationFilter),
    responses(
        (status = 200, description = "Reservations", body = Vec<Reservation>)
    )
)]
pub async fn list_reservations(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Query(filter): Query<ReservationFilter>,
) -> AppResult<Json<Vec<Reservation>>> {
    let reservations = state
        .services
        .reservations
        .list(claims.context(), &filter)
        .await?;
    Ok(Json(reservations))
}

/// Get one reservation
#[utoipa::path(
    get,
    path = "/reservations/{id}",
    tag = "reservations",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Reservation ID")),
    responses(
        (status = 200, description = "Reservation", body = Reservation),
        (status = 404, description = "Reservation not found")
    )
)]
pub async fn get_reservation(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i32>,
) -> AppResult<Json<Reservation>> {
    let reservation = state.services.reservations.get(claims.context(), id).await?;
    Ok(Json(reservation))
}

/// Request custody of equipment for a time window.
///
/// Conflicting requests are rejected with the conflict list unless the
/// body sets `waitlist: true`, in which case the request queues.
#[utoipa::path(
    post,
    path = "/reservations",
    tag = "reservations",
    security(("bearer_auth" = [])),
    request_body = CreateReservation,
    responses(
        (status = 201, description = "Reservation created", body = Reservation),
        (status = 400, description = "Invalid interval"),
        (status = 404, description = "Equipment not found"),
        (status = 409, description = "Interval already booked; conflicts listed in body")
    )
)]
pub async fn create_reservation(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Json(request): Json<CreateReservation>,
) -> AppResult<(StatusCode, Json<Reservation>)> {
    request
        .validate()
        .map_err(|e| AppError::Validation(e.to_string()))?;

    let reservation = state
        .services
        .reservations
        .create(claims.context(), request)
        .await?;

    Ok((StatusCode::CREATED, Json(reservation)))
}

/// Approve a pending reservation (manager only)
#[utoipa::path(
    post,
    path = "/reservations/{id}/approve",
    tag = "reservations",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Reservation ID")),
    responses(
        (status = 200, description = "Reservation approved", body = Reservation),
        (status = 403, description = "Not an equipment manager"),
        (status = 404, description = "Reservation not found"),
        (status = 409, description = "Not pending, or interval taken meanwhile")
    )
)]
pub async fn approve_reservation(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i32>,
) -> AppResult<Json<Reservation>> {
    claims.require(Permission::ManageEquipment)?;

    let reservation = state.services.reservations.approve(claims.context(), id).await?;
    Ok(Json(reservation))
}

/// Physically check equipment out against an approved reservation
#[utoipa::path(
    post,
    path = "/reservations/{id}/checkout",
    tag = "reservations",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Reservation ID")),
    responses(
        (status = 200, description = "Checked out; equipment now in use", body = Reservation),
        (status = 404, description = "Reservation not found"),
        (status = 409, description = "Not approved, or start date not reached")
    )
)]
pub async fn checkout_reservation(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i32>,
) -> AppResult<Json<Reservation>> {
    let reservation = state
        .services
        .reservations
        .checkout(
            claims.context(),
            id,
            Utc::now(),
            claims.has(Permission::ManageEquipment),
        )
        .await?;
    Ok(Json(reservation))
}

/// Return equipment, closing out an active reservation
#[utoipa::path(
    post,
    path = "/reservations/{id}/return",
    tag = "reservations",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Reservation ID")),
    request_body = ReturnRequest,
    responses(
        (status = 200, description = "Returned; reservation completed", body = Reservation),
        (status = 400, description = "Unknown condition value"),
        (status = 404, description = "Reservation not found"),
        (status = 409, description = "Reservation is not active")
    )
)]
pub async fn return_reservation(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i32>,
    Json(request): Json<ReturnRequest>,
) -> AppResult<Json<Reservation>> {
    let condition: ReturnCondition = request
        .condition
        .parse()
        .map_err(AppError::Validation)?;

    let reservation = state
        .services
        .reservations
        .return_item(
            claims.context(),
            id,
            condition,
            request.condition_notes.as_deref(),
            claims.has(Permission::ManageEquipment),
        )
        .await?;
    Ok(Json(reservation))
}

/// Cancel a pending, approved or active reservation
#[utoipa::path(
    post,
    path = "/reservations/{id}/cancel",
    tag = "reservations",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Reservation ID")),
    responses(
        (status = 200, description = "Reservation cancelled", body = Reservation),
        (status = 404, description = "Reservation not found"),
        (status = 409, description = "Already completed or cancelled")
    )
)]
pub async fn cancel_reservation(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i32>,
) -> AppResult<Json<Reservation>> {
    let reservation = state
        .services
        .reservations
        .cancel(
            claims.context(),
            id,
            claims.has(Permission::ManageEquipment),
        )
        .await?;
    Ok(Json(reservation))
}
