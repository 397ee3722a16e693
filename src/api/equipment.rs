//! Equipment registry endpoints

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

use crate::{
    error::{AppError, AppResult},
    models::{
        equipment::{
            CreateCategory, CreateEquipment, Equipment, EquipmentCategory, EquipmentFilter,
            UpdateEquipment,
        },
        reservation::ConflictingReservation,
        tenant::Permission,
    },
    services::equipment::ScanResult,
};

use super::AuthenticatedUser;

/// QR scan request
#[derive(Deserialize, ToSchema)]
pub struct ScanRequest {
    pub qr_code: String,
}

/// Availability check request
#[derive(Deserialize, ToSchema)]
pub struct AvailabilityRequest {
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
}

/// Availability check response
#[derive(Serialize, ToSchema)]
pub struct AvailabilityResponse {
    pub available: bool,
    pub conflicts: Vec<ConflictingReservation>,
    /// Pending requests on the interval. They do not hold it yet, but a
    /// new submission for the same window will be rejected behind them.
    pub pending: Vec<ConflictingReservation>,
    /// A blocked interval can still be requested with `waitlist: true`
    pub can_waitlist: bool,
}

/// List equipment with optional filters
#[utoipa::path(
    get,
    path = "/equipment",
    tag = "equipment",
    security(("bearer_auth" = [])),
    params(EquipmentFilter),
    responses(
        (status = 200, description = "Equipment list", body = Vec<Equipment>)
    )
)]
pub async fn list_equipment(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Query(filter): Query<EquipmentFilter>,
) -> AppResult<Json<Vec<Equipment>>> {
    let equipment = state.services.equipment.list(claims.context(), &filter).await?;
    Ok(Json(equipment))
}

/// Get one asset
#[utoipa::path(
    get,
    path = "/equipment/{id}",
    tag = "equipment",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Equipment ID")),
    responses(
        (status = 200, description = "Equipment", body = Equipment),
        (status = 404, description = "Equipment not found")
    )
)]
pub async fn get_equipment(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i32>,
) -> AppResult<Json<Equipment>> {
    let equipment = state.services.equipment.get(claims.context(), id).await?;
    Ok(Json(equipment))
}

/// Register a new asset (manager only)
#[utoipa::path(
    post,
    path = "/equipment",
    tag = "equipment",
    security(("bearer_auth" = [])),
    request_body = CreateEquipment,
    responses(
        (status = 201, description = "Equipment created", body = Equipment),
        (status = 403, description = "Not an equipment manager")
    )
)]
pub async fn create_equipment(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Json(request): Json<CreateEquipment>,
) -> AppResult<(StatusCode, Json<Equipment>)> {
    claims.require(Permission::ManageEquipment)?;
    request
        .validate()
        .map_err(|e| AppError::Validation(e.to_string()))?;

    let equipment = state.services.equipment.create(claims.context(), request).await?;
    Ok((StatusCode::CREATED, Json(equipment)))
}

/// Update asset metadata (manager only)
#[utoipa::path(
    put,
    path = "/equipment/{id}",
    tag = "equipment",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Equipment ID")),
    request_body = UpdateEquipment,
    responses(
        (status = 200, description = "Equipment updated", body = Equipment),
        (status = 403, description = "Not an equipment manager"),
        (status = 404, description = "Equipment not found")
    )
)]
pub async fn update_equipment(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i32>,
    Json(request): Json<UpdateEquipment>,
) -> AppResult<Json<Equipment>> {
    claims.require(Permission::ManageEquipment)?;
    request
        .validate()
        .map_err(|e| AppError::Validation(e.to_string()))?;

    let equipment = state
        .services
        .equipment
        .update(claims.context(), id, request)
        .await?;
    Ok(Json(equipment))
}

/// Retire an asset permanently (manager only)
#[utoipa::path(
    post,
    path = "/equipment/{id}/retire",
    tag = "equipment",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Equipment ID")),
    responses(
        (status = 200, description = "Equipment retired", body = Equipment),
        (status = 403, description = "Not an equipment manager"),
        (status = 404, description = "Equipment not found"),
        (status = 409, description = "Equipment is currently checked out")
    )
)]
pub async fn retire_equipment(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i32>,
) -> AppResult<Json<Equipment>> {
    claims.require(Permission::ManageEquipment)?;

    let equipment = state.services.equipment.retire(claims.context(), id).await?;
    Ok(Json(equipment))
}

/// Resolve a scanned QR label to an asset with custody info
#[utoipa::path(
    post,
    path = "/equipment/scan",
    tag = "equipment",
    security(("bearer_auth" = [])),
    request_body = ScanRequest,
    responses(
        (status = 200, description = "Asset found", body = ScanResult),
        (status = 404, description = "No such asset in this agency")
    )
)]
pub async fn scan_qr(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Json(request): Json<ScanRequest>,
) -> AppResult<Json<ScanResult>> {
    let result = state
        .services
        .equipment
        .scan_qr(claims.context(), &request.qr_code)
        .await?;
    Ok(Json(result))
}

/// Check whether an interval is free, listing any blocking reservations
#[utoipa::path(
    post,
    path = "/equipment/{id}/availability",
    tag = "equipment",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Equipment ID")),
    request_body = AvailabilityRequest,
    responses(
        (status = 200, description = "Availability result", body = AvailabilityResponse),
        (status = 400, description = "Invalid interval"),
        (status = 404, description = "Equipment not found")
    )
)]
pub async fn check_availability(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i32>,
    Json(request): Json<AvailabilityRequest>,
) -> AppResult<Json<AvailabilityResponse>> {
    let availability = state
        .services
        .reservations
        .check_availability(claims.context(), id, request.start_date, request.end_date)
        .await?;

    Ok(Json(AvailabilityResponse {
        available: availability.conflicts.is_empty(),
        can_waitlist: !availability.conflicts.is_empty(),
        conflicts: availability.conflicts,
        pending: availability.pending,
    }))
}

/// List categories
#[utoipa::path(
    get,
    path = "/equipment/categories",
    tag = "equipment",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Categories", body = Vec<EquipmentCategory>)
    )
)]
pub async fn list_categories(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
) -> AppResult<Json<Vec<EquipmentCategory>>> {
    let categories = state.services.equipment.list_categories(claims.context()).await?;
    Ok(Json(categories))
}

/// Create a category (manager only)
#[utoipa::path(
    post,
    path = "/equipment/categories",
    tag = "equipment",
    security(("bearer_auth" = [])),
    request_body = CreateCategory,
    responses(
        (status = 201, description = "Category created", body = EquipmentCategory),
        (status = 403, description = "Not an equipment manager")
    )
)]
pub async fn create_category(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Json(request): Json<CreateCategory>,
) -> AppResult<(StatusCode, Json<EquipmentCategory>)> {
    claims.require(Permission::ManageEquipment)?;
    request
        .validate()
        .map_err(|e| AppError::Validation(e.to_string()))?;

    let category = state
        .services
        .equipment
        .create_category(claims.context(), request)
        .await?;
    Ok((StatusCode::CREATED, Json(category)))
}
