//! OpenAPI documentation

use axum::Router;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::api::{equipment, health, notifications, reservations};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Gearhouse API",
        version = "0.3.0",
        description = "Multi-tenant equipment reservation and custody REST API",
        license(name = "AGPL-3.0", url = "https://www.gnu.org/licenses/agpl-3.0.html")
    ),
    servers(
        (url = "/api/v1", description = "API v1")
    ),
    paths(
        // Health
        health::health_check,
        health::readiness_check,
        // Equipment
        equipment::list_equipment,
        equipment::get_equipment,
        equipment::create_equipment,
        equipment::update_equipment,
        equipment::retire_equipment,
        equipment::scan_qr,
        equipment::check_availability,
        equipment::list_categories,
        equipment::create_category,
        // Reservations
        reservations::list_reservations,
        reservations::get_reservation,
        reservations::create_reservation,
        reservations::approve_reservation,
        reservations::checkout_reservation,
        reservations::return_reservation,
        reservations::cancel_reservation,
        // Notifications
        notifications::list_notifications,
        notifications::mark_notification_read,
    ),
    components(
        schemas(
            // Equipment
            crate::models::equipment::Equipment,
            crate::models::equipment::EquipmentStatus,
            crate::models::equipment::EquipmentCategory,
            crate::models::equipment::CreateEquipment,
            crate::models::equipment::UpdateEquipment,
            crate::models::equipment::CreateCategory,
            crate::services::equipment::ScanResult,
            equipment::ScanRequest,
            equipment::AvailabilityRequest,
            equipment::AvailabilityResponse,
            // Reservations
            crate::models::reservation::Reservation,
            crate::models::reservation::ReservationStatus,
            crate::models::reservation::ReturnCondition,
            crate::models::reservation::CreateReservation,
            crate::models::reservation::ConflictingReservation,
            reservations::ReturnRequest,
            // Notifications
            crate::models::notification::Notification,
            // Health
            health::HealthResponse,
            // Errors
            crate::error::ErrorResponse,
            crate::error::ConflictReport,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "equipment", description = "Equipment registry"),
        (name = "reservations", description = "Reservation lifecycle"),
        (name = "notifications", description = "In-app notifications")
    )
)]
pub struct ApiDoc;

/// Create the OpenAPI documentation router
pub fn create_openapi_router() -> Router {
    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
}
