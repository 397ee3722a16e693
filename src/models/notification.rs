//! Notification rows and the lifecycle events that produce them

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;

use crate::models::reservation::Reservation;

/// Persisted in-app notification
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Notification {
    pub id: i32,
    pub agency_id: i32,
    pub user_id: i32,
    pub kind: String,
    pub title: String,
    pub message: String,
    pub link: Option<String>,
    pub read: bool,
    pub created_at: DateTime<Utc>,
}

/// Lifecycle events handed to the outbound worker after a transition
/// commits. Delivery is best-effort; the committed reservation row is the
/// source of truth.
#[derive(Debug, Clone)]
pub enum DomainEvent {
    /// A new pending reservation awaits manager review
    ReservationCreatedPendingReview {
        reservation: Reservation,
        equipment_name: String,
    },
    /// A manager approved the reservation
    ReservationApproved {
        reservation: Reservation,
        equipment_name: String,
    },
    /// A waitlisted reservation was promoted into a vacated interval
    WaitlistSlotAvailable {
        reservation: Reservation,
        equipment_name: String,
    },
}

impl DomainEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            DomainEvent::ReservationCreatedPendingReview { .. } => {
                "reservation_created_pending_review"
            }
            DomainEvent::ReservationApproved { .. } => "reservation_approved",
            DomainEvent::WaitlistSlotAvailable { .. } => "waitlist_slot_available",
        }
    }
}
