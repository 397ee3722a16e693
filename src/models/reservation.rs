//! Reservation model, state machine and interval semantics

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

/// Reservation lifecycle status.
///
/// Only `approved` and `active` hold the equipment's interval; `pending`
/// and `waitlist` are requests that have not claimed anything yet.
/// `completed` and `cancelled` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ReservationStatus {
    Pending,
    Waitlist,
    Approved,
    Active,
    Completed,
    Cancelled,
}

impl ReservationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReservationStatus::Pending => "pending",
            ReservationStatus::Waitlist => "waitlist",
            ReservationStatus::Approved => "approved",
            ReservationStatus::Active => "active",
            ReservationStatus::Completed => "completed",
            ReservationStatus::Cancelled => "cancelled",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, ReservationStatus::Completed | ReservationStatus::Cancelled)
    }

    /// Whether a reservation in this status holds the equipment's interval
    pub fn holds_interval(&self) -> bool {
        matches!(self, ReservationStatus::Approved | ReservationStatus::Active)
    }

    /// The transition table. Returns the resulting status, or `None` when
    /// the event is not legal from this status (never a silent no-op).
    pub fn next(self, event: TransitionEvent) -> Option<ReservationStatus> {
        use ReservationStatus::*;
        use TransitionEvent::*;
        match (self, event) {
            (Pending, Approve) => Some(Approved),
            (Pending, Cancel) => Some(Cancelled),
            (Approved, Checkout) => Some(Active),
            (Approved, Cancel) => Some(Cancelled),
            (Active, Return) => Some(Completed),
            (Active, Cancel) => Some(Cancelled),
            (Waitlist, Promote) => Some(Approved),
            _ => None,
        }
    }
}

impl std::fmt::Display for ReservationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for ReservationStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(ReservationStatus::Pending),
            "waitlist" => Ok(ReservationStatus::Waitlist),
            "approved" => Ok(ReservationStatus::Approved),
            "active" => Ok(ReservationStatus::Active),
            "completed" => Ok(ReservationStatus::Completed),
            "cancelled" => Ok(ReservationStatus::Cancelled),
            _ => Err(format!("Invalid reservation status: {}", s)),
        }
    }
}

/// Events accepted by the lifecycle engine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionEvent {
    Approve,
    Checkout,
    Return,
    Cancel,
    Promote,
}

impl std::fmt::Display for TransitionEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            TransitionEvent::Approve => "approve",
            TransitionEvent::Checkout => "checkout",
            TransitionEvent::Return => "return",
            TransitionEvent::Cancel => "cancel",
            TransitionEvent::Promote => "promote",
        };
        write!(f, "{}", label)
    }
}

/// Condition reported at return time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ReturnCondition {
    Good,
    Damaged,
    NeedsMaintenance,
}

impl ReturnCondition {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReturnCondition::Good => "good",
            ReturnCondition::Damaged => "damaged",
            ReturnCondition::NeedsMaintenance => "needs_maintenance",
        }
    }

    /// Damaged or worn-out gear goes straight to the maintenance queue
    pub fn requires_maintenance(&self) -> bool {
        !matches!(self, ReturnCondition::Good)
    }
}

impl std::str::FromStr for ReturnCondition {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "good" => Ok(ReturnCondition::Good),
            "damaged" => Ok(ReturnCondition::Damaged),
            "needs_maintenance" => Ok(ReturnCondition::NeedsMaintenance),
            _ => Err(format!("Invalid return condition: {}", s)),
        }
    }
}

/// Half-open interval overlap: `[a_start, a_end)` intersects
/// `[b_start, b_end)`. Back-to-back bookings (one ends exactly when the
/// other starts) do not overlap.
pub fn overlaps(
    a_start: DateTime<Utc>,
    a_end: DateTime<Utc>,
    b_start: DateTime<Utc>,
    b_end: DateTime<Utc>,
) -> bool {
    a_start < b_end && b_start < a_end
}

/// Reservation record
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Reservation {
    pub id: i32,
    pub agency_id: i32,
    pub equipment_id: i32,
    pub project_id: Option<i32>,
    pub reserved_by: i32,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub status: ReservationStatus,
    pub notes: String,
    pub condition_report: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Create reservation request
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateReservation {
    pub equipment_id: i32,
    pub project_id: Option<i32>,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    #[validate(length(max = 2000))]
    pub notes: Option<String>,
    /// Queue instead of failing when the interval is taken
    #[serde(default)]
    pub waitlist: bool,
}

/// Requester-facing view of a reservation blocking an interval
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ConflictingReservation {
    pub id: i32,
    pub project_id: Option<i32>,
    pub reserved_by: String,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub status: ReservationStatus,
}

/// List filters for the reservation index
#[derive(Debug, Default, Deserialize, utoipa::IntoParams)]
pub struct ReservationFilter {
    pub status: Option<ReservationStatus>,
    pub equipment_id: Option<i32>,
    /// Restrict to the caller's own reservations
    #[serde(default)]
    pub mine: bool,
}
