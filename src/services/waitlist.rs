//! Waitlist admission policy
//!
//! Decides, at creation time, what happens to a request whose interval is
//! already held. Purely a decision function; the lifecycle engine owns all
//! state.

use crate::error::ConflictReport;
use crate::models::reservation::{ConflictingReservation, ReservationStatus};

/// Outcome of admission for a new reservation request
#[derive(Debug)]
pub enum AdmissionDecision {
    /// Admit the request with the given initial status
    Admit(ReservationStatus),
    /// Reject, returning the full conflict list so the requester can opt
    /// into the waitlist and retry
    Reject(ConflictReport),
}

pub fn decide(conflicts: Vec<ConflictingReservation>, opted_in: bool) -> AdmissionDecision {
    if conflicts.is_empty() {
        return AdmissionDecision::Admit(ReservationStatus::Pending);
    }
    if opted_in {
        return AdmissionDecision::Admit(ReservationStatus::Waitlist);
    }
    AdmissionDecision::Reject(ConflictReport {
        message: "Equipment is already booked for the requested dates".to_string(),
        conflicts,
        can_waitlist: true,
    })
}
