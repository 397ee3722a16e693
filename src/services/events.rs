//! Outbound event queue
//!
//! Lifecycle transitions push events here after their transaction commits.
//! A background worker turns each event into a persisted notification and,
//! where relevant, an email. Delivery is best-effort: any failure is
//! logged and dropped, never propagated back into a committed transition.

use tokio::sync::mpsc;

use crate::{
    error::AppResult,
    models::notification::DomainEvent,
    models::reservation::Reservation,
    repository::Repository,
    services::email::EmailService,
};

/// Cloneable handle used by services to emit events
#[derive(Clone)]
pub struct EventEmitter {
    tx: mpsc::UnboundedSender<DomainEvent>,
}

impl EventEmitter {
    /// Fire-and-forget. A send error only means the worker is gone, which
    /// happens during shutdown; the transition already committed.
    pub fn emit(&self, event: DomainEvent) {
        let kind = event.kind();
        if self.tx.send(event).is_err() {
            tracing::warn!(kind, "Event dropped: worker not running");
        }
    }
}

/// Build the emitter/receiver pair
pub fn channel() -> (EventEmitter, mpsc::UnboundedReceiver<DomainEvent>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (EventEmitter { tx }, rx)
}

/// Worker loop; spawned once at startup
pub async fn run_worker(
    mut rx: mpsc::UnboundedReceiver<DomainEvent>,
    repository: Repository,
    email: EmailService,
    app_base_url: String,
) {
    while let Some(event) = rx.recv().await {
        let kind = event.kind();
        if let Err(e) = handle_event(&repository, &email, &app_base_url, event).await {
            tracing::warn!(kind, error = %e, "Event delivery failed");
        }
    }
    tracing::info!("Event worker stopped");
}

fn reservation_link(base_url: &str, reservation: &Reservation) -> String {
    format!("{}/reservations/{}", base_url, reservation.id)
}

fn date_range(reservation: &Reservation) -> (String, String) {
    (
        reservation.start_date.format("%d/%m/%Y").to_string(),
        reservation.end_date.format("%d/%m/%Y").to_string(),
    )
}

async fn handle_event(
    repository: &Repository,
    email: &EmailService,
    base_url: &str,
    event: DomainEvent,
) -> AppResult<()> {
    match event {
        DomainEvent::ReservationCreatedPendingReview {
            reservation,
            equipment_name,
        } => {
            let (start, _) = date_range(&reservation);
            repository
                .notifications
                .insert(
                    reservation.agency_id,
                    reservation.reserved_by,
                    "info",
                    "Reservation submitted",
                    &format!(
                        "Your reservation for {} (from {}) is awaiting manager approval.",
                        equipment_name, start
                    ),
                    Some(&reservation_link(base_url, &reservation)),
                )
                .await?;
        }
        DomainEvent::ReservationApproved {
            reservation,
            equipment_name,
        } => {
            let (start, end) = date_range(&reservation);
            let link = reservation_link(base_url, &reservation);
            repository
                .notifications
                .insert(
                    reservation.agency_id,
                    reservation.reserved_by,
                    "success",
                    "Reservation approved",
                    &format!(
                        "Your reservation for {} was approved. Pickup on {}.",
                        equipment_name, start
                    ),
                    Some(&link),
                )
                .await?;

            let requester = repository
                .users
                .get(reservation.agency_id, reservation.reserved_by)
                .await?;
            email
                .send_reservation_approved(
                    &requester.email,
                    &requester.full_name,
                    &equipment_name,
                    &start,
                    &end,
                    &link,
                )
                .await?;
        }
        DomainEvent::WaitlistSlotAvailable {
            reservation,
            equipment_name,
        } => {
            let (start, end) = date_range(&reservation);
            let link = reservation_link(base_url, &reservation);
            repository
                .notifications
                .insert(
                    reservation.agency_id,
                    reservation.reserved_by,
                    "success",
                    "Waitlist slot available",
                    &format!(
                        "{} freed up for {} - {}; your reservation is now approved.",
                        equipment_name, start, end
                    ),
                    Some(&link),
                )
                .await?;

            let requester = repository
                .users
                .get(reservation.agency_id, reservation.reserved_by)
                .await?;
            email
                .send_waitlist_slot_available(
                    &requester.email,
                    &requester.full_name,
                    &equipment_name,
                    &start,
                    &end,
                    &link,
                )
                .await?;
        }
    }
    Ok(())
}
