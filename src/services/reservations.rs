//! Reservation lifecycle engine
//!
//! Owns the state machine and every write that touches reservation status
//! or equipment status/holder. Each transition runs in one short
//! transaction; the equipment row lock taken by `get_for_update`
//! serializes check-and-write sequences per asset.

use chrono::{DateTime, Utc};

use crate::{
    error::{AppError, AppResult},
    models::{
        equipment::EquipmentStatus,
        notification::DomainEvent,
        reservation::{
            ConflictingReservation, CreateReservation, Reservation, ReservationFilter,
            ReservationStatus, ReturnCondition, TransitionEvent,
        },
        user::TenantContext,
    },
    repository::Repository,
    services::events::EventEmitter,
    services::waitlist::{self, AdmissionDecision},
};

/// Availability probe result. `conflicts` are reservations holding the
/// interval; `pending` requests hold nothing yet but block a new
/// submission, so clients get to see both.
#[derive(Debug)]
pub struct Availability {
    pub conflicts: Vec<ConflictingReservation>,
    pub pending: Vec<ConflictingReservation>,
}

#[derive(Clone)]
pub struct ReservationsService {
    repository: Repository,
    events: EventEmitter,
}

impl ReservationsService {
    pub fn new(repository: Repository, events: EventEmitter) -> Self {
        Self { repository, events }
    }

    /// Get one reservation
    pub async fn get(&self, ctx: TenantContext, id: i32) -> AppResult<Reservation> {
        self.repository.reservations.get(ctx.agency_id, id).await
    }

    /// List reservations
    pub async fn list(
        &self,
        ctx: TenantContext,
        filter: &ReservationFilter,
    ) -> AppResult<Vec<Reservation>> {
        self.repository
            .reservations
            .list(ctx.agency_id, ctx.user_id, filter)
            .await
    }

    /// Create a reservation.
    ///
    /// Conflict check and insert happen under the equipment row lock so
    /// two racing requests for the same interval cannot both pass; the
    /// loser either queues (opt-in) or gets the conflict list back.
    pub async fn create(
        &self,
        ctx: TenantContext,
        data: CreateReservation,
    ) -> AppResult<Reservation> {
        if data.end_date <= data.start_date {
            return Err(AppError::Validation(
                "end_date must be strictly after start_date".to_string(),
            ));
        }

        let mut tx = self.repository.pool.begin().await?;

        let equipment = self
            .repository
            .equipment
            .get_for_update(&mut tx, ctx.agency_id, data.equipment_id)
            .await?;

        if equipment.status == EquipmentStatus::Retired {
            return Err(AppError::Validation(format!(
                "{} is retired and cannot be reserved",
                equipment.name
            )));
        }

        // Admission also counts queued pending requests as blocking, so a
        // pair of racing identical requests ends up as one request and one
        // conflict, not two pendings.
        let conflicts = self
            .repository
            .reservations
            .find_conflicts(
                &mut *tx,
                ctx.agency_id,
                data.equipment_id,
                data.start_date,
                data.end_date,
                None,
                true,
            )
            .await?;

        let status = match waitlist::decide(conflicts, data.waitlist) {
            AdmissionDecision::Admit(status) => status,
            AdmissionDecision::Reject(report) => {
                return Err(AppError::ReservationConflict(report));
            }
        };

        let reservation = self
            .repository
            .reservations
            .insert(&mut tx, ctx.agency_id, ctx.user_id, &data, status)
            .await?;

        tx.commit().await?;

        tracing::info!(
            reservation_id = reservation.id,
            equipment_id = equipment.id,
            status = %reservation.status,
            "Reservation created"
        );

        if reservation.status == ReservationStatus::Pending {
            self.events.emit(DomainEvent::ReservationCreatedPendingReview {
                reservation: reservation.clone(),
                equipment_name: equipment.name,
            });
        }

        Ok(reservation)
    }

    /// Approve a pending reservation (manager action).
    ///
    /// A pending row holds nothing; approval is where the interval gets
    /// claimed, so conflicts are re-checked under the equipment lock
    /// before the status flips.
    pub async fn approve(&self, ctx: TenantContext, id: i32) -> AppResult<Reservation> {
        let reservation = self.repository.reservations.get(ctx.agency_id, id).await?;
        self.check_transition(&reservation, TransitionEvent::Approve)?;

        let mut tx = self.repository.pool.begin().await?;

        let equipment = self
            .repository
            .equipment
            .get_for_update(&mut tx, ctx.agency_id, reservation.equipment_id)
            .await?;

        let conflicts = self
            .repository
            .reservations
            .find_conflicts(
                &mut *tx,
                ctx.agency_id,
                reservation.equipment_id,
                reservation.start_date,
                reservation.end_date,
                Some(reservation.id),
                false,
            )
            .await?;

        if !conflicts.is_empty() {
            return Err(AppError::ReservationConflict(crate::error::ConflictReport {
                message: "The requested dates were taken while this reservation was pending"
                    .to_string(),
                conflicts,
                can_waitlist: false,
            }));
        }

        let approved = self
            .cas(
                &mut tx,
                ctx,
                id,
                ReservationStatus::Pending,
                TransitionEvent::Approve,
                None,
            )
            .await?;

        tx.commit().await?;

        tracing::info!(reservation_id = id, "Reservation approved");

        self.events.emit(DomainEvent::ReservationApproved {
            reservation: approved.clone(),
            equipment_name: equipment.name,
        });

        Ok(approved)
    }

    /// Physical checkout: custody passes to the requester.
    pub async fn checkout(
        &self,
        ctx: TenantContext,
        id: i32,
        now: DateTime<Utc>,
        is_manager: bool,
    ) -> AppResult<Reservation> {
        let reservation = self.repository.reservations.get(ctx.agency_id, id).await?;
        self.check_actor(ctx, &reservation, is_manager)?;
        self.check_transition(&reservation, TransitionEvent::Checkout)?;

        if now < reservation.start_date {
            return Err(AppError::InvalidTransition(format!(
                "Reservation does not start until {}",
                reservation.start_date
            )));
        }

        let mut tx = self.repository.pool.begin().await?;

        self.repository
            .equipment
            .get_for_update(&mut tx, ctx.agency_id, reservation.equipment_id)
            .await?;

        let active = self
            .cas(
                &mut tx,
                ctx,
                id,
                ReservationStatus::Approved,
                TransitionEvent::Checkout,
                None,
            )
            .await?;

        // Holder is the requester on record, not whoever carried the box
        self.repository
            .equipment
            .set_state(
                &mut tx,
                reservation.equipment_id,
                EquipmentStatus::InUse,
                Some(reservation.reserved_by),
            )
            .await?;

        tx.commit().await?;

        tracing::info!(
            reservation_id = id,
            equipment_id = reservation.equipment_id,
            "Equipment checked out"
        );

        Ok(active)
    }

    /// Physical return: reservation completes, equipment state follows the
    /// condition report, and the freed interval may promote a waitlisted
    /// request.
    pub async fn return_item(
        &self,
        ctx: TenantContext,
        id: i32,
        condition: ReturnCondition,
        condition_notes: Option<&str>,
        is_manager: bool,
    ) -> AppResult<Reservation> {
        let reservation = self.repository.reservations.get(ctx.agency_id, id).await?;
        self.check_actor(ctx, &reservation, is_manager)?;
        self.check_transition(&reservation, TransitionEvent::Return)?;

        let report = match condition_notes.filter(|n| !n.trim().is_empty()) {
            Some(notes) => format!("condition: {}. {}", condition.as_str(), notes.trim()),
            None => format!("condition: {}", condition.as_str()),
        };

        let next_status = if condition.requires_maintenance() {
            EquipmentStatus::Maintenance
        } else {
            EquipmentStatus::Available
        };

        let mut tx = self.repository.pool.begin().await?;

        self.repository
            .equipment
            .get_for_update(&mut tx, ctx.agency_id, reservation.equipment_id)
            .await?;

        let completed = self
            .cas(
                &mut tx,
                ctx,
                id,
                ReservationStatus::Active,
                TransitionEvent::Return,
                Some(&report),
            )
            .await?;

        self.repository
            .equipment
            .set_state(&mut tx, reservation.equipment_id, next_status, None)
            .await?;

        tx.commit().await?;

        tracing::info!(
            reservation_id = id,
            equipment_id = reservation.equipment_id,
            condition = condition.as_str(),
            "Equipment returned"
        );

        self.promote_waitlisted(ctx, reservation.equipment_id).await;

        Ok(completed)
    }

    /// Cancel a pending, approved or active reservation. Cancelling an
    /// active one takes the equipment back.
    pub async fn cancel(
        &self,
        ctx: TenantContext,
        id: i32,
        is_manager: bool,
    ) -> AppResult<Reservation> {
        let reservation = self.repository.reservations.get(ctx.agency_id, id).await?;
        self.check_actor(ctx, &reservation, is_manager)?;
        self.check_transition(&reservation, TransitionEvent::Cancel)?;

        let was_active = reservation.status == ReservationStatus::Active;

        let mut tx = self.repository.pool.begin().await?;

        self.repository
            .equipment
            .get_for_update(&mut tx, ctx.agency_id, reservation.equipment_id)
            .await?;

        let cancelled = self
            .cas(
                &mut tx,
                ctx,
                id,
                reservation.status,
                TransitionEvent::Cancel,
                None,
            )
            .await?;

        if was_active {
            self.repository
                .equipment
                .set_state(
                    &mut tx,
                    reservation.equipment_id,
                    EquipmentStatus::Available,
                    None,
                )
                .await?;
        }

        tx.commit().await?;

        tracing::info!(reservation_id = id, "Reservation cancelled");

        // Any cancellation can unblock the queue: pending requests block
        // admission, approved/active ones held the interval itself.
        self.promote_waitlisted(ctx, reservation.equipment_id).await;

        Ok(cancelled)
    }

    /// Availability probe: pure read, no lock needed.
    pub async fn check_availability(
        &self,
        ctx: TenantContext,
        equipment_id: i32,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> AppResult<Availability> {
        if end <= start {
            return Err(AppError::Validation(
                "end_date must be strictly after start_date".to_string(),
            ));
        }
        // Tenant scope check; cross-tenant lookups surface as NotFound
        self.repository.equipment.get(ctx.agency_id, equipment_id).await?;

        let blocking = self
            .repository
            .reservations
            .find_conflicts(
                &self.repository.pool,
                ctx.agency_id,
                equipment_id,
                start,
                end,
                None,
                true,
            )
            .await?;

        let (pending, conflicts): (Vec<_>, Vec<_>) = blocking
            .into_iter()
            .partition(|c| c.status == ReservationStatus::Pending);

        Ok(Availability { conflicts, pending })
    }

    /// Re-run conflict detection for every waitlisted request on this
    /// equipment, oldest first, and promote the first one whose interval
    /// is now free. One promotion per vacancy: a promoted reservation can
    /// only shrink availability for the rest of the queue.
    ///
    /// Called after a vacating transition has committed; a failure here is
    /// logged but never unwinds that transition.
    async fn promote_waitlisted(&self, ctx: TenantContext, equipment_id: i32) {
        if let Err(e) = self.try_promote(ctx, equipment_id).await {
            tracing::warn!(
                equipment_id,
                error = %e,
                "Waitlist promotion sweep failed"
            );
        }
    }

    async fn try_promote(&self, ctx: TenantContext, equipment_id: i32) -> AppResult<()> {
        let mut tx = self.repository.pool.begin().await?;

        let equipment = self
            .repository
            .equipment
            .get_for_update(&mut tx, ctx.agency_id, equipment_id)
            .await?;

        let waitlisted = self
            .repository
            .reservations
            .waitlisted(&mut tx, ctx.agency_id, equipment_id)
            .await?;

        for candidate in waitlisted {
            let conflicts = self
                .repository
                .reservations
                .find_conflicts(
                    &mut *tx,
                    ctx.agency_id,
                    equipment_id,
                    candidate.start_date,
                    candidate.end_date,
                    Some(candidate.id),
                    false,
                )
                .await?;

            if !conflicts.is_empty() {
                continue;
            }

            let promoted = self
                .repository
                .reservations
                .transition(
                    &mut tx,
                    ctx.agency_id,
                    candidate.id,
                    ReservationStatus::Waitlist,
                    ReservationStatus::Approved,
                    None,
                )
                .await?;

            if let Some(promoted) = promoted {
                tx.commit().await?;
                tracing::info!(
                    reservation_id = promoted.id,
                    equipment_id,
                    "Waitlisted reservation promoted"
                );
                self.events.emit(DomainEvent::WaitlistSlotAvailable {
                    reservation: promoted,
                    equipment_name: equipment.name,
                });
                return Ok(());
            }
        }

        tx.rollback().await?;
        Ok(())
    }

    /// Guarded status write. `None` from the CAS means the row moved under
    /// us (or a racing actor won); reported as an invalid transition, state
    /// unchanged.
    async fn cas(
        &self,
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        ctx: TenantContext,
        id: i32,
        expected: ReservationStatus,
        event: TransitionEvent,
        condition_report: Option<&str>,
    ) -> AppResult<Reservation> {
        let next = expected.next(event).ok_or_else(|| {
            AppError::InvalidTransition(format!("Cannot {} a {} reservation", event, expected))
        })?;

        self.repository
            .reservations
            .transition(tx, ctx.agency_id, id, expected, next, condition_report)
            .await?
            .ok_or_else(|| {
                AppError::InvalidTransition(format!(
                    "Reservation {} is no longer {}",
                    id, expected
                ))
            })
    }

    fn check_transition(
        &self,
        reservation: &Reservation,
        event: TransitionEvent,
    ) -> AppResult<()> {
        if reservation.status.next(event).is_none() {
            return Err(AppError::InvalidTransition(format!(
                "Cannot {} a {} reservation",
                event, reservation.status
            )));
        }
        Ok(())
    }

    fn check_actor(
        &self,
        ctx: TenantContext,
        reservation: &Reservation,
        is_manager: bool,
    ) -> AppResult<()> {
        if is_manager || reservation.reserved_by == ctx.user_id {
            Ok(())
        } else {
            Err(AppError::Authorization(
                "Only the requester or an equipment manager may do this".to_string(),
            ))
        }
    }
}
