//! Reservations repository: conflict detection and guarded status writes

use chrono::{DateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::{Executor, Pool, Postgres, Row, Transaction};

use crate::{
    error::{AppError, AppResult},
    models::reservation::{
        ConflictingReservation, CreateReservation, Reservation, ReservationFilter,
        ReservationStatus,
    },
};

pub(crate) fn reservation_from_row(row: &PgRow) -> AppResult<Reservation> {
    let status: String = row.try_get("status")?;
    Ok(Reservation {
        id: row.try_get("id")?,
        agency_id: row.try_get("agency_id")?,
        equipment_id: row.try_get("equipment_id")?,
        project_id: row.try_get("project_id")?,
        reserved_by: row.try_get("reserved_by")?,
        start_date: row.try_get("start_date")?,
        end_date: row.try_get("end_date")?,
        status: status.parse().map_err(AppError::Internal)?,
        notes: row.try_get("notes")?,
        condition_report: row.try_get("condition_report")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

#[derive(Clone)]
pub struct ReservationsRepository {
    pool: Pool<Postgres>,
}

impl ReservationsRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// Get a reservation by ID within the agency
    pub async fn get(&self, agency_id: i32, id: i32) -> AppResult<Reservation> {
        let row = sqlx::query("SELECT * FROM reservations WHERE id = $1 AND agency_id = $2")
            .bind(id)
            .bind(agency_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Reservation {} not found", id)))?;
        reservation_from_row(&row)
    }

    /// List reservations with optional filters
    pub async fn list(
        &self,
        agency_id: i32,
        user_id: i32,
        filter: &ReservationFilter,
    ) -> AppResult<Vec<Reservation>> {
        let rows = sqlx::query(
            r#"
            SELECT * FROM reservations
            WHERE agency_id = $1
              AND ($2::text IS NULL OR status = $2)
              AND ($3::int IS NULL OR equipment_id = $3)
              AND (NOT $4 OR reserved_by = $5)
            ORDER BY start_date
            "#,
        )
        .bind(agency_id)
        .bind(filter.status.map(|s| s.as_str()))
        .bind(filter.equipment_id)
        .bind(filter.mine)
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(reservation_from_row).collect()
    }

    /// Find reservations blocking any part of the half-open interval
    /// `[start, end)` on this equipment.
    ///
    /// Only `approved` and `active` rows hold an interval;
    /// `include_pending` additionally counts queued `pending` requests,
    /// which creation-time admission treats as blocking so that two
    /// racing identical requests resolve to one request plus one
    /// conflict. Ordered by start date for deterministic conflict
    /// reporting. Pure read; runs on the pool or inside a lifecycle
    /// transaction, depending on the executor passed in.
    pub async fn find_conflicts<'e, E>(
        &self,
        executor: E,
        agency_id: i32,
        equipment_id: i32,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        exclude_id: Option<i32>,
        include_pending: bool,
    ) -> AppResult<Vec<ConflictingReservation>>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let rows = sqlx::query(
            r#"
            SELECT r.id, r.project_id, u.full_name AS reserved_by,
                   r.start_date, r.end_date, r.status
            FROM reservations r
            JOIN users u ON u.id = r.reserved_by
            WHERE r.agency_id = $1
              AND r.equipment_id = $2
              AND (r.status IN ('approved', 'active')
                   OR ($6 AND r.status = 'pending'))
              AND r.start_date < $4
              AND r.end_date > $3
              AND ($5::int IS NULL OR r.id <> $5)
            ORDER BY r.start_date
            "#,
        )
        .bind(agency_id)
        .bind(equipment_id)
        .bind(start)
        .bind(end)
        .bind(exclude_id)
        .bind(include_pending)
        .fetch_all(executor)
        .await?;

        rows.iter()
            .map(|row| {
                let status: String = row.try_get("status")?;
                Ok(ConflictingReservation {
                    id: row.try_get("id")?,
                    project_id: row.try_get("project_id")?,
                    reserved_by: row.try_get("reserved_by")?,
                    start_date: row.try_get("start_date")?,
                    end_date: row.try_get("end_date")?,
                    status: status.parse().map_err(AppError::Internal)?,
                })
            })
            .collect()
    }

    /// Insert a reservation inside the lifecycle transaction holding the
    /// equipment row lock
    pub async fn insert(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        agency_id: i32,
        reserved_by: i32,
        data: &CreateReservation,
        status: ReservationStatus,
    ) -> AppResult<Reservation> {
        let row = sqlx::query(
            r#"
            INSERT INTO reservations
                (agency_id, equipment_id, project_id, reserved_by, start_date, end_date, status, notes)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING *
            "#,
        )
        .bind(agency_id)
        .bind(data.equipment_id)
        .bind(data.project_id)
        .bind(reserved_by)
        .bind(data.start_date)
        .bind(data.end_date)
        .bind(status.as_str())
        .bind(data.notes.as_deref().unwrap_or(""))
        .fetch_one(&mut **tx)
        .await?;
        reservation_from_row(&row)
    }

    /// Compare-and-swap status transition.
    ///
    /// The guard (`status = expected`) and the write happen in one
    /// statement, so two racing managers cannot both win; the loser sees
    /// `None` and reports an invalid transition. Optionally writes the
    /// condition report in the same statement (return transitions).
    pub async fn transition(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        agency_id: i32,
        id: i32,
        expected: ReservationStatus,
        next: ReservationStatus,
        condition_report: Option<&str>,
    ) -> AppResult<Option<Reservation>> {
        let row = sqlx::query(
            r#"
            UPDATE reservations
            SET status = $1,
                condition_report = COALESCE($2, condition_report),
                updated_at = NOW()
            WHERE id = $3 AND agency_id = $4 AND status = $5
            RETURNING *
            "#,
        )
        .bind(next.as_str())
        .bind(condition_report)
        .bind(id)
        .bind(agency_id)
        .bind(expected.as_str())
        .fetch_optional(&mut **tx)
        .await?;

        row.as_ref().map(reservation_from_row).transpose()
    }

    /// Whether any reservation currently holds (or is booked to hold) the
    /// equipment's calendar
    pub async fn holding_exists(&self, agency_id: i32, equipment_id: i32) -> AppResult<bool> {
        let row = sqlx::query(
            r#"
            SELECT EXISTS (
                SELECT 1 FROM reservations
                WHERE agency_id = $1 AND equipment_id = $2
                  AND status IN ('approved', 'active')
            ) AS held
            "#,
        )
        .bind(agency_id)
        .bind(equipment_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(row.try_get("held")?)
    }

    /// Waitlisted reservations for one equipment, oldest request first.
    /// Runs inside the promotion transaction so the set is stable under
    /// the equipment row lock.
    pub async fn waitlisted(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        agency_id: i32,
        equipment_id: i32,
    ) -> AppResult<Vec<Reservation>> {
        let rows = sqlx::query(
            r#"
            SELECT * FROM reservations
            WHERE agency_id = $1 AND equipment_id = $2 AND status = 'waitlist'
            ORDER BY created_at
            "#,
        )
        .bind(agency_id)
        .bind(equipment_id)
        .fetch_all(&mut **tx)
        .await?;

        rows.iter().map(reservation_from_row).collect()
    }
}
