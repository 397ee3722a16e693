//! Notifications repository

use sqlx::{Pool, Postgres};

use crate::{
    error::{AppError, AppResult},
    models::notification::Notification,
};

#[derive(Clone)]
pub struct NotificationsRepository {
    pool: Pool<Postgres>,
}

impl NotificationsRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// Persist a notification for a member
    pub async fn insert(
        &self,
        agency_id: i32,
        user_id: i32,
        kind: &str,
        title: &str,
        message: &str,
        link: Option<&str>,
    ) -> AppResult<Notification> {
        let notification = sqlx::query_as::<_, Notification>(
            r#"
            INSERT INTO notifications (agency_id, user_id, kind, title, message, link)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *
            "#,
        )
        .bind(agency_id)
        .bind(user_id)
        .bind(kind)
        .bind(title)
        .bind(message)
        .bind(link)
        .fetch_one(&self.pool)
        .await?;
        Ok(notification)
    }

    /// Most recent notifications for a member
    pub async fn list_for_user(&self, agency_id: i32, user_id: i32) -> AppResult<Vec<Notification>> {
        let notifications = sqlx::query_as::<_, Notification>(
            r#"
            SELECT * FROM notifications
            WHERE agency_id = $1 AND user_id = $2
            ORDER BY created_at DESC
            LIMIT 100
            "#,
        )
        .bind(agency_id)
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(notifications)
    }

    /// Mark one of the member's notifications read
    pub async fn mark_read(&self, agency_id: i32, user_id: i32, id: i32) -> AppResult<()> {
        let result = sqlx::query(
            "UPDATE notifications SET read = TRUE WHERE id = $1 AND agency_id = $2 AND user_id = $3",
        )
        .bind(id)
        .bind(agency_id)
        .bind(user_id)
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Notification {} not found", id)));
        }
        Ok(())
    }
}
