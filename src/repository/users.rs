//! Users repository (member mirror for holder display and delivery)

use sqlx::{Pool, Postgres};

use crate::{
    error::{AppError, AppResult},
    models::user::UserRef,
};

#[derive(Clone)]
pub struct UsersRepository {
    pool: Pool<Postgres>,
}

impl UsersRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// Get a member by ID within the agency
    pub async fn get(&self, agency_id: i32, id: i32) -> AppResult<UserRef> {
        sqlx::query_as::<_, UserRef>("SELECT * FROM users WHERE id = $1 AND agency_id = $2")
            .bind(id)
            .bind(agency_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("User {} not found", id)))
    }
}
