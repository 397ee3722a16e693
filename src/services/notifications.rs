//! Notification read-side service

use crate::{
    error::AppResult,
    models::{notification::Notification, user::TenantContext},
    repository::Repository,
};

#[derive(Clone)]
pub struct NotificationsService {
    repository: Repository,
}

impl NotificationsService {
    pub fn new(repository: Repository) -> Self {
        Self { repository }
    }

    /// The caller's recent notifications
    pub async fn list(&self, ctx: TenantContext) -> AppResult<Vec<Notification>> {
        self.repository
            .notifications
            .list_for_user(ctx.agency_id, ctx.user_id)
            .await
    }

    /// Mark one of the caller's notifications read
    pub async fn mark_read(&self, ctx: TenantContext, id: i32) -> AppResult<()> {
        self.repository
            .notifications
            .mark_read(ctx.agency_id, ctx.user_id, id)
            .await
    }
}
