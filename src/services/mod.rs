//! Business logic services

pub mod email;
pub mod equipment;
pub mod events;
pub mod notifications;
pub mod reservations;
pub mod waitlist;

use crate::{config::EmailConfig, error::AppResult, repository::Repository};

/// Container for all services
#[derive(Clone)]
pub struct Services {
    pub reservations: reservations::ReservationsService,
    pub equipment: equipment::EquipmentService,
    pub notifications: notifications::NotificationsService,
    pub email: email::EmailService,
    pub events: events::EventEmitter,
}

impl Services {
    /// Create all services with the given repository
    pub async fn new(
        repository: Repository,
        email_config: EmailConfig,
        events: events::EventEmitter,
    ) -> AppResult<Self> {
        Ok(Self {
            reservations: reservations::ReservationsService::new(repository.clone(), events.clone()),
            equipment: equipment::EquipmentService::new(repository.clone()),
            notifications: notifications::NotificationsService::new(repository),
            email: email::EmailService::new(email_config),
            events,
        })
    }
}
