//! Domain models

pub mod equipment;
pub mod notification;
pub mod reservation;
pub mod tenant;
pub mod user;
