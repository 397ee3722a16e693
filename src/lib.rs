//! Gearhouse Equipment Reservation Server
//!
//! A multi-tenant REST JSON API for managing shared production equipment:
//! members reserve time-bounded custody of gear, managers approve, and
//! custody is tracked through physical checkout and return.

use std::sync::Arc;

pub mod api;
pub mod config;
pub mod error;
pub mod models;
pub mod repository;
pub mod services;

pub use config::AppConfig;
pub use error::{AppError, AppResult};

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub services: Arc<services::Services>,
    pub pool: sqlx::PgPool,
}
