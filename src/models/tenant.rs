//! Tenant (agency) model and role capabilities

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;

/// An agency is the tenancy boundary: every asset, reservation and
/// notification belongs to exactly one agency, and all queries are scoped
/// to it.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Agency {
    pub id: i32,
    pub name: String,
    pub slug: String,
    pub plan: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

/// Role capabilities carried in token claims.
///
/// Checked through [`crate::models::user::UserClaims::require`] rather than
/// string-keyed attribute lookups.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum Permission {
    ManageEquipment,
    ManageProjects,
    ManageTeam,
    ViewFinance,
    ManageSettings,
}

impl Permission {
    pub fn as_str(&self) -> &'static str {
        match self {
            Permission::ManageEquipment => "manage_equipment",
            Permission::ManageProjects => "manage_projects",
            Permission::ManageTeam => "manage_team",
            Permission::ViewFinance => "view_finance",
            Permission::ManageSettings => "manage_settings",
        }
    }
}

impl std::fmt::Display for Permission {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
