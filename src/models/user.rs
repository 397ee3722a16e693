//! User references and token claims

use chrono::{DateTime, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;

use crate::error::AppError;
use crate::models::tenant::Permission;

/// Member record, as far as this service cares about members.
///
/// Accounts are provisioned by the identity collaborator; this table only
/// mirrors what is needed for holder display and notification delivery.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct UserRef {
    pub id: i32,
    pub agency_id: i32,
    pub email: String,
    pub full_name: String,
    pub created_at: DateTime<Utc>,
}

/// Claims embedded in the bearer token issued by the identity service.
///
/// The agency id in here is the only tenant identifier the server ever
/// trusts; tenant ids arriving in request bodies or paths are ignored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserClaims {
    /// User id
    pub sub: i32,
    /// Acting agency id
    pub agency_id: i32,
    /// Display name
    pub name: String,
    /// Capability set granted by the user's role in this agency
    pub permissions: Vec<Permission>,
    /// Expiration timestamp (seconds since epoch)
    pub exp: i64,
}

/// Tenant scoping passed explicitly into every service call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TenantContext {
    pub agency_id: i32,
    pub user_id: i32,
}

impl UserClaims {
    /// Validate and decode a bearer token
    pub fn from_token(token: &str, secret: &str) -> Result<Self, jsonwebtoken::errors::Error> {
        let data = decode::<UserClaims>(
            token,
            &DecodingKey::from_secret(secret.as_bytes()),
            &Validation::default(),
        )?;
        Ok(data.claims)
    }

    /// Sign claims into a token. The identity service owns issuance in
    /// production; this is used by dev tooling and the integration tests.
    pub fn to_token(&self, secret: &str) -> Result<String, jsonwebtoken::errors::Error> {
        encode(
            &Header::default(),
            self,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
    }

    /// The tenant scope every core operation runs under
    pub fn context(&self) -> TenantContext {
        TenantContext {
            agency_id: self.agency_id,
            user_id: self.sub,
        }
    }

    pub fn has(&self, permission: Permission) -> bool {
        self.permissions.contains(&permission)
    }

    /// Capability check, surfaced before any business logic runs
    pub fn require(&self, permission: Permission) -> Result<(), AppError> {
        if self.has(permission) {
            Ok(())
        } else {
            Err(AppError::Authorization(format!(
                "Missing permission: {}",
                permission
            )))
        }
    }
}
