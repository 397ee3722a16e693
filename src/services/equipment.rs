//! Equipment registry service

use uuid::Uuid;

use crate::{
    error::{AppError, AppResult},
    models::{
        equipment::{
            CreateCategory, CreateEquipment, Equipment, EquipmentCategory, EquipmentFilter,
            EquipmentStatus, UpdateEquipment,
        },
        user::TenantContext,
    },
    repository::Repository,
};

/// QR scan result: the asset plus a custody summary for the scanning app
#[derive(Debug, serde::Serialize, utoipa::ToSchema)]
pub struct ScanResult {
    pub equipment: Equipment,
    pub is_available: bool,
    pub current_holder: Option<String>,
}

#[derive(Clone)]
pub struct EquipmentService {
    repository: Repository,
}

impl EquipmentService {
    pub fn new(repository: Repository) -> Self {
        Self { repository }
    }

    pub async fn get(&self, ctx: TenantContext, id: i32) -> AppResult<Equipment> {
        self.repository.equipment.get(ctx.agency_id, id).await
    }

    pub async fn list(
        &self,
        ctx: TenantContext,
        filter: &EquipmentFilter,
    ) -> AppResult<Vec<Equipment>> {
        self.repository.equipment.list(ctx.agency_id, filter).await
    }

    /// Register a new asset; the QR payload is generated server-side and
    /// printed on the physical label.
    pub async fn create(&self, ctx: TenantContext, data: CreateEquipment) -> AppResult<Equipment> {
        let qr_code = format!("GH-{}", Uuid::new_v4());
        self.repository
            .equipment
            .create(ctx.agency_id, &data, &qr_code)
            .await
    }

    pub async fn update(
        &self,
        ctx: TenantContext,
        id: i32,
        data: UpdateEquipment,
    ) -> AppResult<Equipment> {
        self.repository.equipment.update(ctx.agency_id, id, &data).await
    }

    /// Take an asset out of circulation permanently. Gear that is out in
    /// the field has to come back first, and approved bookings have to be
    /// cancelled; otherwise a retired asset could still be checked out.
    pub async fn retire(&self, ctx: TenantContext, id: i32) -> AppResult<Equipment> {
        let equipment = self.repository.equipment.get(ctx.agency_id, id).await?;
        if equipment.status == EquipmentStatus::InUse {
            return Err(AppError::InvalidTransition(
                "Equipment is checked out; it must be returned before retiring".to_string(),
            ));
        }
        if self
            .repository
            .reservations
            .holding_exists(ctx.agency_id, id)
            .await?
        {
            return Err(AppError::InvalidTransition(
                "Equipment has approved or active reservations; cancel them before retiring"
                    .to_string(),
            ));
        }
        self.repository.equipment.set_retired(ctx.agency_id, id).await
    }

    /// Resolve a scanned QR label within the caller's agency
    pub async fn scan_qr(&self, ctx: TenantContext, qr_code: &str) -> AppResult<ScanResult> {
        let equipment = self.repository.equipment.find_by_qr(ctx.agency_id, qr_code).await?;

        let current_holder = match equipment.current_holder_id {
            Some(holder_id) => Some(
                self.repository
                    .users
                    .get(ctx.agency_id, holder_id)
                    .await?
                    .full_name,
            ),
            None => None,
        };

        Ok(ScanResult {
            is_available: equipment.status == EquipmentStatus::Available,
            current_holder,
            equipment,
        })
    }

    pub async fn list_categories(&self, ctx: TenantContext) -> AppResult<Vec<EquipmentCategory>> {
        self.repository.equipment.list_categories(ctx.agency_id).await
    }

    pub async fn create_category(
        &self,
        ctx: TenantContext,
        data: CreateCategory,
    ) -> AppResult<EquipmentCategory> {
        self.repository
            .equipment
            .create_category(ctx.agency_id, &data)
            .await
    }
}
