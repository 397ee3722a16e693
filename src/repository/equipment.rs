//! Equipment repository for database operations
//!
//! Every query is scoped to an agency id; a row in another agency is
//! indistinguishable from a missing row.

use sqlx::postgres::PgRow;
use sqlx::{Pool, Postgres, Row, Transaction};

use crate::{
    error::{AppError, AppResult},
    models::equipment::{
        CreateCategory, CreateEquipment, Equipment, EquipmentCategory, EquipmentFilter,
        EquipmentStatus, UpdateEquipment,
    },
};

pub(crate) fn equipment_from_row(row: &PgRow) -> AppResult<Equipment> {
    let status: String = row.try_get("status")?;
    Ok(Equipment {
        id: row.try_get("id")?,
        agency_id: row.try_get("agency_id")?,
        category_id: row.try_get("category_id")?,
        name: row.try_get("name")?,
        brand: row.try_get("brand")?,
        model: row.try_get("model")?,
        serial_number: row.try_get("serial_number")?,
        qr_code: row.try_get("qr_code")?,
        status: status.parse().map_err(AppError::Internal)?,
        current_holder_id: row.try_get("current_holder_id")?,
        notes: row.try_get("notes")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

#[derive(Clone)]
pub struct EquipmentRepository {
    pool: Pool<Postgres>,
}

impl EquipmentRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// Get equipment by ID within the agency
    pub async fn get(&self, agency_id: i32, id: i32) -> AppResult<Equipment> {
        let row = sqlx::query("SELECT * FROM equipment WHERE id = $1 AND agency_id = $2")
            .bind(id)
            .bind(agency_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Equipment {} not found", id)))?;
        equipment_from_row(&row)
    }

    /// Get equipment by ID, locking the row for the rest of the
    /// transaction. The lock serializes every conflict-check-and-write
    /// for one asset, which is what keeps two racing requests from both
    /// passing the conflict check.
    pub async fn get_for_update(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        agency_id: i32,
        id: i32,
    ) -> AppResult<Equipment> {
        let row = sqlx::query("SELECT * FROM equipment WHERE id = $1 AND agency_id = $2 FOR UPDATE")
            .bind(id)
            .bind(agency_id)
            .fetch_optional(&mut **tx)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Equipment {} not found", id)))?;
        equipment_from_row(&row)
    }

    /// Find equipment by its QR payload
    pub async fn find_by_qr(&self, agency_id: i32, qr_code: &str) -> AppResult<Equipment> {
        let row = sqlx::query("SELECT * FROM equipment WHERE qr_code = $1 AND agency_id = $2")
            .bind(qr_code)
            .bind(agency_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound("Equipment not found".to_string()))?;
        equipment_from_row(&row)
    }

    /// List equipment with optional search / status / category filters
    pub async fn list(&self, agency_id: i32, filter: &EquipmentFilter) -> AppResult<Vec<Equipment>> {
        let rows = sqlx::query(
            r#"
            SELECT * FROM equipment
            WHERE agency_id = $1
              AND ($2::text IS NULL OR
                   name ILIKE '%' || $2 || '%' OR
                   serial_number ILIKE '%' || $2 || '%' OR
                   brand ILIKE '%' || $2 || '%' OR
                   model ILIKE '%' || $2 || '%')
              AND ($3::text IS NULL OR status = $3)
              AND ($4::int IS NULL OR category_id = $4)
            ORDER BY name
            "#,
        )
        .bind(agency_id)
        .bind(filter.search.as_deref())
        .bind(filter.status.map(|s| s.as_str()))
        .bind(filter.category_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(equipment_from_row).collect()
    }

    /// Create equipment
    pub async fn create(
        &self,
        agency_id: i32,
        data: &CreateEquipment,
        qr_code: &str,
    ) -> AppResult<Equipment> {
        let row = sqlx::query(
            r#"
            INSERT INTO equipment (agency_id, category_id, name, brand, model, serial_number, qr_code, notes)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING *
            "#,
        )
        .bind(agency_id)
        .bind(data.category_id)
        .bind(&data.name)
        .bind(data.brand.as_deref().unwrap_or(""))
        .bind(data.model.as_deref().unwrap_or(""))
        .bind(data.serial_number.as_deref().unwrap_or(""))
        .bind(qr_code)
        .bind(data.notes.as_deref().unwrap_or(""))
        .fetch_one(&self.pool)
        .await?;
        equipment_from_row(&row)
    }

    /// Update equipment metadata (never status/holder; those belong to the
    /// lifecycle engine)
    pub async fn update(
        &self,
        agency_id: i32,
        id: i32,
        data: &UpdateEquipment,
    ) -> AppResult<Equipment> {
        let mut sets = vec!["updated_at = NOW()".to_string()];
        let mut idx = 3;

        macro_rules! add_field {
            ($field:expr, $name:expr) => {
                if $field.is_some() {
                    sets.push(format!("{} = ${}", $name, idx));
                    idx += 1;
                }
            };
        }

        add_field!(data.name, "name");
        add_field!(data.category_id, "category_id");
        add_field!(data.brand, "brand");
        add_field!(data.model, "model");
        add_field!(data.serial_number, "serial_number");
        add_field!(data.notes, "notes");

        let query = format!(
            "UPDATE equipment SET {} WHERE id = $1 AND agency_id = $2 RETURNING *",
            sets.join(", ")
        );

        let mut builder = sqlx::query(&query).bind(id).bind(agency_id);

        macro_rules! bind_field {
            ($field:expr) => {
                if let Some(ref val) = $field {
                    builder = builder.bind(val);
                }
            };
        }

        bind_field!(data.name);
        bind_field!(data.category_id);
        bind_field!(data.brand);
        bind_field!(data.model);
        bind_field!(data.serial_number);
        bind_field!(data.notes);

        let row = builder
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Equipment {} not found", id)))?;
        equipment_from_row(&row)
    }

    /// Write status + holder inside a lifecycle transaction.
    ///
    /// Only the reservation lifecycle engine calls this, and always in the
    /// same transaction as the reservation status write, so the registry
    /// and the reservation table cannot diverge.
    pub async fn set_state(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        id: i32,
        status: EquipmentStatus,
        holder_id: Option<i32>,
    ) -> AppResult<()> {
        sqlx::query(
            "UPDATE equipment SET status = $1, current_holder_id = $2, updated_at = NOW() WHERE id = $3",
        )
        .bind(status.as_str())
        .bind(holder_id)
        .bind(id)
        .execute(&mut **tx)
        .await?;
        Ok(())
    }

    /// Mark equipment retired (management action, not a lifecycle write)
    pub async fn set_retired(&self, agency_id: i32, id: i32) -> AppResult<Equipment> {
        let row = sqlx::query(
            "UPDATE equipment SET status = 'retired', updated_at = NOW() WHERE id = $1 AND agency_id = $2 RETURNING *",
        )
        .bind(id)
        .bind(agency_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Equipment {} not found", id)))?;
        equipment_from_row(&row)
    }

    /// List categories
    pub async fn list_categories(&self, agency_id: i32) -> AppResult<Vec<EquipmentCategory>> {
        let categories = sqlx::query_as::<_, EquipmentCategory>(
            "SELECT * FROM equipment_categories WHERE agency_id = $1 ORDER BY name",
        )
        .bind(agency_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(categories)
    }

    /// Create a category
    pub async fn create_category(
        &self,
        agency_id: i32,
        data: &CreateCategory,
    ) -> AppResult<EquipmentCategory> {
        let category = sqlx::query_as::<_, EquipmentCategory>(
            r#"
            INSERT INTO equipment_categories (agency_id, name, slug, parent_id)
            VALUES ($1, $2, $3, $4)
            RETURNING *
            "#,
        )
        .bind(agency_id)
        .bind(&data.name)
        .bind(&data.slug)
        .bind(data.parent_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(category)
    }
}
