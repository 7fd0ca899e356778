//! Entity (team / individual) queries.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::model::*;

const ENTITY_COLUMNS: &str =
    "id, program_id, kind, name, status, progress, created_at, updated_at";

impl super::Db {
    pub(super) async fn insert_entity_row(&self, entity: &Entity) -> Result<()> {
        sqlx::query(
            "INSERT INTO entities (id, program_id, kind, name, status, progress, created_at, updated_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
        )
        .bind(entity.id.0)
        .bind(entity.program_id.0)
        .bind(entity.kind.to_string())
        .bind(&entity.name)
        .bind(entity.status.to_string())
        .bind(entity.progress as i16)
        .bind(entity.created_at)
        .bind(entity.updated_at)
        .execute(self.pool())
        .await
        .map_err(|e| match &e {
            sqlx::Error::Database(db) if db.is_foreign_key_violation() => {
                Error::NotFound(format!("program {}", entity.program_id))
            }
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                Error::Conflict(format!("entity {} already exists", entity.id))
            }
            _ => Error::Database(e),
        })?;
        Ok(())
    }

    pub(super) async fn fetch_entity(&self, id: EntityId) -> Result<Option<Entity>> {
        let row: Option<EntityRow> =
            sqlx::query_as(&format!("SELECT {ENTITY_COLUMNS} FROM entities WHERE id = $1"))
                .bind(id.0)
                .fetch_optional(self.pool())
                .await?;

        row.map(EntityRow::try_into_entity).transpose()
    }

    pub(super) async fn fetch_entities(&self, program_id: ProgramId) -> Result<Vec<Entity>> {
        let rows: Vec<EntityRow> = sqlx::query_as(&format!(
            "SELECT {ENTITY_COLUMNS} FROM entities WHERE program_id = $1
             ORDER BY created_at ASC, name ASC"
        ))
        .bind(program_id.0)
        .fetch_all(self.pool())
        .await?;

        rows.into_iter().map(EntityRow::try_into_entity).collect()
    }

    pub(super) async fn swap_entity_status(
        &self,
        id: EntityId,
        from: EntityStatus,
        to: EntityStatus,
    ) -> Result<Option<Entity>> {
        let row: Option<EntityRow> = sqlx::query_as(&format!(
            "UPDATE entities SET status = $1, updated_at = $2
             WHERE id = $3 AND status = $4
             RETURNING {ENTITY_COLUMNS}"
        ))
        .bind(to.to_string())
        .bind(Utc::now())
        .bind(id.0)
        .bind(from.to_string())
        .fetch_optional(self.pool())
        .await?;

        row.map(EntityRow::try_into_entity).transpose()
    }
}

/// Internal row type for sqlx::FromRow.
#[derive(sqlx::FromRow)]
struct EntityRow {
    id: Uuid,
    program_id: Uuid,
    kind: String,
    name: String,
    status: String,
    progress: i16,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl EntityRow {
    fn try_into_entity(self) -> Result<Entity> {
        Ok(Entity {
            id: EntityId(self.id),
            program_id: ProgramId(self.program_id),
            kind: self.kind.parse()?,
            name: self.name,
            status: self.status.parse()?,
            progress: self.progress.clamp(0, 100) as u8,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}
