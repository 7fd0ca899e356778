//! Phase assignment queries.
//!
//! Writes on one (entity, program) key serialize on its row: direct moves
//! upsert (last commit wins), sequential moves compare-and-swap on the
//! phase they started from.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::map_constraint;
use crate::error::Result;
use crate::model::*;
use crate::store::AssignmentChange;

impl super::Db {
    pub(super) async fn fetch_assignment(
        &self,
        entity_id: EntityId,
        program_id: ProgramId,
    ) -> Result<Option<PhaseAssignment>> {
        let row: Option<AssignmentRow> = sqlx::query_as(
            "SELECT entity_id, program_id, phase_id, updated_at
             FROM phase_assignments WHERE entity_id = $1 AND program_id = $2",
        )
        .bind(entity_id.0)
        .bind(program_id.0)
        .fetch_optional(self.pool())
        .await?;

        Ok(row.map(PhaseAssignment::from))
    }

    pub(super) async fn fetch_assignments(
        &self,
        program_id: ProgramId,
    ) -> Result<Vec<PhaseAssignment>> {
        let rows: Vec<AssignmentRow> = sqlx::query_as(
            "SELECT entity_id, program_id, phase_id, updated_at
             FROM phase_assignments WHERE program_id = $1",
        )
        .bind(program_id.0)
        .fetch_all(self.pool())
        .await?;

        Ok(rows.into_iter().map(PhaseAssignment::from).collect())
    }

    pub(super) async fn put_assignment(
        &self,
        entity_id: EntityId,
        program_id: ProgramId,
        phase_id: PhaseId,
    ) -> Result<AssignmentChange> {
        let mut tx = self.pool().begin().await?;

        // Lock the row (if any) so `previous` is the value this write replaced.
        let previous: Option<(Uuid,)> = sqlx::query_as(
            "SELECT phase_id FROM phase_assignments
             WHERE entity_id = $1 AND program_id = $2
             FOR UPDATE",
        )
        .bind(entity_id.0)
        .bind(program_id.0)
        .fetch_optional(&mut *tx)
        .await?;

        let row: AssignmentRow = sqlx::query_as(
            "INSERT INTO phase_assignments (entity_id, program_id, phase_id, updated_at)
             VALUES ($1, $2, $3, $4)
             ON CONFLICT (entity_id, program_id)
             DO UPDATE SET phase_id = EXCLUDED.phase_id, updated_at = EXCLUDED.updated_at
             RETURNING entity_id, program_id, phase_id, updated_at",
        )
        .bind(entity_id.0)
        .bind(program_id.0)
        .bind(phase_id.0)
        .bind(Utc::now())
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| map_constraint(e, program_id, phase_id))?;

        tx.commit().await?;

        Ok(AssignmentChange {
            previous: previous.map(|(id,)| PhaseId(id)),
            assignment: row.into(),
        })
    }

    pub(super) async fn cas_assignment(
        &self,
        entity_id: EntityId,
        program_id: ProgramId,
        expected: Option<PhaseId>,
        phase_id: PhaseId,
    ) -> Result<Option<PhaseAssignment>> {
        let now = Utc::now();
        let row: Option<AssignmentRow> = match expected {
            None => {
                sqlx::query_as(
                    "INSERT INTO phase_assignments (entity_id, program_id, phase_id, updated_at)
                     VALUES ($1, $2, $3, $4)
                     ON CONFLICT (entity_id, program_id) DO NOTHING
                     RETURNING entity_id, program_id, phase_id, updated_at",
                )
                .bind(entity_id.0)
                .bind(program_id.0)
                .bind(phase_id.0)
                .bind(now)
                .fetch_optional(self.pool())
                .await
            }
            Some(current) => {
                sqlx::query_as(
                    "UPDATE phase_assignments SET phase_id = $3, updated_at = $4
                     WHERE entity_id = $1 AND program_id = $2 AND phase_id = $5
                     RETURNING entity_id, program_id, phase_id, updated_at",
                )
                .bind(entity_id.0)
                .bind(program_id.0)
                .bind(phase_id.0)
                .bind(now)
                .bind(current.0)
                .fetch_optional(self.pool())
                .await
            }
        }
        .map_err(|e| map_constraint(e, program_id, phase_id))?;

        Ok(row.map(PhaseAssignment::from))
    }
}

/// Internal row type for sqlx::FromRow.
#[derive(sqlx::FromRow)]
struct AssignmentRow {
    entity_id: Uuid,
    program_id: Uuid,
    phase_id: Uuid,
    updated_at: DateTime<Utc>,
}

impl From<AssignmentRow> for PhaseAssignment {
    fn from(row: AssignmentRow) -> Self {
        Self {
            entity_id: EntityId(row.entity_id),
            program_id: ProgramId(row.program_id),
            phase_id: PhaseId(row.phase_id),
            updated_at: row.updated_at,
        }
    }
}
