//! Winner record queries.
//!
//! `winners.program_id` is the primary key, so two concurrent declarations
//! for one program cannot both insert.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::Result;
use crate::model::*;
use crate::store::WinnerInsert;

impl super::Db {
    pub(super) async fn record_winner(
        &self,
        record: &WinnerRecord,
        unassigned_in_phase: bool,
    ) -> Result<WinnerInsert> {
        let mut tx = self.pool().begin().await?;

        let existing: Option<WinnerRow> = sqlx::query_as(
            "SELECT program_id, entity_id, phase_id, declared_at
             FROM winners WHERE program_id = $1",
        )
        .bind(record.program_id.0)
        .fetch_optional(&mut *tx)
        .await?;
        if let Some(row) = existing {
            return Ok(WinnerInsert::Existing(row.into()));
        }

        // Hold the assignment row until commit so the entity cannot be
        // moved out of the phase between this check and the insert.
        let current: Option<(Uuid,)> = sqlx::query_as(
            "SELECT phase_id FROM phase_assignments
             WHERE entity_id = $1 AND program_id = $2
             FOR SHARE",
        )
        .bind(record.entity_id.0)
        .bind(record.program_id.0)
        .fetch_optional(&mut *tx)
        .await?;

        let in_phase = match current {
            Some((phase_id,)) => phase_id == record.phase_id.0,
            None => unassigned_in_phase,
        };
        if !in_phase {
            return Ok(WinnerInsert::PhaseMoved);
        }

        let inserted: Option<WinnerRow> = sqlx::query_as(
            "INSERT INTO winners (program_id, entity_id, phase_id, declared_at)
             VALUES ($1, $2, $3, $4)
             ON CONFLICT (program_id) DO NOTHING
             RETURNING program_id, entity_id, phase_id, declared_at",
        )
        .bind(record.program_id.0)
        .bind(record.entity_id.0)
        .bind(record.phase_id.0)
        .bind(record.declared_at)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(row) = inserted else {
            // Lost the race to a concurrent declaration.
            let winner: WinnerRow = sqlx::query_as(
                "SELECT program_id, entity_id, phase_id, declared_at
                 FROM winners WHERE program_id = $1",
            )
            .bind(record.program_id.0)
            .fetch_one(&mut *tx)
            .await?;
            return Ok(WinnerInsert::Existing(winner.into()));
        };

        sqlx::query(
            "UPDATE entities SET status = 'completed', progress = 100, updated_at = $1
             WHERE id = $2",
        )
        .bind(record.declared_at)
        .bind(record.entity_id.0)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(WinnerInsert::Declared(row.into()))
    }

    pub(super) async fn fetch_winner(&self, program_id: ProgramId) -> Result<Option<WinnerRecord>> {
        let row: Option<WinnerRow> = sqlx::query_as(
            "SELECT program_id, entity_id, phase_id, declared_at
             FROM winners WHERE program_id = $1",
        )
        .bind(program_id.0)
        .fetch_optional(self.pool())
        .await?;

        Ok(row.map(WinnerRecord::from))
    }
}

/// Internal row type for sqlx::FromRow.
#[derive(sqlx::FromRow)]
struct WinnerRow {
    program_id: Uuid,
    entity_id: Uuid,
    phase_id: Uuid,
    declared_at: DateTime<Utc>,
}

impl From<WinnerRow> for WinnerRecord {
    fn from(row: WinnerRow) -> Self {
        Self {
            program_id: ProgramId(row.program_id),
            entity_id: EntityId(row.entity_id),
            phase_id: PhaseId(row.phase_id),
            declared_at: row.declared_at,
        }
    }
}
