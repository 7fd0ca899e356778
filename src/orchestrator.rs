//! Phase transition orchestrator: the single entry point for callers.
//!
//! Composes the catalog, tracker and winner registry, applies the role
//! rule (mentors move entities but never pick winners), and owns program
//! and entity authoring plus the kanban board projection.

use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use opentelemetry::KeyValue;
use serde::Serialize;
use tracing::info;

use crate::catalog::{self, PhaseCatalog};
use crate::error::{Error, Result};
use crate::event::{EventBus, EventKind};
use crate::model::*;
use crate::registry::WinnerRegistry;
use crate::store::Store;
use crate::telemetry::metrics;
use crate::tracker::PhaseTracker;

/// A program together with its ordered phases.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgramDetail {
    #[serde(flatten)]
    pub program: Program,
    pub phases: Vec<Phase>,
}

/// Result of a direct move, optionally combined with a winner declaration.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MoveOutcome {
    #[serde(flatten)]
    pub phase: PhaseView,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub winner: Option<WinnerRecord>,
}

/// Kanban projection of a program: one column per phase.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Board {
    pub program_id: ProgramId,
    pub winner: Option<WinnerRecord>,
    pub columns: Vec<BoardColumn>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BoardColumn {
    pub phase: Phase,
    pub cards: Vec<BoardCard>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BoardCard {
    #[serde(flatten)]
    pub entity: Entity,
    pub is_winner: bool,
}

#[derive(Clone)]
pub struct Orchestrator {
    store: Arc<dyn Store>,
    events: EventBus,
    tracker: PhaseTracker,
    registry: WinnerRegistry,
}

impl Orchestrator {
    pub fn new(store: Arc<dyn Store>) -> Self {
        let events = EventBus::new();
        Self {
            tracker: PhaseTracker::new(Arc::clone(&store), events.clone()),
            registry: WinnerRegistry::new(Arc::clone(&store), events.clone()),
            store,
            events,
        }
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    pub fn tracker(&self) -> &PhaseTracker {
        &self.tracker
    }

    pub fn registry(&self) -> &WinnerRegistry {
        &self.registry
    }

    pub fn store(&self) -> &Arc<dyn Store> {
        &self.store
    }

    // -----------------------------------------------------------------------
    // Programs
    // -----------------------------------------------------------------------

    /// Author a program. It starts in `draft`.
    pub async fn create_program(&self, new: NewProgram) -> Result<ProgramDetail> {
        let id = ProgramId::new();
        let catalog = PhaseCatalog::author(id, &new)?;
        let now = Utc::now();
        let program = Program {
            id,
            name: new.name.trim().to_string(),
            status: ProgramStatus::Draft,
            start_date: new.start_date,
            end_date: new.end_date,
            created_at: now,
            updated_at: now,
        };

        self.store.insert_program(&program, catalog.phases()).await?;
        info!(program_id = %id, name = %program.name, phases = catalog.len(), "program created");
        self.events.publish(
            id,
            EventKind::ProgramCreated {
                name: program.name.clone(),
                phases: catalog.len(),
            },
        );

        Ok(ProgramDetail {
            program,
            phases: catalog.into_phases(),
        })
    }

    pub async fn get_program(&self, id: ProgramId) -> Result<ProgramDetail> {
        let program = self
            .store
            .get_program(id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("program {id}")))?;
        let phases = self.store.list_phases(id).await?;
        Ok(ProgramDetail { program, phases })
    }

    pub async fn list_programs(&self) -> Result<Vec<Program>> {
        self.store.list_programs().await
    }

    /// Move a program forward through draft -> active -> completed.
    pub async fn set_program_status(&self, id: ProgramId, to: ProgramStatus) -> Result<Program> {
        let program = self.get_program(id).await?.program;
        let from = program.status;
        if from == to {
            return Ok(program);
        }
        if !from.can_transition_to(to) {
            return Err(Error::InvalidTransition {
                from: from.to_string(),
                to: to.to_string(),
            });
        }

        let updated = self
            .store
            .update_program_status(id, from, to)
            .await?
            .ok_or_else(|| Error::Conflict(format!("status of program {id} changed concurrently")))?;

        info!(program_id = %id, %from, %to, "program status changed");
        metrics::program_status_changes().add(
            1,
            &[
                KeyValue::new("from", from.to_string()),
                KeyValue::new("to", to.to_string()),
            ],
        );
        self.events
            .publish(id, EventKind::ProgramStatusChanged { from, to });
        Ok(updated)
    }

    // -----------------------------------------------------------------------
    // Entities
    // -----------------------------------------------------------------------

    pub async fn register_entity(&self, new: NewEntity) -> Result<Entity> {
        let name = new.name.trim();
        if name.is_empty() {
            return Err(Error::Validation("entity name must not be empty".to_string()));
        }
        if self.store.get_program(new.program_id).await?.is_none() {
            return Err(Error::NotFound(format!("program {}", new.program_id)));
        }

        let now = Utc::now();
        let entity = Entity {
            id: EntityId::new(),
            program_id: new.program_id,
            kind: new.kind,
            name: name.to_string(),
            status: EntityStatus::Active,
            progress: 0,
            created_at: now,
            updated_at: now,
        };
        self.store.insert_entity(&entity).await?;

        info!(program_id = %entity.program_id, entity_id = %entity.id, kind = %entity.kind, "entity registered");
        self.events.publish(
            entity.program_id,
            EventKind::EntityRegistered {
                entity_id: entity.id,
                name: entity.name.clone(),
            },
        );
        Ok(entity)
    }

    pub async fn list_entities(&self, program_id: ProgramId) -> Result<Vec<Entity>> {
        if self.store.get_program(program_id).await?.is_none() {
            return Err(Error::NotFound(format!("program {program_id}")));
        }
        self.store.list_entities(program_id).await
    }

    /// Flag or unflag an entity as at risk. `completed` belongs to the winner
    /// registry and cannot be set or cleared here.
    pub async fn set_entity_status(
        &self,
        program_id: ProgramId,
        entity_id: EntityId,
        to: EntityStatus,
    ) -> Result<Entity> {
        let entity = match self.store.get_entity(entity_id).await? {
            Some(e) if e.program_id == program_id => e,
            _ => {
                return Err(Error::NotFound(format!(
                    "entity {entity_id} in program {program_id}"
                )));
            }
        };
        let from = entity.status;
        if from == to {
            return Ok(entity);
        }
        if from == EntityStatus::Completed || to == EntityStatus::Completed {
            return Err(Error::InvalidTransition {
                from: from.to_string(),
                to: to.to_string(),
            });
        }

        let updated = self
            .store
            .update_entity_status(entity_id, from, to)
            .await?
            .ok_or_else(|| {
                Error::Conflict(format!("status of entity {entity_id} changed concurrently"))
            })?;
        self.events.publish(
            program_id,
            EventKind::EntityStatusChanged {
                entity_id,
                status: to,
            },
        );
        Ok(updated)
    }

    // -----------------------------------------------------------------------
    // Catalog
    // -----------------------------------------------------------------------

    pub async fn list_phases(&self, program_id: ProgramId) -> Result<Vec<Phase>> {
        Ok(catalog::load(self.store.as_ref(), program_id)
            .await?
            .into_phases())
    }

    pub async fn get_phase(&self, program_id: ProgramId, phase_id: PhaseId) -> Result<Phase> {
        let catalog = catalog::load(self.store.as_ref(), program_id).await?;
        catalog.get(phase_id).cloned()
    }

    // -----------------------------------------------------------------------
    // Phase moves
    // -----------------------------------------------------------------------

    /// Where the entity sits now; unassigned entities report the first phase.
    pub async fn current_phase(&self, program_id: ProgramId, entity_id: EntityId) -> Result<PhaseView> {
        let phase = self.tracker.current_or_first(entity_id, program_id).await?;
        Ok(PhaseView::from(&phase))
    }

    /// Direct move to any phase (kanban drag). With `select_winner`, the
    /// entity is also declared winner; that combination is refused to
    /// mentors before anything changes.
    pub async fn move_entity_to_phase(
        &self,
        role: ActorRole,
        program_id: ProgramId,
        entity_id: EntityId,
        target: PhaseId,
        select_winner: bool,
    ) -> Result<MoveOutcome> {
        let started = Instant::now();
        if select_winner {
            self.authorize_winner(role)?;
            self.check_winner_move(program_id, entity_id, target).await?;
        }

        let assignment = self
            .tracker
            .assign_phase(entity_id, program_id, target)
            .await?;
        let phase = self.view_of(program_id, assignment.phase_id).await?;
        info!(%role, %program_id, %entity_id, phase = %phase.name, "entity moved");

        let winner = if select_winner {
            Some(self.registry.declare_winner(program_id, entity_id).await?)
        } else {
            None
        };

        record_duration("move_entity_to_phase", started);
        Ok(MoveOutcome { phase, winner })
    }

    pub async fn advance_entity(
        &self,
        role: ActorRole,
        program_id: ProgramId,
        entity_id: EntityId,
    ) -> Result<PhaseView> {
        let started = Instant::now();
        let assignment = self.tracker.advance(entity_id, program_id).await?;
        let view = self.view_of(program_id, assignment.phase_id).await?;
        info!(%role, %program_id, %entity_id, phase = %view.name, "entity advanced");
        record_duration("advance", started);
        Ok(view)
    }

    pub async fn retreat_entity(
        &self,
        role: ActorRole,
        program_id: ProgramId,
        entity_id: EntityId,
    ) -> Result<PhaseView> {
        let started = Instant::now();
        let assignment = self.tracker.retreat(entity_id, program_id).await?;
        let view = self.view_of(program_id, assignment.phase_id).await?;
        info!(%role, %program_id, %entity_id, phase = %view.name, "entity retreated");
        record_duration("retreat", started);
        Ok(view)
    }

    /// Declare the winner of a program. Mentors are always refused.
    pub async fn select_winner(
        &self,
        role: ActorRole,
        program_id: ProgramId,
        entity_id: EntityId,
    ) -> Result<WinnerRecord> {
        let started = Instant::now();
        self.authorize_winner(role)?;
        let record = self.registry.declare_winner(program_id, entity_id).await?;
        record_duration("select_winner", started);
        Ok(record)
    }

    pub async fn get_winner(&self, program_id: ProgramId) -> Result<Option<WinnerRecord>> {
        self.registry.get_winner(program_id).await
    }

    /// Place an entity from legacy data that only carries a phase name.
    pub async fn import_legacy(
        &self,
        program_id: ProgramId,
        entity_id: EntityId,
        phase_name: &str,
    ) -> Result<PhaseView> {
        let assignment = self
            .tracker
            .assign_by_name(entity_id, program_id, phase_name)
            .await?;
        self.view_of(program_id, assignment.phase_id).await
    }

    // -----------------------------------------------------------------------
    // Board
    // -----------------------------------------------------------------------

    /// Columns in ordinal order; unassigned entities land in the first column.
    pub async fn board(&self, program_id: ProgramId) -> Result<Board> {
        let catalog = catalog::load(self.store.as_ref(), program_id).await?;
        let entities = self.store.list_entities(program_id).await?;
        let assignments = self.store.list_assignments(program_id).await?;
        let winner = self.registry.get_winner(program_id).await?;

        let mut columns: Vec<BoardColumn> = catalog
            .phases()
            .iter()
            .map(|phase| BoardColumn {
                phase: phase.clone(),
                cards: Vec::new(),
            })
            .collect();

        for entity in entities {
            let phase_id = assignments
                .iter()
                .find(|a| a.entity_id == entity.id)
                .map(|a| a.phase_id)
                .or_else(|| catalog.first().map(|p| p.id));
            let Some(column) = columns.iter_mut().find(|c| Some(c.phase.id) == phase_id) else {
                continue;
            };
            let is_winner = winner.as_ref().is_some_and(|w| w.entity_id == entity.id);
            column.cards.push(BoardCard { entity, is_winner });
        }

        Ok(Board {
            program_id,
            winner,
            columns,
        })
    }

    fn authorize_winner(&self, role: ActorRole) -> Result<()> {
        if role.can_declare_winner() {
            Ok(())
        } else {
            metrics::winner_declarations().add(1, &[KeyValue::new("result", "forbidden")]);
            Err(Error::Forbidden(format!("role {role} may not select a winner")))
        }
    }

    /// Fail early, before the move, if the declaration could not succeed.
    async fn check_winner_move(
        &self,
        program_id: ProgramId,
        entity_id: EntityId,
        target: PhaseId,
    ) -> Result<()> {
        let catalog = self.tracker.membership(entity_id, program_id).await?;
        let phase = catalog.get(target).map_err(|_| Error::InvalidPhase {
            program: program_id.to_string(),
            phase: target.to_string(),
        })?;
        if !catalog.is_terminal(target)? {
            return Err(Error::NotInTerminalPhase {
                program: program_id.to_string(),
                entity: entity_id.to_string(),
            });
        }
        if !phase.has_winner {
            return Err(Error::PhaseNotWinnerEligible(phase.name.clone()));
        }
        match self.store.get_winner(program_id).await? {
            Some(existing) if existing.entity_id != entity_id => Err(Error::WinnerAlreadyDeclared {
                program: program_id.to_string(),
                entity: existing.entity_id.to_string(),
            }),
            _ => Ok(()),
        }
    }

    async fn view_of(&self, program_id: ProgramId, phase_id: PhaseId) -> Result<PhaseView> {
        let phase = self.get_phase(program_id, phase_id).await?;
        Ok(PhaseView::from(&phase))
    }
}

fn record_duration(operation: &'static str, started: Instant) {
    metrics::operation_duration_ms().record(
        started.elapsed().as_secs_f64() * 1000.0,
        &[KeyValue::new("operation", operation)],
    );
}
