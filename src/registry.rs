//! Winner registry: at most one winner per program.
//!
//! The registry is the only place that decides who won. Views that need to
//! highlight the winner ask [`WinnerRegistry::get_winner`] or
//! [`WinnerRegistry::is_winner`] instead of scanning entity statuses.

use std::sync::Arc;

use chrono::Utc;
use opentelemetry::KeyValue;
use tracing::{Instrument, info, warn};

use crate::catalog;
use crate::error::{Error, Result};
use crate::event::{EventBus, EventKind};
use crate::model::*;
use crate::store::{Store, WinnerInsert};
use crate::telemetry::metrics;
use crate::telemetry::phase::start_transition_span;
use crate::tracker::resolve_current;

#[derive(Clone)]
pub struct WinnerRegistry {
    store: Arc<dyn Store>,
    events: EventBus,
}

impl WinnerRegistry {
    pub fn new(store: Arc<dyn Store>, events: EventBus) -> Self {
        Self { store, events }
    }

    /// Declare `entity_id` the winner of `program_id`.
    ///
    /// Repeating the call for the same entity returns the stored record.
    /// Any other entity must first pass the final-phase checks; only then
    /// does a standing winner yield [`Error::WinnerAlreadyDeclared`], and
    /// the stored record is left untouched.
    pub async fn declare_winner(
        &self,
        program_id: ProgramId,
        entity_id: EntityId,
    ) -> Result<WinnerRecord> {
        let span = start_transition_span("declare_winner", program_id, entity_id);
        async {
            let catalog = catalog::load(self.store.as_ref(), program_id).await?;
            match self.store.get_entity(entity_id).await? {
                Some(entity) if entity.program_id == program_id => {}
                _ => {
                    return Err(Error::NotFound(format!(
                        "entity {entity_id} in program {program_id}"
                    )));
                }
            }

            let existing = self.store.get_winner(program_id).await?;
            if let Some(existing) = existing.as_ref().filter(|w| w.entity_id == entity_id) {
                count("existing");
                return Ok(existing.clone());
            }

            let assignment = self.store.get_assignment(entity_id, program_id).await?;
            let current = resolve_current(&catalog, assignment.as_ref())?;
            let terminal = catalog
                .terminal()
                .ok_or_else(|| Error::NotFound(format!("phases of program {program_id}")))?;

            if current.id != terminal.id {
                count("rejected");
                return Err(Error::NotInTerminalPhase {
                    program: program_id.to_string(),
                    entity: entity_id.to_string(),
                });
            }
            if !terminal.has_winner {
                count("rejected");
                return Err(Error::PhaseNotWinnerEligible(terminal.name.clone()));
            }
            if let Some(existing) = existing {
                return settle_existing(existing, entity_id);
            }

            let record = WinnerRecord {
                program_id,
                entity_id,
                phase_id: terminal.id,
                declared_at: Utc::now(),
            };
            let unassigned_in_phase = catalog.first().is_some_and(|f| f.id == terminal.id);

            match self.store.insert_winner(&record, unassigned_in_phase).await? {
                WinnerInsert::Declared(record) => {
                    info!(%program_id, %entity_id, phase = %terminal.name, "winner declared");
                    count("declared");
                    self.events.publish(
                        program_id,
                        EventKind::WinnerDeclared {
                            entity_id,
                            phase_id: record.phase_id,
                        },
                    );
                    Ok(record)
                }
                WinnerInsert::Existing(existing) => settle_existing(existing, entity_id),
                WinnerInsert::PhaseMoved => {
                    warn!(%program_id, %entity_id, "entity left the final phase during declaration");
                    count("rejected");
                    Err(Error::NotInTerminalPhase {
                        program: program_id.to_string(),
                        entity: entity_id.to_string(),
                    })
                }
            }
        }
        .instrument(span.clone())
        .await
    }

    pub async fn get_winner(&self, program_id: ProgramId) -> Result<Option<WinnerRecord>> {
        if self.store.get_program(program_id).await?.is_none() {
            return Err(Error::NotFound(format!("program {program_id}")));
        }
        self.store.get_winner(program_id).await
    }

    pub async fn is_winner(&self, program_id: ProgramId, entity_id: EntityId) -> Result<bool> {
        Ok(self
            .get_winner(program_id)
            .await?
            .is_some_and(|w| w.entity_id == entity_id))
    }
}

fn settle_existing(existing: WinnerRecord, entity_id: EntityId) -> Result<WinnerRecord> {
    if existing.entity_id == entity_id {
        count("existing");
        Ok(existing)
    } else {
        count("conflict");
        Err(Error::WinnerAlreadyDeclared {
            program: existing.program_id.to_string(),
            entity: existing.entity_id.to_string(),
        })
    }
}

fn count(result: &'static str) {
    metrics::winner_declarations().add(1, &[KeyValue::new("result", result)]);
}
