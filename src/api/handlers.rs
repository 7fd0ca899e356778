//! Request handlers.
//!
//! Every mutating handler answers with the fresh authoritative state so
//! clients can apply it directly instead of re-polling.

use std::convert::Infallible;
use std::time::Duration;

use axum::{
    Json,
    extract::{FromRequestParts, State},
    http::{StatusCode, request::Parts},
    response::sse::{Event, KeepAlive, Sse},
};
use futures_util::stream::{self, Stream};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast::error::RecvError;
use tracing::warn;
use uuid::Uuid;

use super::error::{ApiError, ApiResult};
use super::extract::{ApiJson, ApiPath};
use super::state::AppState;
use crate::model::*;
use crate::orchestrator::{Board, MoveOutcome, ProgramDetail};

/// Header carrying the caller's role.
pub const ROLE_HEADER: &str = "x-actor-role";

/// Role of the caller, taken from the `x-actor-role` header.
#[derive(Debug, Clone, Copy)]
pub struct Actor(pub ActorRole);

#[axum::async_trait]
impl<S> FromRequestParts<S> for Actor
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let raw = parts
            .headers
            .get(ROLE_HEADER)
            .ok_or_else(|| ApiError::BadRequest(format!("missing {ROLE_HEADER} header")))?
            .to_str()
            .map_err(|_| ApiError::BadRequest(format!("{ROLE_HEADER} is not valid text")))?;
        let role = raw
            .parse()
            .map_err(|e: crate::error::Error| ApiError::BadRequest(e.to_string()))?;
        Ok(Actor(role))
    }
}

// ---------------------------------------------------------------------------
// Health
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: String,
    pub uptime_secs: i64,
}

pub async fn health_check(State(state): State<AppState>) -> ApiResult<Json<HealthResponse>> {
    state.orchestrator.store().health_check().await?;
    Ok(Json(HealthResponse {
        status: "ok",
        version: state.version.clone(),
        uptime_secs: (chrono::Utc::now() - state.started_at).num_seconds(),
    }))
}

// ---------------------------------------------------------------------------
// Programs
// ---------------------------------------------------------------------------

pub async fn list_programs(State(state): State<AppState>) -> ApiResult<Json<Vec<Program>>> {
    Ok(Json(state.orchestrator.list_programs().await?))
}

pub async fn create_program(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<NewProgram>,
) -> ApiResult<(StatusCode, Json<ProgramDetail>)> {
    let detail = state.orchestrator.create_program(request).await?;
    Ok((StatusCode::CREATED, Json(detail)))
}

pub async fn get_program(
    State(state): State<AppState>,
    ApiPath(program_id): ApiPath<Uuid>,
) -> ApiResult<Json<ProgramDetail>> {
    Ok(Json(
        state.orchestrator.get_program(ProgramId(program_id)).await?,
    ))
}

#[derive(Debug, Deserialize)]
pub struct ProgramStatusRequest {
    pub status: ProgramStatus,
}

pub async fn set_program_status(
    State(state): State<AppState>,
    ApiPath(program_id): ApiPath<Uuid>,
    ApiJson(request): ApiJson<ProgramStatusRequest>,
) -> ApiResult<Json<Program>> {
    let program = state
        .orchestrator
        .set_program_status(ProgramId(program_id), request.status)
        .await?;
    Ok(Json(program))
}

// ---------------------------------------------------------------------------
// Entities
// ---------------------------------------------------------------------------

pub async fn list_entities(
    State(state): State<AppState>,
    ApiPath(program_id): ApiPath<Uuid>,
) -> ApiResult<Json<Vec<Entity>>> {
    Ok(Json(
        state
            .orchestrator
            .list_entities(ProgramId(program_id))
            .await?,
    ))
}

#[derive(Debug, Deserialize)]
pub struct RegisterEntityRequest {
    pub kind: EntityKind,
    pub name: String,
}

pub async fn register_entity(
    State(state): State<AppState>,
    ApiPath(program_id): ApiPath<Uuid>,
    ApiJson(request): ApiJson<RegisterEntityRequest>,
) -> ApiResult<(StatusCode, Json<Entity>)> {
    let entity = state
        .orchestrator
        .register_entity(NewEntity::new(
            ProgramId(program_id),
            request.kind,
            request.name,
        ))
        .await?;
    Ok((StatusCode::CREATED, Json(entity)))
}

#[derive(Debug, Deserialize)]
pub struct EntityStatusRequest {
    pub status: EntityStatus,
}

pub async fn set_entity_status(
    State(state): State<AppState>,
    ApiPath((program_id, entity_id)): ApiPath<(Uuid, Uuid)>,
    ApiJson(request): ApiJson<EntityStatusRequest>,
) -> ApiResult<Json<Entity>> {
    let entity = state
        .orchestrator
        .set_entity_status(ProgramId(program_id), EntityId(entity_id), request.status)
        .await?;
    Ok(Json(entity))
}

// ---------------------------------------------------------------------------
// Phases
// ---------------------------------------------------------------------------

pub async fn list_phases(
    State(state): State<AppState>,
    ApiPath(program_id): ApiPath<Uuid>,
) -> ApiResult<Json<Vec<Phase>>> {
    Ok(Json(
        state.orchestrator.list_phases(ProgramId(program_id)).await?,
    ))
}

pub async fn get_phase(
    State(state): State<AppState>,
    ApiPath((program_id, phase_id)): ApiPath<(Uuid, Uuid)>,
) -> ApiResult<Json<Phase>> {
    let phase = state
        .orchestrator
        .get_phase(ProgramId(program_id), PhaseId(phase_id))
        .await?;
    Ok(Json(phase))
}

pub async fn get_entity_phase(
    State(state): State<AppState>,
    ApiPath((program_id, entity_id)): ApiPath<(Uuid, Uuid)>,
) -> ApiResult<Json<PhaseView>> {
    let view = state
        .orchestrator
        .current_phase(ProgramId(program_id), EntityId(entity_id))
        .await?;
    Ok(Json(view))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MoveRequest {
    pub target_phase_id: Uuid,
    #[serde(default)]
    pub select_winner: bool,
}

pub async fn move_entity(
    State(state): State<AppState>,
    Actor(role): Actor,
    ApiPath((program_id, entity_id)): ApiPath<(Uuid, Uuid)>,
    ApiJson(request): ApiJson<MoveRequest>,
) -> ApiResult<Json<MoveOutcome>> {
    let outcome = state
        .orchestrator
        .move_entity_to_phase(
            role,
            ProgramId(program_id),
            EntityId(entity_id),
            PhaseId(request.target_phase_id),
            request.select_winner,
        )
        .await?;
    Ok(Json(outcome))
}

pub async fn advance_entity(
    State(state): State<AppState>,
    Actor(role): Actor,
    ApiPath((program_id, entity_id)): ApiPath<(Uuid, Uuid)>,
) -> ApiResult<Json<PhaseView>> {
    let view = state
        .orchestrator
        .advance_entity(role, ProgramId(program_id), EntityId(entity_id))
        .await?;
    Ok(Json(view))
}

pub async fn retreat_entity(
    State(state): State<AppState>,
    Actor(role): Actor,
    ApiPath((program_id, entity_id)): ApiPath<(Uuid, Uuid)>,
) -> ApiResult<Json<PhaseView>> {
    let view = state
        .orchestrator
        .retreat_entity(role, ProgramId(program_id), EntityId(entity_id))
        .await?;
    Ok(Json(view))
}

// ---------------------------------------------------------------------------
// Winner
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeclareWinnerRequest {
    pub entity_id: Uuid,
}

pub async fn declare_winner(
    State(state): State<AppState>,
    Actor(role): Actor,
    ApiPath(program_id): ApiPath<Uuid>,
    ApiJson(request): ApiJson<DeclareWinnerRequest>,
) -> ApiResult<Json<WinnerRecord>> {
    let record = state
        .orchestrator
        .select_winner(role, ProgramId(program_id), EntityId(request.entity_id))
        .await?;
    Ok(Json(record))
}

pub async fn get_winner(
    State(state): State<AppState>,
    ApiPath(program_id): ApiPath<Uuid>,
) -> ApiResult<Json<WinnerRecord>> {
    let program_id = ProgramId(program_id);
    state
        .orchestrator
        .get_winner(program_id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("no winner declared for program {program_id}")))
}

// ---------------------------------------------------------------------------
// Board + events
// ---------------------------------------------------------------------------

pub async fn get_board(
    State(state): State<AppState>,
    ApiPath(program_id): ApiPath<Uuid>,
) -> ApiResult<Json<Board>> {
    Ok(Json(state.orchestrator.board(ProgramId(program_id)).await?))
}

/// Server-sent events for one program.
pub async fn stream_events(
    State(state): State<AppState>,
    ApiPath(program_id): ApiPath<Uuid>,
) -> ApiResult<Sse<impl Stream<Item = Result<Event, Infallible>>>> {
    let program_id = ProgramId(program_id);
    // Reject unknown programs up front rather than streaming silence.
    state.orchestrator.get_program(program_id).await?;
    let rx = state.orchestrator.events().subscribe();

    let stream = stream::unfold(rx, move |mut rx| async move {
        loop {
            match rx.recv().await {
                Ok(event) if event.program_id == program_id => {
                    let json = match serde_json::to_string(&event) {
                        Ok(json) => json,
                        Err(e) => {
                            warn!(seq = event.seq, error = %e, "dropping unserializable event");
                            continue;
                        }
                    };
                    let sse_event = Event::default().id(event.seq.to_string()).data(json);
                    return Some((Ok(sse_event), rx));
                }
                Ok(_) => continue,
                Err(RecvError::Lagged(_)) => {
                    // Client fell behind; tell it to re-fetch.
                    return Some((Ok(Event::default().comment("lagged")), rx));
                }
                Err(RecvError::Closed) => return None,
            }
        }
    });

    Ok(Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("ping"),
    ))
}
