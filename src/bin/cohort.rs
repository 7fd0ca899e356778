//! cohort CLI: operator interface to the phase and winner service.

use cohort_rs::api::{self, AppState};
use cohort_rs::config::Config;
use cohort_rs::config::secrets::ExposeSecret;
use cohort_rs::db::Db;
use cohort_rs::model::*;
use cohort_rs::orchestrator::Orchestrator;
use cohort_rs::seed::{LegacyFile, SeedFile};
use cohort_rs::store::{MemoryStore, Store};
use cohort_rs::telemetry::{TelemetryConfig, init_telemetry};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "cohort", about = "Accelerator program phases and winners")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the REST API
    Serve {
        /// Keep state in memory instead of Postgres (lost on exit)
        #[arg(long)]
        in_memory: bool,
        /// TOML program definitions to load at startup
        #[arg(long)]
        seed: Option<PathBuf>,
    },
    /// Program operations
    Program {
        #[command(subcommand)]
        action: ProgramAction,
    },
    /// Entity (team / individual) operations
    Entity {
        #[command(subcommand)]
        action: EntityAction,
    },
    /// Phase tracking
    Phase {
        #[command(subcommand)]
        action: PhaseAction,
    },
    /// Winner registry
    Winner {
        #[command(subcommand)]
        action: WinnerAction,
    },
    /// Print a program's kanban board
    Board { program: ProgramId },
    /// One-off migration of legacy name-based phase data
    Legacy {
        #[command(subcommand)]
        action: LegacyAction,
    },
}

#[derive(Subcommand)]
enum ProgramAction {
    /// Create programs from a TOML seed file
    Seed { file: PathBuf },
    /// List programs
    List,
    /// Show a program and its phases
    Show { id: ProgramId },
    /// Change a program's status (draft, active, completed)
    Status { id: ProgramId, status: ProgramStatus },
}

#[derive(Subcommand)]
enum EntityAction {
    /// Register a team or individual in a program
    Add {
        program: ProgramId,
        /// team | individual
        kind: EntityKind,
        name: String,
    },
    /// List a program's entities
    List { program: ProgramId },
    /// Flag an entity active or at_risk
    Status {
        program: ProgramId,
        entity: EntityId,
        status: EntityStatus,
    },
}

#[derive(Subcommand)]
enum PhaseAction {
    /// Show an entity's current phase
    Show { program: ProgramId, entity: EntityId },
    /// Place an entity in any phase
    Move {
        program: ProgramId,
        entity: EntityId,
        phase: PhaseId,
        #[arg(long, default_value = "admin")]
        role: ActorRole,
        /// Also declare the entity winner
        #[arg(long)]
        select_winner: bool,
    },
    /// Move an entity to the next phase
    Advance {
        program: ProgramId,
        entity: EntityId,
        #[arg(long, default_value = "admin")]
        role: ActorRole,
    },
    /// Move an entity to the previous phase
    Retreat {
        program: ProgramId,
        entity: EntityId,
        #[arg(long, default_value = "admin")]
        role: ActorRole,
    },
}

#[derive(Subcommand)]
enum WinnerAction {
    /// Declare the program winner
    Declare {
        program: ProgramId,
        entity: EntityId,
        #[arg(long, default_value = "admin")]
        role: ActorRole,
    },
    /// Show the program winner
    Show { program: ProgramId },
}

#[derive(Subcommand)]
enum LegacyAction {
    /// Assign phases from a TOML file of (program, entity, phase_name) rows
    Import { file: PathBuf },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    let config = Config::from_env()?;

    match cli.command {
        Command::Serve { in_memory, seed } => cmd_serve(config, in_memory, seed).await,
        command => {
            let orchestrator = Orchestrator::new(connect(&config).await?);
            run_command(&orchestrator, command).await
        }
    }
}

async fn connect(config: &Config) -> anyhow::Result<Arc<dyn Store>> {
    let db = Db::connect(config.require_database_url()?.expose_secret()).await?;
    db.migrate().await?;
    Ok(Arc::new(db))
}

async fn cmd_serve(config: Config, in_memory: bool, seed: Option<PathBuf>) -> anyhow::Result<()> {
    let _guard = init_telemetry(TelemetryConfig {
        endpoint: config.otel_endpoint.clone(),
        service_name: "cohort".to_string(),
        log_level: config.log_level.clone(),
    })?;

    let store: Arc<dyn Store> = if in_memory {
        tracing::warn!("using in-memory store; state is lost on exit");
        Arc::new(MemoryStore::new())
    } else {
        connect(&config).await?
    };
    let orchestrator = Orchestrator::new(store);

    if let Some(path) = seed {
        let seeded = SeedFile::from_path(&path)?.apply(&orchestrator).await?;
        tracing::info!(programs = seeded.len(), path = %path.display(), "seed loaded");
    }

    let shutdown = async {
        tokio::signal::ctrl_c().await.ok();
        tracing::info!("shutting down");
    };
    api::serve(config.bind_addr, AppState::new(orchestrator), shutdown).await?;
    Ok(())
}

async fn run_command(orch: &Orchestrator, command: Command) -> anyhow::Result<()> {
    match command {
        Command::Serve { .. } => anyhow::bail!("serve runs its own store"),
        Command::Program { action } => match action {
            ProgramAction::Seed { file } => {
                for seeded in SeedFile::from_path(&file)?.apply(orch).await? {
                    println!(
                        "Created: {} {} ({} phases, {} entities)",
                        seeded.detail.program.id,
                        seeded.detail.program.name,
                        seeded.detail.phases.len(),
                        seeded.entities.len()
                    );
                }
                Ok(())
            }
            ProgramAction::List => cmd_program_list(orch).await,
            ProgramAction::Show { id } => cmd_program_show(orch, id).await,
            ProgramAction::Status { id, status } => {
                let program = orch.set_program_status(id, status).await?;
                println!("{}: {}", program.name, program.status);
                Ok(())
            }
        },
        Command::Entity { action } => match action {
            EntityAction::Add {
                program,
                kind,
                name,
            } => {
                let entity = orch
                    .register_entity(NewEntity::new(program, kind, name))
                    .await?;
                println!("Registered: {} ({})", entity.id, entity.kind);
                Ok(())
            }
            EntityAction::List { program } => cmd_entity_list(orch, program).await,
            EntityAction::Status {
                program,
                entity,
                status,
            } => {
                let entity = orch.set_entity_status(program, entity, status).await?;
                println!("{}: {}", entity.name, entity.status);
                Ok(())
            }
        },
        Command::Phase { action } => {
            let view = match action {
                PhaseAction::Show { program, entity } => orch.current_phase(program, entity).await?,
                PhaseAction::Move {
                    program,
                    entity,
                    phase,
                    role,
                    select_winner,
                } => {
                    let outcome = orch
                        .move_entity_to_phase(role, program, entity, phase, select_winner)
                        .await?;
                    if let Some(winner) = outcome.winner {
                        println!("Winner: {} (declared {})", winner.entity_id, winner.declared_at);
                    }
                    outcome.phase
                }
                PhaseAction::Advance {
                    program,
                    entity,
                    role,
                } => orch.advance_entity(role, program, entity).await?,
                PhaseAction::Retreat {
                    program,
                    entity,
                    role,
                } => orch.retreat_entity(role, program, entity).await?,
            };
            println!("Phase: {} (ordinal {}, id {})", view.name, view.ordinal, view.phase_id);
            Ok(())
        }
        Command::Winner { action } => match action {
            WinnerAction::Declare {
                program,
                entity,
                role,
            } => {
                let record = orch.select_winner(role, program, entity).await?;
                println!("Winner: {} (declared {})", record.entity_id, record.declared_at);
                Ok(())
            }
            WinnerAction::Show { program } => {
                match orch.get_winner(program).await? {
                    Some(record) => {
                        println!("Winner: {} (declared {})", record.entity_id, record.declared_at)
                    }
                    None => println!("No winner declared."),
                }
                Ok(())
            }
        },
        Command::Board { program } => cmd_board(orch, program).await,
        Command::Legacy {
            action: LegacyAction::Import { file },
        } => {
            let report = LegacyFile::from_path(&file)?.apply(orch).await;
            for (row, view) in &report.resolved {
                println!("{}  {:<30} -> {}", row.entity, row.phase_name, view.name);
            }
            for (row, err) in &report.unresolved {
                println!("{}  {:<30} !! {err}", row.entity, row.phase_name);
            }
            println!(
                "\n{} imported, {} unresolved",
                report.resolved.len(),
                report.unresolved.len()
            );
            if !report.unresolved.is_empty() {
                anyhow::bail!("{} legacy rows need manual review", report.unresolved.len());
            }
            Ok(())
        }
    }
}

async fn cmd_program_list(orch: &Orchestrator) -> anyhow::Result<()> {
    let programs = orch.list_programs().await?;
    if programs.is_empty() {
        println!("No programs found.");
        return Ok(());
    }

    println!(
        "{:<36}  {:<30}  {:<10}  {:<10}  END",
        "ID", "NAME", "STATUS", "START"
    );
    println!("{}", "-".repeat(105));
    for program in &programs {
        println!(
            "{:<36}  {:<30}  {:<10}  {:<10}  {}",
            program.id,
            truncate(&program.name, 30),
            program.status,
            program.start_date,
            program.end_date
        );
    }
    println!("\n{} program(s)", programs.len());
    Ok(())
}

async fn cmd_program_show(orch: &Orchestrator, id: ProgramId) -> anyhow::Result<()> {
    let detail = orch.get_program(id).await?;
    let program = &detail.program;

    println!("ID:         {}", program.id);
    println!("Name:       {}", program.name);
    println!("Status:     {}", program.status);
    println!("Dates:      {} .. {}", program.start_date, program.end_date);
    println!("Created:    {}", program.created_at);
    println!("---");
    for phase in &detail.phases {
        let marker = if phase.has_winner { "  [winner]" } else { "" };
        println!("{:>3}  {}  {}{marker}", phase.ordinal, phase.id, phase.name);
    }
    if let Some(winner) = orch.get_winner(id).await? {
        println!("---");
        println!("Winner:     {} (declared {})", winner.entity_id, winner.declared_at);
    }
    Ok(())
}

async fn cmd_entity_list(orch: &Orchestrator, program: ProgramId) -> anyhow::Result<()> {
    let entities = orch.list_entities(program).await?;
    if entities.is_empty() {
        println!("No entities found.");
        return Ok(());
    }

    println!(
        "{:<36}  {:<10}  {:<30}  {:<9}  PROGRESS",
        "ID", "KIND", "NAME", "STATUS"
    );
    println!("{}", "-".repeat(100));
    for entity in &entities {
        println!(
            "{:<36}  {:<10}  {:<30}  {:<9}  {}%",
            entity.id,
            entity.kind,
            truncate(&entity.name, 30),
            entity.status,
            entity.progress
        );
    }
    println!("\n{} entities", entities.len());
    Ok(())
}

async fn cmd_board(orch: &Orchestrator, program: ProgramId) -> anyhow::Result<()> {
    let board = orch.board(program).await?;
    for column in &board.columns {
        println!(
            "== {} ({}) [{}]",
            column.phase.name,
            column.phase.ordinal,
            column.cards.len()
        );
        for card in &column.cards {
            let badge = if card.is_winner { "  *winner*" } else { "" };
            println!("   {}  {}{badge}", card.entity.id, card.entity.name);
        }
    }
    Ok(())
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() > max {
        s.chars().take(max).collect()
    } else {
        s.to_string()
    }
}
