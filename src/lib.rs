//! # cohort-rs
//!
//! Program phase progression and winner lifecycle for accelerator cohorts.
//!
//! Programs own an ordered phase catalog; teams and individual applicants
//! move through it (sequentially, or by direct kanban placement), and at
//! most one of them is declared the program's winner. State lives in a
//! server-owned store (Postgres via sqlx, or in memory) behind an axum
//! REST API, with OpenTelemetry observability.

pub mod api;
pub mod catalog;
pub mod config;
pub mod db;
pub mod error;
pub mod event;
pub mod model;
pub mod orchestrator;
pub mod registry;
pub mod seed;
pub mod store;
pub mod telemetry;
pub mod tracker;
