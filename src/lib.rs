//! CipherSwarm - distributed password-cracking orchestrator core.
//!
//! The server-side scheduling and lifecycle subsystem:
//! - Campaign / Attack / Task / Agent state machines
//! - Crack submission with cross-list propagation and sibling staleness
//! - Agent telemetry ingestion
//! - Per-pickup task assignment and priority preemption
//! - Campaign ETA estimation and lock-gated health checks

pub mod adapters;
pub mod controllers;
pub mod domain;
pub mod infrastructure;
pub mod services;
