//! Setup use cases.
//!
//! This module exposes the first-run setup orchestrator.

pub mod orchestrator;

pub use orchestrator::{SetupOrchestrator, SetupOrchestratorError};
