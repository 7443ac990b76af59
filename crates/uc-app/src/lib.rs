//! UniClipboard Application Orchestration Layer
//!
//! Use cases driving device pairing: the serialized pairing coordinator and
//! the first-run setup orchestrator.

pub mod usecases;

pub use usecases::{PairingCoordinator, PairingCoordinatorConfig, SetupOrchestrator};
