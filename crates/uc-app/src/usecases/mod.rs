//! Business logic use cases

pub mod pairing;
pub mod setup;

pub use pairing::{CommandGateway, CoordinatorError, PairingCoordinator, PairingCoordinatorConfig};
pub use setup::{SetupOrchestrator, SetupOrchestratorError};
