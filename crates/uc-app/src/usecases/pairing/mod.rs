//! Pairing use cases.

pub mod command_gateway;
pub mod config;
pub mod coordinator;

pub use command_gateway::CommandGateway;
pub use config::PairingCoordinatorConfig;
pub use coordinator::{CoordinatorError, PairingCoordinator};
