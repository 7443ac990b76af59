//! # uc-core
//!
//! Core domain models and business logic for UniClipboard device pairing.
//!
//! This crate contains pure business logic without any infrastructure
//! dependencies: session fencing, event routing, the pairing and setup state
//! machines, and the ports implemented by `uc-infra`.

pub mod config;
pub mod ids;
pub mod pairing;
pub mod ports;
pub mod setup;

// Re-export commonly used types at the crate root
pub use config::AppConfig;
pub use ids::{PeerId, SessionId};
pub use pairing::{
    PairingError, PairingErrorKind, PairingPhase, PairingRole, PairingSignal, PairingViewModel,
    UserAction, VerificationEvent, VerificationKind,
};
