//! Pairing session coordination: fencing, dedup, the session state machine
//! and the view-model projection.

pub mod dedup;
pub mod error;
pub mod event;
pub mod registry;
pub mod router;
pub mod state;
pub mod state_machine;
pub mod view_model;

pub use dedup::{DedupKey, DedupOutcome};
pub use error::{PairingError, PairingErrorKind};
pub use event::{VerificationEvent, VerificationKind};
pub use registry::{RegistryError, SessionRegistry};
pub use router::{DiscardReason, EventRouter, RouteOutcome, RouterPolicy};
pub use state::{PairingPhase, PairingRole, PairingSession};
pub use state_machine::{
    PairingAction, PairingCommand, PairingInput, PairingPolicy, PairingSignal,
    PairingStateMachine, TimerKind, UserAction,
};
pub use view_model::{project, DialogKind, PairingViewModel};
