//! Setup domain module.
//!
//! First-run flow: either create a fresh space or join one by pairing with
//! an existing device.

pub mod state_machine;
pub mod status;

pub use state_machine::{SetupAction, SetupError, SetupEvent, SetupState, SetupStateMachine};
pub use status::SetupStatus;
