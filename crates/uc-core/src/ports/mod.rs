//! Port interfaces for the application layer
//!
//! Ports define the contract between the use cases in `uc-app` and the
//! adapters in `uc-infra`. Only capabilities implemented outside the domain
//! live here.

mod pairing_command;
mod setup_event_port;
mod setup_status;
mod timer;

pub use pairing_command::{InitiatePairingResponse, PairingCommandPort, VerifyPinRequest};
pub use setup_event_port::SetupEventPort;
pub use setup_status::SetupStatusPort;
pub use timer::{TimerPort, TimerTask};
