//! Line-oriented console driving the use cases.
//!
//! Input is NDJSON on a reader, output is NDJSON through the shared
//! [`uc_infra::NdjsonWriter`], so outbound commands, view-model snapshots
//! and setup states land on one ordered stream.

mod pairing;
mod protocol;
mod setup;

pub use pairing::run_pairing_console;
pub use protocol::{ConsoleOutput, PairingConsoleInput, SetupConsoleInput};
pub use setup::run_setup_console;
