//! Infrastructure adapters for the UniClipboard pairing ports.

pub mod codec;
pub mod network;
pub mod setup_events;
pub mod setup_status;
pub mod time;

pub use codec::NdjsonWriter;
pub use network::NdjsonCommandPort;
pub use setup_events::NdjsonSetupEventEmitter;
pub use setup_status::FileSetupStatusRepository;
pub use time::TokioTimer;
