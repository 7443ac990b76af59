//! ID type wrappers for type safety.

pub mod peer_id;
pub mod session_id;

pub use peer_id::PeerId;
pub use session_id::SessionId;
