//! Pairing failure taxonomy.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Why a pairing session ended unsuccessfully.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PairingErrorKind {
    /// Remote service reported a protocol timeout.
    NetworkTimeout,
    /// Remote peer could not be reached.
    PeerUnavailable,
    /// Remote user rejected the request.
    PairingRejected,
    /// Any other remote failure.
    PairingFailed,
    /// Local user reported that the PINs differ.
    PinMismatch,
    /// An outbound command to the peer-networking service failed.
    CommandDispatchError,
    /// A session was bound while another one was still active.
    SessionConflict,
}

impl PairingErrorKind {
    /// Classify a free-form reason reported by the remote service.
    ///
    /// Unknown reasons map to [`PairingErrorKind::PairingFailed`].
    pub fn from_remote_reason(reason: &str) -> Self {
        let reason = reason.to_ascii_lowercase();
        if reason.contains("timeout") || reason.contains("timed out") {
            Self::NetworkTimeout
        } else if reason.contains("reject") {
            Self::PairingRejected
        } else if reason.contains("unavailable")
            || reason.contains("unreachable")
            || reason.contains("offline")
            || reason.contains("not connected")
        {
            Self::PeerUnavailable
        } else if reason.contains("mismatch") {
            Self::PinMismatch
        } else {
            Self::PairingFailed
        }
    }

    fn default_message(self) -> &'static str {
        match self {
            Self::NetworkTimeout => "pairing timed out",
            Self::PeerUnavailable => "peer is unavailable",
            Self::PairingRejected => "pairing was rejected",
            Self::PairingFailed => "pairing failed",
            Self::PinMismatch => "PIN codes do not match",
            Self::CommandDispatchError => "pairing command could not be delivered",
            Self::SessionConflict => "another pairing session is already active",
        }
    }
}

/// A classified failure plus the message shown to the user.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("{kind:?}: {message}")]
pub struct PairingError {
    pub kind: PairingErrorKind,
    pub message: String,
}

impl PairingError {
    pub fn new(kind: PairingErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// Error with the kind's default message.
    pub fn of_kind(kind: PairingErrorKind) -> Self {
        Self::new(kind, kind.default_message())
    }

    /// Failure reported by a `failed` event. The reason is kept verbatim.
    pub fn remote(reason: Option<&str>) -> Self {
        match reason {
            Some(reason) if !reason.is_empty() => {
                Self::new(PairingErrorKind::from_remote_reason(reason), reason)
            }
            _ => Self::of_kind(PairingErrorKind::PairingFailed),
        }
    }

    pub fn command_dispatch(message: impl Into<String>) -> Self {
        Self::new(PairingErrorKind::CommandDispatchError, message)
    }
}
