//! Verification events produced by the peer-networking service.

use serde::{Deserialize, Serialize};

use crate::ids::{PeerId, SessionId};

/// Kind tag of an inbound verification event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VerificationKind {
    /// A remote peer asks to pair with this device.
    Request,
    /// A PIN (short code) is ready to be compared by the user.
    Verification,
    /// The remote side is verifying; carries the same payload as `Verification`.
    Verifying,
    /// The handshake finished successfully.
    Complete,
    /// The handshake failed; `error` carries the remote reason.
    Failed,
}

impl VerificationKind {
    /// `complete` and `failed` end a session.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Complete | Self::Failed)
    }

    /// `verification` and `verifying` both carry the PIN payload.
    pub fn carries_pin(self) -> bool {
        matches!(self, Self::Verification | Self::Verifying)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Request => "request",
            Self::Verification => "verification",
            Self::Verifying => "verifying",
            Self::Complete => "complete",
            Self::Failed => "failed",
        }
    }
}

/// One inbound notification from the peer-networking service.
///
/// All kinds share one shape; which optional fields are present depends on
/// the kind. Events are immutable once received.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerificationEvent {
    pub session_id: SessionId,
    pub kind: VerificationKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub peer_id: Option<PeerId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub local_fingerprint: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub peer_fingerprint: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Emission time in unix milliseconds, when the service provides one.
    /// Part of the dedup key of terminal events.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<i64>,
}

impl VerificationEvent {
    /// Bare event of the given kind; optional fields are filled with the
    /// `with_*` builders.
    pub fn new(session_id: impl Into<SessionId>, kind: VerificationKind) -> Self {
        Self {
            session_id: session_id.into(),
            kind,
            peer_id: None,
            device_name: None,
            code: None,
            local_fingerprint: None,
            peer_fingerprint: None,
            error: None,
            timestamp: None,
        }
    }

    pub fn request(session_id: impl Into<SessionId>) -> Self {
        Self::new(session_id, VerificationKind::Request)
    }

    pub fn verification(session_id: impl Into<SessionId>, code: impl Into<String>) -> Self {
        Self::new(session_id, VerificationKind::Verification).with_code(code)
    }

    pub fn complete(session_id: impl Into<SessionId>) -> Self {
        Self::new(session_id, VerificationKind::Complete)
    }

    pub fn failed(session_id: impl Into<SessionId>, error: impl Into<String>) -> Self {
        Self::new(session_id, VerificationKind::Failed).with_error(error)
    }

    pub fn with_peer_id(mut self, peer_id: impl Into<PeerId>) -> Self {
        self.peer_id = Some(peer_id.into());
        self
    }

    pub fn with_device_name(mut self, device_name: impl Into<String>) -> Self {
        self.device_name = Some(device_name.into());
        self
    }

    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }

    pub fn with_fingerprints(
        mut self,
        local_fingerprint: impl Into<String>,
        peer_fingerprint: impl Into<String>,
    ) -> Self {
        self.local_fingerprint = Some(local_fingerprint.into());
        self.peer_fingerprint = Some(peer_fingerprint.into());
        self
    }

    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }

    pub fn with_timestamp(mut self, timestamp: i64) -> Self {
        self.timestamp = Some(timestamp);
        self
    }
}
