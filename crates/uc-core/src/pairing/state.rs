use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::{PeerId, SessionId};
use crate::pairing::error::PairingError;

/// Which side of the handshake this device plays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PairingRole {
    /// Started pairing by selecting a discovered peer.
    Initiator,
    /// Received an inbound request.
    Responder,
}

/// Pairing progress.
///
/// ```text
/// Initiator:
///   Idle ── selectPeer ──► RequestSent ─┐
///                                       │ verification / verifying
/// Responder:                            ▼
///   Idle ── request ──► RequestReceived ──► PinDisplay
///                        │ (accept: stays)    │ confirmPin(true)    │ confirmPin(false)
///                        │ reject ─► Idle     ▼                     ▼
///                                         PinVerifying            Failed ──(auto)──► Idle
///                                          ├── complete ──► Complete ──(auto)──► Idle
///                                          └── failed ────► Failed ────(auto)──► Idle
///
/// Any non-terminal phase ── cancel ──► Idle
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PairingPhase {
    Idle,
    RequestSent,
    RequestReceived,
    PinDisplay,
    PinVerifying,
    Complete,
    Failed,
    Cancelled,
}

impl PairingPhase {
    /// Phases that end a session.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Complete | Self::Failed | Self::Cancelled)
    }

    /// Phases of a session that is still in progress.
    pub fn is_active(self) -> bool {
        matches!(
            self,
            Self::RequestSent | Self::RequestReceived | Self::PinDisplay | Self::PinVerifying
        )
    }

    /// Phases in which a new session may be started. Terminal phases only
    /// remain on display until the auto-return fires.
    pub fn can_start_session(self) -> bool {
        self == Self::Idle || self.is_terminal()
    }
}

/// The single pairing attempt owned by the coordinator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PairingSession {
    /// `None` while an initiator's `initiate` call has not resolved yet.
    pub session_id: Option<SessionId>,
    pub role: PairingRole,
    pub peer_id: PeerId,
    pub peer_device_name: Option<String>,
    pub phase: PairingPhase,
    pub pin_code: Option<String>,
    pub local_fingerprint: Option<String>,
    pub peer_fingerprint: Option<String>,
    pub error: Option<PairingError>,
    /// Responder has accepted and waits for its verification event.
    pub accepted: bool,
    pub created_at: DateTime<Utc>,
}

impl PairingSession {
    pub fn initiator(peer_id: PeerId, peer_device_name: Option<String>, now: DateTime<Utc>) -> Self {
        Self {
            session_id: None,
            role: PairingRole::Initiator,
            peer_id,
            peer_device_name,
            phase: PairingPhase::RequestSent,
            pin_code: None,
            local_fingerprint: None,
            peer_fingerprint: None,
            error: None,
            accepted: false,
            created_at: now,
        }
    }

    pub fn responder(
        session_id: SessionId,
        peer_id: PeerId,
        peer_device_name: Option<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            session_id: Some(session_id),
            role: PairingRole::Responder,
            peer_id,
            peer_device_name,
            phase: PairingPhase::RequestReceived,
            pin_code: None,
            local_fingerprint: None,
            peer_fingerprint: None,
            error: None,
            accepted: false,
            created_at: now,
        }
    }

    pub fn is_initiator(&self) -> bool {
        self.role == PairingRole::Initiator
    }

    /// Whether `session_id` names this session.
    pub fn is_session(&self, session_id: &SessionId) -> bool {
        self.session_id.as_ref() == Some(session_id)
    }

    /// Name to show for the peer: its device name, else its id.
    pub fn display_name(&self) -> &str {
        self.peer_device_name
            .as_deref()
            .filter(|name| !name.is_empty())
            .unwrap_or_else(|| self.peer_id.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_and_active_are_disjoint() {
        let all = [
            PairingPhase::Idle,
            PairingPhase::RequestSent,
            PairingPhase::RequestReceived,
            PairingPhase::PinDisplay,
            PairingPhase::PinVerifying,
            PairingPhase::Complete,
            PairingPhase::Failed,
            PairingPhase::Cancelled,
        ];
        for phase in all {
            assert!(!(phase.is_terminal() && phase.is_active()), "{phase:?}");
        }
        assert!(!PairingPhase::Idle.is_active());
        assert!(!PairingPhase::Idle.is_terminal());
    }

    #[test]
    fn new_sessions_only_start_from_idle_or_terminal() {
        assert!(PairingPhase::Idle.can_start_session());
        assert!(PairingPhase::Complete.can_start_session());
        assert!(PairingPhase::Failed.can_start_session());
        assert!(!PairingPhase::PinDisplay.can_start_session());
        assert!(!PairingPhase::RequestSent.can_start_session());
    }

    #[test]
    fn display_name_falls_back_to_peer_id() {
        let mut session = PairingSession::initiator(PeerId::from("peer-9"), None, Utc::now());
        assert_eq!(session.display_name(), "peer-9");
        session.peer_device_name = Some("Laptop".to_string());
        assert_eq!(session.display_name(), "Laptop");
        session.peer_device_name = Some(String::new());
        assert_eq!(session.display_name(), "peer-9");
    }
}
