use serde::{Deserialize, Serialize};

use crate::pairing::state::{PairingPhase, PairingSession};

/// Which dialog the presentation layer should show.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DialogKind {
    #[default]
    None,
    /// Initiator waiting for the peer to respond.
    Requesting,
    /// Responder accept/reject prompt.
    IncomingRequest,
    Pin,
    Verifying,
    Success,
    Failed,
}

/// Presentation-ready snapshot of the pairing session.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PairingViewModel {
    pub dialog_open: bool,
    pub dialog_kind: DialogKind,
    pub pin_code: Option<String>,
    pub peer_name: Option<String>,
    pub is_initiator: bool,
    pub busy: bool,
    pub error_message: Option<String>,
}

impl PairingViewModel {
    pub fn idle() -> Self {
        Self::default()
    }
}

/// Project the current session into a view model.
///
/// Pure and deterministic. `phase` wins over `session.phase` so callers can
/// project hypothetical phases.
pub fn project(session: Option<&PairingSession>, phase: PairingPhase) -> PairingViewModel {
    let Some(session) = session else {
        return PairingViewModel::idle();
    };

    let dialog_kind = match phase {
        PairingPhase::Idle | PairingPhase::Cancelled => return PairingViewModel::idle(),
        PairingPhase::RequestSent => DialogKind::Requesting,
        PairingPhase::RequestReceived => DialogKind::IncomingRequest,
        PairingPhase::PinDisplay => DialogKind::Pin,
        PairingPhase::PinVerifying => DialogKind::Verifying,
        PairingPhase::Complete => DialogKind::Success,
        PairingPhase::Failed => DialogKind::Failed,
    };

    let busy = match phase {
        PairingPhase::RequestSent | PairingPhase::PinVerifying => true,
        PairingPhase::RequestReceived => session.accepted,
        _ => false,
    };

    let pin_code = match phase {
        PairingPhase::PinDisplay | PairingPhase::PinVerifying => session.pin_code.clone(),
        _ => None,
    };

    let error_message = match phase {
        PairingPhase::Failed => session.error.as_ref().map(|error| error.message.clone()),
        _ => None,
    };

    let peer_name = session.display_name();
    PairingViewModel {
        dialog_open: true,
        dialog_kind,
        pin_code,
        peer_name: (!peer_name.is_empty()).then(|| peer_name.to_string()),
        is_initiator: session.is_initiator(),
        busy,
        error_message,
    }
}
