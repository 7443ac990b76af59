//! Identity of terminal notifications, used to drop redeliveries.

use crate::ids::{PeerId, SessionId};
use crate::pairing::event::{VerificationEvent, VerificationKind};

/// Outcome part of a [`DedupKey`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DedupOutcome {
    Complete,
    Failed,
}

/// Composite `(session, peer, outcome, reason, timestamp)` key of a
/// `complete`/`failed` event.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DedupKey {
    pub session_id: SessionId,
    pub peer_id: Option<PeerId>,
    pub outcome: DedupOutcome,
    pub reason: Option<String>,
    pub timestamp: Option<i64>,
}

impl DedupKey {
    /// Key of a terminal event; `None` for every other kind.
    pub fn from_event(event: &VerificationEvent) -> Option<Self> {
        let outcome = match event.kind {
            VerificationKind::Complete => DedupOutcome::Complete,
            VerificationKind::Failed => DedupOutcome::Failed,
            _ => return None,
        };
        Some(Self {
            session_id: event.session_id.clone(),
            peer_id: event.peer_id.clone(),
            outcome,
            reason: event.error.clone(),
            timestamp: event.timestamp,
        })
    }
}
