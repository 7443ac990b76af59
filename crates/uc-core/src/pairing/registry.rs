//! Single active-session slot plus the seen set of terminal notifications.

use std::collections::HashSet;

use thiserror::Error;
use tracing::debug;

use crate::ids::SessionId;
use crate::pairing::dedup::DedupKey;
use crate::pairing::state::PairingRole;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("session {requested} conflicts with active session {active}")]
    SessionConflict {
        active: SessionId,
        requested: SessionId,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct ActiveSession {
    session_id: SessionId,
    role: PairingRole,
}

/// Owns the identity of the one session events may belong to.
#[derive(Debug, Default)]
pub struct SessionRegistry {
    active: Option<ActiveSession>,
    seen: HashSet<DedupKey>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `session_id` the active session and reset the seen set.
    ///
    /// Re-registering the already active id is a no-op.
    pub fn set_active(
        &mut self,
        session_id: SessionId,
        role: PairingRole,
    ) -> Result<(), RegistryError> {
        match &self.active {
            Some(active) if active.session_id == session_id => Ok(()),
            Some(active) => Err(RegistryError::SessionConflict {
                active: active.session_id.clone(),
                requested: session_id,
            }),
            None => {
                debug!(session_id = %session_id, ?role, "session registered");
                self.active = Some(ActiveSession { session_id, role });
                self.seen.clear();
                Ok(())
            }
        }
    }

    pub fn is_active(&self, session_id: &SessionId) -> bool {
        self.active
            .as_ref()
            .is_some_and(|active| &active.session_id == session_id)
    }

    pub fn has_active(&self) -> bool {
        self.active.is_some()
    }

    pub fn active_session(&self) -> Option<&SessionId> {
        self.active.as_ref().map(|active| &active.session_id)
    }

    pub fn active_role(&self) -> Option<PairingRole> {
        self.active.as_ref().map(|active| active.role)
    }

    /// Drop the active session and the seen set. Idempotent.
    pub fn clear(&mut self) {
        if let Some(active) = &self.active {
            debug!(session_id = %active.session_id, "session cleared");
        }
        self.active = None;
        self.seen.clear();
    }

    /// Record `key`; `false` if it had been seen already.
    pub fn mark_seen(&mut self, key: DedupKey) -> bool {
        self.seen.insert(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pairing::event::VerificationEvent;

    fn key(session: &str) -> DedupKey {
        DedupKey::from_event(&VerificationEvent::complete(session)).unwrap()
    }

    #[test]
    fn set_active_rejects_second_session() {
        let mut registry = SessionRegistry::new();
        registry
            .set_active(SessionId::from("s1"), PairingRole::Initiator)
            .unwrap();

        let err = registry
            .set_active(SessionId::from("s2"), PairingRole::Responder)
            .unwrap_err();
        assert_eq!(
            err,
            RegistryError::SessionConflict {
                active: SessionId::from("s1"),
                requested: SessionId::from("s2"),
            }
        );
        assert!(registry.is_active(&SessionId::from("s1")));
        assert!(!registry.is_active(&SessionId::from("s2")));
        assert_eq!(registry.active_role(), Some(PairingRole::Initiator));
    }

    #[test]
    fn set_active_same_session_is_noop_and_keeps_seen_set() {
        let mut registry = SessionRegistry::new();
        registry
            .set_active(SessionId::from("s1"), PairingRole::Responder)
            .unwrap();
        assert!(registry.mark_seen(key("s1")));

        registry
            .set_active(SessionId::from("s1"), PairingRole::Responder)
            .unwrap();
        assert!(!registry.mark_seen(key("s1")));
    }

    #[test]
    fn clear_is_idempotent_and_empties_seen_set() {
        let mut registry = SessionRegistry::new();
        registry
            .set_active(SessionId::from("s1"), PairingRole::Initiator)
            .unwrap();
        assert!(registry.mark_seen(key("s1")));

        registry.clear();
        registry.clear();
        assert!(!registry.has_active());
        assert!(registry.active_session().is_none());
        assert!(registry.mark_seen(key("s1")));
    }

    #[test]
    fn new_session_starts_with_empty_seen_set() {
        let mut registry = SessionRegistry::new();
        assert!(registry.mark_seen(key("s1")));
        registry
            .set_active(SessionId::from("s1"), PairingRole::Initiator)
            .unwrap();
        assert!(registry.mark_seen(key("s1")));
        assert!(!registry.mark_seen(key("s1")));
    }
}
