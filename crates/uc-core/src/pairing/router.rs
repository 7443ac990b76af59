//! Fencing and idempotence filter in front of a pairing state machine.
//!
//! The router owns the [`SessionRegistry`]. Consumers hand it a closure that
//! applies a validated event to their state machine; the router guarantees
//! the order registration → forward → teardown within one call, so two
//! events routed back to back always observe each other's registry effects.

use tracing::debug;

use crate::pairing::dedup::DedupKey;
use crate::pairing::event::{VerificationEvent, VerificationKind};
use crate::pairing::registry::SessionRegistry;
use crate::pairing::state::PairingRole;

/// Why an event was dropped. Dropping is silent recovery, not an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiscardReason {
    /// Event belongs to a session that is not the active one.
    StaleSession,
    /// Inbound request while another session is active.
    SessionBusy,
    /// Terminal event already delivered for this session.
    Duplicate,
    /// Inbound requests are not accepted by this router.
    InboundRequestsDisabled,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteOutcome<R> {
    Forwarded(R),
    Discarded(DiscardReason),
}

impl<R> RouteOutcome<R> {
    pub fn is_forwarded(&self) -> bool {
        matches!(self, Self::Forwarded(_))
    }

    pub fn forwarded(self) -> Option<R> {
        match self {
            Self::Forwarded(value) => Some(value),
            Self::Discarded(_) => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RouterPolicy {
    /// Register inbound `request` events as new responder sessions.
    pub accept_inbound_requests: bool,
}

impl Default for RouterPolicy {
    fn default() -> Self {
        Self {
            accept_inbound_requests: true,
        }
    }
}

#[derive(Debug, Default)]
pub struct EventRouter {
    registry: SessionRegistry,
    policy: RouterPolicy,
}

impl EventRouter {
    pub fn new(policy: RouterPolicy) -> Self {
        Self {
            registry: SessionRegistry::new(),
            policy,
        }
    }

    pub fn registry(&self) -> &SessionRegistry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut SessionRegistry {
        &mut self.registry
    }

    /// Validate `event` and hand it to `consume`.
    ///
    /// `consume` receives the registry so that the state machine can tear the
    /// session down itself (user reject, local mismatch). For terminal kinds
    /// the registry is cleared after `consume` returns.
    pub fn on_event<R, F>(&mut self, event: VerificationEvent, consume: F) -> RouteOutcome<R>
    where
        F: FnOnce(&mut SessionRegistry, VerificationEvent) -> R,
    {
        match event.kind {
            VerificationKind::Request => {
                if !self.registry.has_active() {
                    if !self.policy.accept_inbound_requests {
                        return self.discard(&event, DiscardReason::InboundRequestsDisabled);
                    }
                    if self
                        .registry
                        .set_active(event.session_id.clone(), PairingRole::Responder)
                        .is_err()
                    {
                        return self.discard(&event, DiscardReason::SessionBusy);
                    }
                    RouteOutcome::Forwarded(consume(&mut self.registry, event))
                } else if self.registry.is_active(&event.session_id) {
                    RouteOutcome::Forwarded(consume(&mut self.registry, event))
                } else {
                    self.discard(&event, DiscardReason::SessionBusy)
                }
            }
            VerificationKind::Verification | VerificationKind::Verifying => {
                if self.registry.is_active(&event.session_id) {
                    RouteOutcome::Forwarded(consume(&mut self.registry, event))
                } else {
                    self.discard(&event, DiscardReason::StaleSession)
                }
            }
            VerificationKind::Complete | VerificationKind::Failed => {
                if !self.registry.is_active(&event.session_id) {
                    return self.discard(&event, DiscardReason::StaleSession);
                }
                let Some(key) = DedupKey::from_event(&event) else {
                    return self.discard(&event, DiscardReason::StaleSession);
                };
                if !self.registry.mark_seen(key) {
                    return self.discard(&event, DiscardReason::Duplicate);
                }
                let result = consume(&mut self.registry, event);
                self.registry.clear();
                RouteOutcome::Forwarded(result)
            }
        }
    }

    fn discard<R>(&self, event: &VerificationEvent, reason: DiscardReason) -> RouteOutcome<R> {
        debug!(
            session_id = %event.session_id,
            kind = event.kind.as_str(),
            ?reason,
            active = ?self.registry.active_session(),
            "verification event discarded"
        );
        RouteOutcome::Discarded(reason)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::SessionId;

    fn route(router: &mut EventRouter, event: VerificationEvent) -> RouteOutcome<VerificationEvent> {
        router.on_event(event, |_, event| event)
    }

    #[test]
    fn request_while_idle_registers_responder_before_forwarding() {
        let mut router = EventRouter::default();
        let outcome = router.on_event(VerificationEvent::request("s3"), |registry, _| {
            registry.is_active(&SessionId::from("s3"))
        });
        assert_eq!(outcome, RouteOutcome::Forwarded(true));
        assert_eq!(router.registry().active_role(), Some(PairingRole::Responder));
    }

    #[test]
    fn verification_in_same_batch_as_request_is_forwarded() {
        let mut router = EventRouter::default();
        assert!(route(&mut router, VerificationEvent::request("s3")).is_forwarded());
        assert!(route(&mut router, VerificationEvent::verification("s3", "123456")).is_forwarded());
    }

    #[test]
    fn verification_for_unknown_session_is_discarded() {
        let mut router = EventRouter::default();
        assert_eq!(
            route(&mut router, VerificationEvent::verification("s9", "1")),
            RouteOutcome::Discarded(DiscardReason::StaleSession)
        );
        assert!(!router.registry().has_active());
    }

    #[test]
    fn request_while_busy_is_discarded() {
        let mut router = EventRouter::default();
        route(&mut router, VerificationEvent::request("s1"));
        assert_eq!(
            route(&mut router, VerificationEvent::request("s2")),
            RouteOutcome::Discarded(DiscardReason::SessionBusy)
        );
        assert!(router.registry().is_active(&SessionId::from("s1")));
    }

    #[test]
    fn redelivered_request_for_active_session_is_forwarded() {
        let mut router = EventRouter::default();
        route(&mut router, VerificationEvent::request("s1"));
        assert!(route(&mut router, VerificationEvent::request("s1")).is_forwarded());
    }

    #[test]
    fn terminal_event_is_forwarded_once_then_session_is_cleared() {
        let mut router = EventRouter::default();
        route(&mut router, VerificationEvent::request("s1"));

        let mut consumed_while_active = false;
        let outcome = router.on_event(VerificationEvent::complete("s1"), |registry, _| {
            consumed_while_active = registry.is_active(&SessionId::from("s1"));
        });
        assert!(outcome.is_forwarded());
        assert!(consumed_while_active);
        assert!(!router.registry().has_active());

        assert_eq!(
            route(&mut router, VerificationEvent::complete("s1")),
            RouteOutcome::Discarded(DiscardReason::StaleSession)
        );
    }

    #[test]
    fn duplicate_terminal_event_is_discarded_while_session_active() {
        let mut router = EventRouter::default();
        route(&mut router, VerificationEvent::request("s1"));
        let key = DedupKey::from_event(&VerificationEvent::complete("s1")).unwrap();
        assert!(router.registry_mut().mark_seen(key));

        assert_eq!(
            route(&mut router, VerificationEvent::complete("s1")),
            RouteOutcome::Discarded(DiscardReason::Duplicate)
        );
        assert!(router.registry().has_active());
    }

    #[test]
    fn disabled_inbound_requests_are_discarded() {
        let mut router = EventRouter::new(RouterPolicy {
            accept_inbound_requests: false,
        });
        assert_eq!(
            route(&mut router, VerificationEvent::request("s1")),
            RouteOutcome::Discarded(DiscardReason::InboundRequestsDisabled)
        );
        assert!(!router.registry().has_active());
    }
}
