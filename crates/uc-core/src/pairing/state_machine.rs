//! Pairing session state machine
//!
//! Pure transition core of the coordinator: `(state, input) -> actions`.
//! Side effects (outbound commands, timers, notifications) are returned as
//! [`PairingAction`]s and executed by the application layer.
//!
//! # Design Principles
//!
//! - **Never raises**: every input yields a (possibly empty) action list;
//!   inputs that do not apply to the current phase are ignored.
//! - **Exactly-once terminals**: `Complete`/`Failed` are entered only from an
//!   active phase, so each session emits at most one [`PairingSignal`].
//! - **Explicit role**: the role is stored on [`PairingSession`], never
//!   derived from the phase.
//! - **Epoch-fenced timers**: timers carry the epoch of the session that
//!   scheduled them; a timer from an older session is ignored.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::ids::{PeerId, SessionId};
use crate::pairing::error::{PairingError, PairingErrorKind};
use crate::pairing::event::{VerificationEvent, VerificationKind};
use crate::pairing::registry::SessionRegistry;
use crate::pairing::state::{PairingPhase, PairingRole, PairingSession};
use crate::pairing::view_model::{project, PairingViewModel};

/// Decisions taken by the local user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum UserAction {
    #[serde(rename_all = "camelCase")]
    SelectPeer {
        peer_id: PeerId,
        #[serde(default)]
        device_name: Option<String>,
    },
    Accept,
    Reject,
    ConfirmPin { matches: bool },
    Cancel,
}

impl UserAction {
    pub fn select_peer(peer_id: impl Into<PeerId>) -> Self {
        Self::SelectPeer {
            peer_id: peer_id.into(),
            device_name: None,
        }
    }
}

/// Outbound command names, used to tag command failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PairingCommand {
    Initiate,
    Accept,
    Reject,
    VerifyPin,
    Cancel,
}

/// Scheduled self-transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TimerKind {
    /// Leave `Complete` for `Idle`.
    SuccessDisplay,
    /// Leave `Failed` for `Idle`.
    FailureDisplay,
    /// Optional local fallback while waiting in `PinVerifying`.
    VerificationWatchdog,
}

/// Everything the state machine consumes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PairingInput {
    User(UserAction),
    /// An event already validated by the router.
    Event(VerificationEvent),
    /// `initiate` resolved with the service-issued session id.
    SessionBound { session_id: SessionId },
    /// An outbound command failed.
    CommandFailed {
        session_id: Option<SessionId>,
        command: PairingCommand,
        error: PairingError,
    },
    TimerElapsed { epoch: u64, kind: TimerKind },
}

impl PairingInput {
    fn name(&self) -> String {
        match self {
            Self::User(action) => format!("user:{action:?}"),
            Self::Event(event) => format!("event:{}", event.kind.as_str()),
            Self::SessionBound { .. } => "session_bound".to_string(),
            Self::CommandFailed { command, .. } => format!("command_failed:{command:?}"),
            Self::TimerElapsed { kind, .. } => format!("timer:{kind:?}"),
        }
    }
}

/// Notifications emitted once per terminal transition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum PairingSignal {
    #[serde(rename_all = "camelCase")]
    Succeeded {
        session_id: Option<SessionId>,
        peer_id: PeerId,
        peer_device_name: Option<String>,
    },
    #[serde(rename_all = "camelCase")]
    Failed {
        session_id: Option<SessionId>,
        error: PairingError,
    },
}

/// Side effects requested by a transition, executed in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PairingAction {
    Initiate {
        peer_id: PeerId,
    },
    Accept {
        session_id: SessionId,
    },
    Reject {
        session_id: SessionId,
        peer_id: PeerId,
    },
    VerifyPin {
        session_id: SessionId,
        matches: bool,
    },
    Cancel {
        session_id: SessionId,
    },
    StartTimer {
        epoch: u64,
        kind: TimerKind,
    },
    CancelTimers,
    Emit(PairingSignal),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PairingPolicy {
    /// Arm [`TimerKind::VerificationWatchdog`] on entering `PinVerifying`.
    pub verification_watchdog: bool,
}

#[derive(Debug, Default)]
pub struct PairingStateMachine {
    session: Option<PairingSession>,
    epoch: u64,
    policy: PairingPolicy,
}

impl PairingStateMachine {
    pub fn new(policy: PairingPolicy) -> Self {
        Self {
            session: None,
            epoch: 0,
            policy,
        }
    }

    pub fn phase(&self) -> PairingPhase {
        self.session
            .as_ref()
            .map_or(PairingPhase::Idle, |session| session.phase)
    }

    pub fn session(&self) -> Option<&PairingSession> {
        self.session.as_ref()
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn view_model(&self) -> PairingViewModel {
        project(self.session.as_ref(), self.phase())
    }

    /// Apply one input and return the side effects to execute.
    pub fn handle(
        &mut self,
        registry: &mut SessionRegistry,
        input: PairingInput,
        now: DateTime<Utc>,
    ) -> Vec<PairingAction> {
        let from = self.phase();
        let input_name = input.name();

        let actions = match input {
            PairingInput::User(action) => self.on_user_action(registry, action, now),
            PairingInput::Event(event) => self.on_event(registry, event, now),
            PairingInput::SessionBound { session_id } => {
                self.on_session_bound(registry, session_id)
            }
            PairingInput::CommandFailed {
                session_id,
                command,
                error,
            } => self.on_command_failed(registry, session_id, command, error),
            PairingInput::TimerElapsed { epoch, kind } => self.on_timer(registry, epoch, kind),
        };

        let to = self.phase();
        if from != to || !actions.is_empty() {
            let session_id = self
                .session
                .as_ref()
                .and_then(|session| session.session_id.as_ref());
            info!(
                from = ?from,
                to = ?to,
                input = %input_name,
                session_id = ?session_id,
                epoch = self.epoch,
                "pairing state transition"
            );
        } else {
            debug!(phase = ?from, input = %input_name, "pairing input ignored");
        }

        actions
    }

    // =========================================================
    // User decisions
    // =========================================================

    fn on_user_action(
        &mut self,
        registry: &mut SessionRegistry,
        action: UserAction,
        now: DateTime<Utc>,
    ) -> Vec<PairingAction> {
        match action {
            UserAction::SelectPeer {
                peer_id,
                device_name,
            } => {
                if !self.phase().can_start_session() || registry.has_active() {
                    warn!(
                        peer_id = %peer_id,
                        phase = ?self.phase(),
                        "select peer ignored: a pairing session is in progress"
                    );
                    return Vec::new();
                }
                let mut actions = self.supersede();
                self.epoch += 1;
                self.session = Some(PairingSession::initiator(peer_id.clone(), device_name, now));
                actions.push(PairingAction::Initiate { peer_id });
                actions
            }
            UserAction::Accept => {
                let Some(session) = self.session.as_mut() else {
                    return Vec::new();
                };
                if session.phase != PairingPhase::RequestReceived || session.accepted {
                    return Vec::new();
                }
                let Some(session_id) = session.session_id.clone() else {
                    return Vec::new();
                };
                session.accepted = true;
                vec![PairingAction::Accept { session_id }]
            }
            UserAction::Reject => {
                let Some(session) = self.session.as_ref() else {
                    return Vec::new();
                };
                if session.phase != PairingPhase::RequestReceived {
                    return Vec::new();
                }
                let Some(session_id) = session.session_id.clone() else {
                    return Vec::new();
                };
                let peer_id = session.peer_id.clone();
                self.teardown(registry);
                vec![PairingAction::Reject {
                    session_id,
                    peer_id,
                }]
            }
            UserAction::ConfirmPin { matches } => {
                let Some(session) = self.session.as_mut() else {
                    return Vec::new();
                };
                if session.phase != PairingPhase::PinDisplay {
                    return Vec::new();
                }
                let Some(session_id) = session.session_id.clone() else {
                    return Vec::new();
                };
                let mut actions = vec![PairingAction::VerifyPin {
                    session_id,
                    matches,
                }];
                if matches {
                    session.phase = PairingPhase::PinVerifying;
                    if self.policy.verification_watchdog {
                        actions.push(PairingAction::StartTimer {
                            epoch: self.epoch,
                            kind: TimerKind::VerificationWatchdog,
                        });
                    }
                } else {
                    actions.extend(
                        self.fail(registry, PairingError::of_kind(PairingErrorKind::PinMismatch)),
                    );
                }
                actions
            }
            UserAction::Cancel => {
                let phase = self.phase();
                if phase.is_active() {
                    let session_id = self
                        .session
                        .as_ref()
                        .and_then(|session| session.session_id.clone());
                    if let Some(session) = self.session.as_mut() {
                        session.phase = PairingPhase::Cancelled;
                    }
                    self.teardown(registry);
                    let mut actions = vec![PairingAction::CancelTimers];
                    if let Some(session_id) = session_id {
                        actions.push(PairingAction::Cancel { session_id });
                    }
                    actions
                } else if phase.is_terminal() {
                    // Dismiss the result display early.
                    self.session = None;
                    vec![PairingAction::CancelTimers]
                } else {
                    Vec::new()
                }
            }
        }
    }

    // =========================================================
    // Routed verification events
    // =========================================================

    /// Apply an event the router let through.
    ///
    /// `complete` ends the session from any active phase, including a
    /// responder that has not accepted yet: the service only sends it after
    /// the exchange succeeded.
    fn on_event(
        &mut self,
        registry: &mut SessionRegistry,
        event: VerificationEvent,
        now: DateTime<Utc>,
    ) -> Vec<PairingAction> {
        match event.kind {
            VerificationKind::Request => self.on_request(event, now),
            VerificationKind::Verification | VerificationKind::Verifying => {
                self.on_verification(event);
                Vec::new()
            }
            VerificationKind::Complete => {
                if !self.is_current_active(&event.session_id) {
                    return Vec::new();
                }
                let Some(session) = self.session.as_mut() else {
                    return Vec::new();
                };
                session.phase = PairingPhase::Complete;
                if session.peer_device_name.is_none() {
                    session.peer_device_name = event.device_name;
                }
                let signal = PairingSignal::Succeeded {
                    session_id: session.session_id.clone(),
                    peer_id: session.peer_id.clone(),
                    peer_device_name: session.peer_device_name.clone(),
                };
                if registry.is_active(&event.session_id) {
                    registry.clear();
                }
                vec![
                    PairingAction::CancelTimers,
                    PairingAction::Emit(signal),
                    PairingAction::StartTimer {
                        epoch: self.epoch,
                        kind: TimerKind::SuccessDisplay,
                    },
                ]
            }
            VerificationKind::Failed => {
                if !self.is_current_active(&event.session_id) {
                    return Vec::new();
                }
                self.fail(registry, PairingError::remote(event.error.as_deref()))
            }
        }
    }

    fn on_request(&mut self, event: VerificationEvent, now: DateTime<Utc>) -> Vec<PairingAction> {
        if self.phase().can_start_session() {
            let mut actions = self.supersede();
            self.epoch += 1;
            self.session = Some(PairingSession::responder(
                event.session_id,
                event.peer_id.unwrap_or_default(),
                event.device_name,
                now,
            ));
            return actions;
        }

        // Redelivered request for the session we are already handling.
        if let Some(session) = self.session.as_mut() {
            if session.is_session(&event.session_id)
                && session.phase == PairingPhase::RequestReceived
            {
                if event.device_name.is_some() {
                    session.peer_device_name = event.device_name;
                }
                if session.peer_id.is_empty() {
                    if let Some(peer_id) = event.peer_id {
                        session.peer_id = peer_id;
                    }
                }
                return Vec::new();
            }
        }

        debug!(
            session_id = %event.session_id,
            phase = ?self.phase(),
            "inbound request ignored: state machine busy"
        );
        Vec::new()
    }

    fn on_verification(&mut self, event: VerificationEvent) {
        if !self.is_current_active(&event.session_id) {
            return;
        }
        let Some(session) = self.session.as_mut() else {
            return;
        };
        match session.phase {
            PairingPhase::RequestSent | PairingPhase::RequestReceived => {
                session.phase = PairingPhase::PinDisplay;
                session.pin_code = event.code;
                session.local_fingerprint = event.local_fingerprint;
                session.peer_fingerprint = event.peer_fingerprint;
            }
            PairingPhase::PinDisplay => {
                // Refresh with whatever the redelivery carries.
                if event.code.is_some() {
                    session.pin_code = event.code;
                }
                if event.local_fingerprint.is_some() {
                    session.local_fingerprint = event.local_fingerprint;
                }
                if event.peer_fingerprint.is_some() {
                    session.peer_fingerprint = event.peer_fingerprint;
                }
            }
            _ => return,
        }
        if event.device_name.is_some() {
            session.peer_device_name = event.device_name;
        }
        if session.peer_id.is_empty() {
            if let Some(peer_id) = event.peer_id {
                session.peer_id = peer_id;
            }
        }
    }

    // =========================================================
    // Command results and timers
    // =========================================================

    fn on_session_bound(
        &mut self,
        registry: &mut SessionRegistry,
        session_id: SessionId,
    ) -> Vec<PairingAction> {
        let awaiting_binding = self.session.as_ref().is_some_and(|session| {
            session.phase == PairingPhase::RequestSent && session.session_id.is_none()
        });
        if !awaiting_binding {
            warn!(session_id = %session_id, "orphaned session id, cancelling remotely");
            return vec![PairingAction::Cancel { session_id }];
        }

        match registry.set_active(session_id.clone(), PairingRole::Initiator) {
            Ok(()) => {
                if let Some(session) = self.session.as_mut() {
                    session.session_id = Some(session_id);
                }
                Vec::new()
            }
            Err(err) => {
                if let Some(session) = self.session.as_mut() {
                    session.session_id = Some(session_id.clone());
                }
                let mut actions = vec![PairingAction::Cancel { session_id }];
                actions.extend(self.fail(
                    registry,
                    PairingError::new(PairingErrorKind::SessionConflict, err.to_string()),
                ));
                actions
            }
        }
    }

    fn on_command_failed(
        &mut self,
        registry: &mut SessionRegistry,
        session_id: Option<SessionId>,
        command: PairingCommand,
        error: PairingError,
    ) -> Vec<PairingAction> {
        match command {
            PairingCommand::Initiate => {
                let awaiting_binding = self.session.as_ref().is_some_and(|session| {
                    session.phase == PairingPhase::RequestSent && session.session_id.is_none()
                });
                if !awaiting_binding {
                    return Vec::new();
                }
                self.fail(registry, error)
            }
            PairingCommand::Accept | PairingCommand::VerifyPin => {
                let Some(session_id) = session_id else {
                    return Vec::new();
                };
                if !self.is_current_active(&session_id) {
                    return Vec::new();
                }
                let mut actions = vec![PairingAction::Cancel { session_id }];
                actions.extend(self.fail(registry, error));
                actions
            }
            PairingCommand::Reject | PairingCommand::Cancel => {
                warn!(
                    session_id = ?session_id,
                    ?command,
                    error = %error,
                    "best-effort pairing command failed"
                );
                Vec::new()
            }
        }
    }

    fn on_timer(
        &mut self,
        registry: &mut SessionRegistry,
        epoch: u64,
        kind: TimerKind,
    ) -> Vec<PairingAction> {
        if epoch != self.epoch {
            return Vec::new();
        }
        match kind {
            TimerKind::SuccessDisplay | TimerKind::FailureDisplay => {
                if self.phase().is_terminal() {
                    self.session = None;
                }
                Vec::new()
            }
            TimerKind::VerificationWatchdog => {
                if self.phase() != PairingPhase::PinVerifying {
                    return Vec::new();
                }
                let mut actions = Vec::new();
                if let Some(session_id) = self
                    .session
                    .as_ref()
                    .and_then(|session| session.session_id.clone())
                {
                    actions.push(PairingAction::Cancel { session_id });
                }
                actions.extend(self.fail(
                    registry,
                    PairingError::new(
                        PairingErrorKind::NetworkTimeout,
                        "no verification result from peer",
                    ),
                ));
                actions
            }
        }
    }

    // =========================================================
    // Helpers
    // =========================================================

    fn is_current_active(&self, session_id: &SessionId) -> bool {
        self.session
            .as_ref()
            .is_some_and(|session| session.phase.is_active() && session.is_session(session_id))
    }

    /// Enter `Failed`: store the error, release the slot, notify once and
    /// schedule the return to `Idle`.
    fn fail(&mut self, registry: &mut SessionRegistry, error: PairingError) -> Vec<PairingAction> {
        let Some(session) = self.session.as_mut() else {
            return Vec::new();
        };
        if !session.phase.is_active() {
            return Vec::new();
        }
        session.phase = PairingPhase::Failed;
        session.error = Some(error.clone());
        let session_id = session.session_id.clone();
        if let Some(id) = &session_id {
            if registry.is_active(id) {
                registry.clear();
            }
        }
        vec![
            PairingAction::CancelTimers,
            PairingAction::Emit(PairingSignal::Failed { session_id, error }),
            PairingAction::StartTimer {
                epoch: self.epoch,
                kind: TimerKind::FailureDisplay,
            },
        ]
    }

    /// Drop the session immediately, releasing the registry slot.
    fn teardown(&mut self, registry: &mut SessionRegistry) {
        if let Some(session) = self.session.take() {
            if let Some(id) = &session.session_id {
                if registry.is_active(id) {
                    registry.clear();
                }
            }
        }
    }

    /// Replace a terminal session still on display.
    fn supersede(&mut self) -> Vec<PairingAction> {
        match self.session.take() {
            Some(_) => vec![PairingAction::CancelTimers],
            None => Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pairing::view_model::DialogKind;

    struct Harness {
        registry: SessionRegistry,
        machine: PairingStateMachine,
    }

    impl Harness {
        fn new() -> Self {
            Self::with_policy(PairingPolicy::default())
        }

        fn with_policy(policy: PairingPolicy) -> Self {
            Self {
                registry: SessionRegistry::new(),
                machine: PairingStateMachine::new(policy),
            }
        }

        fn input(&mut self, input: PairingInput) -> Vec<PairingAction> {
            self.machine.handle(&mut self.registry, input, Utc::now())
        }

        fn user(&mut self, action: UserAction) -> Vec<PairingAction> {
            self.input(PairingInput::User(action))
        }

        /// Registry effects normally applied by the router.
        fn event(&mut self, event: VerificationEvent) -> Vec<PairingAction> {
            if event.kind == VerificationKind::Request && !self.registry.has_active() {
                self.registry
                    .set_active(event.session_id.clone(), PairingRole::Responder)
                    .unwrap();
            }
            let terminal = event.kind.is_terminal();
            let actions = self.input(PairingInput::Event(event));
            if terminal {
                self.registry.clear();
            }
            actions
        }

        fn initiator_in_pin_display(&mut self, session: &str) {
            self.user(UserAction::select_peer("peer-9"));
            self.input(PairingInput::SessionBound {
                session_id: SessionId::from(session),
            });
            self.event(VerificationEvent::verification(session, "482913"));
        }
    }

    fn signals(actions: &[PairingAction]) -> Vec<&PairingSignal> {
        actions
            .iter()
            .filter_map(|action| match action {
                PairingAction::Emit(signal) => Some(signal),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn initiator_select_peer_requests_initiate() {
        let mut h = Harness::new();
        let actions = h.user(UserAction::select_peer("peer-9"));

        assert_eq!(
            actions,
            vec![PairingAction::Initiate {
                peer_id: PeerId::from("peer-9")
            }]
        );
        assert_eq!(h.machine.phase(), PairingPhase::RequestSent);
        let session = h.machine.session().unwrap();
        assert_eq!(session.role, PairingRole::Initiator);
        assert!(session.session_id.is_none());
        assert!(!h.registry.has_active());
    }

    #[test]
    fn session_bound_registers_initiator() {
        let mut h = Harness::new();
        h.user(UserAction::select_peer("peer-9"));
        let actions = h.input(PairingInput::SessionBound {
            session_id: SessionId::from("s1"),
        });

        assert!(actions.is_empty());
        assert!(h.registry.is_active(&SessionId::from("s1")));
        assert_eq!(h.registry.active_role(), Some(PairingRole::Initiator));
    }

    #[test]
    fn session_bound_conflict_fails_and_cancels_new_session() {
        let mut h = Harness::new();
        h.user(UserAction::select_peer("peer-9"));
        h.registry
            .set_active(SessionId::from("other"), PairingRole::Responder)
            .unwrap();

        let actions = h.input(PairingInput::SessionBound {
            session_id: SessionId::from("s1"),
        });

        assert_eq!(
            actions[0],
            PairingAction::Cancel {
                session_id: SessionId::from("s1")
            }
        );
        assert_eq!(h.machine.phase(), PairingPhase::Failed);
        assert_eq!(
            h.machine.session().unwrap().error.as_ref().unwrap().kind,
            PairingErrorKind::SessionConflict
        );
        // The other session keeps its slot.
        assert!(h.registry.is_active(&SessionId::from("other")));
    }

    #[test]
    fn verification_moves_initiator_to_pin_display() {
        let mut h = Harness::new();
        h.initiator_in_pin_display("s1");

        let session = h.machine.session().unwrap();
        assert_eq!(session.phase, PairingPhase::PinDisplay);
        assert_eq!(session.pin_code.as_deref(), Some("482913"));
        assert_eq!(h.machine.view_model().dialog_kind, DialogKind::Pin);
    }

    #[test]
    fn confirm_match_sends_verify_and_waits() {
        let mut h = Harness::new();
        h.initiator_in_pin_display("s1");

        let actions = h.user(UserAction::ConfirmPin { matches: true });
        assert_eq!(
            actions,
            vec![PairingAction::VerifyPin {
                session_id: SessionId::from("s1"),
                matches: true
            }]
        );
        assert_eq!(h.machine.phase(), PairingPhase::PinVerifying);
    }

    #[test]
    fn confirm_mismatch_fails_locally_and_releases_slot() {
        let mut h = Harness::new();
        h.initiator_in_pin_display("s1");

        let actions = h.user(UserAction::ConfirmPin { matches: false });
        assert_eq!(
            actions[0],
            PairingAction::VerifyPin {
                session_id: SessionId::from("s1"),
                matches: false
            }
        );
        assert_eq!(h.machine.phase(), PairingPhase::Failed);
        assert_eq!(signals(&actions).len(), 1);
        assert!(!h.registry.has_active());
        assert!(actions.contains(&PairingAction::StartTimer {
            epoch: h.machine.epoch(),
            kind: TimerKind::FailureDisplay
        }));
    }

    #[test]
    fn complete_emits_single_success_and_schedules_return() {
        let mut h = Harness::new();
        h.initiator_in_pin_display("s1");
        h.user(UserAction::ConfirmPin { matches: true });

        let actions = h.event(VerificationEvent::complete("s1"));
        assert_eq!(h.machine.phase(), PairingPhase::Complete);
        assert_eq!(
            signals(&actions),
            vec![&PairingSignal::Succeeded {
                session_id: Some(SessionId::from("s1")),
                peer_id: PeerId::from("peer-9"),
                peer_device_name: None,
            }]
        );

        let epoch = h.machine.epoch();
        h.input(PairingInput::TimerElapsed {
            epoch,
            kind: TimerKind::SuccessDisplay,
        });
        assert_eq!(h.machine.phase(), PairingPhase::Idle);
    }

    #[test]
    fn complete_in_terminal_phase_is_ignored() {
        let mut h = Harness::new();
        h.initiator_in_pin_display("s1");
        h.user(UserAction::ConfirmPin { matches: false });

        let actions = h.input(PairingInput::Event(VerificationEvent::complete("s1")));
        assert!(actions.is_empty());
        assert_eq!(h.machine.phase(), PairingPhase::Failed);
    }

    #[test]
    fn remote_failure_passes_reason_through() {
        let mut h = Harness::new();
        h.initiator_in_pin_display("s1");
        h.user(UserAction::ConfirmPin { matches: true });

        let actions = h.event(VerificationEvent::failed("s1", "Timeout waiting for confirm"));
        let error = h.machine.session().unwrap().error.clone().unwrap();
        assert_eq!(error.kind, PairingErrorKind::NetworkTimeout);
        assert_eq!(error.message, "Timeout waiting for confirm");
        assert_eq!(signals(&actions).len(), 1);
    }

    #[test]
    fn responder_request_accept_then_verification() {
        let mut h = Harness::new();
        h.event(
            VerificationEvent::request("s2")
                .with_peer_id("peer-2")
                .with_device_name("Peer Device"),
        );
        assert_eq!(h.machine.phase(), PairingPhase::RequestReceived);
        assert_eq!(h.machine.session().unwrap().role, PairingRole::Responder);

        let actions = h.user(UserAction::Accept);
        assert_eq!(
            actions,
            vec![PairingAction::Accept {
                session_id: SessionId::from("s2")
            }]
        );
        assert_eq!(h.machine.phase(), PairingPhase::RequestReceived);
        assert!(h.user(UserAction::Accept).is_empty());

        h.event(VerificationEvent::verification("s2", "111222"));
        assert_eq!(h.machine.phase(), PairingPhase::PinDisplay);
    }

    #[test]
    fn responder_reject_returns_to_idle() {
        let mut h = Harness::new();
        h.event(VerificationEvent::request("s2").with_peer_id("peer-2"));

        let actions = h.user(UserAction::Reject);
        assert_eq!(
            actions,
            vec![PairingAction::Reject {
                session_id: SessionId::from("s2"),
                peer_id: PeerId::from("peer-2"),
            }]
        );
        assert_eq!(h.machine.phase(), PairingPhase::Idle);
        assert!(!h.registry.has_active());
    }

    #[test]
    fn cancel_during_verifying_is_local_first() {
        let mut h = Harness::new();
        h.initiator_in_pin_display("s1");
        h.user(UserAction::ConfirmPin { matches: true });

        let actions = h.user(UserAction::Cancel);
        assert_eq!(
            actions,
            vec![
                PairingAction::CancelTimers,
                PairingAction::Cancel {
                    session_id: SessionId::from("s1")
                }
            ]
        );
        assert_eq!(h.machine.phase(), PairingPhase::Idle);
        assert!(!h.registry.has_active());
        assert!(signals(&actions).is_empty());
    }

    #[test]
    fn complete_before_accept_succeeds() {
        let mut h = Harness::new();
        h.event(VerificationEvent::request("s2").with_peer_id("peer-2"));
        assert_eq!(h.machine.phase(), PairingPhase::RequestReceived);

        let actions = h.event(VerificationEvent::complete("s2"));

        assert_eq!(h.machine.phase(), PairingPhase::Complete);
        assert!(matches!(
            signals(&actions).as_slice(),
            [PairingSignal::Succeeded { .. }]
        ));
        assert!(!h.registry.has_active());
    }

    /// The coordinator applies a user cancel while `initiate` is pending.
    #[test]
    fn cancel_before_initiate_resolves_sends_no_command() {
        let mut h = Harness::new();
        h.user(UserAction::select_peer("peer-9"));
        assert_eq!(h.user(UserAction::Cancel), vec![PairingAction::CancelTimers]);
        assert_eq!(h.machine.phase(), PairingPhase::Idle);

        // A late binding is cancelled remotely.
        let actions = h.input(PairingInput::SessionBound {
            session_id: SessionId::from("late"),
        });
        assert_eq!(
            actions,
            vec![PairingAction::Cancel {
                session_id: SessionId::from("late")
            }]
        );
        assert!(!h.registry.has_active());
    }

    #[test]
    fn select_peer_while_busy_is_ignored() {
        let mut h = Harness::new();
        h.initiator_in_pin_display("s1");
        assert!(h.user(UserAction::select_peer("peer-10")).is_empty());
        assert!(h.machine.session().unwrap().is_session(&SessionId::from("s1")));
    }

    #[test]
    fn initiate_failure_becomes_command_dispatch_error() {
        let mut h = Harness::new();
        h.user(UserAction::select_peer("peer-9"));
        let actions = h.input(PairingInput::CommandFailed {
            session_id: None,
            command: PairingCommand::Initiate,
            error: PairingError::command_dispatch("service offline"),
        });

        assert_eq!(h.machine.phase(), PairingPhase::Failed);
        assert_eq!(
            h.machine.session().unwrap().error.as_ref().unwrap().kind,
            PairingErrorKind::CommandDispatchError
        );
        assert_eq!(signals(&actions).len(), 1);
    }

    #[test]
    fn accept_failure_for_other_session_is_ignored() {
        let mut h = Harness::new();
        h.event(VerificationEvent::request("s2"));
        let actions = h.input(PairingInput::CommandFailed {
            session_id: Some(SessionId::from("old")),
            command: PairingCommand::Accept,
            error: PairingError::command_dispatch("boom"),
        });
        assert!(actions.is_empty());
        assert_eq!(h.machine.phase(), PairingPhase::RequestReceived);
    }

    #[test]
    fn stale_return_timer_does_not_reset_new_session() {
        let mut h = Harness::new();
        h.initiator_in_pin_display("s1");
        h.user(UserAction::ConfirmPin { matches: false });
        let stale_epoch = h.machine.epoch();

        h.event(VerificationEvent::request("s2"));
        assert_eq!(h.machine.phase(), PairingPhase::RequestReceived);

        h.input(PairingInput::TimerElapsed {
            epoch: stale_epoch,
            kind: TimerKind::FailureDisplay,
        });
        assert_eq!(h.machine.phase(), PairingPhase::RequestReceived);
    }

    #[test]
    fn cancel_in_terminal_phase_dismisses() {
        let mut h = Harness::new();
        h.initiator_in_pin_display("s1");
        h.user(UserAction::ConfirmPin { matches: false });

        assert_eq!(h.user(UserAction::Cancel), vec![PairingAction::CancelTimers]);
        assert_eq!(h.machine.phase(), PairingPhase::Idle);
    }

    #[test]
    fn watchdog_fails_stuck_verification_when_enabled() {
        let mut h = Harness::with_policy(PairingPolicy {
            verification_watchdog: true,
        });
        h.initiator_in_pin_display("s1");
        let actions = h.user(UserAction::ConfirmPin { matches: true });
        let epoch = h.machine.epoch();
        assert!(actions.contains(&PairingAction::StartTimer {
            epoch,
            kind: TimerKind::VerificationWatchdog
        }));

        let actions = h.input(PairingInput::TimerElapsed {
            epoch,
            kind: TimerKind::VerificationWatchdog,
        });
        assert_eq!(
            actions[0],
            PairingAction::Cancel {
                session_id: SessionId::from("s1")
            }
        );
        assert_eq!(
            h.machine.session().unwrap().error.as_ref().unwrap().kind,
            PairingErrorKind::NetworkTimeout
        );
    }

    #[test]
    fn user_action_json_shape() {
        let action: UserAction =
            serde_json::from_str(r#"{"type":"selectPeer","peerId":"peer-9"}"#).unwrap();
        assert_eq!(action, UserAction::select_peer("peer-9"));
        let action: UserAction =
            serde_json::from_str(r#"{"type":"confirmPin","matches":false}"#).unwrap();
        assert_eq!(action, UserAction::ConfirmPin { matches: false });
    }
}
