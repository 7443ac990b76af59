//! Setup orchestrator.
//!
//! This module coordinates the setup state machine and side effects. Pairing
//! progress is fenced and deduplicated by the same [`EventRouter`] the
//! pairing coordinator uses, configured to ignore inbound requests because a
//! joining device always initiates.

use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{debug, info, info_span, warn, Instrument};

use uc_core::ids::{PeerId, SessionId};
use uc_core::pairing::{
    EventRouter, PairingErrorKind, PairingRole, RouteOutcome, RouterPolicy, VerificationEvent,
    VerificationKind,
};
use uc_core::ports::{PairingCommandPort, SetupEventPort, SetupStatusPort};
use uc_core::setup::{SetupAction, SetupError, SetupEvent, SetupState, SetupStateMachine};

use crate::usecases::pairing::CommandGateway;

/// Errors produced by the setup orchestrator.
#[derive(Debug, thiserror::Error)]
pub enum SetupOrchestratorError {
    #[error("mark setup complete failed: {0}")]
    MarkSetupComplete(#[source] anyhow::Error),
    #[error("load setup status failed: {0}")]
    LoadStatus(#[source] anyhow::Error),
}

struct SetupContext {
    state: SetupState,
    router: EventRouter,
    seeded: bool,
}

/// Orchestrator that drives setup state and side effects.
pub struct SetupOrchestrator {
    // Held for the whole of a dispatch, which serializes dispatch calls.
    context: Mutex<SetupContext>,
    gateway: Arc<CommandGateway>,
    setup_status: Arc<dyn SetupStatusPort>,
    setup_event_port: Arc<dyn SetupEventPort>,
}

impl SetupOrchestrator {
    pub fn new(
        command_port: Arc<dyn PairingCommandPort>,
        setup_status: Arc<dyn SetupStatusPort>,
        setup_event_port: Arc<dyn SetupEventPort>,
    ) -> Self {
        Self {
            context: Mutex::new(SetupContext {
                state: SetupState::Welcome,
                router: EventRouter::new(RouterPolicy {
                    accept_inbound_requests: false,
                }),
                seeded: false,
            }),
            gateway: Arc::new(CommandGateway::new(command_port)),
            setup_status,
            setup_event_port,
        }
    }

    pub async fn get_state(&self) -> Result<SetupState, SetupOrchestratorError> {
        let mut context = self.context.lock().await;
        self.seed_state_from_status(&mut context).await?;
        Ok(context.state.clone())
    }

    pub async fn new_space(&self) -> Result<SetupState, SetupOrchestratorError> {
        self.dispatch(SetupEvent::ChooseCreateSpace).await
    }

    pub async fn join_space(&self) -> Result<SetupState, SetupOrchestratorError> {
        self.dispatch(SetupEvent::ChooseJoinSpace).await
    }

    pub async fn back(&self) -> Result<SetupState, SetupOrchestratorError> {
        self.dispatch(SetupEvent::Back).await
    }

    pub async fn select_device(
        &self,
        peer_id: impl Into<PeerId>,
    ) -> Result<SetupState, SetupOrchestratorError> {
        self.dispatch(SetupEvent::SelectPeer {
            peer_id: peer_id.into(),
        })
        .await
    }

    pub async fn confirm_pairing(&self) -> Result<SetupState, SetupOrchestratorError> {
        self.dispatch(SetupEvent::PairingUserConfirm).await
    }

    pub async fn cancel_pairing(&self) -> Result<SetupState, SetupOrchestratorError> {
        self.dispatch(SetupEvent::PairingUserCancel).await
    }

    /// Feed a verification event from the peer-networking service.
    ///
    /// Events for other sessions, redeliveries and inbound requests are
    /// dropped by the router and leave the state untouched.
    pub async fn on_verification_event(
        &self,
        event: VerificationEvent,
    ) -> Result<SetupState, SetupOrchestratorError> {
        let mut context = self.context.lock().await;
        let outcome = context.router.on_event(event, |_, event| setup_event_for(event));
        match outcome {
            RouteOutcome::Forwarded(Some(event)) => self.dispatch_locked(&mut context, event).await,
            RouteOutcome::Forwarded(None) | RouteOutcome::Discarded(_) => Ok(context.state.clone()),
        }
    }

    pub async fn dispatch(&self, event: SetupEvent) -> Result<SetupState, SetupOrchestratorError> {
        let mut context = self.context.lock().await;
        self.seed_state_from_status(&mut context).await?;
        self.dispatch_locked(&mut context, event).await
    }

    async fn dispatch_locked(
        &self,
        context: &mut SetupContext,
        event: SetupEvent,
    ) -> Result<SetupState, SetupOrchestratorError> {
        let span = info_span!("usecase.setup_orchestrator.dispatch", event = ?event);
        async {
            let mut pending_events = vec![event];

            while let Some(event) = pending_events.pop() {
                let from = context.state.clone();
                let event_name = format!("{:?}", event);
                let (next, actions) = SetupStateMachine::transition(from.clone(), event);
                info!(from = ?from, to = ?next, event = %event_name, "setup state transition");
                let follow_up_events = self.execute_actions(context, actions).await?;
                context.state = next;
                if context.state != from {
                    self.setup_event_port
                        .emit_setup_state_changed(
                            context.state.clone(),
                            context.state.session_id().cloned(),
                        )
                        .await;
                }
                pending_events.extend(follow_up_events);
            }

            Ok(context.state.clone())
        }
        .instrument(span)
        .await
    }

    async fn execute_actions(
        &self,
        context: &mut SetupContext,
        actions: Vec<SetupAction>,
    ) -> Result<Vec<SetupEvent>, SetupOrchestratorError> {
        let mut follow_up_events = Vec::new();
        for action in actions {
            debug!(?action, "setup executing action");
            match action {
                SetupAction::StartPairing { peer_id } => {
                    follow_up_events.push(self.start_pairing(context, &peer_id).await);
                }
                SetupAction::ConfirmPairing { session_id } => {
                    if let Err(error) = self.gateway.verify_pin(&session_id, true).await {
                        self.abort_pairing(context, &session_id).await;
                        follow_up_events.push(SetupEvent::PairingFailed {
                            reason: error.kind.into(),
                        });
                    }
                }
                SetupAction::CancelPairing { session_id } => {
                    self.abort_pairing(context, &session_id).await;
                }
                SetupAction::MarkSetupComplete => {
                    self.mark_setup_complete().await?;
                }
            }
        }
        Ok(follow_up_events)
    }

    async fn start_pairing(&self, context: &mut SetupContext, peer_id: &PeerId) -> SetupEvent {
        let session_id = match self.gateway.initiate(peer_id).await {
            Ok(session_id) => session_id,
            Err(error) => {
                return SetupEvent::PairingFailed {
                    reason: error.kind.into(),
                }
            }
        };

        let registry = context.router.registry_mut();
        match registry.set_active(session_id.clone(), PairingRole::Initiator) {
            Ok(()) => SetupEvent::PairingStarted { session_id },
            Err(err) => {
                warn!(error = %err, "setup pairing session conflict");
                if let Err(error) = self.gateway.cancel(&session_id).await {
                    warn!(error = %error, "failed to cancel conflicting session");
                }
                SetupEvent::PairingFailed {
                    reason: PairingErrorKind::SessionConflict.into(),
                }
            }
        }
    }

    /// Release the slot locally first, then notify the service best-effort.
    async fn abort_pairing(&self, context: &mut SetupContext, session_id: &SessionId) {
        if context.router.registry().is_active(session_id) {
            context.router.registry_mut().clear();
        }
        if let Err(error) = self.gateway.cancel(session_id).await {
            warn!(session_id = %session_id, error = %error, "failed to cancel setup pairing");
        }
    }

    async fn mark_setup_complete(&self) -> Result<(), SetupOrchestratorError> {
        let mut status = self
            .setup_status
            .get_status()
            .await
            .map_err(SetupOrchestratorError::MarkSetupComplete)?;
        status.has_completed = true;
        self.setup_status
            .set_status(&status)
            .await
            .map_err(SetupOrchestratorError::MarkSetupComplete)
    }

    async fn seed_state_from_status(
        &self,
        context: &mut SetupContext,
    ) -> Result<(), SetupOrchestratorError> {
        if context.seeded {
            return Ok(());
        }
        let status = self
            .setup_status
            .get_status()
            .await
            .map_err(SetupOrchestratorError::LoadStatus)?;
        context.seeded = true;
        if status.has_completed {
            context.state = SetupState::Done;
        }
        Ok(())
    }
}

fn setup_event_for(event: VerificationEvent) -> Option<SetupEvent> {
    match event.kind {
        VerificationKind::Request => None,
        VerificationKind::Verification | VerificationKind::Verifying => {
            let short_code = event.code?;
            Some(SetupEvent::PairingVerificationRequired {
                session_id: event.session_id,
                short_code,
                peer_fingerprint: event.peer_fingerprint,
            })
        }
        VerificationKind::Complete => Some(SetupEvent::PairingSucceeded),
        VerificationKind::Failed => Some(SetupEvent::PairingFailed {
            reason: event
                .error
                .as_deref()
                .map(PairingErrorKind::from_remote_reason)
                .map(SetupError::from)
                .unwrap_or(SetupError::PairingFailed),
        }),
    }
}
