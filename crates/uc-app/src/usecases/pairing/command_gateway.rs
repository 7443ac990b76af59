use std::sync::Arc;

use tracing::{info_span, warn, Instrument};
use uc_core::ids::{PeerId, SessionId};
use uc_core::pairing::PairingError;
use uc_core::ports::{PairingCommandPort, VerifyPinRequest};

/// Boundary for outbound pairing commands.
///
/// Every port error is folded into [`PairingError`] with kind
/// `CommandDispatchError`, so callers never see a raw transport fault.
pub struct CommandGateway {
    port: Arc<dyn PairingCommandPort>,
}

impl CommandGateway {
    pub fn new(port: Arc<dyn PairingCommandPort>) -> Self {
        Self { port }
    }

    /// Start a session with `peer_id` and return the service-issued id.
    pub async fn initiate(&self, peer_id: &PeerId) -> Result<SessionId, PairingError> {
        let span = info_span!("pairing.command.initiate", peer_id = %peer_id);
        async {
            let response = self.port.initiate(peer_id).await.map_err(dispatch_error)?;
            match (response.success, response.session_id) {
                (true, Some(session_id)) => Ok(session_id),
                (true, None) => Err(PairingError::command_dispatch(
                    "initiate succeeded without a session id",
                )),
                (false, _) => Err(PairingError::command_dispatch(
                    response
                        .error
                        .unwrap_or_else(|| "initiate was refused".to_string()),
                )),
            }
        }
        .instrument(span)
        .await
    }

    pub async fn accept(&self, session_id: &SessionId) -> Result<(), PairingError> {
        let span = info_span!("pairing.command.accept", session_id = %session_id);
        self.port
            .accept(session_id)
            .instrument(span)
            .await
            .map_err(dispatch_error)
    }

    pub async fn reject(&self, session_id: &SessionId, peer_id: &PeerId) -> Result<(), PairingError> {
        let span = info_span!(
            "pairing.command.reject",
            session_id = %session_id,
            peer_id = %peer_id
        );
        self.port
            .reject(session_id, peer_id)
            .instrument(span)
            .await
            .map_err(dispatch_error)
    }

    pub async fn verify_pin(&self, session_id: &SessionId, matches: bool) -> Result<(), PairingError> {
        let span = info_span!("pairing.command.verify_pin", session_id = %session_id, matches);
        self.port
            .verify_pin(VerifyPinRequest {
                session_id: session_id.clone(),
                pin_matches: matches,
            })
            .instrument(span)
            .await
            .map_err(dispatch_error)
    }

    pub async fn cancel(&self, session_id: &SessionId) -> Result<(), PairingError> {
        let span = info_span!("pairing.command.cancel", session_id = %session_id);
        self.port
            .cancel(session_id)
            .instrument(span)
            .await
            .map_err(dispatch_error)
    }
}

fn dispatch_error(err: anyhow::Error) -> PairingError {
    warn!(error = %err, "pairing command failed");
    PairingError::command_dispatch(format!("{err:#}"))
}
