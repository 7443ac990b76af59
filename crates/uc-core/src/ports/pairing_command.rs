use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::ids::{PeerId, SessionId};

/// Result of `initiate` as reported by the peer-networking service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitiatePairingResponse {
    pub session_id: Option<SessionId>,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl InitiatePairingResponse {
    pub fn started(session_id: impl Into<SessionId>) -> Self {
        Self {
            session_id: Some(session_id.into()),
            success: true,
            error: None,
        }
    }

    pub fn refused(error: impl Into<String>) -> Self {
        Self {
            session_id: None,
            success: false,
            error: Some(error.into()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyPinRequest {
    pub session_id: SessionId,
    pub pin_matches: bool,
}

/// Outbound pairing commands to the peer-networking service.
///
/// Calls only acknowledge delivery. Progress is reported back through the
/// verification event stream.
#[async_trait]
pub trait PairingCommandPort: Send + Sync {
    async fn initiate(&self, peer_id: &PeerId) -> anyhow::Result<InitiatePairingResponse>;
    async fn accept(&self, session_id: &SessionId) -> anyhow::Result<()>;
    async fn reject(&self, session_id: &SessionId, peer_id: &PeerId) -> anyhow::Result<()>;
    async fn verify_pin(&self, request: VerifyPinRequest) -> anyhow::Result<()>;
    async fn cancel(&self, session_id: &SessionId) -> anyhow::Result<()>;
}
