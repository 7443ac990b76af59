//! Pairing commands as NDJSON records.
//!
//! Stand-in for the peer-networking service when the coordinator runs behind
//! a line-oriented console: each command becomes one
//! `{"type":"command","command":...}` line, and `initiate` answers with a
//! freshly issued session id.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::io::AsyncWrite;
use tracing::debug;
use uc_core::ids::{PeerId, SessionId};
use uc_core::ports::{InitiatePairingResponse, PairingCommandPort, VerifyPinRequest};

use crate::codec::NdjsonWriter;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "camelCase")]
pub enum OutboundCommand {
    #[serde(rename_all = "camelCase")]
    Initiate {
        peer_id: PeerId,
        session_id: SessionId,
    },
    #[serde(rename_all = "camelCase")]
    Accept { session_id: SessionId },
    #[serde(rename_all = "camelCase")]
    Reject {
        session_id: SessionId,
        peer_id: PeerId,
    },
    #[serde(rename_all = "camelCase")]
    VerifyPin {
        session_id: SessionId,
        pin_matches: bool,
    },
    #[serde(rename_all = "camelCase")]
    Cancel { session_id: SessionId },
}

#[derive(Serialize)]
struct CommandRecord<'a> {
    #[serde(rename = "type")]
    record_type: &'static str,
    #[serde(flatten)]
    command: &'a OutboundCommand,
}

pub struct NdjsonCommandPort<W> {
    writer: Arc<NdjsonWriter<W>>,
}

impl<W> NdjsonCommandPort<W>
where
    W: AsyncWrite + Unpin + Send,
{
    pub fn new(writer: Arc<NdjsonWriter<W>>) -> Self {
        Self { writer }
    }

    async fn send(&self, command: OutboundCommand) -> anyhow::Result<()> {
        debug!(?command, "writing pairing command");
        self.writer
            .write_record(&CommandRecord {
                record_type: "command",
                command: &command,
            })
            .await
    }
}

#[async_trait]
impl<W> PairingCommandPort for NdjsonCommandPort<W>
where
    W: AsyncWrite + Unpin + Send + 'static,
{
    async fn initiate(&self, peer_id: &PeerId) -> anyhow::Result<InitiatePairingResponse> {
        let session_id = SessionId::new(uuid::Uuid::new_v4().to_string());
        self.send(OutboundCommand::Initiate {
            peer_id: peer_id.clone(),
            session_id: session_id.clone(),
        })
        .await?;
        Ok(InitiatePairingResponse::started(session_id))
    }

    async fn accept(&self, session_id: &SessionId) -> anyhow::Result<()> {
        self.send(OutboundCommand::Accept {
            session_id: session_id.clone(),
        })
        .await
    }

    async fn reject(&self, session_id: &SessionId, peer_id: &PeerId) -> anyhow::Result<()> {
        self.send(OutboundCommand::Reject {
            session_id: session_id.clone(),
            peer_id: peer_id.clone(),
        })
        .await
    }

    async fn verify_pin(&self, request: VerifyPinRequest) -> anyhow::Result<()> {
        self.send(OutboundCommand::VerifyPin {
            session_id: request.session_id,
            pin_matches: request.pin_matches,
        })
        .await
    }

    async fn cancel(&self, session_id: &SessionId) -> anyhow::Result<()> {
        self.send(OutboundCommand::Cancel {
            session_id: session_id.clone(),
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    fn lines(writer: Arc<NdjsonWriter<Vec<u8>>>) -> Vec<Value> {
        let bytes = match Arc::try_unwrap(writer) {
            Ok(writer) => writer.into_inner(),
            Err(_) => panic!("writer still shared"),
        };
        String::from_utf8(bytes)
            .unwrap()
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect()
    }

    #[tokio::test]
    async fn initiate_issues_session_id_and_records_command() {
        let writer = Arc::new(NdjsonWriter::new(Vec::new()));
        let port = NdjsonCommandPort::new(writer.clone());

        let response = port.initiate(&PeerId::from("peer-9")).await.unwrap();
        drop(port);

        assert!(response.success);
        let session_id = response.session_id.unwrap();
        let records = lines(writer);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0]["type"], "command");
        assert_eq!(records[0]["command"], "initiate");
        assert_eq!(records[0]["peerId"], "peer-9");
        assert_eq!(records[0]["sessionId"], session_id.as_str());
    }

    #[tokio::test]
    async fn commands_use_camel_case_fields() {
        let writer = Arc::new(NdjsonWriter::new(Vec::new()));
        let port = NdjsonCommandPort::new(writer.clone());

        port.reject(&SessionId::from("s2"), &PeerId::from("peer-2"))
            .await
            .unwrap();
        port.verify_pin(VerifyPinRequest {
            session_id: SessionId::from("s1"),
            pin_matches: false,
        })
        .await
        .unwrap();
        drop(port);

        let records = lines(writer);
        assert_eq!(records[0]["command"], "reject");
        assert_eq!(records[0]["sessionId"], "s2");
        assert_eq!(records[0]["peerId"], "peer-2");
        assert_eq!(records[1]["command"], "verifyPin");
        assert_eq!(records[1]["pinMatches"], false);
    }
}
