//! Setup state notifications as NDJSON records.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use tokio::io::AsyncWrite;
use tracing::{info, warn};
use uc_core::ids::SessionId;
use uc_core::ports::SetupEventPort;
use uc_core::setup::SetupState;

use crate::codec::NdjsonWriter;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SetupStateRecord<'a> {
    #[serde(rename = "type")]
    record_type: &'static str,
    state: &'a SetupState,
    session_id: Option<&'a SessionId>,
}

/// [`SetupEventPort`] writing `{"type":"setupState",...}` lines.
pub struct NdjsonSetupEventEmitter<W> {
    writer: Arc<NdjsonWriter<W>>,
}

impl<W> NdjsonSetupEventEmitter<W> {
    pub fn new(writer: Arc<NdjsonWriter<W>>) -> Self {
        Self { writer }
    }
}

#[async_trait]
impl<W> SetupEventPort for NdjsonSetupEventEmitter<W>
where
    W: AsyncWrite + Unpin + Send + 'static,
{
    async fn emit_setup_state_changed(&self, state: SetupState, session_id: Option<SessionId>) {
        info!(state = ?state, session_id = ?session_id, "setup state changed");
        let record = SetupStateRecord {
            record_type: "setupState",
            state: &state,
            session_id: session_id.as_ref(),
        };
        // Notifications are fire-and-forget; the state itself is authoritative.
        if let Err(err) = self.writer.write_record(&record).await {
            warn!(error = %err, "failed to emit setup state");
        }
    }
}
