use std::sync::Arc;

use anyhow::Context;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite};
use tracing::{debug, error, warn};
use uc_app::usecases::{SetupOrchestrator, SetupOrchestratorError};
use uc_core::ports::SetupEventPort;
use uc_core::setup::SetupState;
use uc_infra::NdjsonWriter;

use super::protocol::{ConsoleOutput, SetupConsoleInput};

/// Drive the setup flow from `input` lines.
///
/// State changes reach the output through `setup_events`; the current state
/// is emitted once up front.
pub async fn run_setup_console<R, W>(
    input: R,
    writer: Arc<NdjsonWriter<W>>,
    orchestrator: SetupOrchestrator,
    setup_events: Arc<dyn SetupEventPort>,
) -> anyhow::Result<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin + Send,
{
    let state = orchestrator.get_state().await?;
    let session_id = state.session_id().cloned();
    setup_events
        .emit_setup_state_changed(state, session_id)
        .await;

    let mut lines = input.lines();
    while let Some(line) = lines
        .next_line()
        .await
        .context("failed to read console input")?
    {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let input = match serde_json::from_str::<SetupConsoleInput>(line) {
            Ok(input) => input,
            Err(err) => {
                warn!(error = %err, "ignoring malformed console line");
                writer
                    .write_record(&ConsoleOutput::Error {
                        message: format!("malformed input: {err}"),
                    })
                    .await?;
                continue;
            }
        };

        if let Err(err) = apply(&orchestrator, input).await {
            error!(error = %err, "setup step failed");
            writer
                .write_record(&ConsoleOutput::Error {
                    message: err.to_string(),
                })
                .await?;
        }
    }

    debug!("setup console input closed");
    Ok(())
}

async fn apply(
    orchestrator: &SetupOrchestrator,
    input: SetupConsoleInput,
) -> Result<SetupState, SetupOrchestratorError> {
    match input {
        SetupConsoleInput::NewSpace => orchestrator.new_space().await,
        SetupConsoleInput::JoinSpace => orchestrator.join_space().await,
        SetupConsoleInput::Back => orchestrator.back().await,
        SetupConsoleInput::SelectDevice { peer_id } => orchestrator.select_device(peer_id).await,
        SetupConsoleInput::ConfirmPairing => orchestrator.confirm_pairing().await,
        SetupConsoleInput::CancelPairing => orchestrator.cancel_pairing().await,
        SetupConsoleInput::Event { event } => orchestrator.on_verification_event(event).await,
    }
}
