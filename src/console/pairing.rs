use std::sync::Arc;

use anyhow::Context;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite};
use tokio::sync::{mpsc, watch};
use tracing::{debug, warn};
use uc_app::usecases::PairingCoordinator;
use uc_core::pairing::{PairingSignal, PairingViewModel};
use uc_infra::NdjsonWriter;

use super::protocol::{ConsoleOutput, PairingConsoleInput};

/// Feed `input` lines to the coordinator until the reader is exhausted.
///
/// Each line is fully applied (including the commands it triggers) before
/// the next is read; timer-driven changes are published while idle.
pub async fn run_pairing_console<R, W>(
    input: R,
    writer: Arc<NdjsonWriter<W>>,
    coordinator: PairingCoordinator,
) -> anyhow::Result<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin + Send,
{
    let mut view_model = coordinator.subscribe();
    let mut signals = coordinator.subscribe_signals().await;

    let initial = view_model.borrow_and_update().clone();
    write_view_model(&writer, &initial).await?;

    let mut lines = input.lines();
    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line.context("failed to read console input")? else {
                    break;
                };
                apply_line(&coordinator, &writer, &line).await?;
                coordinator.settle().await?;
                publish_updates(&writer, &mut view_model, &mut signals).await?;
            }
            changed = view_model.changed() => {
                if changed.is_err() {
                    break;
                }
                publish_updates(&writer, &mut view_model, &mut signals).await?;
            }
            Some(signal) = signals.recv() => {
                write_signal(&writer, &signal).await?;
            }
        }
    }

    debug!("pairing console input closed");
    Ok(())
}

async fn apply_line<W>(
    coordinator: &PairingCoordinator,
    writer: &NdjsonWriter<W>,
    line: &str,
) -> anyhow::Result<()>
where
    W: AsyncWrite + Unpin + Send,
{
    let line = line.trim();
    if line.is_empty() {
        return Ok(());
    }

    match serde_json::from_str::<PairingConsoleInput>(line) {
        Ok(PairingConsoleInput::Action { action }) => coordinator.dispatch(action).await?,
        Ok(PairingConsoleInput::Event { event }) => coordinator.on_event(event).await?,
        Err(err) => {
            warn!(error = %err, "ignoring malformed console line");
            writer
                .write_record(&ConsoleOutput::Error {
                    message: format!("malformed input: {err}"),
                })
                .await?;
        }
    }
    Ok(())
}

async fn publish_updates<W>(
    writer: &NdjsonWriter<W>,
    view_model: &mut watch::Receiver<PairingViewModel>,
    signals: &mut mpsc::Receiver<PairingSignal>,
) -> anyhow::Result<()>
where
    W: AsyncWrite + Unpin + Send,
{
    if view_model.has_changed().unwrap_or(false) {
        let snapshot = view_model.borrow_and_update().clone();
        write_view_model(writer, &snapshot).await?;
    }
    while let Ok(signal) = signals.try_recv() {
        write_signal(writer, &signal).await?;
    }
    Ok(())
}

async fn write_view_model<W>(
    writer: &NdjsonWriter<W>,
    view_model: &PairingViewModel,
) -> anyhow::Result<()>
where
    W: AsyncWrite + Unpin + Send,
{
    writer
        .write_record(&ConsoleOutput::ViewModel { view_model })
        .await
}

async fn write_signal<W>(writer: &NdjsonWriter<W>, signal: &PairingSignal) -> anyhow::Result<()>
where
    W: AsyncWrite + Unpin + Send,
{
    writer.write_record(&ConsoleOutput::Signal { signal }).await
}
