//! Wiring of the ports, use cases and console for one run.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use tokio::io::{self, BufReader};
use tracing::info;
use uc_app::usecases::{PairingCoordinator, PairingCoordinatorConfig, SetupOrchestrator};
use uc_core::config::AppConfig;
use uc_infra::{
    FileSetupStatusRepository, NdjsonCommandPort, NdjsonSetupEventEmitter, NdjsonWriter,
    TokioTimer,
};

use crate::console;

/// Run the pairing console on stdin/stdout until stdin closes.
pub async fn run_pairing(config: &AppConfig) -> anyhow::Result<()> {
    let coordinator_config = PairingCoordinatorConfig::from_app_config(config);
    info!(
        device_name = config.device_name.as_deref().unwrap_or("unnamed"),
        config = ?coordinator_config,
        "starting pairing console"
    );

    let writer = Arc::new(NdjsonWriter::new(io::stdout()));
    let command_port = Arc::new(NdjsonCommandPort::new(Arc::clone(&writer)));
    let coordinator =
        PairingCoordinator::spawn(command_port, Arc::new(TokioTimer::new()), coordinator_config);

    console::run_pairing_console(BufReader::new(io::stdin()), writer, coordinator).await
}

/// Run the first-run setup console on stdin/stdout until stdin closes.
pub async fn run_setup(config: &AppConfig) -> anyhow::Result<()> {
    let status_file = setup_status_file(config)?;
    info!(status_file = %status_file.display(), "starting setup console");

    let writer = Arc::new(NdjsonWriter::new(io::stdout()));
    let command_port = Arc::new(NdjsonCommandPort::new(Arc::clone(&writer)));
    let setup_events = Arc::new(NdjsonSetupEventEmitter::new(Arc::clone(&writer)));
    let orchestrator = SetupOrchestrator::new(
        command_port,
        Arc::new(FileSetupStatusRepository::new(status_file)),
        setup_events.clone(),
    );

    console::run_setup_console(
        BufReader::new(io::stdin()),
        writer,
        orchestrator,
        setup_events,
    )
    .await
}

fn setup_status_file(config: &AppConfig) -> anyhow::Result<PathBuf> {
    if let Some(path) = &config.setup_status_file {
        return Ok(path.clone());
    }
    let data_dir = dirs::data_dir().context("No data directory for the setup status file")?;
    Ok(FileSetupStatusRepository::with_defaults(&data_dir.join("uniclipboard"))
        .path()
        .to_path_buf())
}
