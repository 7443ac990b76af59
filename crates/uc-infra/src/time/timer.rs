use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Mutex;
use tokio::time::{sleep, Duration};
use tracing::debug;
use uc_core::pairing::TimerKind;
use uc_core::ports::{TimerPort, TimerTask};

/// [`TimerPort`] backed by `tokio::time`; one pending timer per kind.
#[derive(Default)]
pub struct TokioTimer {
    timers: Arc<Mutex<HashMap<TimerKind, tokio::task::AbortHandle>>>,
}

impl TokioTimer {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl TimerPort for TokioTimer {
    async fn start(&self, kind: TimerKind, delay: Duration, task: TimerTask) -> anyhow::Result<()> {
        let timers = Arc::clone(&self.timers);

        let mut timers_guard = self.timers.lock().await;
        if let Some(existing) = timers_guard.remove(&kind) {
            existing.abort();
        }

        let handle = tokio::spawn(async move {
            sleep(delay).await;
            timers.lock().await.remove(&kind);
            debug!(?kind, "timer elapsed");
            task.await;
        });

        timers_guard.insert(kind, handle.abort_handle());
        debug!(?kind, delay_ms = delay.as_millis() as u64, "timer started");
        Ok(())
    }

    async fn stop(&self, kind: TimerKind) -> anyhow::Result<()> {
        if let Some(handle) = self.timers.lock().await.remove(&kind) {
            handle.abort();
            debug!(?kind, "timer stopped");
        }
        Ok(())
    }

    async fn stop_all(&self) -> anyhow::Result<()> {
        let mut timers_guard = self.timers.lock().await;
        for (kind, handle) in timers_guard.drain() {
            handle.abort();
            debug!(?kind, "timer stopped");
        }
        Ok(())
    }
}
