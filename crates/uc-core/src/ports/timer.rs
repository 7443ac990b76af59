use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use crate::pairing::TimerKind;

/// Work run when a timer elapses.
pub type TimerTask = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;

#[async_trait::async_trait]
pub trait TimerPort: Send + Sync {
    /// Run `task` after `delay`. A pending timer of the same kind is replaced.
    async fn start(&self, kind: TimerKind, delay: Duration, task: TimerTask) -> anyhow::Result<()>;
    async fn stop(&self, kind: TimerKind) -> anyhow::Result<()>;
    async fn stop_all(&self) -> anyhow::Result<()>;
}
