use anyhow::Context;
use serde::Serialize;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::Mutex;

/// Newline-delimited JSON sink shared by every writer of one stream.
///
/// Each record is serialized, written and flushed under one lock so lines
/// from concurrent writers never interleave.
pub struct NdjsonWriter<W> {
    inner: Mutex<W>,
}

impl<W> NdjsonWriter<W>
where
    W: AsyncWrite + Unpin + Send,
{
    pub fn new(inner: W) -> Self {
        Self {
            inner: Mutex::new(inner),
        }
    }

    pub async fn write_record<T: Serialize + ?Sized>(&self, record: &T) -> anyhow::Result<()> {
        let mut line = serde_json::to_vec(record).context("failed to encode ndjson record")?;
        line.push(b'\n');

        let mut inner = self.inner.lock().await;
        inner
            .write_all(&line)
            .await
            .context("failed to write ndjson record")?;
        inner.flush().await.context("failed to flush ndjson stream")?;
        Ok(())
    }

    pub fn into_inner(self) -> W {
        self.inner.into_inner()
    }
}
