use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;

use super::{DisplayError, DisplaySink, Frame};

/// Writes frames to the log. Used when no panel is attached.
pub struct LogSink {
    delay: Duration,
}

impl LogSink {
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }
}

#[async_trait]
impl DisplaySink for LogSink {
    async fn render(&self, frame: &Frame) -> Result<(), DisplayError> {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        for line in frame.to_string().lines() {
            tracing::info!(target: "acmeter::display", "{}", line);
        }
        Ok(())
    }
}

/// Replaces a file with the text rendering of each frame.
///
/// A panel driver (e-ink helper, framebuffer daemon) watches the file.
pub struct FileSink {
    path: PathBuf,
    delay: Duration,
}

impl FileSink {
    pub fn new(path: PathBuf, delay: Duration) -> Self {
        Self { path, delay }
    }
}

#[async_trait]
impl DisplaySink for FileSink {
    async fn render(&self, frame: &Frame) -> Result<(), DisplayError> {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        // Write-then-rename so a reader never sees a torn frame.
        let tmp = self.path.with_extension("tmp");
        let text = format!("{}\n", frame);
        tokio::fs::write(&tmp, text)
            .await
            .map_err(|e| DisplayError::Write {
                path: tmp.clone(),
                source: e,
            })?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .map_err(|e| DisplayError::Write {
                path: self.path.clone(),
                source: e,
            })?;
        tracing::debug!(path = %self.path.display(), "Frame written");
        Ok(())
    }
}
