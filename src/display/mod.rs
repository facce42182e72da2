//! Output path: frame model, render serialization and display sinks.

mod frame;
mod serializer;
mod sink;

use std::path::PathBuf;

use async_trait::async_trait;
use thiserror::Error;

pub use frame::{fee_label, format_balance, Frame, Splash, StatusFrame};
pub use serializer::{Latch, OutputSerializer};
pub use sink::{FileSink, LogSink};

/// Errors from a display sink.
#[derive(Debug, Error)]
pub enum DisplayError {
    #[error("Failed to write frame to '{path}': {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// A physical or virtual output device.
///
/// `render` may be slow; [`OutputSerializer`] guarantees it is never called
/// concurrently.
#[async_trait]
pub trait DisplaySink: Send + Sync {
    async fn render(&self, frame: &Frame) -> Result<(), DisplayError>;
}
