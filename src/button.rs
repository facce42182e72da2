//! Physical toggle button.
//!
//! The button driver is an external process that writes one line per press
//! (a GPIO line watcher, a FIFO fed by a debouncer, ...). Each non-empty line
//! is forwarded as a toggle. Blank lines are ignored.

use std::io;
use std::path::PathBuf;
use std::time::Duration;

use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};

use crate::session::SessionHandle;
use crate::shutdown::ShutdownHandle;

const REOPEN_DELAY: Duration = Duration::from_secs(1);

/// Forward presses from `reader` until EOF. Returns the number forwarded.
pub async fn forward_presses<R>(reader: R, session: &SessionHandle) -> io::Result<usize>
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = reader.lines();
    let mut presses = 0;

    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        tracing::debug!("Button pressed");
        if session.toggle().await.is_err() {
            break;
        }
        presses += 1;
    }

    Ok(presses)
}

pub struct ButtonSource {
    path: PathBuf,
}

impl ButtonSource {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// Read presses, reopening the source on EOF, until shutdown.
    pub async fn run(self, session: SessionHandle, shutdown: ShutdownHandle) {
        tracing::info!(path = %self.path.display(), "Button source attached");

        loop {
            let result = tokio::select! {
                _ = shutdown.wait() => break,
                result = self.read_once(&session) => result,
            };
            match result {
                Ok(presses) => tracing::debug!(presses, "Button source reached EOF"),
                Err(e) => {
                    tracing::warn!(path = %self.path.display(), error = %e, "Button source read failed")
                }
            }
            if session.is_closed() {
                break;
            }

            tokio::select! {
                _ = shutdown.wait() => break,
                _ = tokio::time::sleep(REOPEN_DELAY) => {}
            }
        }

        tracing::debug!("Button source stopped");
    }

    async fn read_once(&self, session: &SessionHandle) -> io::Result<usize> {
        let file = tokio::fs::File::open(&self.path).await?;
        forward_presses(BufReader::new(file), session).await
    }
}
