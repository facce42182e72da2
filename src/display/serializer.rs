//! Coalescing render queue.
//!
//! ```text
//!            request_refresh()             request_refresh()
//!   Idle ───────────────────▶ Rendering ─────────────────────▶ RenderingWithPending
//!    ▲                          │  ▲                                   │
//!    └──── render done ─────────┘  └────── render done (one more) ─────┘
//! ```
//!
//! Any number of requests that arrive during a render collapse into a single
//! trailing render, which reads the state as it is when it starts.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::watch;

use crate::billing::Tariff;
use crate::state::SharedState;

use super::{DisplaySink, Frame, Splash};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Latch {
    Idle,
    Rendering,
    RenderingWithPending,
}

/// Cloneable front end to the display; at most one render is ever in flight.
#[derive(Clone)]
pub struct OutputSerializer {
    inner: Arc<Inner>,
}

struct Inner {
    sink: Arc<dyn DisplaySink>,
    state: SharedState,
    tariff: Tariff,
    latch: watch::Sender<Latch>,
    splash: Mutex<Option<Splash>>,
    closed: AtomicBool,
    renders: AtomicU64,
}

impl OutputSerializer {
    pub fn new(sink: Arc<dyn DisplaySink>, state: SharedState, tariff: Tariff) -> Self {
        let (latch, _) = watch::channel(Latch::Idle);
        Self {
            inner: Arc::new(Inner {
                sink,
                state,
                tariff,
                latch,
                splash: Mutex::new(None),
                closed: AtomicBool::new(false),
                renders: AtomicU64::new(0),
            }),
        }
    }

    /// Ask for the current state to be shown. Never blocks.
    ///
    /// Must be called from within a tokio runtime.
    pub fn request_refresh(&self) {
        if self.is_closed() {
            return;
        }

        let mut start = false;
        self.inner.latch.send_modify(|latch| {
            *latch = match *latch {
                Latch::Idle => {
                    start = true;
                    Latch::Rendering
                }
                Latch::Rendering | Latch::RenderingWithPending => Latch::RenderingWithPending,
            };
        });

        if start {
            let inner = Arc::clone(&self.inner);
            tokio::spawn(async move { inner.render_loop().await });
        }
    }

    /// Show `splash` on the next render instead of the live state.
    ///
    /// A later splash set before that render replaces this one.
    pub fn splash(&self, splash: Splash) {
        if self.is_closed() {
            return;
        }
        tracing::debug!(image = %splash.image, "Splash queued");
        *self.inner.splash.lock() = Some(splash);
        self.request_refresh();
    }

    /// Resolve once no render is running or owed.
    pub async fn idle(&self) {
        let mut rx = self.inner.latch.subscribe();
        // The sender lives in `inner`, which `self` keeps alive.
        let _ = rx.wait_for(|latch| *latch == Latch::Idle).await;
    }

    /// Stop accepting refreshes. A render already in flight finishes but no
    /// trailing render is started.
    pub fn close(&self) {
        if !self.inner.closed.swap(true, Ordering::SeqCst) {
            tracing::debug!("Output serializer closed");
        }
    }

    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::SeqCst)
    }

    pub fn latch(&self) -> Latch {
        *self.inner.latch.borrow()
    }

    /// Number of renders completed so far, successful or not.
    pub fn render_count(&self) -> u64 {
        self.inner.renders.load(Ordering::SeqCst)
    }
}

impl Inner {
    async fn render_loop(self: Arc<Self>) {
        loop {
            let frame = self.next_frame();
            if let Err(e) = self.sink.render(&frame).await {
                tracing::warn!(error = %e, "Display render failed");
            }
            self.renders.fetch_add(1, Ordering::SeqCst);

            let closed = self.closed.load(Ordering::SeqCst);
            let mut again = false;
            self.latch.send_modify(|latch| {
                *latch = match *latch {
                    Latch::RenderingWithPending if !closed => {
                        again = true;
                        Latch::Rendering
                    }
                    _ => Latch::Idle,
                };
            });

            if !again {
                return;
            }
        }
    }

    fn next_frame(&self) -> Frame {
        match self.splash.lock().take() {
            Some(splash) => Frame::Splash(splash),
            None => Frame::status(&self.state.snapshot(), &self.tariff),
        }
    }
}
