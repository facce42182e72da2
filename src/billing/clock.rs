use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

use crate::session::{SessionHandle, WeakSessionHandle};

/// Recurring billing timer feeding `Tick` events into the session queue.
///
/// Arming an armed clock is a no-op. Every arming gets a fresh epoch and
/// ticks carry it, so a tick that was already queued when the clock was
/// disarmed is recognised as stale by [`accepts`](BillingClock::accepts).
///
/// The clock only holds a weak handle, so it never keeps the session queue
/// open on its own.
pub struct BillingClock {
    period: Duration,
    session: WeakSessionHandle,
    armed: Option<Armed>,
    next_epoch: u64,
}

struct Armed {
    epoch: u64,
    task: JoinHandle<()>,
}

impl BillingClock {
    pub fn new(period: Duration, session: &SessionHandle) -> Self {
        Self {
            period,
            session: session.downgrade(),
            armed: None,
            next_epoch: 1,
        }
    }

    /// Start ticking. Returns false if the clock was already armed.
    pub fn arm(&mut self) -> bool {
        if self.armed.is_some() {
            return false;
        }

        let epoch = self.next_epoch;
        self.next_epoch += 1;

        let period = self.period;
        let session = self.session.clone();
        let task = tokio::spawn(async move {
            let mut ticks = interval_at(Instant::now() + period, period);
            ticks.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticks.tick().await;
                let Some(session) = session.upgrade() else {
                    tracing::debug!(epoch, "Session queue closed, billing clock exiting");
                    break;
                };
                if session.tick(epoch).await.is_err() {
                    tracing::debug!(epoch, "Session gone, billing clock exiting");
                    break;
                }
            }
        });

        tracing::debug!(epoch, period_ms = period.as_millis() as u64, "Billing clock armed");
        self.armed = Some(Armed { epoch, task });
        true
    }

    /// Stop ticking. Returns false if the clock was not armed.
    ///
    /// After this returns, [`accepts`](Self::accepts) is false for every
    /// tick of the stopped epoch, including ones still in the queue.
    pub fn disarm(&mut self) -> bool {
        match self.armed.take() {
            Some(armed) => {
                armed.task.abort();
                tracing::debug!(epoch = armed.epoch, "Billing clock disarmed");
                true
            }
            None => false,
        }
    }

    pub fn is_armed(&self) -> bool {
        self.armed.is_some()
    }

    pub fn epoch(&self) -> Option<u64> {
        self.armed.as_ref().map(|armed| armed.epoch)
    }

    /// Whether a tick stamped with `epoch` belongs to the running session.
    pub fn accepts(&self, epoch: u64) -> bool {
        self.epoch() == Some(epoch)
    }
}

impl Drop for BillingClock {
    fn drop(&mut self) {
        if let Some(armed) = self.armed.take() {
            armed.task.abort();
        }
    }
}
