//! Session controller state machine.
//!
//! | Current | Trigger | Guard | Action | Next |
//! |---|---|---|---|---|
//! | OFF | toggle | tick paid | power on, start billing | ON |
//! | OFF | toggle | tick unaffordable | insufficient-credit splash | OFF |
//! | ON | toggle | | power off, stop billing | OFF |
//! | ON | tick | tick paid | | ON |
//! | ON | tick | tick unaffordable | stop billing, power off, splash | OFF |
//!
//! `status` only changes after the appliance confirmed the command. When a
//! power call fails the status keeps the last confirmed state and an
//! appliance fault is shown instead.

use std::ops::ControlFlow;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::Instant;

use crate::billing::PaymentTracker;
use crate::device::Appliance;
use crate::display::{OutputSerializer, Splash};
use crate::ledger::PaymentNotice;
use crate::state::{Status, StatusWriter};

use super::event::{SessionEvent, ToggleOutcome};

const ADDRESS_RETRY: Duration = Duration::from_secs(30);

pub struct SessionController {
    appliance: Arc<dyn Appliance>,
    tracker: PaymentTracker,
    status: StatusWriter,
    display: OutputSerializer,
    events: mpsc::Receiver<SessionEvent>,
    current: Option<Status>,
    address_retry: Duration,
}

impl SessionController {
    pub fn new(
        appliance: Arc<dyn Appliance>,
        tracker: PaymentTracker,
        status: StatusWriter,
        display: OutputSerializer,
        events: mpsc::Receiver<SessionEvent>,
    ) -> Self {
        Self {
            appliance,
            tracker,
            status,
            display,
            events,
            current: None,
            address_retry: ADDRESS_RETRY,
        }
    }

    /// How long to wait before asking the ledger again after a failed
    /// address request.
    pub fn with_address_retry(mut self, retry: Duration) -> Self {
        self.address_retry = retry;
        self
    }

    pub fn status(&self) -> Option<Status> {
        self.current
    }

    pub fn tracker(&self) -> &PaymentTracker {
        &self.tracker
    }

    pub fn tracker_mut(&mut self) -> &mut PaymentTracker {
        &mut self.tracker
    }

    /// Force a known state and bind a deposit address.
    ///
    /// The appliance cannot report its power state, so it is switched off
    /// once regardless of what it was doing.
    pub async fn boot(&mut self) {
        tracing::info!("Session controller booting");
        if self.power_off().await.is_ok() {
            tracing::info!("Appliance forced off at boot");
        }
        if let Err(e) = self.tracker.refresh_address().await {
            tracing::error!(error = %e, "No deposit address, payments cannot be accepted yet");
        }
    }

    /// Boot, then consume events until shutdown or until every
    /// [`SessionHandle`](super::SessionHandle) is dropped.
    pub async fn run(mut self) {
        self.boot().await;

        // One deadline across iterations: events must not push the retry back.
        let retry = tokio::time::sleep(self.address_retry);
        tokio::pin!(retry);

        loop {
            let event = if self.tracker.binding().is_some() {
                self.events.recv().await
            } else {
                tokio::select! {
                    event = self.events.recv() => event,
                    () = &mut retry => {
                        if let Err(e) = self.tracker.refresh_address().await {
                            tracing::warn!(error = %e, "Deposit address retry failed");
                        }
                        retry.as_mut().reset(Instant::now() + self.address_retry);
                        continue;
                    }
                }
            };

            let Some(event) = event else {
                tracing::info!("Session queue closed");
                self.teardown().await;
                return;
            };
            if self.dispatch(event).await.is_break() {
                return;
            }
        }
    }

    /// Handle one event to completion.
    ///
    /// Once the shared record is sealed only `Shutdown` is acted on; anything
    /// queued ahead of it is dropped and toggle callers see the queue closed.
    pub async fn dispatch(&mut self, event: SessionEvent) -> ControlFlow<()> {
        if self.status.is_sealed() && !matches!(event, SessionEvent::Shutdown { .. }) {
            tracing::debug!(?event, "Teardown in progress, event dropped");
            return ControlFlow::Continue(());
        }

        match event {
            SessionEvent::Toggle { respond_to } => {
                let outcome = self.toggle().await;
                if let Some(respond_to) = respond_to {
                    if respond_to.send(outcome).is_err() {
                        tracing::trace!("Toggle response dropped (receiver gone)");
                    }
                }
            }
            SessionEvent::Tick { epoch } => self.tick(epoch).await,
            SessionEvent::Payment(notice) => self.payment(&notice).await,
            SessionEvent::Shutdown { respond_to } => {
                self.teardown().await;
                if respond_to.send(()).is_err() {
                    tracing::trace!("Shutdown response dropped (receiver gone)");
                }
                return ControlFlow::Break(());
            }
        }
        ControlFlow::Continue(())
    }

    pub async fn toggle(&mut self) -> ToggleOutcome {
        match self.current {
            // Boot-time power-off never succeeded; establish a known state.
            None => match self.power_off().await {
                Ok(()) => ToggleOutcome::TurnedOff,
                Err(reason) => ToggleOutcome::Failed { reason },
            },
            Some(Status::Off) => self.start_session().await,
            Some(Status::On) => self.end_session().await,
        }
    }

    pub async fn tick(&mut self, epoch: u64) {
        if !self.tracker.accepts_tick(epoch) || self.current != Some(Status::On) {
            tracing::debug!(epoch, "Stale tick ignored");
            return;
        }
        if self.tracker.pay_tick() {
            return;
        }

        tracing::info!(balance = self.tracker.balance(), "Credit exhausted, ending session");
        self.display.splash(Splash::insufficient_credit());
        self.tracker.stop_billing();
        if self.power_off().await.is_err() {
            tracing::error!("Appliance may still be running after credit ran out");
        }
    }

    pub async fn payment(&mut self, notice: &PaymentNotice) {
        if let Err(e) = self.tracker.on_payment_notification(notice).await {
            tracing::warn!(tx = %notice.tx_ref, error = %e, "Payment reconciliation failed");
        }
    }

    /// Stop billing, switch the appliance off and release the address.
    ///
    /// Appliance errors are logged and never stop the rest of teardown.
    pub async fn teardown(&mut self) {
        tracing::info!("Session controller shutting down");
        self.display.close();
        self.tracker.stop_billing();
        match self.appliance.power_off().await {
            Ok(()) => tracing::info!("Appliance switched off for shutdown"),
            Err(e) => tracing::error!(error = %e, "Failed to switch appliance off during shutdown"),
        }
        self.tracker.dispose().await;
    }

    async fn start_session(&mut self) -> ToggleOutcome {
        if !self.tracker.pay_tick() {
            self.display.splash(Splash::insufficient_credit());
            return ToggleOutcome::InsufficientCredit;
        }

        match self.appliance.power_on().await {
            Ok(()) => {
                self.set_status(Status::On);
                self.tracker.start_billing();
                tracing::info!(balance = self.tracker.balance(), "Session started");
                ToggleOutcome::TurnedOn
            }
            Err(e) => {
                tracing::error!(error = %e, "Power on failed");
                self.tracker.refund_tick();
                self.appliance_failed(&e.to_string());
                ToggleOutcome::Failed {
                    reason: e.to_string(),
                }
            }
        }
    }

    async fn end_session(&mut self) -> ToggleOutcome {
        match self.power_off().await {
            Ok(()) => {
                tracing::info!(balance = self.tracker.balance(), "Session ended by user");
                ToggleOutcome::TurnedOff
            }
            Err(reason) => ToggleOutcome::Failed { reason },
        }
    }

    /// Switch off; on success stop billing and record OFF.
    async fn power_off(&mut self) -> Result<(), String> {
        match self.appliance.power_off().await {
            Ok(()) => {
                self.tracker.stop_billing();
                self.set_status(Status::Off);
                Ok(())
            }
            Err(e) => {
                tracing::error!(error = %e, "Power off failed");
                let reason = e.to_string();
                self.appliance_failed(&reason);
                Err(reason)
            }
        }
    }

    fn set_status(&mut self, status: Status) {
        self.current = Some(status);
        self.status.set_status(status);
        self.status.clear_fault();
        self.display.request_refresh();
    }

    fn appliance_failed(&mut self, reason: &str) {
        self.status
            .set_fault(format!("appliance unreachable: {}", reason));
        self.display.request_refresh();
    }
}
