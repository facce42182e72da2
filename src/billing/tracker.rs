//! Payment tracker: balance, deposit-address binding and the billing clock.
//!
//! The tracker is owned by the session controller and only ever touched
//! from its event loop, so every operation runs to completion before the
//! next tick, toggle or notification is looked at. That is what makes
//! [`pay_tick`](PaymentTracker::pay_tick) an atomic check-and-decrement.

use std::collections::{HashSet, VecDeque};
use std::sync::Arc;

use crate::billing::{BillingClock, Purse};
use crate::config::AddressRotation;
use crate::display::{OutputSerializer, Splash};
use crate::ledger::{Ledger, LedgerError, PaymentNotice};
use crate::state::PaymentWriter;

const SEEN_REFS: usize = 256;

pub struct PaymentTracker {
    ledger: Arc<dyn Ledger>,
    writer: PaymentWriter,
    display: OutputSerializer,
    rotation: AddressRotation,
    purse: Purse,
    /// Address currently subscribed and advertised.
    binding: Option<String>,
    clock: BillingClock,
    seen: SeenRefs,
}

impl PaymentTracker {
    pub fn new(
        ledger: Arc<dyn Ledger>,
        writer: PaymentWriter,
        display: OutputSerializer,
        tick_cost: u64,
        rotation: AddressRotation,
        clock: BillingClock,
    ) -> Self {
        writer.set_balance(0);
        Self {
            ledger,
            writer,
            display,
            rotation,
            purse: Purse::new(tick_cost),
            binding: None,
            clock,
            seen: SeenRefs::new(SEEN_REFS),
        }
    }

    pub fn balance(&self) -> u64 {
        self.purse.balance()
    }

    pub fn tick_cost(&self) -> u64 {
        self.purse.tick_cost()
    }

    pub fn binding(&self) -> Option<&str> {
        self.binding.as_deref()
    }

    /// Request a deposit address and move the subscription to it if it changed.
    ///
    /// Returns whether the binding changed. On error the previous binding is
    /// kept when it is still subscribed, otherwise no address is advertised.
    pub async fn refresh_address(&mut self) -> Result<bool, LedgerError> {
        tracing::info!("Requesting deposit address");
        let address = match self.ledger.new_deposit_address().await {
            Ok(address) => address,
            Err(e) => return Err(self.ledger_failed(e)),
        };

        if self.binding.as_deref() == Some(address.as_str()) {
            tracing::debug!(address = %address, "Deposit address unchanged");
            self.writer.clear_fault();
            return Ok(false);
        }

        if let Some(old) = self.binding.take() {
            if let Err(e) = self.ledger.unsubscribe(&old).await {
                // Still watching the old address, so keep advertising it.
                self.binding = Some(old);
                return Err(self.ledger_failed(e));
            }
            self.writer.set_address(None);
        }

        if let Err(e) = self.ledger.subscribe(&address).await {
            return Err(self.ledger_failed(e));
        }

        tracing::info!(address = %address, "Deposit address bound");
        self.writer.set_address(Some(address.clone()));
        self.writer.clear_fault();
        self.binding = Some(address);
        self.display.request_refresh();
        Ok(true)
    }

    /// Pay one tick if affordable. Never errors; a short balance is untouched.
    pub fn pay_tick(&mut self) -> bool {
        if !self.purse.try_debit() {
            tracing::info!(
                balance = self.purse.balance(),
                tick_cost = self.purse.tick_cost(),
                "Tick unaffordable"
            );
            return false;
        }

        tracing::debug!(balance = self.purse.balance(), "Tick paid");
        self.writer.set_balance(self.purse.balance());
        self.display.request_refresh();
        true
    }

    /// Give back one tick paid for service that could not be delivered.
    pub fn refund_tick(&mut self) {
        let balance = self.purse.credit(self.purse.tick_cost());
        tracing::info!(balance, "Tick refunded");
        self.writer.set_balance(balance);
        self.display.request_refresh();
    }

    /// Add funds to the balance and return the new balance.
    pub fn credit(&mut self, amount: u64) -> u64 {
        let balance = self.purse.credit(amount);
        self.writer.set_balance(balance);
        self.display.request_refresh();
        balance
    }

    /// Reconcile a feed notice against the ledger and credit its value.
    ///
    /// Notices for an address other than the current binding, or for a
    /// transaction already credited, are ignored. Returns the credited amount.
    pub async fn on_payment_notification(
        &mut self,
        notice: &PaymentNotice,
    ) -> Result<u64, LedgerError> {
        if self.binding.as_deref() != Some(notice.address.as_str()) {
            tracing::debug!(address = %notice.address, "Notice for stale address ignored");
            return Ok(0);
        }
        if self.seen.contains(&notice.tx_ref) {
            tracing::debug!(tx = %notice.tx_ref, "Duplicate notice ignored");
            return Ok(0);
        }

        self.display.splash(Splash::processing_payment());

        let transactions = match self.ledger.fetch_transactions(&notice.tx_ref).await {
            Ok(transactions) => transactions,
            Err(e) => return Err(self.ledger_failed(e)),
        };
        self.seen.insert(&notice.tx_ref);
        self.writer.clear_fault();

        let total = transactions
            .iter()
            .fold(0i64, |acc, tx| acc.saturating_add(tx.value));
        let credited = u64::try_from(total).unwrap_or(0);
        if credited == 0 {
            tracing::warn!(tx = %notice.tx_ref, total, "Notice carried no incoming value");
            self.display.request_refresh();
            return Ok(0);
        }

        let balance = self.credit(credited);
        tracing::info!(tx = %notice.tx_ref, credited, balance, "Payment credited");

        // The credit stands even if rotation fails; the fault is already set.
        if self.rotation == AddressRotation::PerPayment {
            if let Err(e) = self.refresh_address().await {
                tracing::warn!(error = %e, "Address rotation after payment failed");
            }
        }
        Ok(credited)
    }

    /// Arm the billing clock. No-op if already armed.
    pub fn start_billing(&mut self) -> bool {
        let armed = self.clock.arm();
        if armed {
            tracing::info!("Billing started");
        }
        armed
    }

    /// Disarm the billing clock. No-op if not armed.
    pub fn stop_billing(&mut self) -> bool {
        let disarmed = self.clock.disarm();
        if disarmed {
            tracing::info!("Billing stopped");
        }
        disarmed
    }

    pub fn is_billing(&self) -> bool {
        self.clock.is_armed()
    }

    pub fn billing_epoch(&self) -> Option<u64> {
        self.clock.epoch()
    }

    pub fn accepts_tick(&self, epoch: u64) -> bool {
        self.clock.accepts(epoch)
    }

    /// Stop billing and drop the address binding. Safe to call repeatedly.
    pub async fn dispose(&mut self) {
        self.stop_billing();
        if let Some(address) = self.binding.take() {
            if let Err(e) = self.ledger.unsubscribe(&address).await {
                tracing::warn!(address = %address, error = %e, "Unsubscribe during dispose failed");
            }
        }
    }

    fn ledger_failed(&mut self, e: LedgerError) -> LedgerError {
        tracing::error!(error = %e, "Ledger call failed");
        if self.binding.is_none() {
            self.writer.set_address(None);
        }
        self.writer.set_fault(format!("ledger unreachable: {}", e));
        self.display.request_refresh();
        e
    }
}

/// Bounded memory of credited transaction references.
struct SeenRefs {
    order: VecDeque<String>,
    set: HashSet<String>,
    capacity: usize,
}

impl SeenRefs {
    fn new(capacity: usize) -> Self {
        Self {
            order: VecDeque::with_capacity(capacity),
            set: HashSet::with_capacity(capacity),
            capacity,
        }
    }

    fn contains(&self, tx_ref: &str) -> bool {
        self.set.contains(tx_ref)
    }

    fn insert(&mut self, tx_ref: &str) {
        if !self.set.insert(tx_ref.to_string()) {
            return;
        }
        self.order.push_back(tx_ref.to_string());
        if self.order.len() > self.capacity {
            if let Some(oldest) = self.order.pop_front() {
                self.set.remove(&oldest);
            }
        }
    }
}
