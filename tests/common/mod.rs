//! Shared test utilities: recording appliance, scripted ledger, counting sink.

#![allow(dead_code, unused_imports)]

pub mod mock_server;

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use acmeter::billing::{BillingClock, PaymentTracker, Tariff};
use acmeter::config::AddressRotation;
use acmeter::device::{Appliance, DeviceError};
use acmeter::display::{DisplayError, DisplaySink, Frame, OutputSerializer};
use acmeter::ledger::{Ledger, LedgerError, Transaction};
use acmeter::session::{self, SessionController, SessionEvent, SessionHandle};
use acmeter::state::SharedState;
use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::mpsc;

pub const TICK: Duration = Duration::from_secs(60);

/// A power command the appliance received.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PowerCall {
    On,
    Off,
}

/// Appliance that records power calls and fails on demand.
#[derive(Default)]
pub struct MockAppliance {
    calls: Mutex<Vec<PowerCall>>,
    pub fail_power_on: AtomicBool,
    pub fail_power_off: AtomicBool,
    temperature: Mutex<Option<f32>>,
}

impl MockAppliance {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn calls(&self) -> Vec<PowerCall> {
        self.calls.lock().clone()
    }

    pub fn set_temperature(&self, celsius: Option<f32>) {
        *self.temperature.lock() = celsius;
    }

    pub fn fail_on(&self, fail: bool) {
        self.fail_power_on.store(fail, Ordering::SeqCst);
    }

    pub fn fail_off(&self, fail: bool) {
        self.fail_power_off.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl Appliance for MockAppliance {
    async fn power_on(&self) -> Result<(), DeviceError> {
        self.calls.lock().push(PowerCall::On);
        if self.fail_power_on.load(Ordering::SeqCst) {
            return Err(DeviceError::Rejected("ret=PARAM NG".to_string()));
        }
        Ok(())
    }

    async fn power_off(&self) -> Result<(), DeviceError> {
        self.calls.lock().push(PowerCall::Off);
        if self.fail_power_off.load(Ordering::SeqCst) {
            return Err(DeviceError::Timeout(Duration::from_secs(10)));
        }
        Ok(())
    }

    async fn read_temperature(&self) -> Result<f32, DeviceError> {
        (*self.temperature.lock()).ok_or(DeviceError::MissingTemperature)
    }
}

/// Ledger with a queue of addresses, canned transactions and a call log.
#[derive(Default)]
pub struct ScriptedLedger {
    addresses: Mutex<VecDeque<String>>,
    issued: AtomicUsize,
    transactions: Mutex<HashMap<String, Vec<Transaction>>>,
    subscribed: Mutex<HashSet<String>>,
    log: Mutex<Vec<String>>,
    pub fail_address: AtomicBool,
    pub fail_fetch: AtomicBool,
    pub fail_unsubscribe: AtomicBool,
}

impl ScriptedLedger {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Queue the next addresses to hand out. Once empty, fresh `ADDR<n>`
    /// values are generated.
    pub fn queue_addresses(&self, addresses: &[&str]) {
        self.addresses
            .lock()
            .extend(addresses.iter().map(|a| a.to_string()));
    }

    pub fn add_transactions(&self, tx_ref: &str, values: &[i64]) {
        let txs = values
            .iter()
            .enumerate()
            .map(|(i, value)| Transaction {
                hash: format!("{}-{}", tx_ref, i),
                value: *value,
            })
            .collect();
        self.transactions.lock().insert(tx_ref.to_string(), txs);
    }

    pub fn subscribed(&self) -> HashSet<String> {
        self.subscribed.lock().clone()
    }

    pub fn log(&self) -> Vec<String> {
        self.log.lock().clone()
    }

    pub fn fetch_count(&self) -> usize {
        self.log().iter().filter(|e| e.starts_with("fetch:")).count()
    }

    fn unavailable() -> LedgerError {
        LedgerError::Status {
            status: 503,
            body: "node syncing".to_string(),
        }
    }
}

#[async_trait]
impl Ledger for ScriptedLedger {
    async fn new_deposit_address(&self) -> Result<String, LedgerError> {
        self.log.lock().push("address".to_string());
        if self.fail_address.load(Ordering::SeqCst) {
            return Err(Self::unavailable());
        }
        let next = self.addresses.lock().pop_front();
        Ok(next.unwrap_or_else(|| {
            let n = self.issued.fetch_add(1, Ordering::SeqCst) + 1;
            format!("ADDR{}", n)
        }))
    }

    async fn fetch_transactions(&self, tx_ref: &str) -> Result<Vec<Transaction>, LedgerError> {
        self.log.lock().push(format!("fetch:{}", tx_ref));
        if self.fail_fetch.load(Ordering::SeqCst) {
            return Err(Self::unavailable());
        }
        Ok(self
            .transactions
            .lock()
            .get(tx_ref)
            .cloned()
            .unwrap_or_default())
    }

    async fn subscribe(&self, address: &str) -> Result<(), LedgerError> {
        self.log.lock().push(format!("subscribe:{}", address));
        self.subscribed.lock().insert(address.to_string());
        Ok(())
    }

    async fn unsubscribe(&self, address: &str) -> Result<(), LedgerError> {
        self.log.lock().push(format!("unsubscribe:{}", address));
        if self.fail_unsubscribe.load(Ordering::SeqCst) {
            return Err(Self::unavailable());
        }
        if !self.subscribed.lock().remove(address) {
            return Err(LedgerError::NotSubscribed(address.to_string()));
        }
        Ok(())
    }
}

/// Sink that keeps every frame and can be slowed down.
#[derive(Default)]
pub struct CountingSink {
    frames: Mutex<Vec<Frame>>,
    delay: Duration,
    in_flight: AtomicUsize,
    pub max_in_flight: AtomicUsize,
}

impl CountingSink {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn with_delay(delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            delay,
            ..Self::default()
        })
    }

    pub fn frames(&self) -> Vec<Frame> {
        self.frames.lock().clone()
    }

    pub fn count(&self) -> usize {
        self.frames.lock().len()
    }
}

#[async_trait]
impl DisplaySink for CountingSink {
    async fn render(&self, frame: &Frame) -> Result<(), DisplayError> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.frames.lock().push(frame.clone());
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        Ok(())
    }
}

/// A fully wired session with mock collaborators.
pub struct Fixture {
    pub shared: SharedState,
    pub appliance: Arc<MockAppliance>,
    pub ledger: Arc<ScriptedLedger>,
    pub sink: Arc<CountingSink>,
    pub display: OutputSerializer,
    pub session: SessionHandle,
    pub tariff: Tariff,
}

impl Fixture {
    /// Build the collaborators and a controller that has not booted yet.
    pub fn new(tick_cost: u64, rotation: AddressRotation) -> (Self, SessionController) {
        let shared = SharedState::new();
        let appliance = MockAppliance::new();
        let ledger = ScriptedLedger::new();
        let sink = CountingSink::new();
        let tariff = Tariff::new(tick_cost, TICK);
        let display = OutputSerializer::new(sink.clone(), shared.clone(), tariff);

        let (session, events) = session::channel();
        let clock = BillingClock::new(TICK, &session);
        let tracker = PaymentTracker::new(
            ledger.clone(),
            shared.payment_writer(),
            display.clone(),
            tick_cost,
            rotation,
            clock,
        );
        let controller = SessionController::new(
            appliance.clone(),
            tracker,
            shared.status_writer(),
            display.clone(),
            events,
        );

        (
            Self {
                shared,
                appliance,
                ledger,
                sink,
                display,
                session,
                tariff,
            },
            controller,
        )
    }
}
