//! The shared session record.
//!
//! One [`SharedState`] exists per process. Everyone can read a [`Snapshot`],
//! but each field has exactly one writer, expressed as a handle type:
//!
//! | Field | Writer |
//! |---|---|
//! | `status`, `appliance_fault` | [`StatusWriter`] (session controller) |
//! | `balance`, `address`, `ledger_fault` | [`PaymentWriter`] (payment tracker) |
//! | `temperature` | [`TemperatureWriter`] (probe) |
//!
//! Once [`SharedState::seal`] is called every writer becomes a no-op, so
//! results of calls that were in flight during teardown are dropped.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

/// Power state of the metered appliance as last confirmed by the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Status {
    Off,
    On,
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Status::Off => write!(f, "OFF"),
            Status::On => write!(f, "ON"),
        }
    }
}

/// Point-in-time copy of the shared record.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Snapshot {
    /// `None` until the boot-time power-off has been confirmed.
    pub status: Option<Status>,
    /// Prepaid balance in the ledger's minor unit.
    pub balance: u64,
    /// Room temperature in °C, `None` when unknown.
    pub temperature: Option<f32>,
    /// Deposit address currently advertised and watched.
    pub address: Option<String>,
    pub appliance_fault: Option<String>,
    pub ledger_fault: Option<String>,
}

impl Snapshot {
    /// First fault worth showing to the user, appliance problems first.
    pub fn fault(&self) -> Option<&str> {
        self.appliance_fault
            .as_deref()
            .or(self.ledger_fault.as_deref())
    }
}

struct StateCell {
    snapshot: RwLock<Snapshot>,
    sealed: AtomicBool,
}

/// Cheaply cloneable read handle to the shared record.
#[derive(Clone)]
pub struct SharedState {
    cell: Arc<StateCell>,
}

impl SharedState {
    pub fn new() -> Self {
        Self {
            cell: Arc::new(StateCell {
                snapshot: RwLock::new(Snapshot::default()),
                sealed: AtomicBool::new(false),
            }),
        }
    }

    pub fn snapshot(&self) -> Snapshot {
        self.cell.snapshot.read().clone()
    }

    /// Stop accepting writes. Idempotent.
    pub fn seal(&self) {
        if !self.cell.sealed.swap(true, Ordering::SeqCst) {
            tracing::debug!("Shared state sealed");
        }
    }

    pub fn status_writer(&self) -> StatusWriter {
        StatusWriter {
            cell: Arc::clone(&self.cell),
        }
    }

    pub fn payment_writer(&self) -> PaymentWriter {
        PaymentWriter {
            cell: Arc::clone(&self.cell),
        }
    }

    pub fn temperature_writer(&self) -> TemperatureWriter {
        TemperatureWriter {
            cell: Arc::clone(&self.cell),
        }
    }
}

impl Default for SharedState {
    fn default() -> Self {
        Self::new()
    }
}

impl StateCell {
    /// Apply `f` unless sealed. Returns whether the write happened.
    fn write(&self, f: impl FnOnce(&mut Snapshot)) -> bool {
        let mut guard = self.snapshot.write();
        // Checked under the lock so a seal racing with a write is ordered.
        if self.sealed.load(Ordering::SeqCst) {
            return false;
        }
        f(&mut guard);
        true
    }
}

/// Writer for `status` and `appliance_fault`.
pub struct StatusWriter {
    cell: Arc<StateCell>,
}

impl StatusWriter {
    pub fn set_status(&self, status: Status) -> bool {
        self.cell.write(|s| s.status = Some(status))
    }

    pub fn set_fault(&self, fault: impl Into<String>) -> bool {
        let fault = fault.into();
        self.cell.write(|s| s.appliance_fault = Some(fault))
    }

    pub fn clear_fault(&self) -> bool {
        self.cell.write(|s| s.appliance_fault = None)
    }

    /// Whether teardown has sealed the record.
    pub fn is_sealed(&self) -> bool {
        self.cell.sealed.load(Ordering::SeqCst)
    }
}

/// Writer for `balance`, `address` and `ledger_fault`.
pub struct PaymentWriter {
    cell: Arc<StateCell>,
}

impl PaymentWriter {
    pub fn set_balance(&self, balance: u64) -> bool {
        self.cell.write(|s| s.balance = balance)
    }

    pub fn set_address(&self, address: Option<String>) -> bool {
        self.cell.write(|s| s.address = address)
    }

    pub fn set_fault(&self, fault: impl Into<String>) -> bool {
        let fault = fault.into();
        self.cell.write(|s| s.ledger_fault = Some(fault))
    }

    pub fn clear_fault(&self) -> bool {
        self.cell.write(|s| s.ledger_fault = None)
    }
}

/// Writer for `temperature`.
pub struct TemperatureWriter {
    cell: Arc<StateCell>,
}

impl TemperatureWriter {
    /// Store a reading. Returns true only when the visible value changed.
    pub fn set_temperature(&self, temperature: Option<f32>) -> bool {
        let mut changed = false;
        self.cell.write(|s| {
            if s.temperature != temperature {
                s.temperature = temperature;
                changed = true;
            }
        });
        changed
    }
}
