use serde::Serialize;
use tokio::sync::oneshot;

use crate::ledger::PaymentNotice;

/// Everything the session controller reacts to, in arrival order.
#[derive(Debug)]
pub enum SessionEvent {
    /// Button press or dashboard toggle.
    Toggle {
        respond_to: Option<oneshot::Sender<ToggleOutcome>>,
    },
    /// Billing clock boundary, stamped with the clock's epoch.
    Tick { epoch: u64 },
    Payment(PaymentNotice),
    Shutdown { respond_to: oneshot::Sender<()> },
}

/// Result of handling one toggle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ToggleOutcome {
    TurnedOn,
    TurnedOff,
    InsufficientCredit,
    Failed { reason: String },
}
