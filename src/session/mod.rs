//! Metered session: the controller state machine and its event queue.
//!
//! ```text
//!   button ────────┐                                      ┌──▶ Appliance
//!   dashboard ─────┤                                      │
//!   billing clock ─┼──▶ SessionEvent ──▶ SessionController ┼──▶ PaymentTracker
//!   ledger feed ───┘       queue                          │
//!                                                         └──▶ OutputSerializer
//! ```

mod controller;
mod event;
mod handle;

pub use controller::SessionController;
pub use event::{SessionEvent, ToggleOutcome};
pub use handle::{channel, SessionError, SessionHandle, WeakSessionHandle};
