//! Prepaid billing: tariff, balance, billing clock and the payment tracker.

mod clock;
mod purse;
mod tracker;

use std::time::Duration;

pub use clock::BillingClock;
pub use purse::Purse;
pub use tracker::PaymentTracker;

use crate::config::ApplianceConfig;

/// Price and length of one billing tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tariff {
    pub tick_cost: u64,
    pub tick_duration: Duration,
}

impl Tariff {
    pub fn new(tick_cost: u64, tick_duration: Duration) -> Self {
        Self {
            tick_cost,
            tick_duration,
        }
    }

    /// Whole minutes in one tick.
    pub fn tick_minutes(&self) -> u64 {
        self.tick_duration.as_secs() / 60
    }

    /// Whole minutes of service `balance` pays for.
    pub fn minutes_covered(&self, balance: u64) -> u64 {
        balance
            .checked_div(self.tick_cost)
            .unwrap_or(0)
            .saturating_mul(self.tick_minutes())
    }
}

impl From<&ApplianceConfig> for Tariff {
    fn from(config: &ApplianceConfig) -> Self {
        Self::new(config.tick_cost, config.tick_duration())
    }
}
