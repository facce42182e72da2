use std::sync::Arc;
use std::time::Duration;

use tokio::time::MissedTickBehavior;

use crate::display::OutputSerializer;
use crate::shutdown::ShutdownHandle;
use crate::state::TemperatureWriter;

use super::Appliance;

/// Periodic room-temperature sampler.
///
/// Readings only reach the display when the value actually changed. A failed
/// read clears the temperature rather than leaving a stale number on screen.
pub struct TemperatureProbe {
    appliance: Arc<dyn Appliance>,
    writer: TemperatureWriter,
    display: OutputSerializer,
    interval: Duration,
}

impl TemperatureProbe {
    pub fn new(
        appliance: Arc<dyn Appliance>,
        writer: TemperatureWriter,
        display: OutputSerializer,
        interval: Duration,
    ) -> Self {
        Self {
            appliance,
            writer,
            display,
            interval,
        }
    }

    /// Take one reading. Returns whether the stored temperature changed.
    pub async fn measure(&self) -> bool {
        let reading = match self.appliance.read_temperature().await {
            Ok(celsius) => Some(celsius),
            Err(e) => {
                tracing::warn!(error = %e, "Temperature read failed");
                None
            }
        };

        if self.display.is_closed() {
            return false;
        }

        let changed = self.writer.set_temperature(reading);
        if changed {
            tracing::debug!(temperature = ?reading, "Temperature changed");
            self.display.request_refresh();
        }
        changed
    }

    /// Sample immediately, then every interval until shutdown.
    pub async fn run(self, shutdown: ShutdownHandle) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.measure().await;
                }
                _ = shutdown.wait() => {
                    tracing::debug!("Temperature probe stopped");
                    return;
                }
            }
        }
    }
}
