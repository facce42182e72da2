//! Appliance facade: power control and temperature sensing.
//!
//! The session core only sees the [`Appliance`] trait. [`HttpAppliance`]
//! talks to the vendor's LAN API; tests substitute recording mocks.

mod http;
mod probe;

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

pub use http::{parse_sensor_info, HttpAppliance};
pub use probe::TemperatureProbe;

/// Errors from appliance calls.
#[derive(Debug, Error)]
pub enum DeviceError {
    /// The HTTP request could not be completed.
    #[error("Appliance request to '{url}' failed: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// The appliance answered but refused the command.
    #[error("Appliance rejected command: {0}")]
    Rejected(String),

    /// The call did not finish within the configured bound.
    #[error("Appliance did not answer within {}s", .0.as_secs())]
    Timeout(Duration),

    /// The sensor response carried no room temperature.
    #[error("Sensor response has no room temperature")]
    MissingTemperature,
}

/// Narrow interface to the metered appliance.
///
/// Calls are fallible remote operations and are never retried by the caller.
#[async_trait]
pub trait Appliance: Send + Sync {
    async fn power_on(&self) -> Result<(), DeviceError>;

    async fn power_off(&self) -> Result<(), DeviceError>;

    /// Current room temperature in °C.
    async fn read_temperature(&self) -> Result<f32, DeviceError>;
}
