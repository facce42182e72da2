use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use tokio::time::timeout;

use crate::config::ApplianceConfig;
use crate::device::{Appliance, DeviceError};

// Values sent alongside pow=0. The unit ignores them but requires the fields.
const OFF_MODE: u8 = 2;
const OFF_TEMP: u8 = 26;

/// Appliance reached over its LAN HTTP API (`/aircon/*` endpoints).
pub struct HttpAppliance {
    client: Client,
    base_url: String,
    enabled: bool,
    mode: u8,
    target_temp: u8,
    timeout: Duration,
}

impl HttpAppliance {
    pub fn new(config: &ApplianceConfig) -> Result<Self, DeviceError> {
        let client = Client::builder()
            .connect_timeout(config.request_timeout())
            .build()
            .map_err(|e| DeviceError::Request {
                url: config.base_url.clone(),
                source: e,
            })?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            enabled: config.enabled,
            mode: config.mode,
            target_temp: config.target_temp,
            timeout: config.request_timeout(),
        })
    }

    /// Query string for `set_control_info`.
    pub fn control_query(&self, power: bool) -> String {
        let (pow, mode, stemp) = if power {
            (1, self.mode, self.target_temp)
        } else {
            (0, OFF_MODE, OFF_TEMP)
        };
        format!(
            "pow={}&mode={}&stemp={}&shum=0&f_rate=A&f_dir=0",
            pow, mode, stemp
        )
    }

    async fn set_power(&self, power: bool) -> Result<(), DeviceError> {
        let label = if power { "on" } else { "off" };
        if !self.enabled {
            tracing::info!(power = label, "Appliance control disabled, command skipped");
            return Ok(());
        }

        let url = format!(
            "{}/aircon/set_control_info?{}",
            self.base_url,
            self.control_query(power)
        );
        tracing::debug!(power = label, url = %url, "Sending power command");

        let body = self.request(reqwest::Method::POST, url).await?;
        match field(&body, "ret") {
            Some("OK") => {
                tracing::info!(power = label, "Appliance acknowledged power command");
                Ok(())
            }
            _ => Err(DeviceError::Rejected(body.trim().to_string())),
        }
    }

    async fn request(&self, method: reqwest::Method, url: String) -> Result<String, DeviceError> {
        let call = async {
            let resp = self
                .client
                .request(method, &url)
                .send()
                .await
                .map_err(|e| DeviceError::Request {
                    url: url.clone(),
                    source: e,
                })?;
            resp.text().await.map_err(|e| DeviceError::Request {
                url: url.clone(),
                source: e,
            })
        };

        match timeout(self.timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(DeviceError::Timeout(self.timeout)),
        }
    }
}

#[async_trait]
impl Appliance for HttpAppliance {
    async fn power_on(&self) -> Result<(), DeviceError> {
        self.set_power(true).await
    }

    async fn power_off(&self) -> Result<(), DeviceError> {
        self.set_power(false).await
    }

    async fn read_temperature(&self) -> Result<f32, DeviceError> {
        let url = format!("{}/aircon/get_sensor_info", self.base_url);
        let body = self.request(reqwest::Method::GET, url).await?;
        parse_sensor_info(&body).ok_or(DeviceError::MissingTemperature)
    }
}

/// Extract the indoor temperature (`htemp`) from a sensor-info response.
///
/// The body is a comma-separated `key=value` list, e.g.
/// `ret=OK,htemp=24.5,hhum=-,otemp=18.0,err=0`. Non-numeric values such
/// as `-` yield `None`.
pub fn parse_sensor_info(body: &str) -> Option<f32> {
    field(body, "htemp")?.parse::<f32>().ok()
}

fn field<'a>(body: &'a str, key: &str) -> Option<&'a str> {
    body.trim()
        .split(',')
        .filter_map(|pair| pair.split_once('='))
        .find(|(k, _)| *k == key)
        .map(|(_, v)| v)
}
