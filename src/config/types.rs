use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Root configuration container.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub appliance: ApplianceConfig,
    #[serde(default)]
    pub probe: ProbeConfig,
    #[serde(default)]
    pub ledger: LedgerConfig,
    #[serde(default)]
    pub dashboard: DashboardConfig,
    #[serde(default)]
    pub display: DisplayConfig,
    #[serde(default)]
    pub button: ButtonConfig,
}

/// The metered appliance and its tariff.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApplianceConfig {
    /// Base URL of the appliance's vendor API (e.g., "http://192.168.1.20").
    #[serde(default = "default_appliance_base_url")]
    pub base_url: String,
    /// When false, power commands are logged but never sent.
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Length of one billing tick in milliseconds (default: 60000).
    #[serde(default = "default_tick_duration_ms")]
    pub tick_duration_ms: u64,
    /// Price of one tick in the ledger's minor unit (default: 1).
    #[serde(default = "default_tick_cost")]
    pub tick_cost: u64,
    /// Target temperature sent with the power-on command (default: 25).
    #[serde(default = "default_target_temp")]
    pub target_temp: u8,
    /// Operating mode sent with the power-on command (default: 7, automatic).
    #[serde(default = "default_mode")]
    pub mode: u8,
    /// Per-request timeout in seconds (default: 10).
    #[serde(default = "default_appliance_timeout")]
    pub request_timeout_secs: u64,
}

/// Temperature probe settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProbeConfig {
    /// Seconds between two sensor reads (default: 60).
    #[serde(default = "default_probe_interval")]
    pub interval_secs: u64,
}

/// Which deposit address the payment side advertises over time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AddressRotation {
    /// One address is requested at boot and kept for the process lifetime.
    Static,
    /// A fresh address is requested after every credited payment.
    #[default]
    PerPayment,
}

/// Ledger node and notification feed settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerConfig {
    /// HTTP endpoint of the ledger node.
    #[serde(default = "default_node_url")]
    pub node_url: String,
    /// host:port of the node's line-oriented notification feed.
    #[serde(default = "default_feed_addr")]
    pub feed_addr: String,
    #[serde(default)]
    pub rotation: AddressRotation,
    /// Per-request timeout in seconds (default: 15).
    #[serde(default = "default_ledger_timeout")]
    pub request_timeout_secs: u64,
    /// Initial reconnect backoff for the feed in milliseconds (default: 500).
    #[serde(default = "default_reconnect_backoff_ms")]
    pub reconnect_backoff_ms: u64,
}

/// Web dashboard settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DashboardConfig {
    /// Bind address for the dashboard (host:port).
    #[serde(default = "default_dashboard_bind_addr")]
    pub bind_addr: String,
}

/// Output device settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DisplayConfig {
    /// File the rendered frame is written to. Frames go to the log when unset.
    #[serde(default)]
    pub frame_path: Option<PathBuf>,
    /// Artificial latency added to every render, in milliseconds.
    #[serde(default)]
    pub render_delay_ms: u64,
}

/// Physical button settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ButtonConfig {
    /// Line-oriented event source (FIFO or character device). One line = one press.
    #[serde(default)]
    pub device: Option<PathBuf>,
}

fn default_true() -> bool {
    true
}

fn default_appliance_base_url() -> String {
    "http://127.0.0.1".to_string()
}

fn default_tick_duration_ms() -> u64 {
    60_000
}

fn default_tick_cost() -> u64 {
    1
}

fn default_target_temp() -> u8 {
    25
}

fn default_mode() -> u8 {
    7
}

fn default_appliance_timeout() -> u64 {
    10
}

fn default_probe_interval() -> u64 {
    60
}

fn default_node_url() -> String {
    "http://127.0.0.1:14265".to_string()
}

fn default_feed_addr() -> String {
    "127.0.0.1:5556".to_string()
}

fn default_ledger_timeout() -> u64 {
    15
}

fn default_reconnect_backoff_ms() -> u64 {
    500
}

fn default_dashboard_bind_addr() -> String {
    "0.0.0.0:8080".to_string()
}

impl ApplianceConfig {
    pub fn tick_duration(&self) -> Duration {
        Duration::from_millis(self.tick_duration_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl ProbeConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}

impl LedgerConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn reconnect_backoff(&self) -> Duration {
        Duration::from_millis(self.reconnect_backoff_ms)
    }
}

impl DisplayConfig {
    pub fn render_delay(&self) -> Duration {
        Duration::from_millis(self.render_delay_ms)
    }
}

impl Default for ApplianceConfig {
    fn default() -> Self {
        Self {
            base_url: default_appliance_base_url(),
            enabled: true,
            tick_duration_ms: default_tick_duration_ms(),
            tick_cost: default_tick_cost(),
            target_temp: default_target_temp(),
            mode: default_mode(),
            request_timeout_secs: default_appliance_timeout(),
        }
    }
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_probe_interval(),
        }
    }
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            node_url: default_node_url(),
            feed_addr: default_feed_addr(),
            rotation: AddressRotation::default(),
            request_timeout_secs: default_ledger_timeout(),
            reconnect_backoff_ms: default_reconnect_backoff_ms(),
        }
    }
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_dashboard_bind_addr(),
        }
    }
}
