//! TOML configuration: file location, parsing, defaults and validation.

mod loader;
mod types;

pub use loader::ConfigError;
pub use types::{
    AddressRotation, ApplianceConfig, ButtonConfig, Config, DashboardConfig, DisplayConfig,
    LedgerConfig, ProbeConfig,
};
