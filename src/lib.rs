pub mod billing;
pub mod button;
pub mod config;
pub mod dashboard;
pub mod device;
pub mod display;
pub mod ledger;
pub mod logging;
pub mod session;
pub mod shutdown;
pub mod state;
