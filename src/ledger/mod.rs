//! Ledger backend: deposit addresses, transaction lookup and the
//! subscription feed that announces incoming transfers.

mod feed;
mod node;

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use feed::{parse_feed_line, NotificationFeed, Topics};
pub use node::NodeLedger;

/// A transfer as reported by the ledger node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    #[serde(default)]
    pub hash: String,
    /// Signed amount in the ledger's minor unit; outgoing transfers are negative.
    pub value: i64,
}

/// "Something arrived at `address`", as published on the feed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentNotice {
    pub address: String,
    pub tx_ref: String,
}

/// Errors from ledger calls.
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("Ledger request to '{url}' failed: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Ledger returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Ledger response from '{url}' could not be decoded: {source}")]
    Decode {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Ledger did not answer within {}s", .0.as_secs())]
    Timeout(Duration),

    #[error("Not subscribed to '{0}'")]
    NotSubscribed(String),
}

/// Narrow interface to the ledger node.
#[async_trait]
pub trait Ledger: Send + Sync {
    /// A deposit address that has never been spent from.
    async fn new_deposit_address(&self) -> Result<String, LedgerError>;

    async fn fetch_transactions(&self, tx_ref: &str) -> Result<Vec<Transaction>, LedgerError>;

    /// Start receiving feed notices for `address`.
    async fn subscribe(&self, address: &str) -> Result<(), LedgerError>;

    /// Stop receiving feed notices for `address`.
    async fn unsubscribe(&self, address: &str) -> Result<(), LedgerError>;
}
