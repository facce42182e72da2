use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tokio::time::timeout;

use crate::config::LedgerConfig;
use crate::ledger::{Ledger, LedgerError, Topics, Transaction};

/// HTTP client for the ledger node plus the feed's topic set.
///
/// The node exposes:
/// - `POST /addresses` → `{"address": "..."}`
/// - `GET /transactions/{ref}` → `{"transactions": [{"hash": "...", "value": 50}]}`
///
/// Subscriptions are client-side: the feed filters published lines by the
/// topics registered here.
pub struct NodeLedger {
    client: Client,
    node_url: String,
    timeout: Duration,
    topics: Topics,
}

#[derive(Deserialize)]
struct AddressResponse {
    address: String,
}

#[derive(Deserialize)]
struct TransactionsResponse {
    #[serde(default)]
    transactions: Vec<Transaction>,
}

impl NodeLedger {
    pub fn new(config: &LedgerConfig, topics: Topics) -> Result<Self, LedgerError> {
        let client = Client::builder()
            .connect_timeout(config.request_timeout())
            .build()
            .map_err(|e| LedgerError::Request {
                url: config.node_url.clone(),
                source: e,
            })?;

        Ok(Self {
            client,
            node_url: config.node_url.trim_end_matches('/').to_string(),
            timeout: config.request_timeout(),
            topics,
        })
    }

    pub fn topics(&self) -> &Topics {
        &self.topics
    }

    async fn bounded<T>(
        &self,
        call: impl Future<Output = Result<T, LedgerError>>,
    ) -> Result<T, LedgerError> {
        match timeout(self.timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(LedgerError::Timeout(self.timeout)),
        }
    }

    async fn decode<T: DeserializeOwned>(
        url: &str,
        resp: reqwest::Response,
    ) -> Result<T, LedgerError> {
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(LedgerError::Status {
                status: status.as_u16(),
                body,
            });
        }
        resp.json::<T>().await.map_err(|e| LedgerError::Decode {
            url: url.to_string(),
            source: e,
        })
    }
}

#[async_trait]
impl Ledger for NodeLedger {
    async fn new_deposit_address(&self) -> Result<String, LedgerError> {
        let url = format!("{}/addresses", self.node_url);
        self.bounded(async {
            let resp = self
                .client
                .post(&url)
                .send()
                .await
                .map_err(|e| LedgerError::Request {
                    url: url.clone(),
                    source: e,
                })?;
            let body: AddressResponse = Self::decode(&url, resp).await?;
            Ok(body.address)
        })
        .await
    }

    async fn fetch_transactions(&self, tx_ref: &str) -> Result<Vec<Transaction>, LedgerError> {
        let url = format!("{}/transactions/{}", self.node_url, tx_ref);
        self.bounded(async {
            let resp = self
                .client
                .get(&url)
                .send()
                .await
                .map_err(|e| LedgerError::Request {
                    url: url.clone(),
                    source: e,
                })?;
            let body: TransactionsResponse = Self::decode(&url, resp).await?;
            Ok(body.transactions)
        })
        .await
    }

    async fn subscribe(&self, address: &str) -> Result<(), LedgerError> {
        if !self.topics.insert(address) {
            tracing::debug!(address = %address, "Already subscribed");
        }
        tracing::info!(address = %address, "Subscribed to deposit address");
        Ok(())
    }

    async fn unsubscribe(&self, address: &str) -> Result<(), LedgerError> {
        if !self.topics.remove(address) {
            return Err(LedgerError::NotSubscribed(address.to_string()));
        }
        tracing::info!(address = %address, "Unsubscribed from deposit address");
        Ok(())
    }
}
