//! Line-oriented notification feed.
//!
//! The node publishes one line per event, topic first:
//! `<address> <tx-ref> [fields...]`. Lines whose topic is subscribed are
//! forwarded to the session as [`PaymentNotice`]s.

use std::collections::HashSet;
use std::io;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio::net::TcpStream;

use crate::config::LedgerConfig;
use crate::ledger::PaymentNotice;
use crate::session::SessionHandle;
use crate::shutdown::ShutdownHandle;

const MAX_BACKOFF: Duration = Duration::from_secs(30);

/// Subscribed feed topics, shared between the ledger client and the feed.
#[derive(Clone, Default)]
pub struct Topics {
    inner: Arc<RwLock<HashSet<String>>>,
}

impl Topics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns false if the topic was already present.
    pub fn insert(&self, topic: &str) -> bool {
        self.inner.write().insert(topic.to_string())
    }

    /// Returns false if the topic was not present.
    pub fn remove(&self, topic: &str) -> bool {
        self.inner.write().remove(topic)
    }

    pub fn contains(&self, topic: &str) -> bool {
        self.inner.read().contains(topic)
    }
}

/// Split a feed line into topic and transaction reference.
pub fn parse_feed_line(line: &str) -> Option<PaymentNotice> {
    let mut fields = line.split_whitespace();
    let address = fields.next()?;
    let tx_ref = fields.next()?;
    Some(PaymentNotice {
        address: address.to_string(),
        tx_ref: tx_ref.to_string(),
    })
}

pub struct NotificationFeed {
    addr: String,
    topics: Topics,
    backoff: Duration,
}

impl NotificationFeed {
    pub fn new(config: &LedgerConfig, topics: Topics) -> Self {
        Self {
            addr: config.feed_addr.clone(),
            topics,
            backoff: config.reconnect_backoff(),
        }
    }

    /// Connect, forward, reconnect with exponential backoff until shutdown.
    pub async fn run(self, session: SessionHandle, shutdown: ShutdownHandle) {
        let mut delay = self.backoff;

        loop {
            let connected = tokio::select! {
                _ = shutdown.wait() => break,
                result = TcpStream::connect(&self.addr) => result,
            };

            match connected {
                Ok(stream) => {
                    tracing::info!(addr = %self.addr, "Notification feed connected");
                    delay = self.backoff;
                    let forwarded = tokio::select! {
                        _ = shutdown.wait() => break,
                        result = self.forward(BufReader::new(stream), &session) => result,
                    };
                    match forwarded {
                        Ok(count) => {
                            tracing::warn!(addr = %self.addr, forwarded = count, "Notification feed closed")
                        }
                        Err(e) => {
                            tracing::warn!(addr = %self.addr, error = %e, "Notification feed read failed")
                        }
                    }
                    if session.is_closed() {
                        break;
                    }
                }
                Err(e) => {
                    tracing::warn!(
                        addr = %self.addr,
                        error = %e,
                        retry_ms = delay.as_millis() as u64,
                        "Notification feed unreachable"
                    );
                }
            }

            tokio::select! {
                _ = shutdown.wait() => break,
                _ = tokio::time::sleep(delay) => {}
            }
            delay = (delay * 2).min(MAX_BACKOFF);
        }

        tracing::debug!("Notification feed stopped");
    }

    /// Forward subscribed notices from `reader` until EOF.
    ///
    /// Returns the number of notices handed to the session.
    pub async fn forward<R>(&self, reader: R, session: &SessionHandle) -> io::Result<usize>
    where
        R: AsyncBufRead + Unpin,
    {
        let mut lines = reader.lines();
        let mut forwarded = 0;

        while let Some(line) = lines.next_line().await? {
            let Some(notice) = parse_feed_line(&line) else {
                continue;
            };
            if !self.topics.contains(&notice.address) {
                continue;
            }
            tracing::info!(address = %notice.address, tx = %notice.tx_ref, "Transfer notified");
            if session.payment(notice).await.is_err() {
                break;
            }
            forwarded += 1;
        }

        Ok(forwarded)
    }
}
