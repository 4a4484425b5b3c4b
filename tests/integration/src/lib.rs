//! Shared fixtures for the connector integration tests.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use connector_core::{RequestMessage, ResponseMessage};
use connector_ledgers::{InMemoryLedger, LedgerBus, LedgerClient, LedgerError, RequestHandler};
use connector_node::{Connector, ConnectorConfig};
use parking_lot::Mutex;

/// One ledger a test connector is attached to.
pub struct LedgerSpec<'a> {
    pub prefix: &'a str,
    pub currency: &'a str,
    pub connectors: &'a [&'a str],
}

/// Config with fixed rates (USD 1, EUR 0.5, CAD 0.75), no spread and a
/// periodic broadcast slow enough that only the initial one fires in a test.
pub fn test_config() -> ConnectorConfig {
    let mut config = ConnectorConfig::default();
    config.backend.spread = 0.0;
    config.backend.rates = [("USD", 1.0), ("EUR", 0.5), ("CAD", 0.75)]
        .into_iter()
        .map(|(c, r)| (c.to_string(), r))
        .collect();
    config.routing.broadcast_interval = Duration::from_secs(60);
    config
}

/// Build a connector whose account on every ledger is `<prefix><account>`.
pub async fn connector(
    bus: &Arc<LedgerBus>,
    account: &str,
    config: ConnectorConfig,
    ledgers: &[LedgerSpec<'_>],
) -> Connector {
    let connector = Connector::new(config).expect("valid config");
    for spec in ledgers {
        let client = InMemoryLedger::new(Arc::clone(bus), spec.prefix, account, spec.currency)
            .with_balance(1_000_000_000)
            .with_connectors(spec.connectors.iter().map(|c| c.to_string()).collect());
        connector
            .add_ledger(spec.prefix, Arc::new(client))
            .await
            .expect("ledger added");
    }
    connector
}

/// A connected account on `prefix` that records every request it receives.
pub async fn recording_account(
    bus: &Arc<LedgerBus>,
    prefix: &str,
    name: &str,
) -> (Arc<InMemoryLedger>, Arc<RecordingHandler>) {
    let recorder = Arc::new(RecordingHandler::default());
    let client = Arc::new(InMemoryLedger::new(Arc::clone(bus), prefix, name, "EUR"));
    client.register_request_handler(recorder.clone());
    client.connect().await.expect("connect");
    (client, recorder)
}

/// Request handler that stores what it receives and acknowledges.
#[derive(Default)]
pub struct RecordingHandler {
    seen: Mutex<Vec<RequestMessage>>,
}

impl RecordingHandler {
    pub fn requests(&self) -> Vec<RequestMessage> {
        self.seen.lock().clone()
    }

    pub fn count(&self) -> usize {
        self.seen.lock().len()
    }
}

#[async_trait]
impl RequestHandler for RecordingHandler {
    async fn handle_request(
        &self,
        request: RequestMessage,
    ) -> Result<Option<ResponseMessage>, LedgerError> {
        tracing::debug!(from = %request.from, "recorded request");
        self.seen.lock().push(request);
        Ok(None)
    }
}

/// Poll `condition` until it holds or `timeout` elapses.
pub async fn eventually<F>(timeout: Duration, condition: F) -> bool
where
    F: Fn() -> bool,
{
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        if condition() {
            return true;
        }
        if tokio::time::Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}
