use std::sync::Arc;

use connector_core::address::{longest_prefix_match, validate_prefix};
use connector_core::{RequestMessage, ResponseMessage};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use parking_lot::RwLock;

use crate::error::LedgerError;
use crate::traits::{LedgerClient, LedgerInfo, RequestHandler};

/// Registry of ledger clients keyed by ledger prefix.
///
/// The registry also owns the connector's single internal request handler,
/// installing it on every client that is currently registered or added later.
pub struct Ledgers {
    clients: DashMap<String, Arc<dyn LedgerClient>>,
    handler: RwLock<Option<Arc<dyn RequestHandler>>>,
}

impl Ledgers {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            clients: DashMap::new(),
            handler: RwLock::new(None),
        }
    }

    /// Register a client for `prefix`.
    pub fn add(&self, prefix: &str, client: Arc<dyn LedgerClient>) -> Result<(), LedgerError> {
        validate_prefix(prefix)?;
        match self.clients.entry(prefix.to_string()) {
            Entry::Occupied(_) => Err(LedgerError::AlreadyRegistered(prefix.to_string())),
            Entry::Vacant(slot) => {
                if let Some(handler) = self.handler.read().clone() {
                    client.register_request_handler(handler);
                }
                tracing::info!(ledger = %prefix, account = %client.get_account(), "registering ledger");
                slot.insert(client);
                Ok(())
            }
        }
    }

    /// Unregister the client for `prefix`, returning it if it existed.
    pub fn remove(&self, prefix: &str) -> Option<Arc<dyn LedgerClient>> {
        let removed = self.clients.remove(prefix).map(|(_, client)| client);
        if removed.is_some() {
            tracing::info!(ledger = %prefix, "removed ledger");
        }
        removed
    }

    /// Look up the client for `prefix`.
    pub fn get(&self, prefix: &str) -> Result<Arc<dyn LedgerClient>, LedgerError> {
        self.clients
            .get(prefix)
            .map(|c| Arc::clone(c.value()))
            .ok_or_else(|| LedgerError::NotFound(prefix.to_string()))
    }

    pub fn contains(&self, prefix: &str) -> bool {
        self.clients.contains_key(prefix)
    }

    /// All registered prefixes, sorted.
    pub fn prefixes(&self) -> Vec<String> {
        let mut prefixes: Vec<String> = self.clients.iter().map(|c| c.key().clone()).collect();
        prefixes.sort();
        prefixes
    }

    /// The directly-connected ledger an address belongs to, by longest prefix.
    pub fn ledger_for_address(&self, address: &str) -> Option<String> {
        let prefixes = self.prefixes();
        longest_prefix_match(address, prefixes.iter().map(String::as_str)).map(str::to_string)
    }

    /// The connector's own account on `prefix`.
    pub fn account_on(&self, prefix: &str) -> Result<String, LedgerError> {
        Ok(self.get(prefix)?.get_account())
    }

    /// Install the connector's request handler on all current and future clients.
    pub fn register_internal_request_handler(&self, handler: Arc<dyn RequestHandler>) {
        for client in self.clients.iter() {
            client.value().register_request_handler(Arc::clone(&handler));
        }
        *self.handler.write() = Some(handler);
    }

    /// Connect every registered client.
    pub async fn connect_all(&self) -> Result<(), LedgerError> {
        for client in self.snapshot() {
            if !client.is_connected() {
                client.connect().await?;
            }
        }
        Ok(())
    }

    pub async fn get_info(&self, prefix: &str) -> Result<LedgerInfo, LedgerError> {
        self.get(prefix)?.get_info().await
    }

    pub async fn get_balance(&self, prefix: &str) -> Result<u64, LedgerError> {
        self.get(prefix)?.get_balance().await
    }

    /// Send a request over the ledger named in its envelope.
    pub async fn send_request(&self, request: RequestMessage) -> Result<ResponseMessage, LedgerError> {
        let client = self.get(&request.ledger)?;
        client.send_request(request).await
    }

    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }

    /// Clone the client handles out so no map guard is held across an await.
    fn snapshot(&self) -> Vec<Arc<dyn LedgerClient>> {
        self.clients.iter().map(|c| Arc::clone(c.value())).collect()
    }
}

impl Default for Ledgers {
    fn default() -> Self {
        Self::new()
    }
}
