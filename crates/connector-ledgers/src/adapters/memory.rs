use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use connector_core::address::account_on;
use connector_core::{RequestMessage, ResponseMessage};
use dashmap::DashMap;
use parking_lot::RwLock;

use crate::error::LedgerError;
use crate::traits::{LedgerClient, LedgerInfo, RequestHandler};

/// Shared in-process message bus connecting [`InMemoryLedger`] clients.
///
/// Every client that registers a request handler is reachable by its account
/// address; `deliver` hands a request straight to the recipient's handler.
pub struct LedgerBus {
    handlers: DashMap<String, Arc<dyn RequestHandler>>,
}

impl LedgerBus {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            handlers: DashMap::new(),
        })
    }

    /// Make `account` reachable through `handler`.
    pub fn attach(&self, account: &str, handler: Arc<dyn RequestHandler>) {
        self.handlers.insert(account.to_string(), handler);
    }

    pub fn detach(&self, account: &str) {
        self.handlers.remove(account);
    }

    pub fn is_attached(&self, account: &str) -> bool {
        self.handlers.contains_key(account)
    }

    /// Deliver a request to the handler registered for `request.to`.
    pub async fn deliver(&self, request: RequestMessage) -> Result<ResponseMessage, LedgerError> {
        let handler = self
            .handlers
            .get(&request.to)
            .map(|h| Arc::clone(h.value()))
            .ok_or_else(|| LedgerError::NoHandler(request.to.clone()))?;
        let ack = request.reply();
        Ok(handler.handle_request(request).await?.unwrap_or(ack))
    }
}

/// In-memory ledger adapter.
///
/// Models a ledger with no external rail: balances live in memory and
/// requests travel over a shared [`LedgerBus`]. Used for loopback
/// deployments and for exercising multi-connector topologies in tests.
pub struct InMemoryLedger {
    bus: Arc<LedgerBus>,
    prefix: String,
    account: String,
    currency_code: String,
    currency_scale: u8,
    connectors: Vec<String>,
    balance: AtomicU64,
    connected: AtomicBool,
    handler: RwLock<Option<Arc<dyn RequestHandler>>>,
}

impl InMemoryLedger {
    /// Create a client for the account `<prefix><username>`.
    pub fn new(bus: Arc<LedgerBus>, prefix: &str, username: &str, currency_code: &str) -> Self {
        Self {
            bus,
            prefix: prefix.to_string(),
            account: account_on(prefix, username),
            currency_code: currency_code.to_string(),
            currency_scale: 2,
            connectors: Vec::new(),
            balance: AtomicU64::new(0),
            connected: AtomicBool::new(false),
            handler: RwLock::new(None),
        }
    }

    /// Other connectors reported by `get_info`.
    pub fn with_connectors(mut self, connectors: Vec<String>) -> Self {
        self.connectors = connectors;
        self
    }

    pub fn with_balance(self, balance: u64) -> Self {
        self.balance.store(balance, Ordering::SeqCst);
        self
    }

    pub fn with_scale(mut self, currency_scale: u8) -> Self {
        self.currency_scale = currency_scale;
        self
    }

    pub fn set_balance(&self, balance: u64) {
        self.balance.store(balance, Ordering::SeqCst);
    }
}

#[async_trait]
impl LedgerClient for InMemoryLedger {
    async fn connect(&self) -> Result<(), LedgerError> {
        if let Some(handler) = self.handler.read().clone() {
            self.bus.attach(&self.account, handler);
        }
        self.connected.store(true, Ordering::SeqCst);
        tracing::debug!(account = %self.account, "in-memory ledger connected");
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), LedgerError> {
        self.connected.store(false, Ordering::SeqCst);
        self.bus.detach(&self.account);
        tracing::debug!(account = %self.account, "in-memory ledger disconnected");
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    async fn get_info(&self) -> Result<LedgerInfo, LedgerError> {
        Ok(LedgerInfo {
            prefix: self.prefix.clone(),
            currency_code: self.currency_code.clone(),
            currency_scale: self.currency_scale,
            connectors: self.connectors.clone(),
        })
    }

    fn get_account(&self) -> String {
        self.account.clone()
    }

    async fn get_balance(&self) -> Result<u64, LedgerError> {
        Ok(self.balance.load(Ordering::SeqCst))
    }

    async fn send_request(&self, request: RequestMessage) -> Result<ResponseMessage, LedgerError> {
        if !self.is_connected() {
            return Err(LedgerError::Disconnected(self.prefix.clone()));
        }
        self.bus.deliver(request).await
    }

    fn register_request_handler(&self, handler: Arc<dyn RequestHandler>) {
        if self.is_connected() {
            self.bus.attach(&self.account, Arc::clone(&handler));
        }
        *self.handler.write() = Some(handler);
    }
}
