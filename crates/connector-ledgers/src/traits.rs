use std::sync::Arc;

use async_trait::async_trait;
use connector_core::{RequestMessage, ResponseMessage};
use serde::{Deserialize, Serialize};

use crate::error::LedgerError;

/// Static facts a ledger reports about itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerInfo {
    /// Address prefix of the ledger (e.g. `usd-ledger.`).
    pub prefix: String,
    pub currency_code: String,
    pub currency_scale: u8,
    /// Other connectors with accounts on this ledger, by account name or full address.
    pub connectors: Vec<String>,
}

/// Receives every inbound request envelope delivered by a ledger.
#[async_trait]
pub trait RequestHandler: Send + Sync {
    /// Handle a request. `Ok(None)` acknowledges without a payload.
    async fn handle_request(
        &self,
        request: RequestMessage,
    ) -> Result<Option<ResponseMessage>, LedgerError>;
}

/// Ledger client capability.
///
/// Each implementation bridges the connector to one concrete ledger. The
/// connector depends only on this interface; adapters are selected and
/// injected by whoever boots the process.
#[async_trait]
pub trait LedgerClient: Send + Sync {
    async fn connect(&self) -> Result<(), LedgerError>;

    async fn disconnect(&self) -> Result<(), LedgerError>;

    fn is_connected(&self) -> bool;

    async fn get_info(&self) -> Result<LedgerInfo, LedgerError>;

    /// The connector's own account address on this ledger.
    fn get_account(&self) -> String;

    /// The connector's available balance on this ledger, in ledger units.
    async fn get_balance(&self) -> Result<u64, LedgerError>;

    /// Send a request to another account on this ledger and await its response.
    async fn send_request(&self, request: RequestMessage) -> Result<ResponseMessage, LedgerError>;

    /// Install the single handler that receives all inbound requests.
    fn register_request_handler(&self, handler: Arc<dyn RequestHandler>);
}
