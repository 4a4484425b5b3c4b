//! Connector node — wires ledgers, routing and quoting into a running connector.
//!
//! This crate provides:
//! - [`MessageRouter`] — the single handler for every inbound ledger request.
//! - [`Connector`] — the orchestrator owning all layers and their background tasks.
//! - [`ConnectorConfig`] — TOML configuration.

pub mod config;
pub mod error;
pub mod node;
pub mod router;

pub use config::{BackendConfig, ConnectorConfig, LedgerConfig, LoggingConfig};
pub use error::RouterError;
pub use node::Connector;
pub use router::MessageRouter;
