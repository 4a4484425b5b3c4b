//! Connector ledger layer
//!
//! Provides the ledger client capability the routing core depends on, the
//! registry of connected ledgers keyed by prefix, the balance cache used to
//! bound quotes by liquidity, and an in-memory adapter for local rails.

pub mod adapters;
pub mod balance_cache;
pub mod error;
pub mod ledgers;
pub mod traits;

pub use adapters::memory::{InMemoryLedger, LedgerBus};
pub use balance_cache::{BalanceCache, BalanceCacheEntry};
pub use error::LedgerError;
pub use ledgers::Ledgers;
pub use traits::{LedgerClient, LedgerInfo, RequestHandler};
