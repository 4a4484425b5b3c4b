//! Connector routing — route propagation layer of the ledger connector.
//!
//! This crate provides:
//! - [`RoutingTable`] — destination prefixes mapped to local and learned routes, with peer hold-down.
//! - [`RouteBroadcaster`] — the distance-vector protocol: advertise, receive, withdraw, expire.
//! - [`RoutingUpdate`] / [`RouteInfo`] — the `broadcast_routes` wire payload.
//! - [`TradingPairs`] and [`CurveProvider`] — which ledgers the connector trades between, and at what rate.

pub mod advertisement;
pub mod broadcaster;
pub mod config;
pub mod error;
pub mod pairs;
pub mod route;
pub mod table;

// Re-exports for convenience.
pub use advertisement::{RouteInfo, RoutingUpdate};
pub use broadcaster::{BroadcasterTasks, RouteBroadcaster, RouteUpdateSummary};
pub use config::{RoutingConfig, DEFAULT_MIN_MESSAGE_WINDOW, DEFAULT_PROBE_AMOUNT};
pub use error::RoutingError;
pub use pairs::{CurveProvider, FixedRateBackend, TradingPairs};
pub use route::{Route, RouteOrigin};
pub use table::{ConnectorPeer, RoutingTable};
