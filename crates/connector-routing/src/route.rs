use std::time::Duration;

use chrono::{DateTime, Utc};
use connector_core::LiquidityCurve;

use crate::advertisement::RouteInfo;

/// Where a route leaves this connector.
///
/// Local routes come from the connector's own trading pairs; peer routes were
/// learned from an advertisement and are forwarded to that peer.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum RouteOrigin {
    /// A local pair, keyed by its source ledger.
    Local(String),
    /// A peer connector, keyed by its full address.
    Peer(String),
}

/// A single route stored in the [`RoutingTable`](crate::RoutingTable).
#[derive(Debug, Clone)]
pub struct Route {
    /// Ledger the connector receives funds on for this route.
    pub source_ledger: String,
    /// Destination prefix this route reaches.
    pub destination_ledger: String,
    /// Peer that forwards the payment onward; `None` for a local pair.
    pub next_hop: Option<String>,
    /// Amount mapping from `source_ledger` to `destination_ledger`.
    pub curve: LiquidityCurve,
    /// Cumulative hold-time margin required beyond this connector.
    pub min_message_window: Duration,
    /// When this route was stored or last replaced.
    pub added_at: DateTime<Utc>,
}

impl Route {
    /// A route served by one of the connector's own trading pairs.
    pub fn local(
        source_ledger: impl Into<String>,
        destination_ledger: impl Into<String>,
        curve: LiquidityCurve,
        min_message_window: Duration,
    ) -> Self {
        Self {
            source_ledger: source_ledger.into(),
            destination_ledger: destination_ledger.into(),
            next_hop: None,
            curve,
            min_message_window,
            added_at: Utc::now(),
        }
    }

    /// A route learned from `peer`'s advertisement.
    pub fn learned(info: RouteInfo, peer: impl Into<String>) -> Self {
        Self {
            source_ledger: info.source_ledger,
            destination_ledger: info.destination_ledger,
            next_hop: Some(peer.into()),
            curve: info.points,
            min_message_window: info.min_message_window,
            added_at: Utc::now(),
        }
    }

    pub fn is_local(&self) -> bool {
        self.next_hop.is_none()
    }

    pub fn origin(&self) -> RouteOrigin {
        match &self.next_hop {
            Some(peer) => RouteOrigin::Peer(peer.clone()),
            None => RouteOrigin::Local(self.source_ledger.clone()),
        }
    }

    /// Same route content, ignoring when it was stored.
    pub fn same_as(&self, other: &Route) -> bool {
        self.source_ledger == other.source_ledger
            && self.destination_ledger == other.destination_ledger
            && self.next_hop == other.next_hop
            && self.curve == other.curve
            && self.min_message_window == other.min_message_window
    }
}
