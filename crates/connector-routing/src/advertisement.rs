use std::time::Duration;

use connector_core::address::is_peer_prefix;
use connector_core::LiquidityCurve;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::RoutingError;

/// A single route as it travels on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteInfo {
    /// Ledger on which the advertiser accepts payments for this route.
    pub source_ledger: String,
    /// The advertiser's own account on `source_ledger`.
    pub source_account: String,
    /// Destination prefix reachable through the advertiser.
    pub destination_ledger: String,
    /// Liquidity curve from `source_ledger` to `destination_ledger`.
    #[serde(alias = "curve")]
    pub points: LiquidityCurve,
    /// Hold-time margin the advertiser and everything past it require.
    #[serde(with = "connector_core::duration_millis")]
    pub min_message_window: Duration,
}

impl RouteInfo {
    /// Accept only routes the sender can actually serve.
    ///
    /// The advertised `source_account` must be the sender itself and must live
    /// on the advertised source ledger; peer-link destinations are never learned.
    pub fn is_acceptable_from(&self, sender: &str) -> bool {
        self.source_account == sender
            && self.source_account.starts_with(&self.source_ledger)
            && !is_peer_prefix(&self.destination_ledger)
    }
}

/// Payload of the `broadcast_routes` control message.
///
/// An update with no new routes and no withdrawals is a heartbeat: it only
/// refreshes the sender's hold-down.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoutingUpdate {
    pub new_routes: Vec<RouteInfo>,
    /// How long the receiver should keep the sender's routes without a refresh.
    #[serde(with = "connector_core::duration_millis")]
    pub hold_down_time: Duration,
    /// Destination prefixes the sender can no longer reach.
    #[serde(default)]
    pub unreachable_through_me: Vec<String>,
}

/// Envelope fields are strict; individual routes are decoded leniently.
#[derive(Deserialize)]
struct RawRoutingUpdate {
    new_routes: Vec<Value>,
    #[serde(with = "connector_core::duration_millis")]
    hold_down_time: Duration,
    #[serde(default)]
    unreachable_through_me: Vec<String>,
}

impl RoutingUpdate {
    /// A heartbeat carrying no routes.
    pub fn heartbeat(hold_down_time: Duration) -> Self {
        Self {
            new_routes: Vec::new(),
            hold_down_time,
            unreachable_through_me: Vec::new(),
        }
    }

    pub fn is_heartbeat(&self) -> bool {
        self.new_routes.is_empty() && self.unreachable_through_me.is_empty()
    }

    /// Decode an inbound payload.
    ///
    /// A payload whose envelope does not match the schema is rejected as a
    /// whole. Routes that fail to decode are dropped one by one; the count of
    /// dropped routes is returned alongside the update.
    pub fn parse(payload: &Value) -> Result<(Self, usize), RoutingError> {
        let raw = RawRoutingUpdate::deserialize(payload)
            .map_err(|e| RoutingError::MalformedUpdate(e.to_string()))?;

        let mut new_routes = Vec::with_capacity(raw.new_routes.len());
        let mut dropped = 0;
        for value in raw.new_routes {
            match serde_json::from_value::<RouteInfo>(value) {
                Ok(route) => new_routes.push(route),
                Err(e) => {
                    tracing::debug!(error = %e, "dropping undecodable route");
                    dropped += 1;
                }
            }
        }

        Ok((
            Self {
                new_routes,
                hold_down_time: raw.hold_down_time,
                unreachable_through_me: raw.unreachable_through_me,
            },
            dropped,
        ))
    }

    pub fn to_value(&self) -> Result<Value, RoutingError> {
        Ok(serde_json::to_value(self)?)
    }
}
