use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::time::Duration;

use chrono::{DateTime, Utc};
use connector_core::address::{has_prefix, is_peer_prefix};
use dashmap::DashMap;
use parking_lot::RwLock;

use crate::config::DEFAULT_PROBE_AMOUNT;
use crate::route::{Route, RouteOrigin};

/// Liveness record for a neighbouring connector.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectorPeer {
    /// Full address of the peer on the shared ledger.
    pub address: String,
    /// Routes learned from this peer are dropped after this instant.
    pub hold_down_expires_at: DateTime<Utc>,
    /// Last time the peer sent any update, heartbeats included.
    pub last_refreshed: DateTime<Utc>,
}

impl ConnectorPeer {
    pub fn is_live(&self, now: DateTime<Utc>) -> bool {
        now < self.hold_down_expires_at
    }
}

/// Composite key for looking up a route: (origin, destination prefix).
type RouteKey = (RouteOrigin, String);

#[derive(Default)]
struct TableState {
    routes: HashMap<RouteKey, Route>,
    /// destination prefix -> origins that reach it
    by_destination: BTreeMap<String, BTreeSet<RouteOrigin>>,
    /// peer address -> destinations learned from it
    by_peer: HashMap<String, BTreeSet<String>>,
}

impl TableState {
    fn insert(&mut self, route: Route) -> Option<Route> {
        let origin = route.origin();
        let destination = route.destination_ledger.clone();
        self.by_destination
            .entry(destination.clone())
            .or_default()
            .insert(origin.clone());
        if let RouteOrigin::Peer(peer) = &origin {
            self.by_peer
                .entry(peer.clone())
                .or_default()
                .insert(destination.clone());
        }
        self.routes.insert((origin, destination), route)
    }

    fn remove(&mut self, origin: &RouteOrigin, destination: &str) -> Option<Route> {
        let removed = self
            .routes
            .remove(&(origin.clone(), destination.to_string()))?;
        if let Some(origins) = self.by_destination.get_mut(destination) {
            origins.remove(origin);
            if origins.is_empty() {
                self.by_destination.remove(destination);
            }
        }
        if let RouteOrigin::Peer(peer) = origin {
            if let Some(destinations) = self.by_peer.get_mut(peer) {
                destinations.remove(destination);
                if destinations.is_empty() {
                    self.by_peer.remove(peer);
                }
            }
        }
        Some(removed)
    }

    /// Remove every route learned from `address`, returning their destinations.
    fn drop_peer_routes(&mut self, address: &str) -> Vec<String> {
        let destinations: Vec<String> = self
            .by_peer
            .get(address)
            .map(|d| d.iter().cloned().collect())
            .unwrap_or_default();
        let origin = RouteOrigin::Peer(address.to_string());
        destinations
            .into_iter()
            .filter(|d| self.remove(&origin, d).is_some())
            .collect()
    }

    /// Remove every route matching `predicate`, returning the affected destinations.
    fn remove_where<F>(&mut self, predicate: F) -> Vec<String>
    where
        F: Fn(&Route) -> bool,
    {
        let doomed: Vec<RouteKey> = self
            .routes
            .iter()
            .filter(|(_, route)| predicate(*route))
            .map(|(key, _)| key.clone())
            .collect();
        let mut lost = BTreeSet::new();
        for (origin, destination) in doomed {
            if self.remove(&origin, &destination).is_some() {
                lost.insert(destination);
            }
        }
        lost.into_iter().collect()
    }
}

/// The connector's view of every reachable destination prefix.
///
/// Routes are keyed by `(origin, destination)`, so each peer holds at most one
/// route per destination and a newer advertisement replaces the older one.
/// The route index sits behind a single `RwLock` so lookups see either the
/// state before or after an update, never a partial one. Peer liveness is
/// tracked separately in a `DashMap`.
pub struct RoutingTable {
    state: RwLock<TableState>,
    peers: DashMap<String, ConnectorPeer>,
    probe_amount: f64,
}

impl RoutingTable {
    /// Create a new, empty routing table.
    pub fn new() -> Self {
        Self::with_probe_amount(DEFAULT_PROBE_AMOUNT)
    }

    /// Create a table that ranks competing curves at `probe_amount`.
    pub fn with_probe_amount(probe_amount: f64) -> Self {
        Self {
            state: RwLock::new(TableState::default()),
            peers: DashMap::new(),
            probe_amount,
        }
    }

    pub fn probe_amount(&self) -> f64 {
        self.probe_amount
    }

    /// Insert or replace a route.
    ///
    /// Returns `false` (and leaves the table untouched) when the destination
    /// is a peer-link prefix, when a learned route's peer has no live
    /// hold-down, or when an identical route is already stored.
    pub fn add_route(&self, route: Route) -> bool {
        if is_peer_prefix(&route.destination_ledger) {
            tracing::debug!(destination = %route.destination_ledger, "refusing peer-link route");
            return false;
        }
        if let Some(peer) = &route.next_hop {
            if !self.is_live(peer, Utc::now()) {
                tracing::debug!(peer = %peer, "refusing route from peer without live hold-down");
                return false;
            }
        }

        let mut state = self.state.write();
        let key = (route.origin(), route.destination_ledger.clone());
        if let Some(existing) = state.routes.get(&key) {
            if existing.same_as(&route) {
                return false;
            }
        }
        tracing::debug!(
            source = %route.source_ledger,
            destination = %route.destination_ledger,
            next_hop = route.next_hop.as_deref().unwrap_or("local"),
            "storing route"
        );
        state.insert(route);
        true
    }

    /// Extend the hold-down of `address` to `now + hold_down`.
    ///
    /// A hold-down too long to represent saturates at the latest instant.
    pub fn bump_connector(&self, address: &str, hold_down: Duration) {
        let now = Utc::now();
        let expires_at = chrono::Duration::from_std(hold_down)
            .ok()
            .and_then(|d| now.checked_add_signed(d))
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        self.peers.insert(
            address.to_string(),
            ConnectorPeer {
                address: address.to_string(),
                hold_down_expires_at: expires_at,
                last_refreshed: now,
            },
        );
    }

    pub fn peer(&self, address: &str) -> Option<ConnectorPeer> {
        self.peers.get(address).map(|p| p.value().clone())
    }

    /// All tracked peers, sorted by address.
    pub fn peers(&self) -> Vec<ConnectorPeer> {
        let mut peers: Vec<ConnectorPeer> = self.peers.iter().map(|p| p.value().clone()).collect();
        peers.sort_by(|a, b| a.address.cmp(&b.address));
        peers
    }

    pub fn is_live(&self, address: &str, now: DateTime<Utc>) -> bool {
        self.peers.get(address).is_some_and(|p| p.is_live(now))
    }

    /// Drop the route learned from `address` for exactly `prefix`.
    ///
    /// More specific destinations the peer advertises are left alone.
    /// Returns the affected destination prefixes.
    pub fn invalidate_connectors_routes_to(&self, address: &str, prefix: &str) -> Vec<String> {
        let origin = RouteOrigin::Peer(address.to_string());
        let removed = self.state.write().remove(&origin, prefix);
        match removed {
            Some(_) => {
                tracing::debug!(peer = %address, prefix = %prefix, "invalidated route");
                vec![prefix.to_string()]
            }
            None => Vec::new(),
        }
    }

    /// Best route for a destination address.
    pub fn best_route_for(&self, destination: &str) -> Option<Route> {
        self.best_route_for_where(destination, |_| true)
    }

    /// Best route for a destination address among the routes matching `filter`.
    ///
    /// The longest matching destination prefix wins. Among routes to that
    /// prefix, the one delivering the most at the probe amount wins, then the
    /// most recently refreshed peer (local routes count as freshest). Routes of
    /// peers whose hold-down has already lapsed are ignored.
    pub fn best_route_for_where<F>(&self, destination: &str, filter: F) -> Option<Route>
    where
        F: Fn(&Route) -> bool,
    {
        let now = Utc::now();
        let state = self.state.read();

        let mut prefixes: Vec<&String> = state
            .by_destination
            .keys()
            .filter(|p| has_prefix(destination, p))
            .collect();
        prefixes.sort_by_key(|p| std::cmp::Reverse(p.len()));

        for prefix in prefixes {
            let mut best: Option<(&Route, f64, Option<DateTime<Utc>>)> = None;
            for origin in &state.by_destination[prefix] {
                let Some(route) = state.routes.get(&(origin.clone(), prefix.clone())) else {
                    continue;
                };
                let freshness = match &route.next_hop {
                    None => None,
                    Some(peer) => match self.peer(peer) {
                        Some(p) if p.is_live(now) => Some(p.last_refreshed),
                        _ => continue,
                    },
                };
                if !filter(route) {
                    continue;
                }
                let score = route.curve.amount_at(self.probe_amount);
                let better = match &best {
                    None => true,
                    Some((_, best_score, best_freshness)) => {
                        match score.partial_cmp(best_score).unwrap_or(Ordering::Equal) {
                            Ordering::Greater => true,
                            Ordering::Less => false,
                            Ordering::Equal => fresher(freshness, *best_freshness),
                        }
                    }
                };
                if better {
                    best = Some((route, score, freshness));
                }
            }
            if let Some((route, _, _)) = best {
                return Some(route.clone());
            }
        }
        None
    }

    /// Routes stored for exactly `destination_prefix`.
    pub fn routes_for(&self, destination_prefix: &str) -> Vec<Route> {
        let state = self.state.read();
        state
            .by_destination
            .get(destination_prefix)
            .map(|origins| {
                origins
                    .iter()
                    .filter_map(|o| state.routes.get(&(o.clone(), destination_prefix.to_string())))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Routes learned from `address`.
    pub fn routes_from(&self, address: &str) -> Vec<Route> {
        let state = self.state.read();
        let origin = RouteOrigin::Peer(address.to_string());
        state
            .by_peer
            .get(address)
            .map(|destinations| {
                destinations
                    .iter()
                    .filter_map(|d| state.routes.get(&(origin.clone(), d.clone())))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn has_route_to(&self, destination_prefix: &str) -> bool {
        self.state.read().by_destination.contains_key(destination_prefix)
    }

    /// The local pair route from `source_ledger` to `destination_ledger`, if any.
    pub fn local_route(&self, source_ledger: &str, destination_ledger: &str) -> Option<Route> {
        self.state
            .read()
            .routes
            .get(&(
                RouteOrigin::Local(source_ledger.to_string()),
                destination_ledger.to_string(),
            ))
            .cloned()
    }

    /// Swap the full set of local routes for `routes`.
    ///
    /// Returns true if the set of local routes changed.
    pub fn replace_local_routes(&self, routes: Vec<Route>) -> bool {
        let mut state = self.state.write();
        let mut incoming: HashMap<RouteKey, Route> = HashMap::new();
        for route in routes.into_iter().filter(|r| r.is_local()) {
            if is_peer_prefix(&route.destination_ledger) {
                continue;
            }
            incoming.insert((route.origin(), route.destination_ledger.clone()), route);
        }

        let stale: Vec<RouteKey> = state
            .routes
            .iter()
            .filter(|(key, _)| matches!(key.0, RouteOrigin::Local(_)) && !incoming.contains_key(*key))
            .map(|(key, _)| key.clone())
            .collect();
        let mut changed = !stale.is_empty();
        for (origin, destination) in stale {
            state.remove(&origin, &destination);
        }

        for (key, route) in incoming {
            let unchanged = state.routes.get(&key).is_some_and(|r| r.same_as(&route));
            if !unchanged {
                state.insert(route);
                changed = true;
            }
        }
        changed
    }

    /// Drop every peer whose hold-down lapsed before `now`, with all its routes.
    ///
    /// Returns the destination prefixes that lost a route.
    pub fn expire_stale_routes(&self, now: DateTime<Utc>) -> Vec<String> {
        let expired: Vec<String> = self
            .peers
            .iter()
            .filter(|p| !p.value().is_live(now))
            .map(|p| p.key().clone())
            .collect();

        let mut lost = BTreeSet::new();
        for address in expired {
            // holding the route lock keeps a concurrent re-advertisement from
            // landing between the liveness check and the route drop
            let mut state = self.state.write();
            if self
                .peers
                .remove_if(&address, |_, p| !p.is_live(now))
                .is_none()
            {
                continue;
            }
            let dropped = state.drop_peer_routes(&address);
            drop(state);
            if !dropped.is_empty() {
                tracing::info!(peer = %address, routes = dropped.len(), "peer hold-down expired");
            }
            lost.extend(dropped);
        }
        lost.into_iter().collect()
    }

    /// Forget `address` entirely, returning the destinations that lost a route.
    pub fn remove_connector(&self, address: &str) -> Vec<String> {
        let mut state = self.state.write();
        self.peers.remove(address);
        state.drop_peer_routes(address)
    }

    /// Drop every route that starts or ends on `prefix`.
    pub fn remove_ledger(&self, prefix: &str) -> Vec<String> {
        self.state
            .write()
            .remove_where(|r| r.source_ledger == prefix || r.destination_ledger == prefix)
    }

    /// Every stored route, ordered by destination then origin.
    pub fn all_routes(&self) -> Vec<Route> {
        let state = self.state.read();
        state
            .by_destination
            .iter()
            .flat_map(|(destination, origins)| {
                origins
                    .iter()
                    .filter_map(|o| state.routes.get(&(o.clone(), destination.clone())))
            })
            .cloned()
            .collect()
    }

    /// Destination prefixes with at least one route, sorted.
    pub fn destinations(&self) -> Vec<String> {
        self.state.read().by_destination.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.state.read().routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.read().routes.is_empty()
    }
}

impl Default for RoutingTable {
    fn default() -> Self {
        Self::new()
    }
}

/// Local routes (`None`) rank above any peer; otherwise the later refresh wins.
fn fresher(candidate: Option<DateTime<Utc>>, incumbent: Option<DateTime<Utc>>) -> bool {
    match (candidate, incumbent) {
        (None, Some(_)) => true,
        (Some(c), Some(i)) => c > i,
        _ => false,
    }
}
