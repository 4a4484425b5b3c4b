//! Distance-vector route propagation.
//!
//! The broadcaster advertises the connector's routes to every known peer,
//! applies the advertisements and withdrawals peers send back, and expires
//! routes of peers that stop refreshing their hold-down.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::Utc;
use connector_core::address::{account_on, has_prefix};
use connector_core::{CustomMessage, RequestMessage, METHOD_BROADCAST_ROUTES};
use connector_ledgers::Ledgers;
use dashmap::DashMap;
use futures::future::join_all;
use parking_lot::Mutex;
use serde_json::Value;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::advertisement::{RouteInfo, RoutingUpdate};
use crate::config::RoutingConfig;
use crate::error::RoutingError;
use crate::pairs::{CurveProvider, TradingPairs};
use crate::route::Route;
use crate::table::RoutingTable;

/// What a single inbound update did to the table.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RouteUpdateSummary {
    /// The update carried neither routes nor withdrawals.
    pub heartbeat: bool,
    /// Routes that were new or replaced an older version.
    pub stored: usize,
    /// Routes dropped for failing validation.
    pub rejected: usize,
    /// Destinations that lost the sender's route.
    pub lost: Vec<String>,
    /// An out-of-cycle broadcast was scheduled.
    pub broadcast_triggered: bool,
}

/// Handles of the periodic broadcast and cleanup tasks.
///
/// Dropping the handle stops the tasks.
pub struct BroadcasterTasks {
    handles: Vec<JoinHandle<()>>,
}

impl BroadcasterTasks {
    pub fn shutdown(&mut self) {
        for handle in self.handles.drain(..) {
            handle.abort();
        }
    }

    pub fn is_running(&self) -> bool {
        self.handles.iter().any(|h| !h.is_finished())
    }
}

impl Drop for BroadcasterTasks {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Advertises routes to peers and applies the advertisements they send.
pub struct RouteBroadcaster {
    table: Arc<RoutingTable>,
    ledgers: Arc<Ledgers>,
    curves: Arc<dyn CurveProvider>,
    pairs: Arc<TradingPairs>,
    config: RoutingConfig,
    /// ledger prefix -> full addresses of peer connectors on it
    peers_by_ledger: DashMap<String, BTreeSet<String>>,
    /// Withdrawals to announce with the next broadcast.
    pending_unreachable: Mutex<BTreeSet<String>>,
    in_flight: AtomicBool,
    rerun: AtomicBool,
}

impl RouteBroadcaster {
    pub fn new(
        table: Arc<RoutingTable>,
        ledgers: Arc<Ledgers>,
        curves: Arc<dyn CurveProvider>,
        pairs: Arc<TradingPairs>,
        config: RoutingConfig,
    ) -> Self {
        Self {
            table,
            ledgers,
            curves,
            pairs,
            config,
            peers_by_ledger: DashMap::new(),
            pending_unreachable: Mutex::new(BTreeSet::new()),
            in_flight: AtomicBool::new(false),
            rerun: AtomicBool::new(false),
        }
    }

    pub fn config(&self) -> &RoutingConfig {
        &self.config
    }

    pub fn routing_table(&self) -> &Arc<RoutingTable> {
        &self.table
    }

    /// Rebuild the local routes from the current trading pairs.
    ///
    /// Only pairs whose ledgers are both registered and that have a curve
    /// become routes. Returns true if the local routes changed.
    pub fn reload_local_routes(&self) -> bool {
        let routes: Vec<Route> = self
            .pairs
            .pairs()
            .into_iter()
            .filter(|(src, dst)| self.ledgers.contains(src) && self.ledgers.contains(dst))
            .filter_map(|(src, dst)| {
                let curve = self.curves.curve_for(&src, &dst)?;
                Some(Route::local(src, dst, curve, self.config.min_message_window))
            })
            .collect();
        let count = routes.len();
        let changed = self.table.replace_local_routes(routes);
        if changed {
            tracing::info!(routes = count, "reloaded local routes");
        }
        changed
    }

    /// Discover the peers on a newly registered ledger.
    ///
    /// Connector names reported by the ledger are qualified with its prefix;
    /// the connector's own account is skipped. Returns the number of peers.
    pub async fn add_ledger(&self, prefix: &str) -> Result<usize, RoutingError> {
        let info = self.ledgers.get_info(prefix).await?;
        let own_account = self.ledgers.account_on(prefix)?;
        let peers: BTreeSet<String> = info
            .connectors
            .iter()
            .map(|name| {
                if has_prefix(name, prefix) {
                    name.clone()
                } else {
                    account_on(prefix, name)
                }
            })
            .filter(|address| *address != own_account)
            .collect();
        let count = peers.len();
        self.peers_by_ledger.insert(prefix.to_string(), peers);
        self.reload_local_routes();
        tracing::info!(ledger = %prefix, peers = count, "added ledger to route broadcaster");
        Ok(count)
    }

    /// Forget a ledger, its peers and every route through it.
    ///
    /// Callers remove the ledger from the registry and trading pairs first.
    /// Destinations left without any route are queued as unreachable and,
    /// when broadcasting is enabled, announced right away.
    pub fn remove_ledger(self: &Arc<Self>, prefix: &str) -> Vec<String> {
        let peers = self
            .peers_by_ledger
            .remove(prefix)
            .map(|(_, peers)| peers)
            .unwrap_or_default();

        let mut lost = BTreeSet::new();
        for peer in &peers {
            lost.extend(self.table.remove_connector(peer));
        }
        lost.extend(self.table.remove_ledger(prefix));
        self.reload_local_routes();

        let lost: Vec<String> = lost
            .into_iter()
            .filter(|d| !self.table.has_route_to(d))
            .collect();
        tracing::info!(ledger = %prefix, lost = lost.len(), "removed ledger from route broadcaster");
        if !lost.is_empty() {
            self.mark_ledgers_unreachable(&lost);
            if self.config.broadcast_enabled {
                self.trigger_broadcast();
            }
        }
        lost
    }

    /// Add a peer connector on `ledger` by full address.
    pub fn add_peer(&self, ledger: &str, address: &str) -> bool {
        self.peers_by_ledger
            .entry(ledger.to_string())
            .or_default()
            .insert(address.to_string())
    }

    /// Stop advertising to `address` and drop the routes learned from it.
    pub fn remove_peer(&self, ledger: &str, address: &str) -> Vec<String> {
        if let Some(mut peers) = self.peers_by_ledger.get_mut(ledger) {
            peers.remove(address);
        }
        let lost: Vec<String> = self
            .table
            .remove_connector(address)
            .into_iter()
            .filter(|d| !self.table.has_route_to(d))
            .collect();
        self.mark_ledgers_unreachable(&lost);
        lost
    }

    /// Peers known on `ledger`, sorted.
    pub fn peers_on(&self, ledger: &str) -> Vec<String> {
        self.peers_by_ledger
            .get(ledger)
            .map(|p| p.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Snapshot of the whole peer topology.
    pub fn peers_by_ledger(&self) -> BTreeMap<String, Vec<String>> {
        self.peers_by_ledger
            .iter()
            .map(|e| (e.key().clone(), e.value().iter().cloned().collect()))
            .collect()
    }

    /// Queue destinations to be withdrawn with the next broadcast.
    pub fn mark_ledgers_unreachable(&self, prefixes: &[String]) {
        if prefixes.is_empty() {
            return;
        }
        tracing::debug!(count = prefixes.len(), "marking destinations unreachable");
        self.pending_unreachable
            .lock()
            .extend(prefixes.iter().cloned());
    }

    /// Withdrawals waiting for the next broadcast, sorted.
    pub fn pending_unreachable(&self) -> Vec<String> {
        self.pending_unreachable.lock().iter().cloned().collect()
    }

    /// Apply a `broadcast_routes` payload received from `sender`.
    ///
    /// Any update, heartbeats included, refreshes the sender's hold-down.
    /// Withdrawals are applied before new routes. Routes not owned by the
    /// sender, not on its own ledger, or towards a peer-link prefix are
    /// dropped one by one.
    pub async fn receive_routes(
        self: &Arc<Self>,
        payload: &Value,
        sender: &str,
    ) -> Result<RouteUpdateSummary, RoutingError> {
        let (update, undecodable) = RoutingUpdate::parse(payload)?;
        self.table.bump_connector(sender, update.hold_down_time);

        let mut lost = BTreeSet::new();
        for prefix in &update.unreachable_through_me {
            lost.extend(self.table.invalidate_connectors_routes_to(sender, prefix));
        }

        let mut summary = RouteUpdateSummary {
            heartbeat: update.is_heartbeat(),
            rejected: undecodable,
            lost: lost.into_iter().collect(),
            ..RouteUpdateSummary::default()
        };
        if summary.heartbeat {
            tracing::info!(peer = %sender, "heartbeat");
            return Ok(summary);
        }

        for info in update.new_routes {
            if !info.is_acceptable_from(sender) {
                tracing::debug!(
                    peer = %sender,
                    source_account = %info.source_account,
                    destination = %info.destination_ledger,
                    "dropping route not served by sender"
                );
                summary.rejected += 1;
                continue;
            }
            if self.table.add_route(Route::learned(info, sender)) {
                summary.stored += 1;
            }
        }

        if (summary.stored > 0 || !summary.lost.is_empty()) && self.config.broadcast_enabled {
            self.mark_ledgers_unreachable(&summary.lost);
            self.trigger_broadcast();
            summary.broadcast_triggered = true;
        }
        tracing::debug!(
            peer = %sender,
            stored = summary.stored,
            rejected = summary.rejected,
            lost = summary.lost.len(),
            "applied route update"
        );
        Ok(summary)
    }

    /// Drop routes of peers whose hold-down lapsed and queue their withdrawal.
    pub fn remove_expired_routes(&self) -> Vec<String> {
        let lost: Vec<String> = self
            .table
            .expire_stale_routes(Utc::now())
            .into_iter()
            .filter(|d| !self.table.has_route_to(d))
            .collect();
        self.mark_ledgers_unreachable(&lost);
        lost
    }

    /// Send the current routes and pending withdrawals to every peer.
    ///
    /// At most one broadcast runs at a time; a call made while one is in
    /// flight makes the running broadcast go around once more and returns 0.
    /// Returns the number of peers that accepted the update. Failures to reach
    /// individual peers are logged and do not fail the broadcast.
    pub async fn broadcast(&self) -> Result<usize, RoutingError> {
        if self.in_flight.swap(true, Ordering::SeqCst) {
            self.rerun.store(true, Ordering::SeqCst);
            tracing::debug!("broadcast already in flight, coalescing");
            return Ok(0);
        }

        let mut delivered = 0;
        loop {
            self.rerun.store(false, Ordering::SeqCst);
            let result = self.broadcast_once().await;
            self.in_flight.store(false, Ordering::SeqCst);
            delivered += result?;
            if !self.rerun.load(Ordering::SeqCst) || self.in_flight.swap(true, Ordering::SeqCst) {
                break;
            }
        }
        Ok(delivered)
    }

    /// Spawn the periodic broadcast (when enabled) and the stale-route sweep.
    pub fn start(self: &Arc<Self>) -> BroadcasterTasks {
        let mut handles = Vec::new();

        if self.config.broadcast_enabled {
            let this = Arc::clone(self);
            handles.push(tokio::spawn(async move {
                let mut ticker = tokio::time::interval(this.config.broadcast_interval);
                ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
                loop {
                    ticker.tick().await;
                    match this.broadcast().await {
                        Ok(peers) => tracing::debug!(peers, "periodic route broadcast"),
                        Err(e) => tracing::warn!(error = %e, "periodic route broadcast failed"),
                    }
                }
            }));
        }

        let this = Arc::clone(self);
        handles.push(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(this.config.cleanup_interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                let lost = this.remove_expired_routes();
                if !lost.is_empty() {
                    tracing::info!(lost = ?lost, "expired stale routes");
                }
            }
        }));

        tracing::info!(
            broadcast_enabled = self.config.broadcast_enabled,
            interval_ms = self.config.broadcast_interval.as_millis() as u64,
            "route broadcaster started"
        );
        BroadcasterTasks { handles }
    }

    fn trigger_broadcast(self: &Arc<Self>) {
        let this = Arc::clone(self);
        tokio::spawn(async move {
            if let Err(e) = this.broadcast().await {
                tracing::warn!(error = %e, "out-of-cycle route broadcast failed");
            }
        });
    }

    async fn broadcast_once(&self) -> Result<usize, RoutingError> {
        let unreachable: Vec<String> = std::mem::take(&mut *self.pending_unreachable.lock())
            .into_iter()
            .collect();

        let mut requests = Vec::new();
        for (ledger, peers) in self.peers_by_ledger() {
            if peers.is_empty() {
                continue;
            }
            let account = match self.ledgers.account_on(&ledger) {
                Ok(account) => account,
                Err(e) => {
                    tracing::warn!(ledger = %ledger, error = %e, "skipping broadcast on ledger");
                    continue;
                }
            };
            let update = RoutingUpdate {
                new_routes: self.advertisement_for(&ledger, &account),
                hold_down_time: self.config.route_expiry,
                unreachable_through_me: unreachable.clone(),
            };
            let data = update.to_value()?;
            for peer in peers {
                requests.push(RequestMessage::with_custom(
                    ledger.clone(),
                    account.clone(),
                    peer,
                    CustomMessage::new(METHOD_BROADCAST_ROUTES, data.clone()),
                ));
            }
        }

        if requests.is_empty() {
            return Ok(0);
        }
        tracing::debug!(
            peers = requests.len(),
            unreachable = unreachable.len(),
            "broadcasting routes"
        );

        let results = join_all(requests.into_iter().map(|request| async move {
            let peer = request.to.clone();
            (peer, self.ledgers.send_request(request).await)
        }))
        .await;

        let mut delivered = 0;
        for (peer, result) in results {
            match result {
                Ok(_) => delivered += 1,
                Err(e) => tracing::warn!(peer = %peer, error = %e, "failed to broadcast routes to peer"),
            }
        }
        Ok(delivered)
    }

    /// The routes offered to peers on `ledger`: the best curve per destination.
    ///
    /// Local pairs starting on `ledger` are offered as they are. Routes learned
    /// on another ledger are composed with the local curve into that ledger.
    /// Routes learned on `ledger` itself are never offered back onto it.
    fn advertisement_for(&self, ledger: &str, account: &str) -> Vec<RouteInfo> {
        let now = Utc::now();
        let probe = self.table.probe_amount();
        let mut best: BTreeMap<String, (f64, RouteInfo)> = BTreeMap::new();

        for route in self.table.all_routes() {
            if route.destination_ledger == ledger {
                continue;
            }
            let (curve, window) = match &route.next_hop {
                None if route.source_ledger == ledger => {
                    (route.curve.clone(), route.min_message_window)
                }
                None => continue,
                Some(_) if route.source_ledger == ledger => continue,
                Some(peer) => {
                    if !self.table.is_live(peer, now) {
                        continue;
                    }
                    let Some(local) = self.curves.curve_for(ledger, &route.source_ledger) else {
                        continue;
                    };
                    (
                        local.join(&route.curve),
                        self.config.min_message_window + route.min_message_window,
                    )
                }
            };

            let score = curve.amount_at(probe);
            let improves = best
                .get(&route.destination_ledger)
                .map_or(true, |(incumbent, _)| score > *incumbent);
            if improves {
                best.insert(
                    route.destination_ledger.clone(),
                    (
                        score,
                        RouteInfo {
                            source_ledger: ledger.to_string(),
                            source_account: account.to_string(),
                            destination_ledger: route.destination_ledger.clone(),
                            points: curve,
                            min_message_window: window,
                        },
                    ),
                );
            }
        }
        best.into_values().map(|(_, info)| info).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pairs::FixedRateBackend;
    use async_trait::async_trait;
    use connector_ledgers::{InMemoryLedger, LedgerBus, LedgerClient, LedgerError, RequestHandler};
    use connector_core::ResponseMessage;
    use serde_json::json;
    use std::time::Duration;

    #[derive(Default)]
    struct Recorder {
        seen: Mutex<Vec<RequestMessage>>,
    }

    #[async_trait]
    impl RequestHandler for Recorder {
        async fn handle_request(
            &self,
            request: RequestMessage,
        ) -> Result<Option<ResponseMessage>, LedgerError> {
            self.seen.lock().push(request);
            Ok(None)
        }
    }

    struct Fixture {
        broadcaster: Arc<RouteBroadcaster>,
        ledgers: Arc<Ledgers>,
        pairs: Arc<TradingPairs>,
        mark: Arc<Recorder>,
    }

    async fn fixture(broadcast_enabled: bool) -> Fixture {
        let bus = LedgerBus::new();
        let ledgers = Arc::new(Ledgers::new());
        let pairs = Arc::new(TradingPairs::new());

        for (prefix, currency, connectors) in [
            ("usd.", "USD", vec![]),
            ("eur.", "EUR", vec!["mark".to_string(), "connie".to_string()]),
        ] {
            let client = InMemoryLedger::new(Arc::clone(&bus), prefix, "connie", currency)
                .with_connectors(connectors);
            ledgers.add(prefix, Arc::new(client)).unwrap();
            pairs.add_ledger(prefix, currency);
        }
        ledgers.connect_all().await.unwrap();

        let mark = Arc::new(Recorder::default());
        let mark_client = InMemoryLedger::new(Arc::clone(&bus), "eur.", "mark", "EUR");
        mark_client.register_request_handler(mark.clone());
        mark_client.connect().await.unwrap();

        let backend = FixedRateBackend::new(
            Arc::clone(&pairs),
            [("USD".to_string(), 1.0), ("EUR".to_string(), 0.5)],
            0.0,
        );
        let config = RoutingConfig {
            broadcast_enabled,
            ..RoutingConfig::default()
        };
        let broadcaster = Arc::new(RouteBroadcaster::new(
            Arc::new(RoutingTable::new()),
            Arc::clone(&ledgers),
            Arc::new(backend),
            Arc::clone(&pairs),
            config,
        ));
        broadcaster.add_ledger("usd.").await.unwrap();
        broadcaster.add_ledger("eur.").await.unwrap();

        Fixture {
            broadcaster,
            ledgers,
            pairs,
            mark,
        }
    }

    fn cad_update(rate: f64) -> Value {
        json!({
            "new_routes": [{
                "source_ledger": "eur.",
                "source_account": "eur.mark",
                "destination_ledger": "cad.",
                "points": [[0, 0], [1_000_000_000, 1_000_000_000.0 * rate]],
                "min_message_window": 1000
            }],
            "hold_down_time": 45000,
            "unreachable_through_me": []
        })
    }

    #[tokio::test]
    async fn test_add_ledger_discovers_peers() {
        let f = fixture(false).await;
        assert_eq!(f.broadcaster.peers_on("eur."), vec!["eur.mark".to_string()]);
        assert!(f.broadcaster.peers_on("usd.").is_empty());

        let table = f.broadcaster.routing_table();
        assert!(table.local_route("usd.", "eur.").is_some());
        assert!(table.local_route("eur.", "usd.").is_some());
    }

    #[tokio::test]
    async fn test_receive_routes_stores_and_filters() {
        let f = fixture(false).await;
        let mut payload = cad_update(1.5);
        payload["new_routes"].as_array_mut().unwrap().push(json!({
            "source_ledger": "eur.",
            "source_account": "eur.mary",
            "destination_ledger": "jpy.",
            "points": [[0, 0], [100, 100]],
            "min_message_window": 1000
        }));

        let summary = f.broadcaster.receive_routes(&payload, "eur.mark").await.unwrap();
        assert_eq!(summary.stored, 1);
        assert_eq!(summary.rejected, 1);
        assert!(!summary.broadcast_triggered);

        let table = f.broadcaster.routing_table();
        assert!(table.best_route_for("cad.carl").is_some());
        assert!(table.best_route_for("jpy.joe").is_none());

        // the same advertisement again changes nothing
        let summary = f.broadcaster.receive_routes(&payload, "eur.mark").await.unwrap();
        assert_eq!(summary.stored, 0);
    }

    #[tokio::test]
    async fn test_heartbeat_only_refreshes_hold_down() {
        let f = fixture(true).await;
        let heartbeat = RoutingUpdate::heartbeat(Duration::from_secs(90)).to_value().unwrap();

        let summary = f.broadcaster.receive_routes(&heartbeat, "eur.mark").await.unwrap();
        assert!(summary.heartbeat);
        assert!(!summary.broadcast_triggered);

        let peer = f.broadcaster.routing_table().peer("eur.mark").unwrap();
        assert!(peer.hold_down_expires_at > Utc::now() + chrono::Duration::seconds(80));
        assert!(f.broadcaster.routing_table().routes_from("eur.mark").is_empty());
    }

    #[tokio::test]
    async fn test_withdrawal_invalidates_and_queues() {
        let f = fixture(false).await;
        f.broadcaster.receive_routes(&cad_update(1.5), "eur.mark").await.unwrap();

        let withdrawal = json!({
            "new_routes": [],
            "hold_down_time": 45000,
            "unreachable_through_me": ["cad."]
        });
        let summary = f.broadcaster.receive_routes(&withdrawal, "eur.mark").await.unwrap();
        assert_eq!(summary.lost, vec!["cad.".to_string()]);
        assert!(f.broadcaster.routing_table().best_route_for("cad.carl").is_none());
    }

    #[tokio::test]
    async fn test_withdrawal_spares_more_specific_destinations() {
        let f = fixture(false).await;
        let mut payload = cad_update(1.5);
        payload["new_routes"].as_array_mut().unwrap().push(json!({
            "source_ledger": "eur.",
            "source_account": "eur.mark",
            "destination_ledger": "cad.east.",
            "points": [[0, 0], [100, 150]],
            "min_message_window": 1000
        }));
        f.broadcaster.receive_routes(&payload, "eur.mark").await.unwrap();

        let withdrawal = json!({
            "new_routes": [],
            "hold_down_time": 45000,
            "unreachable_through_me": ["cad."]
        });
        let summary = f.broadcaster.receive_routes(&withdrawal, "eur.mark").await.unwrap();
        assert_eq!(summary.lost, vec!["cad.".to_string()]);

        let table = f.broadcaster.routing_table();
        assert!(table.best_route_for("cad.east.carl").is_some());
        assert!(table.best_route_for("cad.west.carl").is_none());
    }

    #[tokio::test]
    async fn test_malformed_payload_rejected() {
        let f = fixture(false).await;
        let result = f
            .broadcaster
            .receive_routes(&json!({ "new_routes": "nope" }), "eur.mark")
            .await;
        assert!(matches!(result, Err(RoutingError::MalformedUpdate(_))));
    }

    #[tokio::test]
    async fn test_broadcast_sends_routes_and_drains_withdrawals() {
        let f = fixture(false).await;
        f.broadcaster.mark_ledgers_unreachable(&["jpy.".to_string()]);

        assert_eq!(f.broadcaster.broadcast().await.unwrap(), 1);
        let seen = f.mark.seen.lock().clone();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].from, "eur.connie");

        let custom = seen[0].custom.clone().unwrap();
        assert_eq!(custom.method, METHOD_BROADCAST_ROUTES);
        let (update, _) = RoutingUpdate::parse(&custom.data).unwrap();
        assert_eq!(update.unreachable_through_me, vec!["jpy.".to_string()]);
        assert_eq!(update.new_routes.len(), 1);
        assert_eq!(update.new_routes[0].destination_ledger, "usd.");
        assert_eq!(update.new_routes[0].source_account, "eur.connie");
        assert!((update.new_routes[0].points.amount_at(100.0) - 200.0).abs() < 1e-9);

        assert!(f.broadcaster.pending_unreachable().is_empty());
    }

    #[tokio::test]
    async fn test_advertisement_composes_learned_routes() {
        let f = fixture(false).await;
        f.broadcaster.receive_routes(&cad_update(1.5), "eur.mark").await.unwrap();

        let on_usd = f.broadcaster.advertisement_for("usd.", "usd.connie");
        let cad = on_usd
            .iter()
            .find(|r| r.destination_ledger == "cad.")
            .expect("cad route offered on usd");
        // usd -> eur at 0.5, then eur -> cad at 1.5
        assert!((cad.points.amount_at(100.0) - 75.0).abs() < 1e-6);
        assert_eq!(cad.min_message_window, Duration::from_secs(2));

        // never offered back onto the ledger it was learned on
        let on_eur = f.broadcaster.advertisement_for("eur.", "eur.connie");
        assert!(on_eur.iter().all(|r| r.destination_ledger != "cad."));
    }

    #[tokio::test]
    async fn test_route_change_triggers_broadcast() {
        let f = fixture(true).await;
        let summary = f.broadcaster.receive_routes(&cad_update(1.5), "eur.mark").await.unwrap();
        assert!(summary.broadcast_triggered);

        for _ in 0..100 {
            if !f.mark.seen.lock().is_empty() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(f.mark.seen.lock().len(), 1);
    }

    #[tokio::test]
    async fn test_remove_ledger_withdraws_routes() {
        let f = fixture(false).await;
        f.broadcaster.receive_routes(&cad_update(1.5), "eur.mark").await.unwrap();

        f.ledgers.remove("eur.");
        f.pairs.remove_ledger("eur.");
        let lost = f.broadcaster.remove_ledger("eur.");

        assert!(lost.contains(&"cad.".to_string()));
        assert!(lost.contains(&"eur.".to_string()));
        assert!(f.broadcaster.peers_on("eur.").is_empty());
        assert!(f.broadcaster.routing_table().is_empty());
        assert!(f.broadcaster.pending_unreachable().contains(&"cad.".to_string()));
    }

    #[tokio::test]
    async fn test_expired_peer_routes_are_withdrawn() {
        let f = fixture(false).await;
        let mut payload = cad_update(1.5);
        payload["hold_down_time"] = json!(50);
        let summary = f.broadcaster.receive_routes(&payload, "eur.mark").await.unwrap();
        assert_eq!(summary.stored, 1);

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(f.broadcaster.remove_expired_routes(), vec!["cad.".to_string()]);
        assert_eq!(f.broadcaster.pending_unreachable(), vec!["cad.".to_string()]);
    }
}
