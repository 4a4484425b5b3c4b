//! The connector orchestrator.
//!
//! Ties together all layers: ledgers, routing, quoting and message routing.
//! Spawns the route broadcaster's periodic tasks once started.

use std::sync::Arc;

use anyhow::Result;
use connector_ledgers::{BalanceCache, LedgerClient, Ledgers};
use connector_quoting::RouteBuilder;
use connector_routing::{
    BroadcasterTasks, CurveProvider, FixedRateBackend, RouteBroadcaster, RoutingTable,
    TradingPairs,
};

use crate::config::ConnectorConfig;
use crate::router::MessageRouter;

/// A running connector, orchestrating all layers.
pub struct Connector {
    /// Connector configuration.
    config: ConnectorConfig,
    /// Registered ledger clients.
    ledgers: Arc<Ledgers>,
    /// Ledger pairs the connector trades between.
    pairs: Arc<TradingPairs>,
    /// Local and learned routes.
    routing_table: Arc<RoutingTable>,
    /// Cached balances for liquidity checks.
    balances: Arc<BalanceCache>,
    /// Route propagation.
    broadcaster: Arc<RouteBroadcaster>,
    /// Quote computation.
    route_builder: Arc<RouteBuilder>,
    /// Handler installed on every ledger.
    router: Arc<MessageRouter>,
    /// Background tasks (None until start).
    tasks: Option<BroadcasterTasks>,
}

impl Connector {
    /// Create a new connector with the given config. No ledger is attached yet.
    pub fn new(config: ConnectorConfig) -> Result<Self> {
        config.validate()?;

        let ledgers = Arc::new(Ledgers::new());
        let pairs = Arc::new(TradingPairs::new());
        let routing_table = Arc::new(RoutingTable::with_probe_amount(config.routing.probe_amount));
        let curves: Arc<dyn CurveProvider> = Arc::new(
            FixedRateBackend::new(
                Arc::clone(&pairs),
                config.backend.rates.clone(),
                config.backend.spread,
            )
            .with_max_input(config.backend.max_input),
        );
        let balances = Arc::new(BalanceCache::with_ttl(
            Arc::clone(&ledgers),
            config.backend.balance_ttl,
        ));

        let broadcaster = Arc::new(RouteBroadcaster::new(
            Arc::clone(&routing_table),
            Arc::clone(&ledgers),
            Arc::clone(&curves),
            Arc::clone(&pairs),
            config.routing.clone(),
        ));
        let route_builder = Arc::new(
            RouteBuilder::new(
                Arc::clone(&ledgers),
                Arc::clone(&routing_table),
                curves,
                config.quoting.clone(),
            )
            .with_balance_cache(Arc::clone(&balances))
            .with_message_window(config.routing.min_message_window),
        );
        let router = Arc::new(MessageRouter::new(
            Arc::clone(&route_builder),
            Arc::clone(&broadcaster),
        ));
        ledgers.register_internal_request_handler(router.clone());

        tracing::info!(
            broadcast_enabled = config.routing.broadcast_enabled,
            "connector created"
        );

        Ok(Self {
            config,
            ledgers,
            pairs,
            routing_table,
            balances,
            broadcaster,
            route_builder,
            router,
            tasks: None,
        })
    }

    /// Attach a ledger: register, connect, pair it and discover its peers.
    pub async fn add_ledger(&self, prefix: &str, client: Arc<dyn LedgerClient>) -> Result<()> {
        self.ledgers.add(prefix, Arc::clone(&client))?;
        if let Err(e) = self.attach_ledger(prefix, &client).await {
            self.ledgers.remove(prefix);
            self.pairs.remove_ledger(prefix);
            return Err(e);
        }
        tracing::info!(ledger = %prefix, account = %client.get_account(), "ledger added");
        Ok(())
    }

    async fn attach_ledger(&self, prefix: &str, client: &Arc<dyn LedgerClient>) -> Result<()> {
        if !client.is_connected() {
            client.connect().await?;
        }
        let info = client.get_info().await?;
        self.pairs.add_ledger(prefix, &info.currency_code);
        self.broadcaster.add_ledger(prefix).await?;
        Ok(())
    }

    /// Detach a ledger, withdrawing every route through it.
    ///
    /// Returns the destinations that became unreachable.
    pub async fn remove_ledger(&self, prefix: &str) -> Result<Vec<String>> {
        let client = self
            .ledgers
            .remove(prefix)
            .ok_or_else(|| anyhow::anyhow!("ledger not registered: {}", prefix))?;
        self.pairs.remove_ledger(prefix);
        let lost = self.broadcaster.remove_ledger(prefix);
        self.balances.invalidate(prefix);

        if let Err(e) = client.disconnect().await {
            tracing::warn!(ledger = %prefix, error = %e, "error disconnecting removed ledger");
        }
        tracing::info!(ledger = %prefix, lost = lost.len(), "ledger removed");
        Ok(lost)
    }

    /// Connect every ledger, load local routes and start the background tasks.
    pub async fn start(&mut self) -> Result<()> {
        tracing::info!(ledgers = self.ledgers.len(), "starting connector");
        self.ledgers.connect_all().await?;
        self.broadcaster.reload_local_routes();
        if self.tasks.is_none() {
            self.tasks = Some(self.broadcaster.start());
        }
        tracing::info!(routes = self.routing_table.len(), "connector started");
        Ok(())
    }

    /// Gracefully shut down the connector.
    pub async fn shutdown(&mut self) -> Result<()> {
        tracing::info!("shutting down connector");

        if let Some(mut tasks) = self.tasks.take() {
            tasks.shutdown();
        }
        for prefix in self.ledgers.prefixes() {
            if let Ok(client) = self.ledgers.get(&prefix) {
                if let Err(e) = client.disconnect().await {
                    tracing::warn!(ledger = %prefix, error = %e, "error disconnecting ledger");
                }
            }
        }

        tracing::info!("connector shut down");
        Ok(())
    }

    pub fn is_running(&self) -> bool {
        self.tasks.as_ref().is_some_and(|t| t.is_running())
    }

    pub fn config(&self) -> &ConnectorConfig {
        &self.config
    }

    pub fn ledgers(&self) -> &Arc<Ledgers> {
        &self.ledgers
    }

    pub fn trading_pairs(&self) -> &Arc<TradingPairs> {
        &self.pairs
    }

    pub fn routing_table(&self) -> &Arc<RoutingTable> {
        &self.routing_table
    }

    pub fn balance_cache(&self) -> &Arc<BalanceCache> {
        &self.balances
    }

    pub fn broadcaster(&self) -> &Arc<RouteBroadcaster> {
        &self.broadcaster
    }

    pub fn route_builder(&self) -> &Arc<RouteBuilder> {
        &self.route_builder
    }

    pub fn router(&self) -> &Arc<MessageRouter> {
        &self.router
    }
}
