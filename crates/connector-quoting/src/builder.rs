use std::sync::Arc;
use std::time::Duration;

use connector_core::LiquidityCurve;
use connector_ledgers::{BalanceCache, Ledgers};
use connector_routing::{CurveProvider, RoutingTable, DEFAULT_MIN_MESSAGE_WINDOW};

use crate::config::QuoterConfig;
use crate::error::QuoteError;
use crate::quote::{Quote, QuoteByDestinationParams, QuoteBySourceParams};

/// The resolved path of a quote through this connector.
struct QuotePath {
    /// End-to-end curve from the source ledger to the destination.
    curve: LiquidityCurve,
    /// Curve of this connector's own hop, source ledger to payout ledger.
    local_curve: LiquidityCurve,
    payout_ledger: String,
    next_hop: Option<String>,
    hops: u32,
    /// Hold-time margin this connector and everything past it require.
    window: Duration,
}

/// Computes quotes from the local trading curves and the routing table.
pub struct RouteBuilder {
    ledgers: Arc<Ledgers>,
    table: Arc<RoutingTable>,
    curves: Arc<dyn CurveProvider>,
    balances: Option<Arc<BalanceCache>>,
    message_window: Duration,
    config: QuoterConfig,
}

impl RouteBuilder {
    pub fn new(
        ledgers: Arc<Ledgers>,
        table: Arc<RoutingTable>,
        curves: Arc<dyn CurveProvider>,
        config: QuoterConfig,
    ) -> Self {
        Self {
            ledgers,
            table,
            curves,
            balances: None,
            message_window: DEFAULT_MIN_MESSAGE_WINDOW,
            config,
        }
    }

    /// Hold-time margin reserved for this connector's own hop.
    ///
    /// Must match the window the connector advertises with its routes.
    pub fn with_message_window(mut self, window: Duration) -> Self {
        self.message_window = window;
        self
    }

    /// Check quotes against the connector's cached balances.
    pub fn with_balance_cache(mut self, balances: Arc<BalanceCache>) -> Self {
        self.balances = Some(balances);
        self
    }

    pub fn config(&self) -> &QuoterConfig {
        &self.config
    }

    /// Quote how much arrives at the destination for a fixed source amount.
    pub async fn quote_by_source(&self, params: QuoteBySourceParams) -> Result<Quote, QuoteError> {
        let path = self.resolve(&params.source_account, &params.destination_account)?;
        let (source_hold, destination_hold) =
            self.hold_durations(params.destination_hold_duration, path.window)?;

        let source = params.source_amount as f64;
        let destination_amount =
            floor_amount(path.curve.amount_at(source) * self.slippage_factor(path.hops));

        let payout = match path.next_hop {
            None => destination_amount,
            Some(_) => floor_amount(path.local_curve.amount_at(source)),
        };
        let liquidity_warning = self.liquidity_warning(&path.payout_ledger, payout).await;

        tracing::debug!(
            source_account = %params.source_account,
            destination_account = %params.destination_account,
            source_amount = params.source_amount,
            destination_amount,
            hops = path.hops,
            "quoted by source amount"
        );
        Ok(Quote {
            source_amount: params.source_amount,
            destination_amount,
            source_hold_duration: source_hold,
            destination_hold_duration: destination_hold,
            payout_ledger: path.payout_ledger,
            next_hop: path.next_hop,
            hops: path.hops,
            liquidity_warning,
        })
    }

    /// Quote how much the sender must pay for a fixed destination amount.
    pub async fn quote_by_destination(
        &self,
        params: QuoteByDestinationParams,
    ) -> Result<Quote, QuoteError> {
        let path = self.resolve(&params.source_account, &params.destination_account)?;
        let (source_hold, destination_hold) =
            self.hold_durations(params.destination_hold_duration, path.window)?;

        let factor = self.slippage_factor(path.hops);
        let target = params.destination_amount as f64 / factor;
        let source = path.curve.amount_reverse(target).ok_or_else(|| {
            QuoteError::InsufficientLiquidity {
                requested: params.destination_amount,
                available: floor_amount(path.curve.max_output() * factor),
            }
        })?;
        let source_amount = ceil_amount(source);

        let payout = match path.next_hop {
            None => params.destination_amount,
            Some(_) => floor_amount(path.local_curve.amount_at(source_amount as f64)),
        };
        let liquidity_warning = self.liquidity_warning(&path.payout_ledger, payout).await;

        tracing::debug!(
            source_account = %params.source_account,
            destination_account = %params.destination_account,
            source_amount,
            destination_amount = params.destination_amount,
            hops = path.hops,
            "quoted by destination amount"
        );
        Ok(Quote {
            source_amount,
            destination_amount: params.destination_amount,
            source_hold_duration: source_hold,
            destination_hold_duration: destination_hold,
            payout_ledger: path.payout_ledger,
            next_hop: path.next_hop,
            hops: path.hops,
            liquidity_warning,
        })
    }

    /// Find how a payment from `source_account` reaches `destination_account`.
    ///
    /// A local pair into the destination's ledger wins. Otherwise the best
    /// learned route whose first ledger the connector can pay out on is
    /// composed with the local curve into that ledger.
    fn resolve(
        &self,
        source_account: &str,
        destination_account: &str,
    ) -> Result<QuotePath, QuoteError> {
        let no_route = || QuoteError::NoRouteFound {
            source_account: source_account.to_string(),
            destination_account: destination_account.to_string(),
        };

        let source_ledger = self
            .ledgers
            .ledger_for_address(source_account)
            .ok_or_else(no_route)?;

        if let Some(destination_ledger) = self.ledgers.ledger_for_address(destination_account) {
            if let Some(curve) = self.curves.curve_for(&source_ledger, &destination_ledger) {
                return Ok(QuotePath {
                    curve: curve.clone(),
                    local_curve: curve,
                    payout_ledger: destination_ledger,
                    next_hop: None,
                    hops: 1,
                    window: self.message_window,
                });
            }
        }

        let route = self
            .table
            .best_route_for_where(destination_account, |r| {
                r.next_hop.is_some()
                    && (r.source_ledger == source_ledger
                        || self.curves.curve_for(&source_ledger, &r.source_ledger).is_some())
            })
            .ok_or_else(no_route)?;

        let local_curve = if route.source_ledger == source_ledger {
            LiquidityCurve::identity(route.curve.max_input())
        } else {
            self.curves
                .curve_for(&source_ledger, &route.source_ledger)
                .ok_or_else(no_route)?
        };

        Ok(QuotePath {
            curve: local_curve.join(&route.curve),
            local_curve,
            payout_ledger: route.source_ledger,
            next_hop: route.next_hop,
            hops: 2,
            window: self.message_window + route.min_message_window,
        })
    }

    /// Source hold is the destination hold plus every hop's message window.
    fn hold_durations(
        &self,
        requested: Option<Duration>,
        window: Duration,
    ) -> Result<(Duration, Duration), QuoteError> {
        let destination_hold = requested
            .filter(|d| !d.is_zero())
            .unwrap_or(self.config.default_destination_hold);
        let source_hold = destination_hold + window;
        if source_hold > self.config.max_hold_time {
            return Err(QuoteError::UnacceptableExpiry {
                source_hold,
                max_hold: self.config.max_hold_time,
            });
        }
        Ok((source_hold, destination_hold))
    }

    fn slippage_factor(&self, hops: u32) -> f64 {
        (1.0 - self.config.slippage).powi(hops as i32)
    }

    /// Best-effort: a missing or failing balance never fails the quote.
    async fn liquidity_warning(&self, ledger: &str, payout: u64) -> bool {
        if !self.config.check_liquidity {
            return false;
        }
        let Some(balances) = &self.balances else {
            return false;
        };
        match balances.get(ledger).await {
            Ok(balance) if payout > balance => {
                tracing::warn!(
                    ledger = %ledger,
                    payout,
                    balance,
                    "quoted payout exceeds available balance"
                );
                true
            }
            Ok(_) => false,
            Err(e) => {
                tracing::debug!(ledger = %ledger, error = %e, "balance unavailable for liquidity check");
                false
            }
        }
    }
}

/// Round down, tolerating float error just below an integer.
fn floor_amount(x: f64) -> u64 {
    let tolerance = x.abs() * 1e-12 + 1e-9;
    (x + tolerance).floor().max(0.0) as u64
}

/// Round up, tolerating float error just above an integer.
fn ceil_amount(x: f64) -> u64 {
    let tolerance = x.abs() * 1e-12 + 1e-9;
    (x - tolerance).ceil().max(0.0) as u64
}
