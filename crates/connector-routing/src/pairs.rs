use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;

use connector_core::LiquidityCurve;
use parking_lot::RwLock;

/// Default liquidity ceiling of a locally generated curve.
pub const DEFAULT_MAX_INPUT: f64 = 1e15;

/// Source of local exchange curves between directly connected ledgers.
pub trait CurveProvider: Send + Sync {
    /// The curve for paying out on `destination_ledger` after receiving on
    /// `source_ledger`, or `None` when the pair is not traded.
    fn curve_for(&self, source_ledger: &str, destination_ledger: &str) -> Option<LiquidityCurve>;
}

#[derive(Default)]
struct PairsState {
    /// ledger prefix -> currency code
    currencies: BTreeMap<String, String>,
    pairs: BTreeSet<(String, String)>,
}

/// The set of ledger pairs the connector is willing to trade between.
///
/// Adding a ledger pairs it in both directions with every ledger already
/// present; removing it drops all of its pairs.
#[derive(Default)]
pub struct TradingPairs {
    state: RwLock<PairsState>,
}

impl TradingPairs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a ledger and pair it with every known ledger.
    pub fn add_ledger(&self, prefix: &str, currency_code: &str) {
        let mut state = self.state.write();
        let others: Vec<String> = state
            .currencies
            .keys()
            .filter(|p| p.as_str() != prefix)
            .cloned()
            .collect();
        for other in others {
            state.pairs.insert((prefix.to_string(), other.clone()));
            state.pairs.insert((other, prefix.to_string()));
        }
        state
            .currencies
            .insert(prefix.to_string(), currency_code.to_string());
    }

    /// Forget a ledger and every pair touching it.
    pub fn remove_ledger(&self, prefix: &str) {
        let mut state = self.state.write();
        state.currencies.remove(prefix);
        state.pairs.retain(|(src, dst)| src != prefix && dst != prefix);
    }

    /// Add a single directed pair between two known ledgers.
    pub fn add_pair(&self, source_ledger: &str, destination_ledger: &str) -> bool {
        let mut state = self.state.write();
        if source_ledger == destination_ledger
            || !state.currencies.contains_key(source_ledger)
            || !state.currencies.contains_key(destination_ledger)
        {
            return false;
        }
        state
            .pairs
            .insert((source_ledger.to_string(), destination_ledger.to_string()))
    }

    pub fn remove_pair(&self, source_ledger: &str, destination_ledger: &str) -> bool {
        self.state
            .write()
            .pairs
            .remove(&(source_ledger.to_string(), destination_ledger.to_string()))
    }

    pub fn contains(&self, source_ledger: &str, destination_ledger: &str) -> bool {
        self.state
            .read()
            .pairs
            .contains(&(source_ledger.to_string(), destination_ledger.to_string()))
    }

    /// All directed pairs, sorted.
    pub fn pairs(&self) -> Vec<(String, String)> {
        self.state.read().pairs.iter().cloned().collect()
    }

    pub fn currency_of(&self, prefix: &str) -> Option<String> {
        self.state.read().currencies.get(prefix).cloned()
    }
}

/// Curve provider quoting fixed exchange rates minus a spread.
///
/// `rates` maps a currency code to the number of its units worth one unit of
/// the common base currency.
pub struct FixedRateBackend {
    pairs: Arc<TradingPairs>,
    rates: HashMap<String, f64>,
    spread: f64,
    max_input: f64,
}

impl FixedRateBackend {
    pub fn new<I>(pairs: Arc<TradingPairs>, rates: I, spread: f64) -> Self
    where
        I: IntoIterator<Item = (String, f64)>,
    {
        Self {
            pairs,
            rates: rates.into_iter().collect(),
            spread,
            max_input: DEFAULT_MAX_INPUT,
        }
    }

    /// Cap the source amount of every generated curve.
    pub fn with_max_input(mut self, max_input: f64) -> Self {
        self.max_input = max_input;
        self
    }

    /// Effective rate from `source_ledger` to `destination_ledger`, spread included.
    pub fn rate(&self, source_ledger: &str, destination_ledger: &str) -> Option<f64> {
        let source_currency = self.pairs.currency_of(source_ledger)?;
        let destination_currency = self.pairs.currency_of(destination_ledger)?;
        let base = if source_currency == destination_currency {
            1.0
        } else {
            let source_rate = *self.rates.get(&source_currency)?;
            let destination_rate = *self.rates.get(&destination_currency)?;
            if source_rate <= 0.0 {
                return None;
            }
            destination_rate / source_rate
        };
        Some(base * (1.0 - self.spread))
    }
}

impl CurveProvider for FixedRateBackend {
    fn curve_for(&self, source_ledger: &str, destination_ledger: &str) -> Option<LiquidityCurve> {
        if !self.pairs.contains(source_ledger, destination_ledger) {
            return None;
        }
        let rate = self.rate(source_ledger, destination_ledger)?;
        if !rate.is_finite() || rate <= 0.0 {
            tracing::warn!(
                source = %source_ledger,
                destination = %destination_ledger,
                rate,
                "ignoring unusable exchange rate"
            );
            return None;
        }
        Some(LiquidityCurve::linear(rate, self.max_input))
    }
}
