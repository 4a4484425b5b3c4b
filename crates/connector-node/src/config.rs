//! Connector configuration loading and management.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use std::time::Duration;

use connector_core::address::validate_prefix;
use connector_quoting::QuoterConfig;
use connector_routing::RoutingConfig;
use serde::{Deserialize, Serialize};

/// Full configuration for the connector.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ConnectorConfig {
    /// Route propagation settings.
    #[serde(default)]
    pub routing: RoutingConfig,

    /// Quoting policy.
    #[serde(default)]
    pub quoting: QuoterConfig,

    /// Exchange rate backend settings.
    #[serde(default)]
    pub backend: BackendConfig,

    /// Ledgers to attach at startup.
    #[serde(default)]
    pub ledgers: Vec<LedgerConfig>,

    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    /// Fraction taken off every local exchange rate.
    #[serde(default = "default_spread")]
    pub spread: f64,
    /// Largest source amount a local curve is defined for.
    #[serde(default = "default_max_input")]
    pub max_input: f64,
    /// Units of each currency worth one unit of the base currency.
    #[serde(default = "default_rates")]
    pub rates: BTreeMap<String, f64>,
    /// How long a fetched ledger balance is trusted.
    #[serde(default = "default_balance_ttl", with = "connector_core::duration_millis")]
    pub balance_ttl: Duration,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerConfig {
    /// Ledger prefix, dot-terminated.
    pub prefix: String,
    /// Currency code the ledger is denominated in.
    pub currency: String,
    /// The connector's account name on this ledger.
    #[serde(default = "default_account")]
    pub account: String,
    #[serde(default = "default_currency_scale")]
    pub currency_scale: u8,
    /// Starting balance (in-memory ledgers only).
    #[serde(default)]
    pub balance: u64,
    /// Peer connectors on this ledger, by account name or full address.
    #[serde(default)]
    pub connectors: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Log format (text, json).
    #[serde(default = "default_log_format")]
    pub format: String,
}

// Default value functions
fn default_spread() -> f64 {
    0.002
}
fn default_max_input() -> f64 {
    connector_routing::pairs::DEFAULT_MAX_INPUT
}
fn default_rates() -> BTreeMap<String, f64> {
    BTreeMap::from([("USD".to_string(), 1.0), ("EUR".to_string(), 0.92)])
}
fn default_balance_ttl() -> Duration {
    connector_ledgers::balance_cache::DEFAULT_BALANCE_TTL
}
fn default_account() -> String {
    "connector".into()
}
fn default_currency_scale() -> u8 {
    2
}
fn default_log_level() -> String {
    "info".into()
}
fn default_log_format() -> String {
    "text".into()
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            spread: default_spread(),
            max_input: default_max_input(),
            rates: default_rates(),
            balance_ttl: default_balance_ttl(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl ConnectorConfig {
    /// Load config from a TOML file, falling back to defaults for missing fields.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        if path.exists() {
            let contents = std::fs::read_to_string(path)?;
            let config: ConnectorConfig = toml::from_str(&contents)?;
            Ok(config)
        } else {
            Ok(Self::default())
        }
    }

    /// Save the current config to a TOML file.
    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        let contents = toml::to_string_pretty(self)?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, contents)?;
        Ok(())
    }

    /// A starter config with two in-memory ledgers, written by `--init`.
    pub fn sample() -> Self {
        Self {
            ledgers: vec![
                LedgerConfig {
                    prefix: "usd-ledger.".into(),
                    currency: "USD".into(),
                    account: default_account(),
                    currency_scale: default_currency_scale(),
                    balance: 1_000_000,
                    connectors: Vec::new(),
                },
                LedgerConfig {
                    prefix: "eur-ledger.".into(),
                    currency: "EUR".into(),
                    account: default_account(),
                    currency_scale: default_currency_scale(),
                    balance: 1_000_000,
                    connectors: Vec::new(),
                },
            ],
            ..Self::default()
        }
    }

    /// Reject configurations the connector cannot run with.
    pub fn validate(&self) -> anyhow::Result<()> {
        self.routing.validate()?;
        if !(0.0..1.0).contains(&self.quoting.slippage) {
            anyhow::bail!("quoting.slippage must be in [0, 1), got {}", self.quoting.slippage);
        }
        if !(0.0..1.0).contains(&self.backend.spread) {
            anyhow::bail!("backend.spread must be in [0, 1), got {}", self.backend.spread);
        }
        let mut seen = BTreeSet::new();
        for ledger in &self.ledgers {
            validate_prefix(&ledger.prefix)?;
            if !seen.insert(ledger.prefix.as_str()) {
                anyhow::bail!("ledger {} configured twice", ledger.prefix);
            }
            if !self.backend.rates.contains_key(&ledger.currency) {
                tracing::warn!(
                    ledger = %ledger.prefix,
                    currency = %ledger.currency,
                    "no exchange rate configured for ledger currency"
                );
            }
        }
        Ok(())
    }
}
