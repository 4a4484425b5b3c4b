use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Quoting policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuoterConfig {
    /// Longest source hold the connector will quote.
    #[serde(default = "default_max_hold_time", with = "connector_core::duration_millis")]
    pub max_hold_time: Duration,
    /// Destination hold assumed when the request leaves it unset.
    #[serde(default = "default_destination_hold", with = "connector_core::duration_millis")]
    pub default_destination_hold: Duration,
    /// Fraction shaved off (or added to) the amount per hop to absorb rate drift.
    #[serde(default = "default_slippage")]
    pub slippage: f64,
    /// Warn when a quote exceeds the cached balance on the payout ledger.
    #[serde(default = "default_check_liquidity")]
    pub check_liquidity: bool,
}

fn default_max_hold_time() -> Duration {
    Duration::from_secs(10)
}

fn default_destination_hold() -> Duration {
    Duration::from_secs(5)
}

fn default_slippage() -> f64 {
    0.001
}

fn default_check_liquidity() -> bool {
    true
}

impl Default for QuoterConfig {
    fn default() -> Self {
        Self {
            max_hold_time: default_max_hold_time(),
            default_destination_hold: default_destination_hold(),
            slippage: default_slippage(),
            check_liquidity: default_check_liquidity(),
        }
    }
}
