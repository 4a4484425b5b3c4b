use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::RoutingError;

/// Default probe amount used to rank competing routes.
pub const DEFAULT_PROBE_AMOUNT: f64 = 1_000_000.0;

/// Default hold-time margin a connector reserves for its own hop.
pub const DEFAULT_MIN_MESSAGE_WINDOW: Duration = Duration::from_secs(1);

/// Tunables for route propagation and expiry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoutingConfig {
    /// Whether routes are advertised to peers at all.
    #[serde(default = "default_broadcast_enabled")]
    pub broadcast_enabled: bool,
    /// Period of the unconditional full broadcast.
    #[serde(default = "default_broadcast_interval", with = "connector_core::duration_millis")]
    pub broadcast_interval: Duration,
    /// Period of the stale-route sweep.
    #[serde(default = "default_cleanup_interval", with = "connector_core::duration_millis")]
    pub cleanup_interval: Duration,
    /// Hold-down time advertised to peers with every broadcast.
    #[serde(default = "default_route_expiry", with = "connector_core::duration_millis")]
    pub route_expiry: Duration,
    /// Hold-time margin this connector needs per hop.
    #[serde(default = "default_min_message_window", with = "connector_core::duration_millis")]
    pub min_message_window: Duration,
    /// Source amount at which competing curves are compared.
    #[serde(default = "default_probe_amount")]
    pub probe_amount: f64,
}

fn default_broadcast_enabled() -> bool {
    true
}

fn default_broadcast_interval() -> Duration {
    Duration::from_secs(30)
}

fn default_cleanup_interval() -> Duration {
    Duration::from_secs(1)
}

fn default_route_expiry() -> Duration {
    Duration::from_secs(45)
}

fn default_min_message_window() -> Duration {
    DEFAULT_MIN_MESSAGE_WINDOW
}

fn default_probe_amount() -> f64 {
    DEFAULT_PROBE_AMOUNT
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            broadcast_enabled: default_broadcast_enabled(),
            broadcast_interval: default_broadcast_interval(),
            cleanup_interval: default_cleanup_interval(),
            route_expiry: default_route_expiry(),
            min_message_window: default_min_message_window(),
            probe_amount: default_probe_amount(),
        }
    }
}

impl RoutingConfig {
    /// Reject intervals that would spin the background tasks.
    pub fn validate(&self) -> Result<(), RoutingError> {
        if self.broadcast_interval.is_zero() {
            return Err(RoutingError::InvalidConfig(
                "broadcast_interval must be positive".into(),
            ));
        }
        if self.cleanup_interval.is_zero() {
            return Err(RoutingError::InvalidConfig(
                "cleanup_interval must be positive".into(),
            ));
        }
        if !(self.probe_amount.is_finite() && self.probe_amount > 0.0) {
            return Err(RoutingError::InvalidConfig(format!(
                "probe_amount must be positive, got {}",
                self.probe_amount
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_fill_missing_fields() {
        let config: RoutingConfig = serde_json::from_str(r#"{"route_expiry": 5000}"#).unwrap();
        assert!(config.broadcast_enabled);
        assert_eq!(config.route_expiry, Duration::from_secs(5));
        assert_eq!(config.broadcast_interval, Duration::from_secs(30));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_zero_interval() {
        let config = RoutingConfig {
            cleanup_interval: Duration::ZERO,
            ..RoutingConfig::default()
        };
        assert!(matches!(config.validate(), Err(RoutingError::InvalidConfig(_))));
    }
}
