use std::time::Duration;

use connector_core::{error_code, IlpError};

/// Errors raised while building a quote.
#[derive(Debug, thiserror::Error)]
pub enum QuoteError {
    #[error("No route found from: {source_account} to: {destination_account}")]
    NoRouteFound {
        source_account: String,
        destination_account: String,
    },

    #[error(
        "Source transfer hold time of {}ms exceeds the maximum of {}ms",
        .source_hold.as_millis(),
        .max_hold.as_millis()
    )]
    UnacceptableExpiry {
        source_hold: Duration,
        max_hold: Duration,
    },

    #[error("Destination amount {requested} exceeds available liquidity of {available}")]
    InsufficientLiquidity { requested: u64, available: u64 },
}

impl QuoteError {
    /// The protocol error to answer the requester with.
    pub fn to_ilp_error(&self, triggered_by: &str) -> IlpError {
        let (code, name) = match self {
            QuoteError::NoRouteFound { .. } => (error_code::UNREACHABLE, "Unreachable"),
            QuoteError::UnacceptableExpiry { .. } => {
                (error_code::UNACCEPTABLE_EXPIRY, "Unacceptable Expiry")
            }
            QuoteError::InsufficientLiquidity { .. } => {
                (error_code::INSUFFICIENT_LIQUIDITY, "Insufficient Liquidity")
            }
        };
        IlpError::new(code, name, triggered_by, self.to_string())
    }
}
