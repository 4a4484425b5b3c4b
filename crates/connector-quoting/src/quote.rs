use std::time::Duration;

/// Quote request fixing the amount the sender pays.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuoteBySourceParams {
    pub source_account: String,
    pub destination_account: String,
    pub source_amount: u64,
    /// Hold time requested at the destination; `None` uses the configured default.
    pub destination_hold_duration: Option<Duration>,
}

/// Quote request fixing the amount the receiver gets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuoteByDestinationParams {
    pub source_account: String,
    pub destination_account: String,
    pub destination_amount: u64,
    pub destination_hold_duration: Option<Duration>,
}

/// A computed quote.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Quote {
    pub source_amount: u64,
    pub destination_amount: u64,
    /// Hold time the sender must grant on the source transfer.
    pub source_hold_duration: Duration,
    pub destination_hold_duration: Duration,
    /// Ledger the connector pays out on.
    pub payout_ledger: String,
    /// Peer the payment would be forwarded to; `None` when delivered locally.
    pub next_hop: Option<String>,
    /// Hops the quote crosses, this connector's own included.
    pub hops: u32,
    /// The payout exceeded the connector's cached balance when quoted.
    pub liquidity_warning: bool,
}
