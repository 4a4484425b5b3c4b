use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use dashmap::DashMap;

use crate::error::LedgerError;
use crate::ledgers::Ledgers;

/// Default time a cached balance is trusted.
pub const DEFAULT_BALANCE_TTL: Duration = Duration::from_secs(60);

/// A cached balance for one ledger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BalanceCacheEntry {
    pub ledger_prefix: String,
    pub balance: u64,
    pub fetched_at: DateTime<Utc>,
}

impl BalanceCacheEntry {
    pub fn is_fresh(&self, ttl: Duration, now: DateTime<Utc>) -> bool {
        now.signed_duration_since(self.fetched_at)
            .to_std()
            .map_or(true, |age| age < ttl)
    }
}

/// TTL-bounded cache of the connector's balance on each ledger.
///
/// Reads are informational: they bound quotes by available liquidity but
/// never guarantee it.
pub struct BalanceCache {
    ledgers: Arc<Ledgers>,
    ttl: Duration,
    entries: DashMap<String, BalanceCacheEntry>,
}

impl BalanceCache {
    pub fn new(ledgers: Arc<Ledgers>) -> Self {
        Self::with_ttl(ledgers, DEFAULT_BALANCE_TTL)
    }

    pub fn with_ttl(ledgers: Arc<Ledgers>, ttl: Duration) -> Self {
        Self {
            ledgers,
            ttl,
            entries: DashMap::new(),
        }
    }

    /// The balance on `ledger_prefix`, refreshed from the ledger when stale.
    pub async fn get(&self, ledger_prefix: &str) -> Result<u64, LedgerError> {
        if let Some(entry) = self.peek(ledger_prefix) {
            if entry.is_fresh(self.ttl, Utc::now()) {
                return Ok(entry.balance);
            }
        }
        self.refresh(ledger_prefix).await
    }

    /// The cached entry without triggering a refresh.
    pub fn peek(&self, ledger_prefix: &str) -> Option<BalanceCacheEntry> {
        self.entries.get(ledger_prefix).map(|e| e.value().clone())
    }

    /// Fetch the balance from the ledger and cache it.
    pub async fn refresh(&self, ledger_prefix: &str) -> Result<u64, LedgerError> {
        let balance = self.ledgers.get_balance(ledger_prefix).await?;
        tracing::debug!(ledger = %ledger_prefix, balance, "refreshed balance");
        self.entries.insert(
            ledger_prefix.to_string(),
            BalanceCacheEntry {
                ledger_prefix: ledger_prefix.to_string(),
                balance,
                fetched_at: Utc::now(),
            },
        );
        Ok(balance)
    }

    pub fn invalidate(&self, ledger_prefix: &str) {
        self.entries.remove(ledger_prefix);
    }

    /// Drop every cached balance.
    pub fn reset(&self) {
        self.entries.clear();
    }
}
