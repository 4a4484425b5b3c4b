//! ILP address and ledger prefix helpers.
//!
//! A ledger prefix is a dot-terminated namespace such as `usd-ledger.`;
//! accounts on that ledger are addressed as `<prefix><name>`.

use crate::error::CoreError;

/// Address namespace reserved for direct connector-to-connector links.
/// Routes to destinations under this prefix are never stored or re-advertised.
pub const PEER_LEDGER_PREFIX: &str = "peer.";

/// Returns true if the prefix (or address) falls under the peer-reserved namespace.
pub fn is_peer_prefix(prefix: &str) -> bool {
    prefix.starts_with(PEER_LEDGER_PREFIX)
}

/// Returns true if `address` lives under `prefix`.
pub fn has_prefix(address: &str, prefix: &str) -> bool {
    !prefix.is_empty() && address.starts_with(prefix)
}

/// Pick the longest prefix from `prefixes` that `address` starts with.
pub fn longest_prefix_match<'a, I>(address: &str, prefixes: I) -> Option<&'a str>
where
    I: IntoIterator<Item = &'a str>,
{
    prefixes
        .into_iter()
        .filter(|p| has_prefix(address, p))
        .max_by_key(|p| p.len())
}

/// Build an account address on a ledger.
pub fn account_on(prefix: &str, name: &str) -> String {
    format!("{}{}", prefix, name)
}

/// Validate that a ledger prefix is non-empty and dot-terminated.
pub fn validate_prefix(prefix: &str) -> Result<(), CoreError> {
    if prefix.is_empty() {
        return Err(CoreError::InvalidAddress("empty ledger prefix".into()));
    }
    if !prefix.ends_with('.') {
        return Err(CoreError::InvalidAddress(format!(
            "ledger prefix must end with '.': {}",
            prefix
        )));
    }
    if prefix.chars().any(char::is_whitespace) {
        return Err(CoreError::InvalidAddress(format!(
            "ledger prefix contains whitespace: {:?}",
            prefix
        )));
    }
    Ok(())
}
