use connector_core::CoreError;

/// Ledger-layer errors.
#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    #[error("ledger not registered: {0}")]
    NotFound(String),

    #[error("ledger already registered: {0}")]
    AlreadyRegistered(String),

    #[error("ledger not connected: {0}")]
    Disconnected(String),

    #[error("no request handler registered for {0}")]
    NoHandler(String),

    #[error("request to {to} failed: {reason}")]
    RequestFailed { to: String, reason: String },

    #[error("invalid ledger prefix: {0}")]
    InvalidPrefix(#[from] CoreError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = LedgerError::RequestFailed {
            to: "usd-ledger.mark".into(),
            reason: "timeout".into(),
        };
        assert_eq!(err.to_string(), "request to usd-ledger.mark failed: timeout");
        assert_eq!(
            LedgerError::NotFound("cad-ledger.".into()).to_string(),
            "ledger not registered: cad-ledger."
        );
    }
}
