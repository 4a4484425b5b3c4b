use connector_core::IlpError;
use connector_routing::RoutingError;

/// Errors raised while handling an inbound request.
#[derive(Debug, thiserror::Error)]
pub enum RouterError {
    /// The request envelope or payload does not match the protocol.
    #[error("malformed request: {0}")]
    MalformedRequest(String),

    /// A failure reported to the requester as an error packet.
    #[error("{} {}: {}", .0.code, .0.name, .0.data)]
    Protocol(IlpError),

    #[error("routing error: {0}")]
    Routing(RoutingError),
}

impl From<RoutingError> for RouterError {
    fn from(err: RoutingError) -> Self {
        match err {
            RoutingError::MalformedUpdate(reason) => RouterError::MalformedRequest(reason),
            other => RouterError::Routing(other),
        }
    }
}
