//! Dispatch of inbound ledger requests.
//!
//! Binary packets go to the quoter, `broadcast_routes` control messages go to
//! the route broadcaster. Protocol failures are answered with an error packet
//! that carries this connector's address in its forwarding trail.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use connector_core::{
    error_code, CustomMessage, IlpError, Packet, QuoteByDestinationResponse,
    QuoteBySourceResponse, RequestMessage, ResponseMessage, METHOD_BROADCAST_ROUTES,
};
use connector_ledgers::{LedgerError, RequestHandler};
use connector_quoting::{QuoteByDestinationParams, QuoteBySourceParams, QuoteError, RouteBuilder};
use connector_routing::RouteBroadcaster;

use crate::error::RouterError;

/// The connector's single inbound request handler.
pub struct MessageRouter {
    route_builder: Arc<RouteBuilder>,
    broadcaster: Arc<RouteBroadcaster>,
}

impl MessageRouter {
    pub fn new(route_builder: Arc<RouteBuilder>, broadcaster: Arc<RouteBroadcaster>) -> Self {
        Self {
            route_builder,
            broadcaster,
        }
    }

    /// Handle one request envelope.
    ///
    /// Exactly one of `ilp` or `custom` must be present. Protocol failures
    /// become an error packet response; anything else is returned as an error.
    /// Unknown custom methods are ignored and answered with `None`.
    pub async fn handle_request(
        &self,
        request: RequestMessage,
    ) -> Result<Option<ResponseMessage>, RouterError> {
        let result = match (&request.ilp, &request.custom) {
            (Some(ilp), None) => self.handle_packet(&request, ilp).await.map(Some),
            (None, Some(custom)) => self.handle_custom(&request, custom).await,
            (None, None) => {
                return Err(RouterError::MalformedRequest(
                    "request carries neither an ilp packet nor a custom message".into(),
                ))
            }
            (Some(_), Some(_)) => {
                return Err(RouterError::MalformedRequest(
                    "request carries both an ilp packet and a custom message".into(),
                ))
            }
        };

        match result {
            Err(RouterError::Protocol(err)) => {
                let err = err.forwarded_through(request.to.clone());
                tracing::debug!(
                    from = %request.from,
                    code = %err.code,
                    data = %err.data,
                    "rejecting request with error packet"
                );
                Ok(Some(request.reply().with_packet(&Packet::Error(err))))
            }
            other => other,
        }
    }

    async fn handle_packet(
        &self,
        request: &RequestMessage,
        ilp: &str,
    ) -> Result<ResponseMessage, RouterError> {
        let packet = Packet::from_base64(ilp).map_err(|e| {
            RouterError::Protocol(IlpError::new(
                error_code::INVALID_PACKET,
                "Invalid Packet",
                request.to.clone(),
                e.to_string(),
            ))
        })?;

        let response = match packet {
            Packet::QuoteBySourceRequest(req) => {
                let quote = self
                    .route_builder
                    .quote_by_source(QuoteBySourceParams {
                        source_account: request.from.clone(),
                        destination_account: req.destination_account,
                        source_amount: req.source_amount,
                        destination_hold_duration: hold_from_millis(req.destination_hold_duration),
                    })
                    .await
                    .map_err(|e| classify(e, &request.to))?;
                Packet::QuoteBySourceResponse(QuoteBySourceResponse {
                    destination_amount: quote.destination_amount,
                    source_hold_duration: millis_u32(quote.source_hold_duration),
                })
            }
            Packet::QuoteByDestinationRequest(req) => {
                let quote = self
                    .route_builder
                    .quote_by_destination(QuoteByDestinationParams {
                        source_account: request.from.clone(),
                        destination_account: req.destination_account,
                        destination_amount: req.destination_amount,
                        destination_hold_duration: hold_from_millis(req.destination_hold_duration),
                    })
                    .await
                    .map_err(|e| classify(e, &request.to))?;
                Packet::QuoteByDestinationResponse(QuoteByDestinationResponse {
                    source_amount: quote.source_amount,
                    source_hold_duration: millis_u32(quote.source_hold_duration),
                })
            }
            other => {
                return Err(RouterError::Protocol(IlpError::new(
                    error_code::INVALID_PACKET,
                    "Invalid Packet",
                    request.to.clone(),
                    format!("Packet has unexpected type {}", other.packet_type()),
                )))
            }
        };
        Ok(request.reply().with_packet(&response))
    }

    async fn handle_custom(
        &self,
        request: &RequestMessage,
        custom: &CustomMessage,
    ) -> Result<Option<ResponseMessage>, RouterError> {
        if custom.method != METHOD_BROADCAST_ROUTES {
            tracing::warn!(
                method = %custom.method,
                from = %request.from,
                "ignoring unknown request method"
            );
            return Ok(None);
        }
        self.broadcaster
            .receive_routes(&custom.data, &request.from)
            .await?;
        Ok(None)
    }
}

#[async_trait]
impl RequestHandler for MessageRouter {
    async fn handle_request(
        &self,
        request: RequestMessage,
    ) -> Result<Option<ResponseMessage>, LedgerError> {
        let to = request.to.clone();
        MessageRouter::handle_request(self, request)
            .await
            .map_err(|e| {
                tracing::warn!(to = %to, error = %e, "failed to handle request");
                LedgerError::RequestFailed {
                    to,
                    reason: e.to_string(),
                }
            })
    }
}

/// Every quote failure is answered with an error packet.
fn classify(err: QuoteError, triggered_by: &str) -> RouterError {
    RouterError::Protocol(err.to_ilp_error(triggered_by))
}

/// Zero means the requester left the destination hold to the connector.
fn hold_from_millis(millis: u32) -> Option<Duration> {
    (millis > 0).then(|| Duration::from_millis(u64::from(millis)))
}

fn millis_u32(duration: Duration) -> u32 {
    u32::try_from(duration.as_millis()).unwrap_or(u32::MAX)
}
