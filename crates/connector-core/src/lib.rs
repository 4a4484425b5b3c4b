//! Connector core — shared types for the route propagation and quoting engine.
//!
//! This crate provides:
//! - ILP address and ledger-prefix helpers, including the reserved peer-link namespace.
//! - [`LiquidityCurve`] — the monotonic amount mapping of a single hop, with composition.
//! - [`Packet`] — the binary quote protocol codec and the [`IlpError`] packet.
//! - [`RequestMessage`] / [`ResponseMessage`] — envelopes exchanged with peers over a ledger.

pub mod address;
pub mod curve;
pub mod duration_millis;
pub mod error;
pub mod message;
pub mod packet;

pub use address::{has_prefix, is_peer_prefix, longest_prefix_match, PEER_LEDGER_PREFIX};
pub use curve::LiquidityCurve;
pub use error::CoreError;
pub use message::{CustomMessage, RequestMessage, ResponseMessage, METHOD_BROADCAST_ROUTES};
pub use packet::{
    error_code, packet_type, IlpError, Packet, QuoteByDestinationRequest,
    QuoteByDestinationResponse, QuoteBySourceRequest, QuoteBySourceResponse,
};
