//! Connector quoting — prices payments through the connector.
//!
//! This crate provides:
//! - [`RouteBuilder`] — quotes by source or destination amount over local pairs and learned routes.
//! - [`QuoteBySourceParams`] / [`QuoteByDestinationParams`] / [`Quote`] — request and result types.
//! - [`QuoteError`] — failures, with their protocol error classification.

pub mod builder;
pub mod config;
pub mod error;
pub mod quote;

pub use builder::RouteBuilder;
pub use config::QuoterConfig;
pub use error::QuoteError;
pub use quote::{Quote, QuoteByDestinationParams, QuoteBySourceParams};
