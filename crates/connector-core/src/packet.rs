//! Binary quote protocol packets.
//!
//! Every packet is framed as `[type: u8][length: var-uint][contents]`.
//! Lengths use the canonical short/long form: a single byte below 128,
//! otherwise `0x80 | n` followed by `n` big-endian length bytes. Strings are
//! length-prefixed octet strings, amounts are `u64` big-endian and hold
//! durations are `u32` milliseconds big-endian.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use bytes::{Buf, BufMut, BytesMut};
use chrono::{DateTime, SecondsFormat, Utc};

use crate::error::CoreError;

/// Packet type tags.
pub mod packet_type {
    pub const LIQUIDITY_REQUEST: u8 = 2;
    pub const LIQUIDITY_RESPONSE: u8 = 3;
    pub const QUOTE_BY_SOURCE_REQUEST: u8 = 4;
    pub const QUOTE_BY_SOURCE_RESPONSE: u8 = 5;
    pub const QUOTE_BY_DESTINATION_REQUEST: u8 = 6;
    pub const QUOTE_BY_DESTINATION_RESPONSE: u8 = 7;
    pub const ERROR: u8 = 8;
}

/// Error codes carried in error packets.
pub mod error_code {
    pub const INVALID_PACKET: &str = "F01";
    pub const UNREACHABLE: &str = "F02";
    pub const UNACCEPTABLE_EXPIRY: &str = "R02";
    pub const INSUFFICIENT_LIQUIDITY: &str = "T04";
}

/// Request a quote that fixes the source amount.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuoteBySourceRequest {
    pub destination_account: String,
    pub source_amount: u64,
    pub destination_hold_duration: u32,
}

/// Quote answering a [`QuoteBySourceRequest`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuoteBySourceResponse {
    pub destination_amount: u64,
    pub source_hold_duration: u32,
}

/// Request a quote that fixes the destination amount.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuoteByDestinationRequest {
    pub destination_account: String,
    pub destination_amount: u64,
    pub destination_hold_duration: u32,
}

/// Quote answering a [`QuoteByDestinationRequest`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuoteByDestinationResponse {
    pub source_amount: u64,
    pub source_hold_duration: u32,
}

/// A protocol error, returned to the requester instead of a quote.
///
/// `forwarded_by` is append-only: every connector that relays the error adds
/// its own address, giving the requester the full forwarding chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IlpError {
    pub code: String,
    pub name: String,
    pub triggered_by: String,
    pub forwarded_by: Vec<String>,
    pub triggered_at: DateTime<Utc>,
    pub data: String,
}

impl IlpError {
    pub fn new(
        code: &str,
        name: &str,
        triggered_by: impl Into<String>,
        data: impl Into<String>,
    ) -> Self {
        Self {
            code: code.to_string(),
            name: name.to_string(),
            triggered_by: triggered_by.into(),
            forwarded_by: Vec::new(),
            triggered_at: Utc::now(),
            data: data.into(),
        }
    }

    /// Return a copy of this error with `address` appended to the forwarding trail.
    pub fn forwarded_through(mut self, address: impl Into<String>) -> Self {
        self.forwarded_by.push(address.into());
        self
    }
}

/// All packets understood by the codec.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Packet {
    QuoteBySourceRequest(QuoteBySourceRequest),
    QuoteBySourceResponse(QuoteBySourceResponse),
    QuoteByDestinationRequest(QuoteByDestinationRequest),
    QuoteByDestinationResponse(QuoteByDestinationResponse),
    Error(IlpError),
}

impl Packet {
    /// The type tag written as the first byte.
    pub fn packet_type(&self) -> u8 {
        match self {
            Packet::QuoteBySourceRequest(_) => packet_type::QUOTE_BY_SOURCE_REQUEST,
            Packet::QuoteBySourceResponse(_) => packet_type::QUOTE_BY_SOURCE_RESPONSE,
            Packet::QuoteByDestinationRequest(_) => packet_type::QUOTE_BY_DESTINATION_REQUEST,
            Packet::QuoteByDestinationResponse(_) => packet_type::QUOTE_BY_DESTINATION_RESPONSE,
            Packet::Error(_) => packet_type::ERROR,
        }
    }

    /// Encode to the binary wire format.
    pub fn serialize(&self) -> Vec<u8> {
        let mut contents = BytesMut::new();
        match self {
            Packet::QuoteBySourceRequest(req) => {
                put_var_octets(&mut contents, req.destination_account.as_bytes());
                contents.put_u64(req.source_amount);
                contents.put_u32(req.destination_hold_duration);
            }
            Packet::QuoteBySourceResponse(resp) => {
                contents.put_u64(resp.destination_amount);
                contents.put_u32(resp.source_hold_duration);
            }
            Packet::QuoteByDestinationRequest(req) => {
                put_var_octets(&mut contents, req.destination_account.as_bytes());
                contents.put_u64(req.destination_amount);
                contents.put_u32(req.destination_hold_duration);
            }
            Packet::QuoteByDestinationResponse(resp) => {
                contents.put_u64(resp.source_amount);
                contents.put_u32(resp.source_hold_duration);
            }
            Packet::Error(err) => {
                contents.put_slice(err.code.as_bytes());
                put_var_octets(&mut contents, err.name.as_bytes());
                put_var_octets(&mut contents, err.triggered_by.as_bytes());
                put_length(&mut contents, err.forwarded_by.len());
                for address in &err.forwarded_by {
                    put_var_octets(&mut contents, address.as_bytes());
                }
                let triggered_at = err
                    .triggered_at
                    .to_rfc3339_opts(SecondsFormat::Millis, true);
                put_var_octets(&mut contents, triggered_at.as_bytes());
                put_var_octets(&mut contents, err.data.as_bytes());
            }
        }

        let mut out = BytesMut::with_capacity(contents.len() + 4);
        out.put_u8(self.packet_type());
        put_var_octets(&mut out, &contents);
        out.to_vec()
    }

    /// Decode from the binary wire format.
    pub fn deserialize(data: &[u8]) -> Result<Self, CoreError> {
        let mut buf = data;
        if !buf.has_remaining() {
            return Err(CoreError::InvalidPacket("empty packet".into()));
        }
        let tag = buf.get_u8();
        let mut contents = read_var_octets(&mut buf)?;
        if buf.has_remaining() {
            return Err(CoreError::InvalidPacket(format!(
                "{} trailing bytes after packet",
                buf.remaining()
            )));
        }

        let packet = match tag {
            packet_type::QUOTE_BY_SOURCE_REQUEST => {
                Packet::QuoteBySourceRequest(QuoteBySourceRequest {
                    destination_account: read_string(&mut contents)?,
                    source_amount: read_u64(&mut contents)?,
                    destination_hold_duration: read_u32(&mut contents)?,
                })
            }
            packet_type::QUOTE_BY_SOURCE_RESPONSE => {
                Packet::QuoteBySourceResponse(QuoteBySourceResponse {
                    destination_amount: read_u64(&mut contents)?,
                    source_hold_duration: read_u32(&mut contents)?,
                })
            }
            packet_type::QUOTE_BY_DESTINATION_REQUEST => {
                Packet::QuoteByDestinationRequest(QuoteByDestinationRequest {
                    destination_account: read_string(&mut contents)?,
                    destination_amount: read_u64(&mut contents)?,
                    destination_hold_duration: read_u32(&mut contents)?,
                })
            }
            packet_type::QUOTE_BY_DESTINATION_RESPONSE => {
                Packet::QuoteByDestinationResponse(QuoteByDestinationResponse {
                    source_amount: read_u64(&mut contents)?,
                    source_hold_duration: read_u32(&mut contents)?,
                })
            }
            packet_type::ERROR => Packet::Error(read_error(&mut contents)?),
            other => return Err(CoreError::UnexpectedPacketType(other)),
        };

        if contents.has_remaining() {
            return Err(CoreError::InvalidPacket(format!(
                "{} unread bytes in packet contents",
                contents.remaining()
            )));
        }
        Ok(packet)
    }

    /// Encode as base64, the form carried in a message envelope.
    pub fn to_base64(&self) -> String {
        STANDARD.encode(self.serialize())
    }

    /// Decode from the base64 form carried in a message envelope.
    pub fn from_base64(encoded: &str) -> Result<Self, CoreError> {
        let raw = STANDARD.decode(encoded)?;
        Self::deserialize(&raw)
    }
}

fn read_error(buf: &mut &[u8]) -> Result<IlpError, CoreError> {
    if buf.remaining() < 3 {
        return Err(CoreError::InvalidPacket("truncated error code".into()));
    }
    let code = String::from_utf8(buf[..3].to_vec())
        .map_err(|e| CoreError::InvalidPacket(format!("error code is not utf-8: {}", e)))?;
    buf.advance(3);
    let name = read_string(buf)?;
    let triggered_by = read_string(buf)?;
    let count = read_length(buf)?;
    let mut forwarded_by = Vec::with_capacity(count.min(64));
    for _ in 0..count {
        forwarded_by.push(read_string(buf)?);
    }
    let triggered_at = read_string(buf)?;
    let triggered_at = DateTime::parse_from_rfc3339(&triggered_at)
        .map_err(|e| CoreError::InvalidPacket(format!("bad triggered_at: {}", e)))?
        .with_timezone(&Utc);
    let data = read_string(buf)?;
    Ok(IlpError {
        code,
        name,
        triggered_by,
        forwarded_by,
        triggered_at,
        data,
    })
}

fn put_length(buf: &mut BytesMut, len: usize) {
    if len < 0x80 {
        buf.put_u8(len as u8);
        return;
    }
    let bytes = (len as u64).to_be_bytes();
    let skip = bytes.iter().take_while(|b| **b == 0).count();
    let significant = &bytes[skip..];
    buf.put_u8(0x80 | significant.len() as u8);
    buf.put_slice(significant);
}

fn put_var_octets(buf: &mut BytesMut, data: &[u8]) {
    put_length(buf, data.len());
    buf.put_slice(data);
}

fn read_length(buf: &mut &[u8]) -> Result<usize, CoreError> {
    if !buf.has_remaining() {
        return Err(CoreError::InvalidPacket("missing length prefix".into()));
    }
    let first = buf.get_u8();
    if first & 0x80 == 0 {
        return Ok(first as usize);
    }
    let width = (first & 0x7f) as usize;
    if width == 0 || width > 8 {
        return Err(CoreError::InvalidPacket(format!(
            "unsupported length-of-length: {}",
            width
        )));
    }
    if buf.remaining() < width {
        return Err(CoreError::InvalidPacket("truncated length prefix".into()));
    }
    let mut len: u64 = 0;
    for _ in 0..width {
        len = (len << 8) | buf.get_u8() as u64;
    }
    usize::try_from(len).map_err(|_| CoreError::InvalidPacket("length overflow".into()))
}

fn read_var_octets<'a>(buf: &mut &'a [u8]) -> Result<&'a [u8], CoreError> {
    let len = read_length(buf)?;
    if buf.remaining() < len {
        return Err(CoreError::InvalidPacket(format!(
            "declared length {} exceeds remaining {}",
            len,
            buf.remaining()
        )));
    }
    let whole: &'a [u8] = *buf;
    let (head, tail) = whole.split_at(len);
    *buf = tail;
    Ok(head)
}

fn read_string(buf: &mut &[u8]) -> Result<String, CoreError> {
    let raw = read_var_octets(buf)?;
    String::from_utf8(raw.to_vec())
        .map_err(|e| CoreError::InvalidPacket(format!("string is not utf-8: {}", e)))
}

fn read_u64(buf: &mut &[u8]) -> Result<u64, CoreError> {
    if buf.remaining() < 8 {
        return Err(CoreError::InvalidPacket("truncated u64".into()));
    }
    Ok(buf.get_u64())
}

fn read_u32(buf: &mut &[u8]) -> Result<u32, CoreError> {
    if buf.remaining() < 4 {
        return Err(CoreError::InvalidPacket("truncated u32".into()));
    }
    Ok(buf.get_u32())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quote_by_source_request_layout() {
        let packet = Packet::QuoteBySourceRequest(QuoteBySourceRequest {
            destination_account: "usd.bob".into(),
            source_amount: 100,
            destination_hold_duration: 5000,
        });
        let bytes = packet.serialize();
        assert_eq!(bytes[0], packet_type::QUOTE_BY_SOURCE_REQUEST);
        // 1 (len) + 7 (account) + 8 (amount) + 4 (duration)
        assert_eq!(bytes[1], 20);
        assert_eq!(&bytes[3..10], b"usd.bob");
        assert_eq!(Packet::deserialize(&bytes).unwrap(), packet);
    }

    #[test]
    fn test_long_form_length_prefix() {
        let account = format!("usd.{}", "x".repeat(300));
        let packet = Packet::QuoteByDestinationRequest(QuoteByDestinationRequest {
            destination_account: account.clone(),
            destination_amount: 42,
            destination_hold_duration: 1000,
        });
        let bytes = packet.serialize();
        // contents exceed 127 bytes, so the outer length uses the long form
        assert_eq!(bytes[1], 0x82);
        match Packet::deserialize(&bytes).unwrap() {
            Packet::QuoteByDestinationRequest(req) => {
                assert_eq!(req.destination_account, account);
                assert_eq!(req.destination_amount, 42);
            }
            other => panic!("wrong packet: {:?}", other),
        }
    }

    #[test]
    fn test_error_packet_keeps_forwarding_trail() {
        let err = IlpError::new(error_code::UNREACHABLE, "Unreachable", "usd.connie", "no route")
            .forwarded_through("eur.connie")
            .forwarded_through("cad.connie");
        let packet = Packet::Error(err);
        let decoded = Packet::from_base64(&packet.to_base64()).unwrap();
        match decoded {
            Packet::Error(e) => {
                assert_eq!(e.code, "F02");
                assert_eq!(e.triggered_by, "usd.connie");
                assert_eq!(e.forwarded_by, vec!["eur.connie", "cad.connie"]);
                assert_eq!(e.data, "no route");
            }
            other => panic!("wrong packet: {:?}", other),
        }
    }

    #[test]
    fn test_unknown_type_is_rejected() {
        let bytes = [packet_type::LIQUIDITY_REQUEST, 0];
        assert!(matches!(
            Packet::deserialize(&bytes),
            Err(CoreError::UnexpectedPacketType(2))
        ));
    }

    #[test]
    fn test_truncated_packets_are_rejected() {
        assert!(Packet::deserialize(&[]).is_err());
        assert!(Packet::deserialize(&[packet_type::QUOTE_BY_SOURCE_RESPONSE, 12, 0, 0]).is_err());

        let mut bytes = Packet::QuoteBySourceResponse(QuoteBySourceResponse {
            destination_amount: 1,
            source_hold_duration: 2,
        })
        .serialize();
        bytes.push(0);
        assert!(Packet::deserialize(&bytes).is_err());
    }

    #[test]
    fn test_invalid_base64() {
        assert!(matches!(
            Packet::from_base64("not base64!!"),
            Err(CoreError::Base64(_))
        ));
    }
}
