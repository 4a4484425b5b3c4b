//! Request/response envelopes exchanged with peers over a ledger.
//!
//! Exactly one of `ilp` (a base64 binary packet) or `custom` (a structured
//! control message) is expected on a request.

use serde::{Deserialize, Serialize};

use crate::packet::Packet;

/// Control method carrying route advertisements and heartbeats.
pub const METHOD_BROADCAST_ROUTES: &str = "broadcast_routes";

/// A structured control message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomMessage {
    pub method: String,
    #[serde(default)]
    pub data: serde_json::Value,
}

impl CustomMessage {
    pub fn new(method: impl Into<String>, data: serde_json::Value) -> Self {
        Self {
            method: method.into(),
            data,
        }
    }
}

/// An inbound request delivered by a ledger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestMessage {
    /// Prefix of the ledger the message travelled over.
    pub ledger: String,
    pub from: String,
    pub to: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ilp: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom: Option<CustomMessage>,
}

impl RequestMessage {
    /// A request carrying a binary packet.
    pub fn with_packet(
        ledger: impl Into<String>,
        from: impl Into<String>,
        to: impl Into<String>,
        packet: &Packet,
    ) -> Self {
        Self {
            ledger: ledger.into(),
            from: from.into(),
            to: to.into(),
            ilp: Some(packet.to_base64()),
            custom: None,
        }
    }

    /// A request carrying a control message.
    pub fn with_custom(
        ledger: impl Into<String>,
        from: impl Into<String>,
        to: impl Into<String>,
        custom: CustomMessage,
    ) -> Self {
        Self {
            ledger: ledger.into(),
            from: from.into(),
            to: to.into(),
            ilp: None,
            custom: Some(custom),
        }
    }

    /// An empty response envelope addressed back to the sender.
    pub fn reply(&self) -> ResponseMessage {
        ResponseMessage {
            ledger: self.ledger.clone(),
            from: self.to.clone(),
            to: self.from.clone(),
            ilp: None,
            custom: None,
        }
    }
}

/// A response returned to the requester; `from`/`to` are swapped relative to the request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseMessage {
    pub ledger: String,
    pub from: String,
    pub to: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ilp: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom: Option<CustomMessage>,
}

impl ResponseMessage {
    /// Attach a binary packet to the response.
    pub fn with_packet(mut self, packet: &Packet) -> Self {
        self.ilp = Some(packet.to_base64());
        self
    }

    /// Decode the binary packet, if any.
    pub fn packet(&self) -> Option<Result<Packet, crate::CoreError>> {
        self.ilp.as_deref().map(Packet::from_base64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::packet::QuoteBySourceResponse;

    #[test]
    fn test_reply_swaps_endpoints() {
        let req = RequestMessage::with_custom(
            "usd-ledger.",
            "usd-ledger.mark",
            "usd-ledger.connie",
            CustomMessage::new(METHOD_BROADCAST_ROUTES, serde_json::json!({})),
        );
        let resp = req.reply();
        assert_eq!(resp.ledger, "usd-ledger.");
        assert_eq!(resp.from, "usd-ledger.connie");
        assert_eq!(resp.to, "usd-ledger.mark");
        assert!(resp.ilp.is_none());
        assert!(resp.custom.is_none());
    }

    #[test]
    fn test_response_packet_roundtrip() {
        let packet = Packet::QuoteBySourceResponse(QuoteBySourceResponse {
            destination_amount: 99,
            source_hold_duration: 6000,
        });
        let resp = ResponseMessage {
            ledger: "usd.".into(),
            from: "usd.a".into(),
            to: "usd.b".into(),
            ilp: None,
            custom: None,
        }
        .with_packet(&packet);
        assert_eq!(resp.packet().unwrap().unwrap(), packet);
    }

    #[test]
    fn test_envelope_json_omits_missing_payloads() {
        let req = RequestMessage {
            ledger: "usd.".into(),
            from: "usd.a".into(),
            to: "usd.b".into(),
            ilp: None,
            custom: None,
        };
        let json = serde_json::to_value(&req).unwrap();
        assert!(json.get("ilp").is_none());
        assert!(json.get("custom").is_none());

        let decoded: RequestMessage =
            serde_json::from_str(r#"{"ledger":"usd.","from":"usd.a","to":"usd.b","custom":{"method":"ping"}}"#)
                .unwrap();
        assert_eq!(decoded.custom.unwrap().data, serde_json::Value::Null);
    }
}
