/// Core protocol errors.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("invalid packet: {0}")]
    InvalidPacket(String),

    #[error("unexpected packet type: {0}")]
    UnexpectedPacketType(u8),

    #[error("invalid curve: {0}")]
    InvalidCurve(String),

    #[error("invalid address: {0}")]
    InvalidAddress(String),

    #[error("base64 decode error: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}
