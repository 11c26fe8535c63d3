//! Wire envelopes.
//!
//! Frames are JSON objects discriminated by a `type` field. The discriminants
//! `"TEXT"`, `"SECURE"` and `"KEY_EXCHANGE"` and the field names below are
//! shared with existing peers and must not change.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::crypto::{codec, DecodeError, EncryptedPayload, NONCE_LEN};

pub const TYPE_TEXT: &str = "TEXT";
pub const TYPE_SECURE: &str = "SECURE";
pub const TYPE_KEY_EXCHANGE: &str = "KEY_EXCHANGE";

#[derive(Debug, Error)]
pub enum FrameError {
    #[error("frame is not valid JSON for its type: {0}")]
    Json(#[from] serde_json::Error),
    #[error("frame is not a JSON object")]
    NotAnObject,
}

/// Base64 ciphertext and nonce of a symmetric payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptedContent {
    pub ciphertext: String,
    #[serde(rename = "iv")]
    pub nonce: String,
}

impl EncryptedContent {
    pub fn from_payload(payload: &EncryptedPayload) -> Self {
        Self {
            ciphertext: codec::encode_bytes(&payload.ciphertext),
            nonce: codec::encode_bytes(&payload.nonce),
        }
    }

    pub fn to_payload(&self) -> Result<EncryptedPayload, DecodeError> {
        let ciphertext = codec::decode_bytes(&self.ciphertext)?;
        let raw_nonce = codec::decode_bytes(&self.nonce)?;
        let nonce: [u8; NONCE_LEN] =
            raw_nonce
                .as_slice()
                .try_into()
                .map_err(|_| DecodeError::InvalidLength {
                    expected: NONCE_LEN,
                    actual: raw_nonce.len(),
                })?;
        Ok(EncryptedPayload { ciphertext, nonce })
    }
}

/// Unauthenticated, unencrypted chat message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlainEnvelope {
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sender: Option<String>,
}

/// Hybrid-encrypted, signed chat message. Self-describing: the recipient
/// needs only its own private key to open it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SecureEnvelope {
    pub encrypted_content: EncryptedContent,
    #[serde(rename = "encryptedAESKey")]
    pub wrapped_session_key: String,
    pub signature: String,
    pub sender_public_key: String,
    #[serde(default)]
    pub timestamp: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sender: Option<String>,
}

/// Signed delivery of a fresh session key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyExchangeEnvelope {
    pub sender_public_key: String,
    #[serde(rename = "encryptedSessionKey")]
    pub wrapped_session_key: String,
    pub signature: String,
    #[serde(default)]
    pub timestamp: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sender: Option<String>,
}

/// Any frame carried by the transport.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Frame {
    #[serde(rename = "TEXT")]
    Text(PlainEnvelope),
    #[serde(rename = "SECURE")]
    Secure(SecureEnvelope),
    #[serde(rename = "KEY_EXCHANGE")]
    KeyExchange(KeyExchangeEnvelope),
}

impl Frame {
    /// Decode a raw transport frame. Frames whose `type` is missing or
    /// unknown are read as plain text.
    pub fn parse(raw: &str) -> Result<Self, FrameError> {
        let value: Value = serde_json::from_str(raw)?;
        let kind = value
            .as_object()
            .ok_or(FrameError::NotAnObject)?
            .get("type")
            .and_then(Value::as_str)
            .unwrap_or(TYPE_TEXT);

        match kind {
            TYPE_SECURE | TYPE_KEY_EXCHANGE => Ok(serde_json::from_value(value)?),
            _ => Ok(Frame::Text(serde_json::from_value(value)?)),
        }
    }

    pub fn to_json(&self) -> Result<String, FrameError> {
        Ok(serde_json::to_string(self)?)
    }

    /// Wire discriminant of this frame.
    pub fn kind(&self) -> &'static str {
        match self {
            Frame::Text(_) => TYPE_TEXT,
            Frame::Secure(_) => TYPE_SECURE,
            Frame::KeyExchange(_) => TYPE_KEY_EXCHANGE,
        }
    }

    pub fn sender(&self) -> Option<&str> {
        match self {
            Frame::Text(env) => env.sender.as_deref(),
            Frame::Secure(env) => env.sender.as_deref(),
            Frame::KeyExchange(env) => env.sender.as_deref(),
        }
    }
}

impl From<PlainEnvelope> for Frame {
    fn from(env: PlainEnvelope) -> Self {
        Frame::Text(env)
    }
}

impl From<SecureEnvelope> for Frame {
    fn from(env: SecureEnvelope) -> Self {
        Frame::Secure(env)
    }
}

impl From<KeyExchangeEnvelope> for Frame {
    fn from(env: KeyExchangeEnvelope) -> Self {
        Frame::KeyExchange(env)
    }
}
