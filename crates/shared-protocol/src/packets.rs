//! JSON bodies exchanged over the channel endpoints

use base64::{Engine, engine::general_purpose::STANDARD};
use serde::{Deserialize, Serialize};

use crate::{IV_SIZE, ProtocolError, ProtocolResult, SessionId};

/// Handshake request: the session key wrapped under the server public key
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSessionRequest {
    /// Base64 RSA-OAEP ciphertext
    #[serde(default)]
    pub encrypted_key: Option<String>,
}

impl CreateSessionRequest {
    pub fn new(encrypted_key: impl Into<String>) -> Self {
        Self {
            encrypted_key: Some(encrypted_key.into()),
        }
    }

    /// The wrapped key, or an error when the field is absent or empty
    pub fn encrypted_key(&self) -> ProtocolResult<&str> {
        match self.encrypted_key.as_deref() {
            Some(key) if !key.is_empty() => Ok(key),
            _ => Err(ProtocolError::MissingField("encryptedKey")),
        }
    }
}

/// Handshake response
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSessionResponse {
    pub session_id: SessionId,
}

/// Secure message body as it arrives on the wire (all fields base64)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EnvelopeBody {
    #[serde(default)]
    pub iv: Option<String>,
    /// Encrypted body followed by the 16-byte tag
    #[serde(default)]
    pub ciphertext: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aad: Option<String>,
}

/// Decoded secure message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    pub iv: [u8; IV_SIZE],
    /// Encrypted body followed by the 16-byte tag
    pub ciphertext: Vec<u8>,
    pub aad: Option<Vec<u8>>,
}

impl Envelope {
    /// Encode for the wire
    pub fn to_body(&self) -> EnvelopeBody {
        EnvelopeBody {
            iv: Some(STANDARD.encode(self.iv)),
            ciphertext: Some(STANDARD.encode(&self.ciphertext)),
            aad: self.aad.as_ref().map(|aad| STANDARD.encode(aad)),
        }
    }
}

impl TryFrom<&EnvelopeBody> for Envelope {
    type Error = ProtocolError;

    fn try_from(body: &EnvelopeBody) -> ProtocolResult<Self> {
        let iv = decode_required(body.iv.as_deref(), "iv")?;
        let ciphertext = decode_required(body.ciphertext.as_deref(), "ciphertext")?;
        let aad = body
            .aad
            .as_deref()
            .filter(|aad| !aad.is_empty())
            .map(|aad| decode_field(aad, "aad"))
            .transpose()?;

        let iv: [u8; IV_SIZE] = iv
            .as_slice()
            .try_into()
            .map_err(|_| ProtocolError::InvalidLength {
                field: "iv",
                expected: IV_SIZE,
                actual: iv.len(),
            })?;

        Ok(Self {
            iv,
            ciphertext,
            aad,
        })
    }
}

/// Secure message response, both fields base64
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnvelopeReply {
    pub iv: String,
    pub ciphertext: String,
}

impl EnvelopeReply {
    pub fn new(iv: &[u8], ciphertext: &[u8]) -> Self {
        Self {
            iv: STANDARD.encode(iv),
            ciphertext: STANDARD.encode(ciphertext),
        }
    }

    /// Decode into an envelope (no associated data on replies)
    pub fn decode(&self) -> ProtocolResult<Envelope> {
        Envelope::try_from(&EnvelopeBody {
            iv: Some(self.iv.clone()),
            ciphertext: Some(self.ciphertext.clone()),
            aad: None,
        })
    }
}

/// Generic error body; never carries the underlying cause
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}

impl ErrorBody {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
        }
    }
}

fn decode_required(value: Option<&str>, field: &'static str) -> ProtocolResult<Vec<u8>> {
    match value {
        Some(v) if !v.is_empty() => decode_field(v, field),
        _ => Err(ProtocolError::MissingField(field)),
    }
}

fn decode_field(value: &str, field: &'static str) -> ProtocolResult<Vec<u8>> {
    STANDARD
        .decode(value.trim())
        .map_err(|_| ProtocolError::InvalidEncoding(field))
}
