//! OBS WebSocket v5 message types and validation for livewatch.
//!
//! Only the subset the recorder adapter speaks is modelled: the identify
//! handshake, requests and their responses. Events are parsed so they can be
//! skipped, not interpreted.
//!
//! Every frame is an envelope `{"op": <opcode>, "d": <payload>}`.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use chrono::Utc;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};

pub const RPC_VERSION: u32 = 1;
pub const MAX_MESSAGE_BYTES: usize = 4 * 1024 * 1024; // 4MB
pub const REQUEST_STATUS_SUCCESS: u16 = 100;
pub const CLOSE_AUTHENTICATION_FAILED: u16 = 4009;

/// Opcodes used by the adapter.
pub mod op {
    pub const HELLO: u8 = 0;
    pub const IDENTIFY: u8 = 1;
    pub const IDENTIFIED: u8 = 2;
    pub const EVENT: u8 = 5;
    pub const REQUEST: u8 = 6;
    pub const REQUEST_RESPONSE: u8 = 7;
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProtocolError {
    #[error("message is not a valid envelope: {0}")]
    Malformed(String),

    #[error("message of {len} bytes exceeds the {max} byte limit")]
    TooLarge { len: usize, max: usize },

    #[error("unexpected opcode {0}")]
    UnexpectedOpcode(u8),

    #[error("invalid payload for opcode {op}: {details}")]
    InvalidPayload { op: u8, details: String },

    #[error("unsupported rpc version {0}")]
    UnsupportedRpcVersion(u32),

    #[error("server requires authentication but no credential is configured")]
    CredentialRequired,

    #[error("failed to encode message: {0}")]
    Encode(String),
}

impl ProtocolError {
    pub fn code(&self) -> &'static str {
        match self {
            ProtocolError::Malformed(_) => "malformed",
            ProtocolError::TooLarge { .. } => "too_large",
            ProtocolError::UnexpectedOpcode(_) => "unexpected_opcode",
            ProtocolError::InvalidPayload { .. } => "invalid_payload",
            ProtocolError::UnsupportedRpcVersion(_) => "unsupported_rpc_version",
            ProtocolError::CredentialRequired => "credential_required",
            ProtocolError::Encode(_) => "encode_failed",
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Server → client
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Hello {
    #[serde(default)]
    pub obs_web_socket_version: Option<String>,
    pub rpc_version: u32,
    #[serde(default)]
    pub authentication: Option<AuthChallenge>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AuthChallenge {
    pub challenge: String,
    pub salt: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Identified {
    pub negotiated_rpc_version: u32,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    pub event_type: String,
    #[serde(default)]
    pub event_intent: Option<u64>,
    #[serde(default)]
    pub event_data: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RequestStatus {
    pub result: bool,
    pub code: u16,
    #[serde(default)]
    pub comment: Option<String>,
}

impl RequestStatus {
    pub fn is_success(&self) -> bool {
        self.result && self.code == REQUEST_STATUS_SUCCESS
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestResponse {
    pub request_type: String,
    pub request_id: String,
    pub request_status: RequestStatus,
    #[serde(default)]
    pub response_data: Option<Value>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ServerMessage {
    Hello(Hello),
    Identified(Identified),
    Event(Event),
    RequestResponse(RequestResponse),
}

// ═══════════════════════════════════════════════════════════════════════════════
// Client → server
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Identify {
    pub rpc_version: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub authentication: Option<String>,
    /// Bitmask of event categories; zero opts out of all events.
    pub event_subscriptions: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RequestType {
    StartRecord,
    StopRecord,
}

impl RequestType {
    pub fn as_str(self) -> &'static str {
        match self {
            RequestType::StartRecord => "StartRecord",
            RequestType::StopRecord => "StopRecord",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Request {
    pub request_type: RequestType,
    pub request_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_data: Option<Value>,
}

impl Request {
    pub fn new(request_type: RequestType) -> Self {
        Self {
            request_type,
            request_id: new_request_id(),
            request_data: None,
        }
    }
}

#[derive(Serialize)]
struct OutboundEnvelope<'a, T> {
    op: u8,
    d: &'a T,
}

#[derive(Deserialize)]
struct InboundEnvelope {
    op: u8,
    d: Value,
}

// ═══════════════════════════════════════════════════════════════════════════════
// Handshake
// ═══════════════════════════════════════════════════════════════════════════════

/// `base64(sha256(base64(sha256(password + salt)) + challenge))`
pub fn authentication_string(password: &str, salt: &str, challenge: &str) -> String {
    let secret = BASE64.encode(Sha256::digest(format!("{}{}", password, salt)));
    BASE64.encode(Sha256::digest(format!("{}{}", secret, challenge)))
}

/// Builds the `Identify` reply to `hello`, answering its auth challenge if any.
pub fn identify_for(hello: &Hello, password: Option<&str>) -> Result<Identify, ProtocolError> {
    if hello.rpc_version < RPC_VERSION {
        return Err(ProtocolError::UnsupportedRpcVersion(hello.rpc_version));
    }

    let authentication = match (&hello.authentication, password) {
        (None, _) => None,
        (Some(_), None) => return Err(ProtocolError::CredentialRequired),
        (Some(auth), Some(password)) => Some(authentication_string(
            password,
            &auth.salt,
            &auth.challenge,
        )),
    };

    Ok(Identify {
        rpc_version: RPC_VERSION,
        authentication,
        event_subscriptions: 0,
    })
}

// ═══════════════════════════════════════════════════════════════════════════════
// Encoding and parsing
// ═══════════════════════════════════════════════════════════════════════════════

pub fn encode_identify(identify: &Identify) -> Result<String, ProtocolError> {
    encode(op::IDENTIFY, identify)
}

pub fn encode_request(request: &Request) -> Result<String, ProtocolError> {
    encode(op::REQUEST, request)
}

fn encode<T: Serialize>(op: u8, payload: &T) -> Result<String, ProtocolError> {
    serde_json::to_string(&OutboundEnvelope { op, d: payload })
        .map_err(|err| ProtocolError::Encode(err.to_string()))
}

pub fn parse_server_message(text: &str) -> Result<ServerMessage, ProtocolError> {
    if text.len() > MAX_MESSAGE_BYTES {
        return Err(ProtocolError::TooLarge {
            len: text.len(),
            max: MAX_MESSAGE_BYTES,
        });
    }

    let envelope: InboundEnvelope =
        serde_json::from_str(text).map_err(|err| ProtocolError::Malformed(err.to_string()))?;

    let message = match envelope.op {
        op::HELLO => ServerMessage::Hello(payload(envelope.op, envelope.d)?),
        op::IDENTIFIED => ServerMessage::Identified(payload(envelope.op, envelope.d)?),
        op::EVENT => ServerMessage::Event(payload(envelope.op, envelope.d)?),
        op::REQUEST_RESPONSE => {
            let response: RequestResponse = payload(envelope.op, envelope.d)?;
            if response.request_id.trim().is_empty() {
                return Err(ProtocolError::InvalidPayload {
                    op: envelope.op,
                    details: "requestId is required".to_string(),
                });
            }
            ServerMessage::RequestResponse(response)
        }
        other => return Err(ProtocolError::UnexpectedOpcode(other)),
    };

    Ok(message)
}

fn payload<T: for<'de> Deserialize<'de>>(op: u8, value: Value) -> Result<T, ProtocolError> {
    serde_json::from_value(value).map_err(|err| ProtocolError::InvalidPayload {
        op,
        details: err.to_string(),
    })
}

pub fn new_request_id() -> String {
    let mut random = rand::thread_rng();
    let rand = random.next_u64();
    format!("req-{}-{:x}", Utc::now().timestamp_millis(), rand)
}
