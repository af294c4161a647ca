#![forbid(unsafe_code)]

//! JSON envelope spoken over the game connection. Every frame carries a `header` with the
//! protocol version, a request id and the message purpose, plus a purpose-specific `body`.

use crate::error::Result;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use thiserror::Error;
use uuid::Uuid;

pub const PROTOCOL_VERSION: u32 = 1;
pub const PLAYER_MESSAGE_EVENT: &str = "PlayerMessage";

#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MessagePurpose {
    CommandRequest,
    Subscribe,
    Event,
    CommandResponse,
    #[serde(other)]
    Other,
}

#[derive(Debug, Error)]
pub enum EnvelopeError {
    #[error("frame is not a valid envelope: {0}")]
    Json(#[from] serde_json::Error),
    #[error("missing or invalid field `{0}`")]
    Field(&'static str),
}

#[derive(Serialize)]
struct Envelope<B> {
    header: OutboundHeader,
    body: B,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct OutboundHeader {
    version: u32,
    request_id: Uuid,
    message_type: MessagePurpose,
    message_purpose: MessagePurpose,
}

impl OutboundHeader {
    fn request(request_id: Uuid, purpose: MessagePurpose) -> Self {
        Self {
            version: PROTOCOL_VERSION,
            request_id,
            message_type: MessagePurpose::CommandRequest,
            message_purpose: purpose,
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CommandBody<'a> {
    version: u32,
    command_line: &'a str,
    origin: CommandBodyOrigin,
}

#[derive(Serialize)]
struct CommandBodyOrigin {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SubscribeBody<'a> {
    event_name: &'a str,
}

pub fn command_frame(request_id: Uuid, command_line: &str) -> Result<String> {
    let envelope = Envelope {
        header: OutboundHeader::request(request_id, MessagePurpose::CommandRequest),
        body: CommandBody {
            version: PROTOCOL_VERSION,
            command_line,
            origin: CommandBodyOrigin { kind: "player" },
        },
    };
    Ok(serde_json::to_string(&envelope)?)
}

pub fn subscribe_frame(request_id: Uuid, event_name: &str) -> Result<String> {
    let envelope = Envelope {
        header: OutboundHeader::request(request_id, MessagePurpose::Subscribe),
        body: SubscribeBody { event_name },
    };
    Ok(serde_json::to_string(&envelope)?)
}

/// A decoded inbound frame, reduced to what the session acts on.
#[derive(Clone, Debug, PartialEq)]
pub enum Inbound {
    Acknowledgement(Acknowledgement),
    PlayerMessage(ChatMessage),
    Event { name: String },
    Other,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Acknowledgement {
    pub request_id: String,
    /// `None` when the body carried no integer `statusCode`.
    pub status_code: Option<i64>,
    pub status_message: String,
    pub position: Option<BlockPosition>,
}

impl Acknowledgement {
    /// Ids that are not UUIDs can never match an in-flight request.
    pub fn correlation_id(&self) -> Option<Uuid> {
        Uuid::parse_str(&self.request_id).ok()
    }

    /// Negative and missing status codes both count as failures.
    pub fn is_failure(&self) -> bool {
        self.status_code.map_or(true, |code| code < 0)
    }

    pub fn status_label(&self) -> String {
        match self.status_code {
            Some(code) => code.to_string(),
            None => "missing".to_string(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChatMessage {
    pub sender: Option<String>,
    pub message: String,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct BlockPosition {
    pub x: i64,
    pub y: i64,
    pub z: i64,
}

impl BlockPosition {
    fn from_json(value: &JsonValue) -> Option<Self> {
        let coord = |key: &str| {
            value.get(key).and_then(|raw| {
                raw.as_i64()
                    .or_else(|| raw.as_f64().map(|float| float.floor() as i64))
            })
        };
        Some(Self {
            x: coord("x")?,
            y: coord("y")?,
            z: coord("z")?,
        })
    }
}

#[derive(Deserialize)]
struct RawEnvelope {
    header: RawHeader,
    #[serde(default)]
    body: JsonValue,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawHeader {
    #[serde(default)]
    request_id: Option<String>,
    #[serde(default)]
    message_purpose: Option<MessagePurpose>,
    #[serde(default)]
    event_name: Option<String>,
}

pub fn decode_inbound(raw: &str) -> std::result::Result<Inbound, EnvelopeError> {
    let envelope: RawEnvelope = serde_json::from_str(raw)?;
    let RawEnvelope { header, body } = envelope;

    if header.message_purpose == Some(MessagePurpose::CommandResponse) {
        let request_id = header
            .request_id
            .ok_or(EnvelopeError::Field("header.requestId"))?;
        // A bad body still has to retire the request it answers.
        let status_message = body
            .get("statusMessage")
            .and_then(JsonValue::as_str)
            .unwrap_or_default();
        return Ok(Inbound::Acknowledgement(Acknowledgement {
            request_id,
            status_code: body.get("statusCode").and_then(JsonValue::as_i64),
            status_message: status_message.to_owned(),
            position: body.get("position").and_then(BlockPosition::from_json),
        }));
    }

    let event_name = body
        .get("eventName")
        .and_then(JsonValue::as_str)
        .map(str::to_owned)
        .or(header.event_name);

    match event_name {
        Some(name) if name == PLAYER_MESSAGE_EVENT => {
            let properties = body
                .get("properties")
                .ok_or(EnvelopeError::Field("body.properties"))?;
            let message = properties
                .get("Message")
                .and_then(JsonValue::as_str)
                .ok_or(EnvelopeError::Field("body.properties.Message"))?;
            let sender = properties
                .get("Sender")
                .and_then(JsonValue::as_str)
                .map(str::to_owned);
            Ok(Inbound::PlayerMessage(ChatMessage {
                sender,
                message: message.to_owned(),
            }))
        }
        Some(name) => Ok(Inbound::Event { name }),
        None => Ok(Inbound::Other),
    }
}
