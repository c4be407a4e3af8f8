//! Wire shapes exchanged between the bridge and its host.
//!
//! Every message is a JSON object discriminated by its `type` field. Outbound
//! messages are wrapped in an [`Envelope`] that stamps the session token.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Opaque value the host assigns to one bridge instance.
///
/// Any JSON value is accepted and echoed back unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionToken(Value);

impl SessionToken {
    pub fn new(token: impl Into<Value>) -> Self {
        Self(token.into())
    }

    /// The token text, when the host sent a string.
    pub fn as_str(&self) -> Option<&str> {
        self.0.as_str()
    }

    pub fn as_value(&self) -> &Value {
        &self.0
    }
}

impl fmt::Display for SessionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.0 {
            Value::String(text) => f.write_str(text),
            other => write!(f, "{other}"),
        }
    }
}

/// Messages the host sends into the bridge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum InboundMessage {
    ReadyReply {
        token: SessionToken,
        #[serde(rename = "baseUrl")]
        base_url: String,
        #[serde(rename = "jsPath")]
        js_path: String,
    },
    Init {
        #[serde(default)]
        data: Value,
    },
    Event {
        event: String,
        #[serde(default)]
        payload: Value,
    },
}

/// Messages the bridge sends toward the host.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum OutboundMessage {
    Ready,
    Event {
        event: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        payload: Option<Value>,
    },
    Resize {
        height: f64,
    },
    DomEvent {
        event: DomEventDescription,
    },
}

/// A forwarded DOM interaction, `{type, props?}` on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DomEventDescription {
    #[serde(rename = "type")]
    pub kind: DomEventKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub props: Option<KeyProps>,
}

impl DomEventDescription {
    pub fn mouse_down() -> Self {
        Self {
            kind: DomEventKind::MouseDown,
            props: None,
        }
    }

    pub fn focus() -> Self {
        Self {
            kind: DomEventKind::Focus,
            props: None,
        }
    }

    pub fn key_down(props: KeyProps) -> Self {
        Self {
            kind: DomEventKind::KeyDown,
            props: Some(props),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DomEventKind {
    MouseDown,
    Focus,
    KeyDown,
}

/// The nine keyboard fields copied from a native key-down event.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyProps {
    pub alt_key: bool,
    pub code: String,
    pub ctrl_key: bool,
    pub is_composing: bool,
    pub key: String,
    pub location: u32,
    pub meta_key: bool,
    pub repeat: bool,
    pub shift_key: bool,
}

/// An outbound message stamped with the session token.
///
/// The token is omitted from the JSON while unset, which only happens for the
/// initial `ready`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    #[serde(flatten)]
    pub message: OutboundMessage,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<SessionToken>,
}

impl Envelope {
    pub fn stamp(message: OutboundMessage, token: Option<&SessionToken>) -> Self {
        Self {
            message,
            token: token.cloned(),
        }
    }
}

/// A raw inbound delivery: the sender's serialized origin plus its payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InboundFrame {
    pub origin: String,
    pub data: Value,
}

impl InboundFrame {
    pub fn new(origin: impl Into<String>, data: Value) -> Self {
        Self {
            origin: origin.into(),
            data,
        }
    }

    /// Build a frame carrying an already-typed message.
    pub fn from_message(
        origin: impl Into<String>,
        message: &InboundMessage,
    ) -> Result<Self, serde_json::Error> {
        let data = serde_json::to_value(message)?;
        Ok(Self::new(origin, data))
    }

    pub fn decode(&self) -> Result<InboundMessage, serde_json::Error> {
        InboundMessage::deserialize(&self.data)
    }
}
