use karma_core::{ChatError, ChatEvent, MessageEvent, ReactionEvent};
use serde::Deserialize;
use serde_json::Value;

/// Message subtypes that still carry text typed by a person.
const USER_SUBTYPES: [&str; 2] = ["thread_broadcast", "file_share"];

/// One Socket Mode frame, decoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Envelope {
    Hello,
    Disconnect { reason: String },
    Event {
        envelope_id: Option<String>,
        event: ChatEvent,
    },
    /// Acknowledged but otherwise ignored (slash commands, interactivity).
    Other {
        envelope_id: Option<String>,
        kind: String,
    },
}

impl Envelope {
    /// Id that must be echoed back to Slack to acknowledge the frame.
    #[must_use]
    pub fn envelope_id(&self) -> Option<&str> {
        match self {
            Self::Event { envelope_id, .. } | Self::Other { envelope_id, .. } => {
                envelope_id.as_deref()
            }
            Self::Hello | Self::Disconnect { .. } => None,
        }
    }
}

#[derive(Deserialize)]
struct RawEnvelope {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    envelope_id: Option<String>,
    #[serde(default)]
    payload: Option<RawPayload>,
    #[serde(default)]
    reason: Option<String>,
}

#[derive(Deserialize)]
struct RawPayload {
    #[serde(default)]
    event: Option<Value>,
}

#[derive(Deserialize)]
struct RawMessage {
    channel: String,
    #[serde(default)]
    user: Option<String>,
    #[serde(default)]
    text: String,
    ts: String,
    #[serde(default)]
    thread_ts: Option<String>,
    #[serde(default)]
    subtype: Option<String>,
    #[serde(default)]
    bot_id: Option<String>,
}

#[derive(Deserialize)]
struct RawReaction {
    user: String,
    reaction: String,
    #[serde(default)]
    item_user: Option<String>,
    item: RawItem,
}

#[derive(Deserialize)]
struct RawItem {
    #[serde(default)]
    channel: Option<String>,
    #[serde(default)]
    ts: Option<String>,
}

/// Decodes a Socket Mode text frame.
pub fn parse_envelope(frame: &str) -> Result<Envelope, ChatError> {
    let raw: RawEnvelope = serde_json::from_str(frame).map_err(decode)?;
    match raw.kind.as_str() {
        "hello" => Ok(Envelope::Hello),
        "disconnect" => Ok(Envelope::Disconnect {
            reason: raw.reason.unwrap_or_else(|| "unspecified".to_owned()),
        }),
        "events_api" => {
            let event = match raw.payload.and_then(|p| p.event) {
                Some(value) => map_event(value)?,
                None => ChatEvent::Unhandled("events_api/empty".to_owned()),
            };
            Ok(Envelope::Event {
                envelope_id: raw.envelope_id,
                event,
            })
        }
        _ => Ok(Envelope::Other {
            envelope_id: raw.envelope_id,
            kind: raw.kind,
        }),
    }
}

fn map_event(value: Value) -> Result<ChatEvent, ChatError> {
    let kind = value
        .get("type")
        .and_then(Value::as_str)
        .unwrap_or("unknown")
        .to_owned();
    match kind.as_str() {
        "message" => {
            let raw: RawMessage = serde_json::from_value(value).map_err(decode)?;
            Ok(message_event(raw))
        }
        "reaction_added" => {
            let raw: RawReaction = serde_json::from_value(value).map_err(decode)?;
            Ok(ChatEvent::ReactionAdded(reaction_event(raw)))
        }
        "reaction_removed" => {
            let raw: RawReaction = serde_json::from_value(value).map_err(decode)?;
            Ok(ChatEvent::ReactionRemoved(reaction_event(raw)))
        }
        _ => Ok(ChatEvent::Unhandled(kind)),
    }
}

fn message_event(raw: RawMessage) -> ChatEvent {
    if raw.bot_id.is_some() {
        return ChatEvent::Unhandled("message/bot".to_owned());
    }
    if let Some(subtype) = raw.subtype.as_deref()
        && !USER_SUBTYPES.contains(&subtype)
    {
        return ChatEvent::Unhandled(format!("message/{subtype}"));
    }
    let Some(user) = raw.user else {
        return ChatEvent::Unhandled("message/anonymous".to_owned());
    };
    ChatEvent::Message(MessageEvent {
        channel: raw.channel,
        user,
        text: raw.text,
        ts: raw.ts,
        thread_ts: raw.thread_ts,
    })
}

fn reaction_event(raw: RawReaction) -> ReactionEvent {
    ReactionEvent {
        user: raw.user,
        item_user: raw.item_user,
        reaction: raw.reaction,
        channel: raw.item.channel.unwrap_or_default(),
        ts: raw.item.ts.unwrap_or_default(),
    }
}

fn decode(err: serde_json::Error) -> ChatError {
    ChatError::Decode(err.to_string())
}
