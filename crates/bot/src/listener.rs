use std::sync::Arc;

use anyhow::{Result, anyhow};
use futures_util::StreamExt as _;
use karma_core::{ChatEvent, ChatService};
use tracing::{debug, info, warn};

use crate::handler::Handler;

/// The two bot identities.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Identity {
    Good,
    Bad,
}

impl Identity {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Good => "good",
            Self::Bad => "bad",
        }
    }
}

/// What the dispatch loop does with one event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    Message,
    Reaction { added: bool },
    Ignore,
    Fatal,
}

/// Both identities sit in the same channels and see the same traffic, so
/// only the good one acts on it.
pub const fn classify_event(identity: Identity, event: &ChatEvent) -> Route {
    match (identity, event) {
        (Identity::Good, ChatEvent::Message(_)) => Route::Message,
        (Identity::Good, ChatEvent::ReactionAdded(_)) => Route::Reaction { added: true },
        (Identity::Good, ChatEvent::ReactionRemoved(_)) => Route::Reaction { added: false },
        (_, ChatEvent::AuthInvalid) => Route::Fatal,
        (
            Identity::Bad,
            ChatEvent::Message(_) | ChatEvent::ReactionAdded(_) | ChatEvent::ReactionRemoved(_),
        )
        | (_, ChatEvent::Connected { .. } | ChatEvent::TransportError(_) | ChatEvent::Unhandled(_)) => {
            Route::Ignore
        }
    }
}

/// Consumes one identity's event stream, spawning a task per actionable
/// event. Returns only on a fatal event or when the stream ends.
pub async fn listen(
    identity: Identity,
    service: Arc<dyn ChatService>,
    handler: Arc<Handler>,
) -> Result<()> {
    let name = identity.as_str();
    let mut events = service.subscribe();
    while let Some(event) = events.next().await {
        match (classify_event(identity, &event), event) {
            (Route::Fatal, _) => {
                return Err(anyhow!("{name} identity: invalid authentication"));
            }
            (Route::Message, ChatEvent::Message(msg)) => {
                let handler = Arc::clone(&handler);
                tokio::spawn(async move { handler.handle_message(msg).await });
            }
            (Route::Reaction { added }, ChatEvent::ReactionAdded(ev) | ChatEvent::ReactionRemoved(ev)) => {
                let handler = Arc::clone(&handler);
                tokio::spawn(async move { handler.handle_reaction(ev, added).await });
            }
            (_, ChatEvent::Connected { team }) => {
                info!(identity = name, "Connected to Slack");
                debug!(identity = name, team = %team, "Connection details");
            }
            (_, ChatEvent::TransportError(e)) => {
                warn!(identity = name, error = %e, "Transport error");
            }
            (_, ChatEvent::Unhandled(kind)) => {
                debug!(identity = name, kind = %kind, "Unhandled event");
            }
            (_, event) => {
                debug!(identity = name, event = ?event, "Ignoring event");
            }
        }
    }
    Err(anyhow!("{name} identity: event stream ended"))
}
