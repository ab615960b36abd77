use async_trait::async_trait;
use futures_util::stream::BoxStream;

use crate::error::ChatError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageEvent {
    pub channel: String,
    pub user: String,
    pub text: String,
    pub ts: String,
    pub thread_ts: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReactionEvent {
    /// Who reacted.
    pub user: String,
    /// Author of the reacted item, when the platform reports one.
    pub item_user: Option<String>,
    pub reaction: String,
    pub channel: String,
    pub ts: String,
}

/// Everything a transport can report on its event stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatEvent {
    Message(MessageEvent),
    ReactionAdded(ReactionEvent),
    ReactionRemoved(ReactionEvent),
    Connected { team: String },
    AuthInvalid,
    TransportError(String),
    /// Anything else the platform sent; carries the event type for logging.
    Unhandled(String),
}

/// Resolves platform user ids to user names.
#[async_trait]
pub trait UserLookup: Send + Sync {
    async fn lookup_user(&self, id: &str) -> Result<String, ChatError>;
}

/// One authenticated bot identity on the chat platform.
#[async_trait]
pub trait ChatService: UserLookup {
    /// Opens the event stream. Events arrive in platform order; the stream
    /// ends only when the transport gives up.
    fn subscribe(&self) -> BoxStream<'static, ChatEvent>;

    async fn send_message(
        &self,
        text: &str,
        channel: &str,
        thread: Option<&str>,
    ) -> Result<(), ChatError>;

    async fn send_ephemeral(
        &self,
        text: &str,
        channel: &str,
        user: &str,
        thread: Option<&str>,
    ) -> Result<(), ChatError>;

    /// Returns the id of the direct-message channel with `user`.
    async fn open_direct_channel(&self, user: &str) -> Result<String, ChatError>;
}
