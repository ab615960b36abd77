use std::sync::Arc;

use karma_core::{ChatError, ChatService, ReplyContext, ReplyMode};
use tracing::{debug, warn};

use crate::quotes::QuoteBook;

/// Which bot identity speaks a reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Persona {
    Good,
    Bad,
    /// Informational replies; carried by the good identity, never quoted.
    Neutral,
}

impl Persona {
    #[must_use]
    pub const fn for_delta(delta: i64) -> Self {
        if delta < 0 { Self::Bad } else { Self::Good }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Good => "good",
            Self::Bad => "bad",
            Self::Neutral => "neutral",
        }
    }
}

/// Text to send and who sends it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub text: String,
    pub persona: Persona,
}

impl Reply {
    pub fn new(text: impl Into<String>, persona: Persona) -> Self {
        Self {
            text: text.into(),
            persona,
        }
    }

    pub fn neutral(text: impl Into<String>) -> Self {
        Self::new(text, Persona::Neutral)
    }
}

/// A concrete place to post to.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Target {
    channel: String,
    thread: Option<String>,
    ephemeral_user: Option<String>,
}

/// Sends replies through the good or bad identity, in the configured mode.
#[derive(Clone)]
pub struct ReplyRouter {
    good: Arc<dyn ChatService>,
    bad: Arc<dyn ChatService>,
    quotes: Arc<QuoteBook>,
}

impl std::fmt::Debug for ReplyRouter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReplyRouter")
            .field("quotes", &self.quotes)
            .finish_non_exhaustive()
    }
}

impl ReplyRouter {
    pub fn new(good: Arc<dyn ChatService>, bad: Arc<dyn ChatService>, quotes: QuoteBook) -> Self {
        Self {
            good,
            bad,
            quotes: Arc::new(quotes),
        }
    }

    fn service(&self, persona: Persona) -> Arc<dyn ChatService> {
        match persona {
            Persona::Good | Persona::Neutral => Arc::clone(&self.good),
            Persona::Bad => Arc::clone(&self.bad),
        }
    }

    /// Answers the message described by `ctx`.
    pub async fn reply(&self, ctx: &ReplyContext, reply: &Reply) -> Result<(), ChatError> {
        let target = Target {
            channel: ctx.channel.clone(),
            thread: ctx.reply_thread().map(ToOwned::to_owned),
            ephemeral_user: (ctx.reply_mode == ReplyMode::Ephemeral).then(|| ctx.sender_id.clone()),
        };
        self.send(target, reply).await
    }

    /// Answers `user` privately: a direct message, or an ephemeral message
    /// in `channel` under [`ReplyMode::Ephemeral`].
    pub async fn direct(
        &self,
        user: &str,
        channel: &str,
        mode: ReplyMode,
        reply: &Reply,
    ) -> Result<(), ChatError> {
        let target = if mode == ReplyMode::Ephemeral && !channel.is_empty() {
            Target {
                channel: channel.to_owned(),
                thread: None,
                ephemeral_user: Some(user.to_owned()),
            }
        } else {
            let dm = self.service(reply.persona).open_direct_channel(user).await?;
            Target {
                channel: dm,
                thread: None,
                ephemeral_user: None,
            }
        };
        self.send(target, reply).await
    }

    async fn send(&self, target: Target, reply: &Reply) -> Result<(), ChatError> {
        let service = self.service(reply.persona);
        deliver(service.as_ref(), &target, &reply.text).await?;
        debug!(channel = %target.channel, identity = reply.persona.as_str(), "Reply sent");

        if let Some(quote) = self.quotes.pick(reply.persona) {
            let identity = reply.persona.as_str();
            tokio::spawn(async move {
                if let Err(e) = deliver(service.as_ref(), &target, &quote).await {
                    warn!(error = %e, identity, "Failed to send flavor quote");
                }
            });
        }
        Ok(())
    }
}

async fn deliver(service: &dyn ChatService, target: &Target, text: &str) -> Result<(), ChatError> {
    match &target.ephemeral_user {
        Some(user) => {
            service
                .send_ephemeral(text, &target.channel, user, target.thread.as_deref())
                .await
        }
        None => {
            service
                .send_message(text, &target.channel, target.thread.as_deref())
                .await
        }
    }
}
