use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// One signed point transfer from an acting user to a target user.
///
/// Construct through [`KarmaOperation::new`], which refuses a zero delta so
/// every value that exists is worth persisting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KarmaOperation {
    pub from: String,
    pub to: String,
    pub delta: i64,
    pub reason: Option<String>,
    pub timestamp: OffsetDateTime,
}

impl KarmaOperation {
    #[must_use]
    pub fn new(
        from: impl Into<String>,
        to: impl Into<String>,
        delta: i64,
        reason: Option<String>,
    ) -> Option<Self> {
        Self::at(from, to, delta, reason, OffsetDateTime::now_utc())
    }

    #[must_use]
    pub fn at(
        from: impl Into<String>,
        to: impl Into<String>,
        delta: i64,
        reason: Option<String>,
        timestamp: OffsetDateTime,
    ) -> Option<Self> {
        if delta == 0 {
            return None;
        }
        Some(Self {
            from: from.into(),
            to: to.into(),
            delta,
            reason: reason.filter(|r| !r.trim().is_empty()),
            timestamp,
        })
    }
}

/// Raw operands of a give/take fragment, before user resolution and policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Operands {
    pub user_token: String,
    pub magnitude_run: String,
    pub reason: Option<String>,
}

impl Operands {
    /// Renders the operands back into the shortest message that parses to them.
    #[must_use]
    pub fn canonical(&self) -> String {
        match &self.reason {
            Some(reason) => format!("{}{} for {reason}", self.user_token, self.magnitude_run),
            None => format!("{}{}", self.user_token, self.magnitude_run),
        }
    }
}

/// A command recognized in one message or fragment of a message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParsedCommand {
    Give(Operands),
    Take(Operands),
    Query { user_token: String },
    Throwback { user_token: Option<String> },
    Leaderboard { limit: Option<usize> },
    UrlRequest,
    /// Produced by the grammar only; classification rewrites it into a give.
    Motivate { user_token: String },
}

impl ParsedCommand {
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Give(_) => "give",
            Self::Take(_) => "take",
            Self::Query { .. } => "query",
            Self::Throwback { .. } => "throwback",
            Self::Leaderboard { .. } => "leaderboard",
            Self::UrlRequest => "url",
            Self::Motivate { .. } => "motivate",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ReplyMode {
    /// Reply in the thread of the original message, or top-level if it had none.
    #[default]
    Message,
    /// Always reply in a thread anchored at the original message.
    Thread,
    /// Reply visible only to the acting user.
    Ephemeral,
}

/// Where a reply for one incoming event should go.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplyContext {
    pub channel: String,
    pub message_ts: String,
    pub thread_ts: Option<String>,
    pub sender_id: String,
    pub reply_mode: ReplyMode,
}

impl ReplyContext {
    /// Thread timestamp a reply should carry under the configured mode.
    #[must_use]
    pub fn reply_thread(&self) -> Option<&str> {
        match self.reply_mode {
            ReplyMode::Thread => Some(self.thread_ts.as_deref().unwrap_or(&self.message_ts)),
            ReplyMode::Message | ReplyMode::Ephemeral => self.thread_ts.as_deref(),
        }
    }
}
