//! In-process fakes for the chat platform.

use std::{collections::HashMap, sync::Mutex};

use async_trait::async_trait;
use futures_util::{StreamExt as _, stream::BoxStream};
use karma_core::{ChatError, ChatEvent, ChatService, UserLookup};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Sent {
    Message {
        channel: String,
        thread: Option<String>,
        text: String,
    },
    Ephemeral {
        channel: String,
        user: String,
        thread: Option<String>,
        text: String,
    },
}

impl Sent {
    pub fn message(channel: &str, thread: Option<&str>, text: &str) -> Self {
        Self::Message {
            channel: channel.to_owned(),
            thread: thread.map(ToOwned::to_owned),
            text: text.to_owned(),
        }
    }

    pub fn ephemeral(channel: &str, user: &str, thread: Option<&str>, text: &str) -> Self {
        Self::Ephemeral {
            channel: channel.to_owned(),
            user: user.to_owned(),
            thread: thread.map(ToOwned::to_owned),
            text: text.to_owned(),
        }
    }

    pub fn text(&self) -> &str {
        match self {
            Self::Message { text, .. } | Self::Ephemeral { text, .. } => text,
        }
    }
}

/// Records everything sent and replays scripted events.
#[derive(Debug, Default)]
pub struct FakeChat {
    users: HashMap<String, String>,
    events: Mutex<Vec<ChatEvent>>,
    sent: Mutex<Vec<Sent>>,
    send_budget: Mutex<Option<usize>>,
}

impl FakeChat {
    pub fn with_users(users: &[(&str, &str)]) -> Self {
        Self {
            users: users
                .iter()
                .map(|(id, name)| ((*id).to_owned(), (*name).to_owned()))
                .collect(),
            ..Self::default()
        }
    }

    pub fn with_events(self, events: Vec<ChatEvent>) -> Self {
        *self.events.lock().unwrap() = events;
        self
    }

    pub fn sent(&self) -> Vec<Sent> {
        self.sent.lock().unwrap().clone()
    }

    pub fn texts(&self) -> Vec<String> {
        self.sent().iter().map(|s| s.text().to_owned()).collect()
    }

    /// Lets `n` more sends through, then fails every later one.
    pub fn fail_sends_after(&self, n: usize) {
        *self.send_budget.lock().unwrap() = Some(n);
    }

    fn record(&self, sent: Sent) -> Result<(), ChatError> {
        let mut budget = self.send_budget.lock().unwrap();
        match budget.as_mut() {
            Some(0) => return Err(ChatError::Transport("connection reset".to_owned())),
            Some(left) => *left -= 1,
            None => {}
        }
        self.sent.lock().unwrap().push(sent);
        Ok(())
    }
}

#[async_trait]
impl UserLookup for FakeChat {
    async fn lookup_user(&self, id: &str) -> Result<String, ChatError> {
        self.users.get(id).cloned().ok_or_else(|| ChatError::Api {
            method: "users.info",
            error: "user_not_found".to_owned(),
        })
    }
}

#[async_trait]
impl ChatService for FakeChat {
    fn subscribe(&self) -> BoxStream<'static, ChatEvent> {
        let events = std::mem::take(&mut *self.events.lock().unwrap());
        futures_util::stream::iter(events).boxed()
    }

    async fn send_message(
        &self,
        text: &str,
        channel: &str,
        thread: Option<&str>,
    ) -> Result<(), ChatError> {
        self.record(Sent::message(channel, thread, text))
    }

    async fn send_ephemeral(
        &self,
        text: &str,
        channel: &str,
        user: &str,
        thread: Option<&str>,
    ) -> Result<(), ChatError> {
        self.record(Sent::ephemeral(channel, user, thread, text))
    }

    async fn open_direct_channel(&self, user: &str) -> Result<String, ChatError> {
        Ok(format!("D-{user}"))
    }
}

/// Gives spawned fire-and-forget tasks a chance to run.
pub async fn settle() {
    for _ in 0..16 {
        tokio::task::yield_now().await;
    }
}
