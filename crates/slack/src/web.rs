use std::sync::Arc;

use async_trait::async_trait;
use futures_util::stream::BoxStream;
use karma_core::{ChatError, ChatEvent, ChatService, UserLookup};
use reqwest::RequestBuilder;
use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use crate::socket;

const API_BASE: &str = "https://slack.com/api";
/// Web API error codes that mean the token is unusable.
const AUTH_ERRORS: [&str; 4] = ["invalid_auth", "not_authed", "account_inactive", "token_revoked"];

/// Team and bot user behind a bot token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthInfo {
    pub team: String,
    pub user: String,
}

#[derive(Serialize)]
struct PostMessage<'a> {
    channel: &'a str,
    text: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    user: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    thread_ts: Option<&'a str>,
}

#[derive(Serialize)]
struct OpenConversation<'a> {
    users: &'a str,
}

/// One Slack app identity: a bot token for the Web API and an app-level
/// token for Socket Mode.
#[derive(Clone)]
pub struct SlackClient {
    http: reqwest::Client,
    label: &'static str,
    bot_token: Arc<str>,
    app_token: Arc<str>,
    base_url: Arc<str>,
}

impl std::fmt::Debug for SlackClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SlackClient")
            .field("label", &self.label)
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl SlackClient {
    #[must_use]
    pub fn new(label: &'static str, bot_token: &str, app_token: &str) -> Self {
        Self {
            http: reqwest::Client::new(),
            label,
            bot_token: Arc::from(bot_token),
            app_token: Arc::from(app_token),
            base_url: Arc::from(API_BASE),
        }
    }

    /// Points the Web API at another host, e.g. a local mock.
    #[must_use]
    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = Arc::from(base_url.trim_end_matches('/'));
        self
    }

    #[must_use]
    pub const fn label(&self) -> &'static str {
        self.label
    }

    pub async fn auth_test(&self) -> Result<AuthInfo, ChatError> {
        let method = "auth.test";
        let body = self.send(method, self.post(method, &self.bot_token)).await?;
        Ok(AuthInfo {
            team: string_at(&body, "/team"),
            user: string_at(&body, "/user"),
        })
    }

    /// Asks for a fresh Socket Mode websocket url.
    pub async fn open_socket_url(&self) -> Result<String, ChatError> {
        let method = "apps.connections.open";
        let body = self.send(method, self.post(method, &self.app_token)).await?;
        body.get("url")
            .and_then(Value::as_str)
            .map(ToOwned::to_owned)
            .ok_or_else(|| ChatError::Decode(format!("{method}: missing url")))
    }

    fn post(&self, method: &str, token: &str) -> RequestBuilder {
        self.http
            .post(format!("{}/{method}", self.base_url))
            .bearer_auth(token)
    }

    async fn send(&self, method: &'static str, request: RequestBuilder) -> Result<Value, ChatError> {
        debug!(identity = self.label, method, "Slack API call");
        let response = request
            .send()
            .await
            .map_err(|e| ChatError::Transport(format!("{method}: {e}")))?;
        let body: Value = response
            .json()
            .await
            .map_err(|e| ChatError::Decode(format!("{method}: {e}")))?;
        check_response(method, body)
    }
}

/// Maps Slack's `{"ok": false, "error": ...}` convention onto [`ChatError`].
pub(crate) fn check_response(method: &'static str, body: Value) -> Result<Value, ChatError> {
    if body.get("ok").and_then(Value::as_bool) == Some(true) {
        return Ok(body);
    }
    let error = body
        .get("error")
        .and_then(Value::as_str)
        .unwrap_or("unknown_error");
    if AUTH_ERRORS.contains(&error) {
        return Err(ChatError::AuthInvalid);
    }
    Err(ChatError::Api {
        method,
        error: error.to_owned(),
    })
}

fn string_at(body: &Value, pointer: &str) -> String {
    body.pointer(pointer)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_owned()
}

#[async_trait]
impl UserLookup for SlackClient {
    async fn lookup_user(&self, id: &str) -> Result<String, ChatError> {
        let method = "users.info";
        let request = self.post(method, &self.bot_token).form(&[("user", id)]);
        let body = self.send(method, request).await?;
        body.pointer("/user/name")
            .and_then(Value::as_str)
            .map(ToOwned::to_owned)
            .ok_or_else(|| ChatError::Decode(format!("{method}: missing user.name")))
    }
}

#[async_trait]
impl ChatService for SlackClient {
    fn subscribe(&self) -> BoxStream<'static, ChatEvent> {
        socket::subscribe(self.clone())
    }

    async fn send_message(
        &self,
        text: &str,
        channel: &str,
        thread: Option<&str>,
    ) -> Result<(), ChatError> {
        let method = "chat.postMessage";
        let payload = PostMessage {
            channel,
            text,
            user: None,
            thread_ts: thread,
        };
        let request = self.post(method, &self.bot_token).json(&payload);
        self.send(method, request).await.map(|_| ())
    }

    async fn send_ephemeral(
        &self,
        text: &str,
        channel: &str,
        user: &str,
        thread: Option<&str>,
    ) -> Result<(), ChatError> {
        let method = "chat.postEphemeral";
        let payload = PostMessage {
            channel,
            text,
            user: Some(user),
            thread_ts: thread,
        };
        let request = self.post(method, &self.bot_token).json(&payload);
        self.send(method, request).await.map(|_| ())
    }

    async fn open_direct_channel(&self, user: &str) -> Result<String, ChatError> {
        let method = "conversations.open";
        let request = self
            .post(method, &self.bot_token)
            .json(&OpenConversation { users: user });
        let body = self.send(method, request).await?;
        body.pointer("/channel/id")
            .and_then(Value::as_str)
            .map(ToOwned::to_owned)
            .ok_or_else(|| ChatError::Decode(format!("{method}: missing channel.id")))
    }
}
