use core::time::Duration;

use futures_util::{SinkExt as _, StreamExt as _, stream::BoxStream};
use karma_core::{ChatError, ChatEvent};
use serde_json::json;
use tokio::{
    sync::mpsc::{UnboundedSender, unbounded_channel},
    time::Instant,
};
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, info, warn};

use crate::{
    events::{Envelope, parse_envelope},
    web::SlackClient,
};

/// Starts the Socket Mode reader for `client` and returns its events.
///
/// The reader reopens the socket whenever Slack closes it. It stops, and
/// the stream ends, once the token is rejected, a socket cannot be opened,
/// or the stream is dropped.
pub(crate) fn subscribe(client: SlackClient) -> BoxStream<'static, ChatEvent> {
    let (tx, rx) = unbounded_channel();
    tokio::spawn(run(client, tx));
    futures_util::stream::unfold(rx, |mut rx| async move {
        rx.recv().await.map(|event| (event, rx))
    })
    .boxed()
}

async fn run(client: SlackClient, tx: UnboundedSender<ChatEvent>) {
    let team = match client.auth_test().await {
        Ok(info) => info.team,
        Err(e) => {
            let _ = tx.send(fatal(e));
            return;
        }
    };
    let mut quick_closes: u32 = 0;
    while !tx.is_closed() {
        let url = match client.open_socket_url().await {
            Ok(url) => url,
            Err(e) => {
                let _ = tx.send(fatal(e));
                return;
            }
        };
        let opened = Instant::now();
        if let Err(e) = session(client.label(), &url, &team, &tx).await {
            warn!(identity = client.label(), error = %e, "Socket Mode connection failed");
            let _ = tx.send(ChatEvent::TransportError(e.to_string()));
            return;
        }
        quick_closes = if opened.elapsed() < STABLE_SESSION {
            quick_closes.saturating_add(1)
        } else {
            0
        };
        let delay = reconnect_delay(quick_closes);
        debug!(identity = client.label(), delay_ms = delay.as_millis(), "Socket closed, reopening");
        tokio::time::sleep(delay).await;
    }
}

/// Sessions shorter than this count towards the reconnect backoff.
const STABLE_SESSION: Duration = Duration::from_secs(30);
const MAX_RECONNECT_DELAY: Duration = Duration::from_secs(30);

/// One second, doubled for every session in a row that closed quickly.
fn reconnect_delay(quick_closes: u32) -> Duration {
    Duration::from_secs(1)
        .saturating_mul(2_u32.saturating_pow(quick_closes.saturating_sub(1)))
        .min(MAX_RECONNECT_DELAY)
}

fn fatal(err: ChatError) -> ChatEvent {
    match err {
        ChatError::AuthInvalid => ChatEvent::AuthInvalid,
        ChatError::Api { .. } | ChatError::Transport(_) | ChatError::Decode(_) => {
            ChatEvent::TransportError(err.to_string())
        }
    }
}

/// Reads one websocket until Slack closes it. Only a failed connect is an
/// error; problems on a live socket are reported on the stream.
async fn session(
    label: &'static str,
    url: &str,
    team: &str,
    tx: &UnboundedSender<ChatEvent>,
) -> Result<(), ChatError> {
    let (ws, _) = connect_async(url)
        .await
        .map_err(|e| ChatError::Transport(format!("websocket connect: {e}")))?;
    let (mut write, mut read) = ws.split();

    while let Some(frame) = read.next().await {
        if tx.is_closed() {
            return Ok(());
        }
        let text = match frame {
            Ok(Message::Text(text)) => text,
            Ok(Message::Close(_)) => return Ok(()),
            Ok(Message::Binary(_) | Message::Ping(_) | Message::Pong(_) | Message::Frame(_)) => {
                continue;
            }
            Err(e) => {
                let _ = tx.send(ChatEvent::TransportError(e.to_string()));
                return Ok(());
            }
        };
        let envelope = match parse_envelope(&text) {
            Ok(envelope) => envelope,
            Err(e) => {
                let _ = tx.send(ChatEvent::TransportError(e.to_string()));
                continue;
            }
        };
        if let Some(id) = envelope.envelope_id() {
            let ack = json!({ "envelope_id": id }).to_string();
            if let Err(e) = write.send(Message::Text(ack)).await {
                let _ = tx.send(ChatEvent::TransportError(format!("ack failed: {e}")));
                return Ok(());
            }
        }
        let event = match envelope {
            Envelope::Hello => ChatEvent::Connected {
                team: team.to_owned(),
            },
            Envelope::Disconnect { reason } => {
                info!(identity = label, reason = %reason, "Slack requested disconnect");
                return Ok(());
            }
            Envelope::Event { event, .. } => event,
            Envelope::Other { kind, .. } => ChatEvent::Unhandled(kind),
        };
        let _ = tx.send(event);
    }
    Ok(())
}
