//! Websocket change feed — the hosted backend's realtime notification
//! stream, one logical channel per (table, filter) pair.
//!
//! Each subscription runs its own connection task: connect, send the
//! subscribe frame, forward matching events, ping on an interval, and
//! reconnect after a fixed delay if the stream drops. Dropping the
//! returned [`Subscription`] shuts the task down.

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, mpsc};
use tokio::time::sleep;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use uuid::Uuid;

use checkin_core::store::{
  ChangeEvent, ChangeFeed, ChangeInterest, ChangeKind, Subscription, WatchTable,
};

use crate::error::{Error, Result};

// ─── Config ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct RealtimeConfig {
  /// Websocket endpoint, e.g. `wss://abc.example.co/realtime/v1/socket`.
  pub socket_url:      String,
  /// The public API key, passed as a query parameter on connect.
  pub api_key:         String,
  pub reconnect_delay: Duration,
  pub ping_interval:   Duration,
}

impl RealtimeConfig {
  /// Derive the websocket endpoint from the backend's base URL.
  pub fn from_base_url(base_url: &str, api_key: impl Into<String>) -> Self {
    let base = base_url.trim_end_matches('/');
    let ws_base = if let Some(rest) = base.strip_prefix("https://") {
      format!("wss://{rest}")
    } else if let Some(rest) = base.strip_prefix("http://") {
      format!("ws://{rest}")
    } else {
      base.to_string()
    };
    Self {
      socket_url:      format!("{ws_base}/realtime/v1/socket"),
      api_key:         api_key.into(),
      reconnect_delay: Duration::from_secs(5),
      ping_interval:   Duration::from_secs(30),
    }
  }
}

// ─── Frames ──────────────────────────────────────────────────────────────────

/// Client → server: open a channel.
#[derive(Debug, Serialize)]
struct SubscribeFrame {
  event:  &'static str,
  topic:  String,
  events: Vec<ChangeKind>,
}

/// Server → client: a row changed.
#[derive(Debug, Deserialize)]
struct ServerFrame {
  #[serde(default)]
  topic:  Option<String>,
  event:  ChangeKind,
  #[serde(default)]
  record: serde_json::Value,
}

/// Channel topic for an interest: `public:posts`, or
/// `public:comments:post_id=eq.<uuid>` when filtered.
fn topic_for(table: WatchTable, post_id: Option<Uuid>) -> String {
  match post_id {
    Some(id) => format!("public:{table}:post_id=eq.{id}"),
    None => format!("public:{table}"),
  }
}

// ─── Feed ────────────────────────────────────────────────────────────────────

/// The realtime service, implementing [`ChangeFeed`].
#[derive(Clone)]
pub struct RealtimeFeed {
  config: RealtimeConfig,
}

impl RealtimeFeed {
  pub fn new(config: RealtimeConfig) -> Self {
    Self { config }
  }
}

impl ChangeFeed for RealtimeFeed {
  type Error = Error;

  async fn subscribe(&self, interest: ChangeInterest) -> Result<Subscription> {
    let (event_tx, event_rx) = mpsc::channel(64);
    let (shutdown_tx, shutdown_rx) = broadcast::channel(1);

    let config = self.config.clone();
    tokio::spawn(run_channel(config, interest, event_tx, shutdown_rx));

    Ok(Subscription::new(event_rx, move || {
      let _ = shutdown_tx.send(());
    }))
  }
}

/// Connection task: keep one channel alive until shut down or until
/// the subscriber goes away.
async fn run_channel(
  config: RealtimeConfig,
  interest: ChangeInterest,
  event_tx: mpsc::Sender<ChangeEvent>,
  mut shutdown_rx: broadcast::Receiver<()>,
) {
  let topic = topic_for(interest.table, interest.post_id);

  loop {
    if shutdown_rx.try_recv().is_ok() {
      break;
    }

    match connect_and_listen(
      &config,
      &topic,
      &interest,
      &event_tx,
      &mut shutdown_rx,
    )
    .await
    {
      Ok(ListenEnd::Shutdown) => break,
      Ok(ListenEnd::StreamClosed) => {
        tracing::debug!(%topic, "change feed closed by server");
      }
      Err(e) => {
        tracing::warn!(%topic, error = %e, "change feed connection error");
      }
    }

    if event_tx.is_closed() {
      break;
    }

    tokio::select! {
      _ = sleep(config.reconnect_delay) => {}
      _ = shutdown_rx.recv() => break,
    }
  }

  tracing::debug!(%topic, "change feed channel stopped");
}

enum ListenEnd {
  Shutdown,
  StreamClosed,
}

async fn connect_and_listen(
  config: &RealtimeConfig,
  topic: &str,
  interest: &ChangeInterest,
  event_tx: &mpsc::Sender<ChangeEvent>,
  shutdown_rx: &mut broadcast::Receiver<()>,
) -> Result<ListenEnd> {
  let url = format!("{}?apikey={}", config.socket_url, config.api_key);
  let (ws, _) = connect_async(&url)
    .await
    .map_err(|e| Error::Websocket(e.to_string()))?;
  let (mut write, mut read) = ws.split();

  let subscribe = SubscribeFrame {
    event:  "subscribe",
    topic:  topic.to_string(),
    events: interest.kinds.clone(),
  };
  write
    .send(Message::Text(serde_json::to_string(&subscribe)?))
    .await
    .map_err(|e| Error::Websocket(e.to_string()))?;

  tracing::debug!(%topic, "change feed channel open");
  let mut ping = tokio::time::interval(config.ping_interval);

  loop {
    tokio::select! {
      _ = shutdown_rx.recv() => {
        let _ = write.close().await;
        return Ok(ListenEnd::Shutdown);
      }

      _ = ping.tick() => {
        write
          .send(Message::Ping(vec![]))
          .await
          .map_err(|e| Error::Websocket(e.to_string()))?;
      }

      msg = read.next() => match msg {
        Some(Ok(Message::Text(text))) => {
          if let Some(event) = decode_frame(&text, interest) {
            // A full receiver just drops the event: re-fetch driven
            // consumers are idempotent, and a stalled view must not
            // back-pressure the socket.
            if event_tx.send(event).await.is_err() {
              return Ok(ListenEnd::Shutdown);
            }
          }
        }
        Some(Ok(Message::Close(_))) | None => return Ok(ListenEnd::StreamClosed),
        Some(Ok(_)) => {}
        Some(Err(e)) => return Err(Error::Websocket(e.to_string())),
      }
    }
  }
}

/// Parse a server frame and filter it against the channel's interest.
/// Unparseable frames are logged and skipped, never fatal.
fn decode_frame(text: &str, interest: &ChangeInterest) -> Option<ChangeEvent> {
  let frame: ServerFrame = match serde_json::from_str(text) {
    Ok(frame) => frame,
    Err(e) => {
      tracing::debug!(error = %e, "unparseable change frame");
      return None;
    }
  };

  let event = ChangeEvent {
    table:  interest.table,
    kind:   frame.event,
    record: frame.record,
  };
  (frame.topic.is_none() || frame.topic.as_deref() == Some(&topic_for(interest.table, interest.post_id)))
    .then(|| event)
    .filter(|e| interest.matches(e))
}
