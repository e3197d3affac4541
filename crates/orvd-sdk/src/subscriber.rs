//! Pub/sub over the relay's WebSocket bridge.

use anyhow::Result;
use futures_util::{SinkExt, StreamExt};
use reqwest::Url;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

/// One message on a topic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Publication {
    pub topic: String,
    pub payload: String,
}

/// WebSocket connection to `/v1/pubsub`.
pub struct TopicStream {
    socket: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

impl TopicStream {
    pub async fn connect(base_url: &str) -> Result<Self> {
        let url = build_ws_url(base_url, "/v1/pubsub")?;
        let (socket, _) = connect_async(url.as_str()).await?;
        Ok(Self { socket })
    }

    /// Subscribe to `pattern` (`{name}`, `+` and `#` allowed). Repeat to widen.
    pub async fn subscribe(&mut self, pattern: &str) -> Result<()> {
        let frame = json!({ "op": "subscribe", "pattern": pattern });
        self.socket.send(Message::Text(frame.to_string())).await?;
        Ok(())
    }

    pub async fn publish(&mut self, topic: &str, payload: &str) -> Result<()> {
        let frame = json!({ "op": "publish", "topic": topic, "payload": payload });
        self.socket.send(Message::Text(frame.to_string())).await?;
        Ok(())
    }

    /// Next publication (returns None on close). Error frames from the relay fail.
    pub async fn next_publication(&mut self) -> Result<Option<Publication>> {
        while let Some(msg) = self.socket.next().await {
            match msg? {
                Message::Text(text) => return parse_frame(&text).map(Some),
                Message::Close(_) => return Ok(None),
                _ => {}
            }
        }
        Ok(None)
    }
}

fn parse_frame(text: &str) -> Result<Publication> {
    let value: serde_json::Value = serde_json::from_str(text)?;
    if let Some(error) = value.get("error").and_then(|e| e.as_str()) {
        anyhow::bail!("relay rejected frame: {}", error);
    }
    Ok(serde_json::from_value(value)?)
}

fn build_ws_url(base: &str, path: &str) -> Result<Url> {
    let mut url = Url::parse(base)?;
    let scheme = match url.scheme() {
        "http" => "ws",
        "https" => "wss",
        other => other,
    }
    .to_string();

    url.set_scheme(&scheme)
        .map_err(|_| anyhow::anyhow!("Invalid base URL scheme"))?;
    url.set_path(path);
    Ok(url)
}
