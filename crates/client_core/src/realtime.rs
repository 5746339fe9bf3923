//! Realtime channel shared with other clients viewing the same project.

use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use shared::protocol::{PeerEvent, RealtimeEvent};
use tokio::{
    sync::{broadcast, mpsc, Mutex},
    task::JoinHandle,
};
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, info, warn};

#[async_trait]
pub trait RealtimeChannel: Send + Sync {
    /// Queues `event` for delivery. No acknowledgement is awaited.
    async fn emit(&self, event: RealtimeEvent) -> Result<()>;

    /// Delivers whatever is still queued and ends the session.
    async fn close(&self) {}
}

/// Stand-in used when no realtime endpoint is configured or reachable.
pub struct DisconnectedRealtimeChannel;

#[async_trait]
impl RealtimeChannel for DisconnectedRealtimeChannel {
    async fn emit(&self, event: RealtimeEvent) -> Result<()> {
        Err(anyhow!(
            "realtime channel is not connected; dropped event={}",
            event.name()
        ))
    }
}

/// Websocket transport carrying `{"event", "data"}` JSON text frames.
pub struct WsRealtimeChannel {
    outbound: Mutex<Option<mpsc::UnboundedSender<RealtimeEvent>>>,
    writer: Mutex<Option<JoinHandle<()>>>,
    peer_events: broadcast::Sender<PeerEvent>,
}

impl WsRealtimeChannel {
    pub async fn connect(ws_url: &str) -> Result<Arc<Self>> {
        let (ws_stream, _) = connect_async(ws_url)
            .await
            .with_context(|| format!("failed to connect websocket: {ws_url}"))?;
        info!("realtime: connected url={ws_url}");
        let (mut ws_writer, mut ws_reader) = ws_stream.split();

        let (outbound, mut outbound_rx) = mpsc::unbounded_channel::<RealtimeEvent>();
        let (peer_events, _) = broadcast::channel(256);

        let writer = tokio::spawn(async move {
            while let Some(event) = outbound_rx.recv().await {
                let name = event.name();
                let text = match serde_json::to_string(&event) {
                    Ok(text) => text,
                    Err(err) => {
                        warn!("realtime: failed to encode event={name}: {err}");
                        continue;
                    }
                };
                if let Err(err) = ws_writer.send(Message::Text(text)).await {
                    warn!("realtime: send failed event={name}: {err}");
                    break;
                }
                debug!("realtime: sent event={name}");
            }
            if let Err(err) = ws_writer.close().await {
                debug!("realtime: close frame not sent: {err}");
            }
        });

        let inbound = peer_events.clone();
        tokio::spawn(async move {
            while let Some(msg) = ws_reader.next().await {
                match msg {
                    Ok(Message::Text(text)) => match serde_json::from_str::<PeerEvent>(&text) {
                        Ok(event) => {
                            let _ = inbound.send(event);
                        }
                        Err(err) => debug!("realtime: ignored inbound frame: {err}"),
                    },
                    Ok(Message::Close(_)) => break,
                    Ok(_) => {}
                    Err(err) => {
                        warn!("realtime: read failed: {err}");
                        break;
                    }
                }
            }
            info!("realtime: inbound stream closed");
        });

        Ok(Arc::new(Self {
            outbound: Mutex::new(Some(outbound)),
            writer: Mutex::new(Some(writer)),
            peer_events,
        }))
    }

    pub fn subscribe_peer_events(&self) -> broadcast::Receiver<PeerEvent> {
        self.peer_events.subscribe()
    }
}

#[async_trait]
impl RealtimeChannel for WsRealtimeChannel {
    async fn emit(&self, event: RealtimeEvent) -> Result<()> {
        let name = event.name();
        match self.outbound.lock().await.as_ref() {
            Some(outbound) => outbound
                .send(event)
                .map_err(|_| anyhow!("realtime writer stopped; dropped event={name}")),
            None => Err(anyhow!("realtime channel closed; dropped event={name}")),
        }
    }

    /// Stops accepting events, then waits until the writer has sent every
    /// queued frame followed by a close frame.
    async fn close(&self) {
        self.outbound.lock().await.take();
        let writer = self.writer.lock().await.take();
        if let Some(writer) = writer {
            if let Err(err) = writer.await {
                warn!("realtime: writer task ended abnormally: {err}");
            }
            info!("realtime: closed");
        }
    }
}

#[cfg(test)]
#[path = "tests/realtime_tests.rs"]
mod tests;
