//! WebSocket client for the sidecar, implementing the `wabot-core` ports.
//!
//! Each `connect` opens a dedicated WebSocket and binds it to one session: a
//! writer task drains outbound frames, a reader task routes responses to
//! their id-correlated waiters and event frames into the session's channel.

use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc, Mutex,
    },
};

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use serde_json::Value;
use tokio::sync::{mpsc, oneshot};
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};
use tracing::{debug, warn};

use wabot_core::{
    domain::{Jid, MessageKey, SessionId},
    events::Event,
    message::OutboundContent,
    ports::{
        ConnectOptions, CredsSaver, PresenceKind, Session, WaSocket, WaTransport, WaVersion,
    },
    retry::RetryCounterCache,
    Error, Result,
};

use crate::{
    version,
    wire::{Frame, Request},
};

/// Buffered events per session before the reader task applies backpressure.
const EVENT_CHANNEL_CAPACITY: usize = 256;

struct Outcome {
    ok: bool,
    data: Value,
    error: Option<String>,
}

type Pending = Arc<Mutex<HashMap<u64, oneshot::Sender<Outcome>>>>;

/// `WaTransport` over the local sidecar WebSocket.
pub struct SidecarTransport {
    url: String,
    version_url: Option<String>,
    http: reqwest::Client,
}

impl SidecarTransport {
    pub fn new(url: impl Into<String>, version_url: Option<String>) -> Self {
        Self {
            url: url.into(),
            version_url,
            http: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl WaTransport for SidecarTransport {
    async fn fetch_latest_version(&self) -> Result<WaVersion> {
        Ok(version::fetch_latest(&self.http, self.version_url.as_deref()).await)
    }

    async fn connect(&self, opts: ConnectOptions) -> Result<Session> {
        let (ws, _) = connect_async(self.url.as_str())
            .await
            .map_err(|e| Error::Transport(format!("sidecar connect failed: {e}")))?;
        let (mut sink, stream) = ws.split();

        let (write_tx, mut write_rx) = mpsc::unbounded_channel::<String>();
        tokio::spawn(async move {
            while let Some(frame) = write_rx.recv().await {
                if sink.send(Message::Text(frame.into())).await.is_err() {
                    break;
                }
            }
            let _ = sink.close().await;
        });

        let pending: Pending = Arc::new(Mutex::new(HashMap::new()));
        let (event_tx, event_rx) = mpsc::channel::<Event>(EVENT_CHANNEL_CAPACITY);
        spawn_reader(
            stream,
            opts.session.clone(),
            opts.retry_counters.clone(),
            Arc::clone(&pending),
            event_tx,
        );

        let link = Arc::new(SidecarLink {
            session: opts.session.clone(),
            write_tx,
            pending,
            next_id: AtomicU64::new(1),
        });

        let session = opts.session.clone();
        let open = link
            .request(|id| Request::Open {
                id,
                session,
                version: [opts.version.0, opts.version.1, opts.version.2],
                generate_link_previews: opts.generate_link_previews,
                use_pairing_code: opts.use_pairing_code,
                mobile: opts.mobile,
            })
            .await;
        open.map_err(|e| match e {
            // An open failure is a connector failure, not a socket one.
            Error::Socket(msg) => Error::Transport(msg),
            other => other,
        })?;
        debug!(session = %opts.session, "sidecar session open");

        Ok(Session {
            socket: Arc::new(SidecarSocket {
                link: Arc::clone(&link),
            }),
            events: event_rx,
            save_creds: Arc::new(SidecarCredsSaver { link }),
        })
    }
}

type WsStream =
    futures::stream::SplitStream<WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>>;

fn spawn_reader(
    mut stream: WsStream,
    session: SessionId,
    retry_counters: RetryCounterCache,
    pending: Pending,
    event_tx: mpsc::Sender<Event>,
) {
    tokio::spawn(async move {
        while let Some(msg) = stream.next().await {
            let text = match msg {
                Ok(Message::Text(t)) => t,
                Ok(Message::Close(_)) | Err(_) => break,
                Ok(_) => continue,
            };

            let frame = match serde_json::from_str::<Frame>(&text) {
                Ok(frame) => frame,
                Err(e) => {
                    warn!(session = %session, error = %e, "undecodable sidecar frame");
                    continue;
                }
            };

            match frame {
                Frame::Response {
                    id,
                    ok,
                    data,
                    error,
                } => {
                    let waiter = pending.lock().unwrap().remove(&id);
                    match waiter {
                        Some(tx) => {
                            let _ = tx.send(Outcome { ok, data, error });
                        }
                        None => warn!(session = %session, id, "response for unknown request"),
                    }
                }
                Frame::Event {
                    session: from,
                    event,
                } => {
                    // One connection serves one session; anything else is a
                    // sidecar bug and must not leak across handles.
                    if from != session {
                        warn!(session = %session, from = %from, "dropping event for foreign session");
                        continue;
                    }
                    note_delivery_retries(&retry_counters, &event);
                    if event_tx.send(event).await.is_err() {
                        // Dispatcher is gone; stop reading.
                        break;
                    }
                }
            }
        }

        // Connection gone: wake every waiter with a closed-channel error.
        pending.lock().unwrap().clear();
    });
}

/// Mirror the library's delivery-retry accounting into the injected cache.
fn note_delivery_retries(retry_counters: &RetryCounterCache, event: &Event) {
    if let Event::ReceiptUpdate(receipts) = event {
        for receipt in receipts {
            if receipt.receipt_type.as_deref() == Some("retry") {
                let count = retry_counters.increment(&receipt.key.id.0);
                debug!(message = %receipt.key.id, count, "delivery retry noted");
            }
        }
    }
}

struct SidecarLink {
    session: SessionId,
    write_tx: mpsc::UnboundedSender<String>,
    pending: Pending,
    next_id: AtomicU64,
}

impl SidecarLink {
    /// Send one request and wait for its id-correlated response.
    async fn request(&self, build: impl FnOnce(u64) -> Request) -> Result<Value> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let req = build(id);

        let (tx, rx) = oneshot::channel();
        self.pending.lock().unwrap().insert(id, tx);

        let frame = serde_json::to_string(&req)?;
        if self.write_tx.send(frame).is_err() {
            self.pending.lock().unwrap().remove(&id);
            return Err(Error::Socket("sidecar connection closed".to_string()));
        }

        match rx.await {
            Ok(outcome) if outcome.ok => Ok(outcome.data),
            Ok(outcome) => Err(Error::Socket(
                outcome
                    .error
                    .unwrap_or_else(|| "sidecar rejected request".to_string()),
            )),
            Err(_) => Err(Error::Socket("sidecar connection closed".to_string())),
        }
    }
}

struct SidecarSocket {
    link: Arc<SidecarLink>,
}

#[derive(Deserialize)]
struct PictureData {
    #[serde(default)]
    url: Option<String>,
}

#[async_trait]
impl WaSocket for SidecarSocket {
    fn session(&self) -> &SessionId {
        &self.link.session
    }

    async fn send_message(&self, to: &Jid, content: OutboundContent) -> Result<MessageKey> {
        let to = to.clone();
        let data = self
            .link
            .request(|id| Request::SendMessage { id, to, content })
            .await?;
        let key: MessageKey = serde_json::from_value(data)?;
        Ok(key)
    }

    async fn send_presence(&self, to: &Jid, presence: PresenceKind) -> Result<()> {
        let to = to.clone();
        self.link
            .request(|id| Request::SendPresence { id, to, presence })
            .await?;
        Ok(())
    }

    async fn presence_subscribe(&self, to: &Jid) -> Result<()> {
        let to = to.clone();
        self.link
            .request(|id| Request::PresenceSubscribe { id, to })
            .await?;
        Ok(())
    }

    async fn read_messages(&self, keys: &[MessageKey]) -> Result<()> {
        let keys = keys.to_vec();
        self.link
            .request(|id| Request::ReadMessages { id, keys })
            .await?;
        Ok(())
    }

    async fn profile_picture_url(&self, of: &Jid) -> Result<Option<String>> {
        let of = of.clone();
        let data = self
            .link
            .request(|id| Request::ProfilePictureUrl { id, of })
            .await?;
        let picture: PictureData = serde_json::from_value(data)?;
        Ok(picture.url)
    }
}

struct SidecarCredsSaver {
    link: Arc<SidecarLink>,
}

#[async_trait]
impl CredsSaver for SidecarCredsSaver {
    async fn save(&self) -> Result<()> {
        self.link.request(|id| Request::SaveCreds { id }).await?;
        Ok(())
    }
}
