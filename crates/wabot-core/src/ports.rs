//! Ports to the external WhatsApp Web protocol library.
//!
//! The library itself (connection lifecycle, encryption, credential format)
//! is an opaque dependency. Adapters implement these traits; the supervisor,
//! dispatcher and reply engine only ever see the traits.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::{
    domain::{Jid, MessageKey, SessionId},
    events::Event,
    message::OutboundContent,
    retry::RetryCounterCache,
    Result,
};

/// WA Web protocol version triple.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WaVersion(pub u32, pub u32, pub u32);

impl fmt::Display for WaVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.0, self.1, self.2)
    }
}

/// Presence states the socket can announce to a chat.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PresenceKind {
    Available,
    Composing,
    Paused,
}

/// Everything needed to open one session.
#[derive(Clone)]
pub struct ConnectOptions {
    pub session: SessionId,
    pub version: WaVersion,
    /// Shared across sessions; explicitly injected, never a global.
    pub retry_counters: RetryCounterCache,
    pub generate_link_previews: bool,
    /// Request a pairing code instead of a QR for unregistered sessions.
    pub use_pairing_code: bool,
    /// Register with a mobile-client identity.
    pub mobile: bool,
}

/// Zero-argument "persist current credentials" operation returned by
/// `connect`. Must be awaited before the triggering event is considered
/// handled; durability is not assumed until it returns.
#[async_trait]
pub trait CredsSaver: Send + Sync {
    async fn save(&self) -> Result<()>;
}

/// One live connection. Owned exclusively by its dispatcher/reply-engine
/// pair; destroyed and replaced wholesale on every reconnect.
#[async_trait]
pub trait WaSocket: Send + Sync {
    fn session(&self) -> &SessionId;

    async fn send_message(&self, to: &Jid, content: OutboundContent) -> Result<MessageKey>;
    async fn send_presence(&self, to: &Jid, presence: PresenceKind) -> Result<()>;
    async fn presence_subscribe(&self, to: &Jid) -> Result<()>;
    async fn read_messages(&self, keys: &[MessageKey]) -> Result<()>;

    /// Current profile picture URL of a user, `None` when unset.
    async fn profile_picture_url(&self, of: &Jid) -> Result<Option<String>>;
}

/// Bundle returned by a successful connect: the handle, the event stream and
/// the credential-persistence operation.
pub struct Session {
    pub socket: Arc<dyn WaSocket>,
    pub events: mpsc::Receiver<Event>,
    pub save_creds: Arc<dyn CredsSaver>,
}

/// Entry point into the protocol library.
#[async_trait]
pub trait WaTransport: Send + Sync {
    /// Latest known WA Web protocol version.
    async fn fetch_latest_version(&self) -> Result<WaVersion>;

    /// Open one session. Each call returns a fresh handle; the previous
    /// handle for the same session id must already have been dropped.
    async fn connect(&self, opts: ConnectOptions) -> Result<Session>;
}
