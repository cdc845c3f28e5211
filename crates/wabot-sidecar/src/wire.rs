//! Frames exchanged with the sidecar over the WebSocket.
//!
//! JSON text frames. Requests carry an `id` the sidecar echoes in the
//! matching response; event frames arrive unsolicited and name the session
//! they belong to.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use wabot_core::{
    domain::{Jid, MessageKey, SessionId},
    events::Event,
    message::OutboundContent,
    ports::PresenceKind,
};

/// Client -> sidecar.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Request {
    /// Bind this connection to one named session and open it.
    Open {
        id: u64,
        session: SessionId,
        version: [u32; 3],
        generate_link_previews: bool,
        use_pairing_code: bool,
        mobile: bool,
    },
    SendMessage {
        id: u64,
        to: Jid,
        content: OutboundContent,
    },
    SendPresence {
        id: u64,
        to: Jid,
        presence: PresenceKind,
    },
    PresenceSubscribe {
        id: u64,
        to: Jid,
    },
    ReadMessages {
        id: u64,
        keys: Vec<MessageKey>,
    },
    ProfilePictureUrl {
        id: u64,
        of: Jid,
    },
    SaveCreds {
        id: u64,
    },
}

/// Sidecar -> client.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Frame {
    Response {
        id: u64,
        ok: bool,
        #[serde(default)]
        data: Value,
        #[serde(default)]
        error: Option<String>,
    },
    Event {
        session: SessionId,
        #[serde(flatten)]
        event: Event,
    },
}
