//! The unified event stream a session emits.
//!
//! Event kinds form a closed enum so dispatch is an exhaustive `match`: a new
//! kind has to be deliberately handled rather than silently ignored. Variant
//! names on the wire match the upstream library's dotted event names.

use serde::{Deserialize, Serialize};

use crate::domain::{Jid, MessageKey};

/// Connection status as reported by the protocol library. The dispatcher
/// never infers state on its own; it only follows these updates.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionState {
    Connecting,
    Open,
    Close,
}

/// Something about the connection changed: state, a pairing QR, or a close
/// carrying the disconnect error.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionUpdate {
    #[serde(default)]
    pub state: Option<ConnectionState>,
    /// Error carried by a close. Absent on close means deliberate logout.
    #[serde(default)]
    pub error: Option<String>,
    /// Pairing QR payload, emitted while the session is unregistered.
    #[serde(default)]
    pub qr: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UpsertKind {
    /// Live notification; the only kind the bot replies to.
    Notify,
    /// Backfill (offline sync, history), delivered for completeness.
    Append,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InboundMessage {
    pub key: MessageKey,
    #[serde(default)]
    pub push_name: Option<String>,
    #[serde(default)]
    pub text: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessagesUpsert {
    pub kind: UpsertKind,
    pub messages: Vec<InboundMessage>,
}

/// Status change for an already-known message (delivered, deleted, edited).
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageUpdate {
    pub key: MessageKey,
    #[serde(default)]
    pub status: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Receipt {
    pub key: MessageKey,
    /// "read", "played", "retry"; diagnostic only.
    #[serde(default)]
    pub receipt_type: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReactionNotice {
    pub key: MessageKey,
    /// Empty string removes a previous reaction.
    #[serde(default)]
    pub emoji: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParticipantPresence {
    pub participant: Jid,
    #[serde(default)]
    pub state: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PresenceSnapshot {
    pub chat: Jid,
    #[serde(default)]
    pub presences: Vec<ParticipantPresence>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Chat {
    pub id: Jid,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatUpdate {
    pub id: Jid,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub unread_count: Option<u32>,
}

/// What happened to a contact's profile picture, when the update mentions the
/// picture field at all.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PictureUpdate {
    Removed,
    Changed,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Contact {
    pub id: Jid,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContactUpdate {
    pub id: Jid,
    #[serde(default)]
    pub name: Option<String>,
    /// Present only when the profile picture field changed.
    #[serde(default)]
    pub picture: Option<PictureUpdate>,
}

/// Initial history snapshot: everything the network knows about prior chats.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistorySnapshot {
    #[serde(default)]
    pub chats: Vec<Chat>,
    #[serde(default)]
    pub contacts: Vec<Contact>,
    #[serde(default)]
    pub messages: Vec<InboundMessage>,
    #[serde(default)]
    pub is_latest: bool,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LabelAssociation {
    pub label_id: String,
    pub target: Jid,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LabelEdit {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallNotice {
    pub id: String,
    pub from: Jid,
    #[serde(default)]
    pub status: Option<String>,
}

/// One notification off a session's event stream. Transient: processed once,
/// in arrival order, never retained.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "event", content = "data")]
pub enum Event {
    #[serde(rename = "connection.update")]
    Connection(ConnectionUpdate),
    #[serde(rename = "creds.update")]
    CredsUpdate,
    #[serde(rename = "messaging-history.set")]
    HistorySync(HistorySnapshot),
    #[serde(rename = "messages.upsert")]
    MessagesUpsert(MessagesUpsert),
    #[serde(rename = "messages.update")]
    MessagesUpdate(Vec<MessageUpdate>),
    #[serde(rename = "message-receipt.update")]
    ReceiptUpdate(Vec<Receipt>),
    #[serde(rename = "messages.reaction")]
    MessageReaction(Vec<ReactionNotice>),
    #[serde(rename = "presence.update")]
    PresenceUpdate(PresenceSnapshot),
    #[serde(rename = "chats.upsert")]
    ChatsUpsert(Vec<Chat>),
    #[serde(rename = "chats.update")]
    ChatsUpdate(Vec<ChatUpdate>),
    #[serde(rename = "chats.delete")]
    ChatsDelete(Vec<Jid>),
    #[serde(rename = "contacts.upsert")]
    ContactsUpsert(Vec<Contact>),
    #[serde(rename = "contacts.update")]
    ContactsUpdate(Vec<ContactUpdate>),
    #[serde(rename = "labels.association")]
    LabelsAssociation(LabelAssociation),
    #[serde(rename = "labels.edit")]
    LabelsEdit(LabelEdit),
    #[serde(rename = "call")]
    Call(Vec<CallNotice>),
}

impl Event {
    /// Dotted event name as used on the wire, for logging.
    pub fn name(&self) -> &'static str {
        match self {
            Event::Connection(_) => "connection.update",
            Event::CredsUpdate => "creds.update",
            Event::HistorySync(_) => "messaging-history.set",
            Event::MessagesUpsert(_) => "messages.upsert",
            Event::MessagesUpdate(_) => "messages.update",
            Event::ReceiptUpdate(_) => "message-receipt.update",
            Event::MessageReaction(_) => "messages.reaction",
            Event::PresenceUpdate(_) => "presence.update",
            Event::ChatsUpsert(_) => "chats.upsert",
            Event::ChatsUpdate(_) => "chats.update",
            Event::ChatsDelete(_) => "chats.delete",
            Event::ContactsUpsert(_) => "contacts.upsert",
            Event::ContactsUpdate(_) => "contacts.update",
            Event::LabelsAssociation(_) => "labels.association",
            Event::LabelsEdit(_) => "labels.edit",
            Event::Call(_) => "call",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn events_round_trip_with_dotted_names() {
        let ev = Event::Connection(ConnectionUpdate {
            state: Some(ConnectionState::Close),
            error: Some("stream errored".to_string()),
            qr: None,
        });
        let json = serde_json::to_value(&ev).unwrap();
        assert_eq!(json["event"], "connection.update");
        assert_eq!(json["data"]["state"], "close");

        let back: Event = serde_json::from_value(json).unwrap();
        match back {
            Event::Connection(u) => assert_eq!(u.error.as_deref(), Some("stream errored")),
            other => panic!("unexpected event: {}", other.name()),
        }
    }

    #[test]
    fn creds_update_needs_no_payload() {
        let ev: Event = serde_json::from_str(r#"{"event":"creds.update"}"#).unwrap();
        assert!(matches!(ev, Event::CredsUpdate));
    }

    #[test]
    fn message_key_uses_upstream_field_names() {
        let json = r#"{"remoteJid":"1234@x","fromMe":false,"id":"ABCD"}"#;
        let key: MessageKey = serde_json::from_str(json).unwrap();
        assert_eq!(key.remote_jid, Jid::new("1234@x"));
        assert!(!key.from_me);
    }
}
