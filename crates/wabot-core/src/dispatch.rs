//! Per-session event dispatch.
//!
//! One dispatcher owns one live session handle and consumes its event stream
//! strictly in arrival order: a single `recv` loop, one event at a time, so a
//! credential save always completes before the next event is looked at.

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::{
    domain::{Jid, MessageKey, SessionId},
    events::{
        ConnectionState, ConnectionUpdate, ContactUpdate, Event, MessagesUpsert, PictureUpdate,
        UpsertKind,
    },
    ports::{CredsSaver, WaSocket},
    reply::ReplyEngine,
    store::InMemoryStore,
    Result,
};

/// Why a dispatch run ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionExit {
    /// Close carried an error: transient, the supervisor should reconnect.
    Restart,
    /// Close without an error: deliberate logout, terminal for this session.
    Logout,
}

#[derive(Clone, Copy, Debug)]
pub struct DispatchReport {
    pub exit: SessionExit,
    /// Whether the connection reached `Open` during this run. The supervisor
    /// resets its reconnect budget on it.
    pub reached_open: bool,
}

pub struct Dispatcher {
    session: SessionId,
    socket: Arc<dyn WaSocket>,
    save_creds: Arc<dyn CredsSaver>,
    reply: ReplyEngine,
    store: Option<Arc<InMemoryStore>>,
    auto_reply: bool,
    reached_open: bool,
}

impl Dispatcher {
    pub fn new(
        session: SessionId,
        socket: Arc<dyn WaSocket>,
        save_creds: Arc<dyn CredsSaver>,
        reply: ReplyEngine,
        store: Option<Arc<InMemoryStore>>,
        auto_reply: bool,
    ) -> Self {
        Self {
            session,
            socket,
            save_creds,
            reply,
            store,
            auto_reply,
            reached_open: false,
        }
    }

    /// Consume the stream until the connection closes. Dropping the receiver
    /// on return guarantees the replaced handle gets no further deliveries.
    pub async fn run(mut self, mut events: mpsc::Receiver<Event>) -> Result<DispatchReport> {
        while let Some(event) = events.recv().await {
            debug!(session = %self.session, event = event.name(), "event");
            if let Some(store) = &self.store {
                store.apply(&event);
            }
            if let Some(exit) = self.handle(event).await? {
                return Ok(DispatchReport {
                    exit,
                    reached_open: self.reached_open,
                });
            }
        }

        // Stream ended without a close event: the transport died out from
        // under us. Treat it like a transient disconnect.
        warn!(session = %self.session, "event stream ended without close");
        Ok(DispatchReport {
            exit: SessionExit::Restart,
            reached_open: self.reached_open,
        })
    }

    async fn handle(&mut self, event: Event) -> Result<Option<SessionExit>> {
        match event {
            Event::Connection(update) => return Ok(self.on_connection(update)),
            Event::CredsUpdate => {
                // Awaited in-line: durability before the next event.
                self.save_creds.save().await?;
                debug!(session = %self.session, "credentials persisted");
            }
            Event::HistorySync(h) => {
                info!(
                    session = %self.session,
                    chats = h.chats.len(),
                    contacts = h.contacts.len(),
                    messages = h.messages.len(),
                    is_latest = h.is_latest,
                    "history snapshot received"
                );
            }
            Event::MessagesUpsert(upsert) => self.on_messages_upsert(upsert).await,
            Event::MessagesUpdate(updates) => {
                debug!(session = %self.session, count = updates.len(), "message status updates");
            }
            Event::ReceiptUpdate(receipts) => {
                debug!(session = %self.session, count = receipts.len(), "receipt updates");
            }
            Event::MessageReaction(reactions) => {
                debug!(session = %self.session, count = reactions.len(), "message reactions");
            }
            Event::PresenceUpdate(presence) => {
                debug!(session = %self.session, chat = %presence.chat, "presence update");
            }
            Event::ChatsUpsert(chats) => {
                debug!(session = %self.session, count = chats.len(), "chats upserted");
            }
            Event::ChatsUpdate(updates) => {
                debug!(session = %self.session, count = updates.len(), "chats updated");
            }
            Event::ChatsDelete(ids) => {
                info!(session = %self.session, count = ids.len(), "chats deleted");
            }
            Event::ContactsUpsert(contacts) => {
                debug!(session = %self.session, count = contacts.len(), "contacts upserted");
            }
            Event::ContactsUpdate(updates) => self.on_contacts_update(updates).await,
            Event::LabelsAssociation(assoc) => {
                debug!(
                    session = %self.session,
                    label = %assoc.label_id,
                    target = %assoc.target,
                    "label association"
                );
            }
            Event::LabelsEdit(edit) => {
                debug!(session = %self.session, label = %edit.id, "label edited");
            }
            Event::Call(calls) => {
                info!(session = %self.session, count = calls.len(), "call event received");
            }
        }
        Ok(None)
    }

    fn on_connection(&mut self, update: ConnectionUpdate) -> Option<SessionExit> {
        if update.qr.is_some() {
            info!(session = %self.session, "pairing QR received, scan it from the phone");
        }

        match update.state? {
            ConnectionState::Connecting => {
                debug!(session = %self.session, "connecting");
                None
            }
            ConnectionState::Open => {
                self.reached_open = true;
                info!(session = %self.session, "connection open");
                None
            }
            ConnectionState::Close => match update.error {
                Some(error) => {
                    warn!(session = %self.session, error = %error, "connection closed with error");
                    Some(SessionExit::Restart)
                }
                None => {
                    info!(session = %self.session, "connection closed, logged out");
                    Some(SessionExit::Logout)
                }
            },
        }
    }

    async fn on_messages_upsert(&self, upsert: MessagesUpsert) {
        debug!(
            session = %self.session,
            kind = ?upsert.kind,
            count = upsert.messages.len(),
            "messages upsert"
        );
        if upsert.kind != UpsertKind::Notify {
            return;
        }

        for message in &upsert.messages {
            // Never reply to messages the bot itself authored.
            if message.key.from_me || !self.auto_reply {
                continue;
            }
            let to = message.key.remote_jid.clone();
            info!(session = %self.session, to = %to, "replying");
            if let Err(e) = self.reply_to(&to, &message.key).await {
                warn!(session = %self.session, to = %to, error = %e, "reply sequence aborted");
            }
        }
    }

    async fn reply_to(&self, to: &Jid, key: &MessageKey) -> Result<()> {
        self.socket.read_messages(std::slice::from_ref(key)).await?;
        self.reply.send_demo_replies(to, key).await
    }

    async fn on_contacts_update(&self, updates: Vec<ContactUpdate>) {
        for update in updates {
            match update.picture {
                Some(PictureUpdate::Changed) => {
                    // Best-effort: a failed lookup reads as "no picture now".
                    let url = self
                        .socket
                        .profile_picture_url(&update.id)
                        .await
                        .ok()
                        .flatten();
                    info!(
                        session = %self.session,
                        contact = %update.id,
                        url = url.as_deref().unwrap_or("<none>"),
                        "contact has a new profile picture"
                    );
                }
                Some(PictureUpdate::Removed) => {
                    info!(session = %self.session, contact = %update.id, "contact removed their profile picture");
                }
                None => {
                    debug!(session = %self.session, contact = %update.id, "contact updated");
                }
            }
        }
    }
}
