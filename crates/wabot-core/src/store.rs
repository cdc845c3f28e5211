//! Optional in-memory mirror of chats/contacts/messages.
//!
//! Exists only to accelerate lookups and to survive restarts a little: the
//! dispatcher feeds it, and a timer task rewrites the snapshot file wholesale
//! on a fixed interval. A write landing mid-flush is acceptable staleness,
//! not a correctness bug.

use std::{
    collections::HashMap,
    path::{Path, PathBuf},
    sync::{Arc, Mutex},
    time::Duration,
};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::{
    domain::SessionId,
    events::{Chat, Contact, Event},
    Result,
};

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
struct Snapshot {
    #[serde(default)]
    chats: HashMap<String, Chat>,
    #[serde(default)]
    contacts: HashMap<String, Contact>,
    #[serde(default)]
    message_count: u64,
    #[serde(default)]
    written_at: Option<DateTime<Utc>>,
}

pub struct InMemoryStore {
    path: PathBuf,
    inner: Mutex<Snapshot>,
}

impl InMemoryStore {
    /// Open a store backed by `path`, loading the previous snapshot if one
    /// is readable. A corrupt or missing file starts empty.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let snapshot = std::fs::read_to_string(&path)
            .ok()
            .and_then(|txt| serde_json::from_str::<Snapshot>(&txt).ok())
            .unwrap_or_default();

        Self {
            path,
            inner: Mutex::new(snapshot),
        }
    }

    /// Snapshot path for one named session, so concurrent sessions never
    /// share a file: `wabot_store.json` + `s1` -> `wabot_store.s1.json`.
    pub fn session_path(base: &Path, session: &SessionId) -> PathBuf {
        let stem = base
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "wabot_store".to_string());
        let ext = base
            .extension()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "json".to_string());
        base.with_file_name(format!("{stem}.{session}.{ext}"))
    }

    /// Fold one event into the mirror. Kinds without store-relevant payloads
    /// pass through untouched.
    pub fn apply(&self, event: &Event) {
        let mut snap = self.inner.lock().unwrap();
        match event {
            Event::HistorySync(h) => {
                for chat in &h.chats {
                    snap.chats.insert(chat.id.0.clone(), chat.clone());
                }
                for contact in &h.contacts {
                    snap.contacts.insert(contact.id.0.clone(), contact.clone());
                }
                snap.message_count += h.messages.len() as u64;
            }
            Event::MessagesUpsert(up) => {
                snap.message_count += up.messages.len() as u64;
            }
            Event::ChatsUpsert(chats) => {
                for chat in chats {
                    snap.chats.insert(chat.id.0.clone(), chat.clone());
                }
            }
            Event::ChatsUpdate(updates) => {
                for update in updates {
                    if let (Some(chat), Some(name)) =
                        (snap.chats.get_mut(&update.id.0), update.name.clone())
                    {
                        chat.name = Some(name);
                    }
                }
            }
            Event::ChatsDelete(ids) => {
                for id in ids {
                    snap.chats.remove(&id.0);
                }
            }
            Event::ContactsUpsert(contacts) => {
                for contact in contacts {
                    snap.contacts.insert(contact.id.0.clone(), contact.clone());
                }
            }
            Event::ContactsUpdate(updates) => {
                for update in updates {
                    if let (Some(contact), Some(name)) =
                        (snap.contacts.get_mut(&update.id.0), update.name.clone())
                    {
                        contact.name = Some(name);
                    }
                }
            }
            _ => {}
        }
    }

    pub fn chat_count(&self) -> usize {
        self.inner.lock().unwrap().chats.len()
    }

    pub fn contact_count(&self) -> usize {
        self.inner.lock().unwrap().contacts.len()
    }

    pub fn message_count(&self) -> u64 {
        self.inner.lock().unwrap().message_count
    }

    /// Rewrite the snapshot file wholesale.
    pub async fn flush(&self) -> Result<()> {
        let snapshot = {
            let mut snap = self.inner.lock().unwrap();
            snap.written_at = Some(Utc::now());
            snap.clone()
        };
        let bytes = serde_json::to_vec_pretty(&snapshot)?;
        tokio::fs::write(&self.path, bytes).await?;
        debug!(path = %self.path.display(), "store snapshot written");
        Ok(())
    }

    /// Spawn the periodic flush loop. The task runs for the life of the
    /// process; flush failures are logged and the loop keeps going.
    pub fn spawn_flush_task(self: &Arc<Self>, every: Duration) -> JoinHandle<()> {
        let store = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            // The first tick completes immediately; skip it.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                if let Err(e) = store.flush().await {
                    warn!(error = %e, "store snapshot flush failed");
                }
            }
        })
    }
}
