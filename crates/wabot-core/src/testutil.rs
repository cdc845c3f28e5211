//! Fake port implementations shared by the orchestration tests.

use std::{
    collections::VecDeque,
    sync::{
        atomic::{AtomicU32, Ordering},
        Arc, Mutex,
    },
};

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::{
    domain::{Jid, MessageId, MessageKey, SessionId},
    events::Event,
    message::OutboundContent,
    ports::{ConnectOptions, CredsSaver, PresenceKind, Session, WaSocket, WaTransport, WaVersion},
    Error, Result,
};

/// Shared, ordered log of observed operations across fakes. Lets a test
/// assert cross-component ordering (e.g. creds persisted before the next
/// event's side effects).
#[derive(Clone, Default)]
pub struct Journal(Arc<Mutex<Vec<String>>>);

impl Journal {
    pub fn push(&self, entry: impl Into<String>) {
        self.0.lock().unwrap().push(entry.into());
    }

    pub fn entries(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum SocketCall {
    Subscribe(Jid),
    Presence(Jid, PresenceKind),
    Send(Jid, OutboundContent),
    Read(Vec<MessageKey>),
    ProfilePicture(Jid),
}

/// How the fake answers `profile_picture_url`.
#[derive(Clone, Debug)]
pub enum PictureBehavior {
    Url(String),
    Absent,
    Fail,
}

/// Recording `WaSocket`: every call is appended to `calls` (and the journal,
/// when one is attached). Sends past `send_budget` fail.
pub struct RecordingSocket {
    session: SessionId,
    pub calls: Mutex<Vec<SocketCall>>,
    pub journal: Option<Journal>,
    /// Number of `send_message` calls that succeed before the fake starts
    /// failing; `None` means never fail.
    pub send_budget: Option<usize>,
    pub picture: PictureBehavior,
    sends: AtomicU32,
}

impl RecordingSocket {
    pub fn new(session: &str) -> Arc<Self> {
        Arc::new(Self {
            session: SessionId::new(session),
            calls: Mutex::new(Vec::new()),
            journal: None,
            send_budget: None,
            picture: PictureBehavior::Absent,
            sends: AtomicU32::new(0),
        })
    }

    pub fn with_journal(session: &str, journal: Journal) -> Arc<Self> {
        Arc::new(Self {
            session: SessionId::new(session),
            calls: Mutex::new(Vec::new()),
            journal: Some(journal),
            send_budget: None,
            picture: PictureBehavior::Absent,
            sends: AtomicU32::new(0),
        })
    }

    pub fn with_send_budget(session: &str, budget: usize) -> Arc<Self> {
        Arc::new(Self {
            session: SessionId::new(session),
            calls: Mutex::new(Vec::new()),
            journal: None,
            send_budget: Some(budget),
            picture: PictureBehavior::Absent,
            sends: AtomicU32::new(0),
        })
    }

    pub fn with_picture(session: &str, picture: PictureBehavior) -> Arc<Self> {
        Arc::new(Self {
            session: SessionId::new(session),
            calls: Mutex::new(Vec::new()),
            journal: None,
            send_budget: None,
            picture,
            sends: AtomicU32::new(0),
        })
    }

    pub fn calls(&self) -> Vec<SocketCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn sent_payloads(&self) -> Vec<OutboundContent> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                SocketCall::Send(_, content) => Some(content),
                _ => None,
            })
            .collect()
    }

    fn record(&self, call: SocketCall, journal_entry: String) {
        self.calls.lock().unwrap().push(call);
        if let Some(journal) = &self.journal {
            journal.push(journal_entry);
        }
    }
}

#[async_trait]
impl WaSocket for RecordingSocket {
    fn session(&self) -> &SessionId {
        &self.session
    }

    async fn send_message(&self, to: &Jid, content: OutboundContent) -> Result<MessageKey> {
        let n = self.sends.fetch_add(1, Ordering::SeqCst) as usize;
        let kind = content.kind();
        self.record(
            SocketCall::Send(to.clone(), content),
            format!("send:{kind}"),
        );
        if self.send_budget.is_some_and(|budget| n >= budget) {
            return Err(Error::Socket("scripted send failure".to_string()));
        }
        Ok(MessageKey {
            remote_jid: to.clone(),
            from_me: true,
            id: MessageId(format!("SENT{n}")),
        })
    }

    async fn send_presence(&self, to: &Jid, presence: PresenceKind) -> Result<()> {
        self.record(
            SocketCall::Presence(to.clone(), presence),
            format!("presence:{presence:?}"),
        );
        Ok(())
    }

    async fn presence_subscribe(&self, to: &Jid) -> Result<()> {
        self.record(SocketCall::Subscribe(to.clone()), "subscribe".to_string());
        Ok(())
    }

    async fn read_messages(&self, keys: &[MessageKey]) -> Result<()> {
        self.record(SocketCall::Read(keys.to_vec()), "read".to_string());
        Ok(())
    }

    async fn profile_picture_url(&self, of: &Jid) -> Result<Option<String>> {
        self.record(
            SocketCall::ProfilePicture(of.clone()),
            "profile-picture".to_string(),
        );
        match &self.picture {
            PictureBehavior::Url(url) => Ok(Some(url.clone())),
            PictureBehavior::Absent => Ok(None),
            PictureBehavior::Fail => Err(Error::Socket("picture lookup failed".to_string())),
        }
    }
}

/// Recording `CredsSaver`.
pub struct RecordingSaver {
    pub saves: AtomicU32,
    pub journal: Option<Journal>,
}

impl RecordingSaver {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            saves: AtomicU32::new(0),
            journal: None,
        })
    }

    pub fn with_journal(journal: Journal) -> Arc<Self> {
        Arc::new(Self {
            saves: AtomicU32::new(0),
            journal: Some(journal),
        })
    }

    pub fn save_count(&self) -> u32 {
        self.saves.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CredsSaver for RecordingSaver {
    async fn save(&self) -> Result<()> {
        self.saves.fetch_add(1, Ordering::SeqCst);
        if let Some(journal) = &self.journal {
            journal.push("save-creds");
        }
        Ok(())
    }
}

/// `WaTransport` that replays one pre-scripted event list per connect.
///
/// Each script should end with a connection-close event; the sender half of
/// every handed-out channel is retained so tests can verify that a replaced
/// handle no longer receives deliveries.
pub struct ScriptedTransport {
    scripts: Mutex<VecDeque<Vec<Event>>>,
    pub connects: AtomicU32,
    pub senders: Mutex<Vec<mpsc::Sender<Event>>>,
    pub sockets: Mutex<Vec<Arc<RecordingSocket>>>,
}

impl ScriptedTransport {
    pub fn new(scripts: Vec<Vec<Event>>) -> Arc<Self> {
        Arc::new(Self {
            scripts: Mutex::new(scripts.into()),
            connects: AtomicU32::new(0),
            senders: Mutex::new(Vec::new()),
            sockets: Mutex::new(Vec::new()),
        })
    }

    pub fn connect_count(&self) -> u32 {
        self.connects.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl WaTransport for ScriptedTransport {
    async fn fetch_latest_version(&self) -> Result<WaVersion> {
        Ok(WaVersion(2, 3000, 0))
    }

    async fn connect(&self, opts: ConnectOptions) -> Result<Session> {
        self.connects.fetch_add(1, Ordering::SeqCst);

        let script = self
            .scripts
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| Error::Transport("no scripted session left".to_string()))?;

        let (tx, rx) = mpsc::channel(script.len().max(1));
        for event in script {
            tx.try_send(event)
                .map_err(|e| Error::Transport(format!("script overflow: {e}")))?;
        }
        self.senders.lock().unwrap().push(tx);

        let socket = RecordingSocket::new(&opts.session.0);
        self.sockets.lock().unwrap().push(Arc::clone(&socket));

        Ok(Session {
            socket,
            events: rx,
            save_creds: RecordingSaver::new(),
        })
    }
}
