//! Canned replies with simulated human presence cues.
//!
//! Every delivery runs the same sequence: subscribe to the target's
//! presence, pause, announce "composing", pause longer, announce "paused",
//! then send. The pauses are cosmetic typing latency, not synchronization.

use std::{sync::Arc, time::Duration};

use tokio::time::sleep;
use tracing::debug;

use crate::{
    domain::{Jid, MessageKey},
    message::{vcard, ListRow, ListSection, OutboundContent},
    ports::{PresenceKind, WaSocket},
    Result,
};

/// Cosmetic pauses in the typing simulation. Tunable; the defaults mimic a
/// short human read-then-type rhythm.
#[derive(Clone, Copy, Debug)]
pub struct TypingDelays {
    /// Pause after subscribing to the target's presence.
    pub subscribe_pause: Duration,
    /// Pause while "composing" is showing, before the paused signal.
    pub composing_pause: Duration,
}

impl Default for TypingDelays {
    fn default() -> Self {
        Self {
            subscribe_pause: Duration::from_millis(500),
            composing_pause: Duration::from_millis(2_000),
        }
    }
}

/// How much of the demonstration catalogue a reply sends.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReplyMode {
    /// Greeting text only (multi-session binary).
    Greeting,
    /// The full payload catalogue (single-session binary).
    Catalogue,
}

pub struct ReplyEngine {
    socket: Arc<dyn WaSocket>,
    delays: TypingDelays,
    mode: ReplyMode,
}

impl ReplyEngine {
    pub fn new(socket: Arc<dyn WaSocket>, delays: TypingDelays, mode: ReplyMode) -> Self {
        Self {
            socket,
            delays,
            mode,
        }
    }

    /// Deliver one payload with the typing simulation:
    /// subscribe -> pause -> composing -> pause -> paused -> send.
    pub async fn send_with_typing(&self, to: &Jid, content: OutboundContent) -> Result<MessageKey> {
        self.socket.presence_subscribe(to).await?;
        sleep(self.delays.subscribe_pause).await;

        self.socket.send_presence(to, PresenceKind::Composing).await?;
        sleep(self.delays.composing_pause).await;

        self.socket.send_presence(to, PresenceKind::Paused).await?;

        self.socket.send_message(to, content).await
    }

    /// The demonstration replies for one inbound message. A failed send
    /// aborts the remainder of the sequence; there is no compensation for
    /// payloads already delivered.
    pub async fn send_demo_replies(&self, to: &Jid, inbound: &MessageKey) -> Result<()> {
        self.send_with_typing(to, OutboundContent::text("Hello there!"))
            .await?;

        if self.mode == ReplyMode::Greeting {
            return Ok(());
        }

        // The rest exercises the library's message-composition surface; sent
        // plainly, without re-running the typing simulation each time.
        self.socket
            .send_message(
                to,
                OutboundContent::text(
                    "Hi, this was sent using https://github.com/adiwajshing/baileys",
                ),
            )
            .await?;
        self.socket.send_message(to, demo_document()).await?;
        self.socket
            .send_message(
                to,
                OutboundContent::Location {
                    latitude: 24.121231,
                    longitude: 55.1121221,
                },
            )
            .await?;
        self.socket.send_message(to, demo_contact_card()).await?;
        self.socket.send_message(to, demo_list()).await?;
        self.socket
            .send_message(to, OutboundContent::reaction("\u{1f496}", inbound.clone()))
            .await?;

        debug!(to = %to, "demo catalogue delivered");
        Ok(())
    }
}

fn demo_document() -> OutboundContent {
    OutboundContent::Document {
        url: "https://ik.imagekit.io/ghzlr9kj8/Agarson_Folder.pdf?updatedAt=1688643310063"
            .to_string(),
        file_name: "catalogue.pdf".to_string(),
        caption: Some("download the catalogue".to_string()),
        mime_type: "application/pdf".to_string(),
    }
}

fn demo_contact_card() -> OutboundContent {
    OutboundContent::Contacts {
        display_name: "Jeff".to_string(),
        vcards: vec![vcard(
            "Jeff Singh",
            "Ashoka Uni",
            "911234567890",
            "+91 12345 67890",
        )],
    }
}

fn demo_list() -> OutboundContent {
    let sections = vec![
        ListSection {
            title: "Section 1".to_string(),
            rows: vec![
                ListRow {
                    title: "Option 1".to_string(),
                    row_id: "option1".to_string(),
                    description: None,
                },
                ListRow {
                    title: "Option 2".to_string(),
                    row_id: "option2".to_string(),
                    description: Some("This is a description".to_string()),
                },
            ],
        },
        ListSection {
            title: "Section 2".to_string(),
            rows: vec![
                ListRow {
                    title: "Option 3".to_string(),
                    row_id: "option3".to_string(),
                    description: None,
                },
                ListRow {
                    title: "Option 4".to_string(),
                    row_id: "option4".to_string(),
                    description: Some("This is a description V2".to_string()),
                },
            ],
        },
    ];

    OutboundContent::List {
        title: "Amazing boldfaced list title".to_string(),
        text: "This is a list".to_string(),
        footer: "nice footer, link: https://google.com".to_string(),
        button_text: "Required, text on the button to view the list".to_string(),
        sections,
    }
}
