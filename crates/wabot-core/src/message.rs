//! Outbound message payloads.
//!
//! A closed union of the payload kinds the demo exercises. Constructed ad hoc
//! per reply, never persisted.

use serde::{Deserialize, Serialize};

use crate::domain::MessageKey;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListRow {
    pub title: String,
    pub row_id: String,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListSection {
    pub title: String,
    pub rows: Vec<ListRow>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum OutboundContent {
    Text {
        text: String,
    },
    /// Remote document reference; the network fetches the bytes itself.
    Document {
        url: String,
        file_name: String,
        #[serde(default)]
        caption: Option<String>,
        mime_type: String,
    },
    Location {
        latitude: f64,
        longitude: f64,
    },
    Contacts {
        display_name: String,
        vcards: Vec<String>,
    },
    List {
        title: String,
        text: String,
        footer: String,
        button_text: String,
        sections: Vec<ListSection>,
    },
    /// Emoji reaction keyed to an existing message. An empty emoji removes
    /// the reaction.
    Reaction {
        emoji: String,
        key: MessageKey,
    },
}

impl OutboundContent {
    pub fn text(text: impl Into<String>) -> Self {
        OutboundContent::Text { text: text.into() }
    }

    pub fn reaction(emoji: impl Into<String>, key: MessageKey) -> Self {
        OutboundContent::Reaction {
            emoji: emoji.into(),
            key,
        }
    }

    /// Payload kind for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            OutboundContent::Text { .. } => "text",
            OutboundContent::Document { .. } => "document",
            OutboundContent::Location { .. } => "location",
            OutboundContent::Contacts { .. } => "contacts",
            OutboundContent::List { .. } => "list",
            OutboundContent::Reaction { .. } => "reaction",
        }
    }
}

/// Render a minimal vCard 3.0 for a contact-card payload: full name,
/// organization, and a phone number tied to a WhatsApp id.
pub fn vcard(full_name: &str, org: &str, wa_id: &str, phone: &str) -> String {
    format!(
        "BEGIN:VCARD\n\
         VERSION:3.0\n\
         FN:{full_name}\n\
         ORG:{org};\n\
         TEL;type=CELL;type=VOICE;waid={wa_id}:{phone}\n\
         END:VCARD"
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Jid, MessageId};

    #[test]
    fn vcard_carries_name_org_and_waid() {
        let card = vcard("Jeff Singh", "Ashoka Uni", "911234567890", "+91 12345 67890");
        assert!(card.starts_with("BEGIN:VCARD\nVERSION:3.0\n"));
        assert!(card.contains("FN:Jeff Singh"));
        assert!(card.contains("ORG:Ashoka Uni;"));
        assert!(card.contains("waid=911234567890:+91 12345 67890"));
        assert!(card.ends_with("END:VCARD"));
    }

    #[test]
    fn text_payload_serializes_flat() {
        let json = serde_json::to_value(OutboundContent::text("Hello there!")).unwrap();
        assert_eq!(json["kind"], "text");
        assert_eq!(json["text"], "Hello there!");
    }

    #[test]
    fn reaction_keeps_the_original_key() {
        let key = MessageKey {
            remote_jid: Jid::new("1234@x"),
            from_me: false,
            id: MessageId("ABCD".to_string()),
        };
        let json = serde_json::to_value(OutboundContent::reaction("\u{1f496}", key)).unwrap();
        assert_eq!(json["key"]["remoteJid"], "1234@x");
    }
}
