//! Incoming room event filtering.
//!
//! Sync payloads arrive as loosely-typed JSON; these filters pull out the
//! two shapes the bot reacts to: a PDF report posted to Room-1, and a text
//! reply to one of the bot's own messages in Rooms 2/3. Strict template
//! parsing of reply bodies happens in the core parsers, not here.

use serde_json::Value;

/// Minimal normalized view of one timeline event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncomingRoomEvent {
    pub room_id: String,
    pub event_id: String,
    pub sender: String,
    pub msgtype: String,
    pub body: String,
    pub media_url: Option<String>,
    pub mimetype: Option<String>,
    pub reply_to_event_id: Option<String>,
}

/// A Room-1 PDF report attachment that originates a case.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PdfOriginEvent {
    pub room_id: String,
    pub event_id: String,
    pub sender: String,
    pub pdf_mxc_url: String,
    pub filename: String,
}

/// A text reply to a specific bot message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplyEvent {
    pub room_id: String,
    pub event_id: String,
    pub sender: String,
    pub reply_to_event_id: String,
    pub body: String,
}

impl IncomingRoomEvent {
    /// Normalize one `m.room.message` timeline event; anything else is None.
    pub fn from_timeline_event(room_id: &str, event: &Value) -> Option<Self> {
        if event.get("type")?.as_str()? != "m.room.message" {
            return None;
        }
        let sender = event.get("sender")?.as_str()?;
        let event_id = event.get("event_id")?.as_str()?;
        let content = event.get("content")?.as_object()?;
        let msgtype = content.get("msgtype")?.as_str()?;
        let body = content.get("body")?.as_str()?;

        let media_url = content.get("url").and_then(Value::as_str).map(str::to_owned);
        let mimetype = content
            .get("info")
            .and_then(|info| info.get("mimetype"))
            .and_then(Value::as_str)
            .map(str::to_owned);
        let reply_to_event_id = content
            .get("m.relates_to")
            .and_then(|relates| relates.get("m.in_reply_to"))
            .and_then(|reply| reply.get("event_id"))
            .and_then(Value::as_str)
            .map(str::to_owned);

        Some(Self {
            room_id: room_id.to_owned(),
            event_id: event_id.to_owned(),
            sender: sender.to_owned(),
            msgtype: msgtype.to_owned(),
            body: body.to_owned(),
            media_url,
            mimetype,
            reply_to_event_id,
        })
    }

    /// Interpret as a case-originating PDF attachment, ignoring bot echoes.
    pub fn as_pdf_origin(&self, bot_user_id: &str) -> Option<PdfOriginEvent> {
        if self.sender == bot_user_id || self.msgtype != "m.file" {
            return None;
        }
        let url = self.media_url.as_deref()?;
        if !url.starts_with("mxc://") {
            return None;
        }
        let is_pdf = self.mimetype.as_deref() == Some("application/pdf")
            || self.body.to_lowercase().ends_with(".pdf");
        if !is_pdf {
            return None;
        }
        Some(PdfOriginEvent {
            room_id: self.room_id.clone(),
            event_id: self.event_id.clone(),
            sender: self.sender.clone(),
            pdf_mxc_url: url.to_owned(),
            filename: self.body.clone(),
        })
    }

    /// Interpret as a human text reply to the given bot message.
    pub fn as_reply_to(&self, bot_user_id: &str, root_event_id: &str) -> Option<ReplyEvent> {
        if self.sender == bot_user_id || self.msgtype != "m.text" {
            return None;
        }
        let reply_to = self.reply_to_event_id.as_deref()?;
        if reply_to != root_event_id {
            return None;
        }
        Some(ReplyEvent {
            room_id: self.room_id.clone(),
            event_id: self.event_id.clone(),
            sender: self.sender.clone(),
            reply_to_event_id: reply_to.to_owned(),
            body: self.body.clone(),
        })
    }
}
