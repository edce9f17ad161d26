//! Core types: peer, incoming message, keyboard markup, callback answer, inline results.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The remote bot or chat being automated, as configured by the caller.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Peer {
    Id(i64),
    Username(String),
}

impl fmt::Display for Peer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Peer::Id(id) => write!(f, "{}", id),
            Peer::Username(name) => write!(f, "@{}", name.trim_start_matches('@')),
        }
    }
}

impl From<i64> for Peer {
    fn from(id: i64) -> Self {
        Peer::Id(id)
    }
}

impl From<&str> for Peer {
    fn from(name: &str) -> Self {
        match name.parse::<i64>() {
            Ok(id) => Peer::Id(id),
            Err(_) => Peer::Username(name.trim_start_matches('@').to_string()),
        }
    }
}

impl From<String> for Peer {
    fn from(name: String) -> Self {
        Peer::from(name.as_str())
    }
}

/// Attached media, reduced to what the engine needs for display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaDescriptor {
    /// e.g. "photo", "document", "video".
    pub kind: String,
    pub file_id: Option<String>,
}

/// A keyboard button. Inline buttons carry a callback payload or a URL; reply buttons only text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Button {
    pub text: String,
    pub callback_data: Option<String>,
    pub url: Option<String>,
}

impl Button {
    /// Inline button with a callback payload.
    pub fn callback(text: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            callback_data: Some(data.into()),
            url: None,
        }
    }

    /// Inline button that opens a link.
    pub fn url(text: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            callback_data: None,
            url: Some(url.into()),
        }
    }

    /// Plain text button (reply keyboards, or an inert inline button).
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            callback_data: None,
            url: None,
        }
    }

    pub fn is_clickable(&self) -> bool {
        self.callback_data.is_some()
    }

    /// True when the button only opens a URL and cannot be clicked through the API.
    pub fn is_url(&self) -> bool {
        self.callback_data.is_none() && self.url.is_some()
    }
}

/// Keyboard attached to a message, as rows of buttons.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum KeyboardMarkup {
    Inline(Vec<Vec<Button>>),
    Reply(Vec<Vec<Button>>),
}

/// A single message delivered by the platform (new or edited).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IncomingMessage {
    pub chat_id: i64,
    pub id: i32,
    pub text: Option<String>,
    pub media: Option<MediaDescriptor>,
    pub markup: Option<KeyboardMarkup>,
    /// Set when this is an edit of an earlier message rather than a new one.
    pub edited: bool,
    pub date: Option<DateTime<Utc>>,
}

impl IncomingMessage {
    /// Text message with no markup or media.
    pub fn text(chat_id: i64, id: i32, text: impl Into<String>) -> Self {
        Self {
            chat_id,
            id,
            text: Some(text.into()),
            media: None,
            markup: None,
            edited: false,
            date: None,
        }
    }

    pub fn with_markup(mut self, markup: KeyboardMarkup) -> Self {
        self.markup = Some(markup);
        self
    }

    pub fn with_media(mut self, media: MediaDescriptor) -> Self {
        self.media = Some(media);
        self
    }

    pub fn edited(mut self) -> Self {
        self.edited = true;
        self
    }
}

/// Handle to a message sent by the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageHandle {
    pub chat_id: i64,
    pub id: i32,
}

/// The bot's answer to a callback query (toast text, alert flag, optional URL).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallbackAnswer {
    pub message: Option<String>,
    pub alert: bool,
    pub url: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
}

/// One result of an inline query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InlineResult {
    pub id: String,
    /// Query the result belongs to; needed to send it.
    pub query_id: i64,
    pub result_type: String,
    pub title: Option<String>,
    pub description: Option<String>,
    pub url: Option<String>,
}

impl InlineResult {
    /// Title and description joined by a newline.
    pub fn full_text(&self) -> String {
        format!(
            "{}\n{}",
            self.title.as_deref().unwrap_or(""),
            self.description.as_deref().unwrap_or("")
        )
        .trim()
        .to_string()
    }
}

/// Offer to continue in a private chat with the bot, attached to inline results.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SwitchPmOffer {
    pub text: String,
    pub start_param: String,
}

/// One page of inline results as returned by the platform.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InlineResultPage {
    pub query_id: i64,
    pub results: Vec<InlineResult>,
    pub next_offset: Option<String>,
    pub is_gallery: bool,
    pub switch_pm: Option<SwitchPmOffer>,
}

/// Converts a transport-specific message type to core [`IncomingMessage`].
pub trait ToIncomingMessage {
    fn to_incoming(&self) -> IncomingMessage;
}

/// Converts a transport-specific markup type to core [`KeyboardMarkup`]. `None` for markup without buttons.
pub trait ToKeyboardMarkup {
    fn to_markup(&self) -> Option<KeyboardMarkup>;
}
