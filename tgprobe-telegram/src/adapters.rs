//! Adapters from Telegram (teloxide) types to tgprobe_core types.
//! Depends only on teloxide and tgprobe_core type definitions.

use teloxide::types::{
    InlineKeyboardButtonKind, InlineKeyboardMarkup, KeyboardMarkup as TgKeyboardMarkup, Message,
    ReplyMarkup, Update, UpdateKind,
};
use tgprobe_core::{
    Button, IncomingMessage, KeyboardMarkup, MediaDescriptor, ToIncomingMessage, ToKeyboardMarkup,
};
use tracing::debug;

fn url_text(url: &reqwest::Url) -> String {
    url.as_str().to_string()
}

/// Wraps a teloxide InlineKeyboardMarkup for conversion to core [`KeyboardMarkup::Inline`].
pub struct InlineMarkupWrapper<'a>(pub &'a InlineKeyboardMarkup);

impl<'a> ToKeyboardMarkup for InlineMarkupWrapper<'a> {
    fn to_markup(&self) -> Option<KeyboardMarkup> {
        let rows: Vec<Vec<Button>> = self
            .0
            .inline_keyboard
            .iter()
            .map(|row| {
                row.iter()
                    .map(|button| match &button.kind {
                        InlineKeyboardButtonKind::CallbackData(data) => {
                            Button::callback(button.text.clone(), data.clone())
                        }
                        InlineKeyboardButtonKind::Url(url) => {
                            Button::url(button.text.clone(), url_text(url))
                        }
                        // Login, web app, switch-inline, game and pay buttons cannot be pressed
                        // through a callback query.
                        _ => Button::text(button.text.clone()),
                    })
                    .collect()
            })
            .filter(|row: &Vec<Button>| !row.is_empty())
            .collect();
        (!rows.is_empty()).then_some(KeyboardMarkup::Inline(rows))
    }
}

/// Wraps a teloxide reply keyboard for conversion to core [`KeyboardMarkup::Reply`].
pub struct ReplyMarkupWrapper<'a>(pub &'a TgKeyboardMarkup);

impl<'a> ToKeyboardMarkup for ReplyMarkupWrapper<'a> {
    fn to_markup(&self) -> Option<KeyboardMarkup> {
        let rows: Vec<Vec<Button>> = self
            .0
            .keyboard
            .iter()
            .map(|row| row.iter().map(|b| Button::text(b.text.clone())).collect())
            .filter(|row: &Vec<Button>| !row.is_empty())
            .collect();
        (!rows.is_empty()).then_some(KeyboardMarkup::Reply(rows))
    }
}

/// Keyboard carried by any reply markup; removals and force-reply carry none.
pub fn keyboard_from_reply_markup(markup: &ReplyMarkup) -> Option<KeyboardMarkup> {
    match markup {
        ReplyMarkup::InlineKeyboard(inline) => InlineMarkupWrapper(inline).to_markup(),
        ReplyMarkup::Keyboard(keyboard) => ReplyMarkupWrapper(keyboard).to_markup(),
        _ => None,
    }
}

/// Wraps a teloxide Message for conversion to core [`IncomingMessage`].
pub struct TelegramMessageWrapper<'a>(pub &'a Message);

impl<'a> ToIncomingMessage for TelegramMessageWrapper<'a> {
    fn to_incoming(&self) -> IncomingMessage {
        IncomingMessage {
            chat_id: self.0.chat.id.0,
            id: self.0.id.0,
            text: self
                .0
                .text()
                .or_else(|| self.0.caption())
                .map(str::to_string),
            media: self.media(),
            markup: self
                .0
                .reply_markup()
                .and_then(|markup| InlineMarkupWrapper(markup).to_markup()),
            edited: self.0.edit_date().is_some(),
            date: Some(self.0.date),
        }
    }
}

impl<'a> TelegramMessageWrapper<'a> {
    /// Kind and file id of the attached media, if any. Photos report their largest size.
    fn media(&self) -> Option<MediaDescriptor> {
        let message = self.0;
        let (kind, file_id) = if let Some(sizes) = message.photo() {
            ("photo", sizes.last().map(|p| p.file.id.to_string()))
        } else if let Some(doc) = message.document() {
            ("document", Some(doc.file.id.to_string()))
        } else if let Some(video) = message.video() {
            ("video", Some(video.file.id.to_string()))
        } else if let Some(audio) = message.audio() {
            ("audio", Some(audio.file.id.to_string()))
        } else if let Some(voice) = message.voice() {
            ("voice", Some(voice.file.id.to_string()))
        } else if let Some(sticker) = message.sticker() {
            ("sticker", Some(sticker.file.id.to_string()))
        } else if let Some(animation) = message.animation() {
            ("animation", Some(animation.file.id.to_string()))
        } else {
            return None;
        };
        Some(MediaDescriptor {
            kind: kind.to_string(),
            file_id,
        })
    }
}

/// Core message carried by an update: new messages, channel posts and their edits.
/// Other update kinds yield `None`.
pub fn incoming_from_update(update: &Update) -> Option<IncomingMessage> {
    let (message, edited) = match &update.kind {
        UpdateKind::Message(m) | UpdateKind::ChannelPost(m) => (m, false),
        UpdateKind::EditedMessage(m) | UpdateKind::EditedChannelPost(m) => (m, true),
        _ => {
            debug!(update_id = update.id.0, "Ignoring update without a message");
            return None;
        }
    };
    let mut incoming = TelegramMessageWrapper(message).to_incoming();
    incoming.edited |= edited;
    Some(incoming)
}

#[cfg(test)]
mod tests {
    use super::*;
    use teloxide::types::{InlineKeyboardButton, KeyboardButton};

    fn message(extra: serde_json::Value) -> Message {
        let mut value = serde_json::json!({
            "message_id": 7,
            "date": 1700000000,
            "chat": { "id": 4242, "type": "private", "first_name": "Menu", "username": "menu_bot" },
            "from": { "id": 4242, "is_bot": true, "first_name": "Menu", "username": "menu_bot" }
        });
        if let (Some(base), Some(extra)) = (value.as_object_mut(), extra.as_object()) {
            base.extend(extra.clone());
        }
        serde_json::from_value(value).unwrap()
    }

    /// **Test: inline markup keeps rows, callback payloads and URLs; other kinds become inert.**
    #[test]
    fn test_inline_markup_wrapper() {
        let markup = InlineKeyboardMarkup::new(vec![
            vec![
                InlineKeyboardButton::callback("A", "a"),
                InlineKeyboardButton::url("Site", reqwest::Url::parse("https://example.org").unwrap()),
            ],
            vec![InlineKeyboardButton::switch_inline_query("Share", "")],
        ]);

        let converted = InlineMarkupWrapper(&markup).to_markup().unwrap();

        assert_eq!(
            converted,
            KeyboardMarkup::Inline(vec![
                vec![Button::callback("A", "a"), Button::url("Site", "https://example.org/")],
                vec![Button::text("Share")],
            ])
        );
        let empty = InlineKeyboardMarkup::new(Vec::<Vec<InlineKeyboardButton>>::new());
        assert!(InlineMarkupWrapper(&empty).to_markup().is_none());
    }

    /// **Test: reply keyboards become text-only buttons, via ReplyMarkup too.**
    #[test]
    fn test_reply_markup_wrapper() {
        let keyboard = TgKeyboardMarkup::new(vec![
            vec![KeyboardButton::new("Yes"), KeyboardButton::new("No")],
            vec![KeyboardButton::new("Maybe")],
        ]);
        let expected = KeyboardMarkup::Reply(vec![
            vec![Button::text("Yes"), Button::text("No")],
            vec![Button::text("Maybe")],
        ]);

        assert_eq!(ReplyMarkupWrapper(&keyboard).to_markup(), Some(expected.clone()));
        assert_eq!(
            keyboard_from_reply_markup(&ReplyMarkup::Keyboard(keyboard)),
            Some(expected)
        );
    }

    /// **Test: TelegramMessageWrapper converts text, ids, date and inline keyboard.**
    #[test]
    fn test_message_wrapper_text_and_keyboard() {
        let msg = message(serde_json::json!({
            "text": "Pick one",
            "reply_markup": { "inline_keyboard": [[{ "text": "A", "callback_data": "a" }]] }
        }));

        let incoming = TelegramMessageWrapper(&msg).to_incoming();

        assert_eq!(incoming.chat_id, 4242);
        assert_eq!(incoming.id, 7);
        assert_eq!(incoming.text.as_deref(), Some("Pick one"));
        assert_eq!(
            incoming.markup,
            Some(KeyboardMarkup::Inline(vec![vec![Button::callback("A", "a")]]))
        );
        assert!(incoming.media.is_none());
        assert!(!incoming.edited);
        assert_eq!(incoming.date.map(|d| d.timestamp()), Some(1700000000));
    }

    /// **Test: captioned photo reports the caption as text and the largest size as media.**
    #[test]
    fn test_message_wrapper_photo() {
        let msg = message(serde_json::json!({
            "caption": "Look",
            "photo": [
                { "file_id": "small", "file_unique_id": "s", "width": 90, "height": 90, "file_size": 100 },
                { "file_id": "large", "file_unique_id": "l", "width": 800, "height": 800, "file_size": 9000 }
            ]
        }));

        let incoming = TelegramMessageWrapper(&msg).to_incoming();

        assert_eq!(incoming.text.as_deref(), Some("Look"));
        assert_eq!(
            incoming.media,
            Some(MediaDescriptor {
                kind: "photo".to_string(),
                file_id: Some("large".to_string()),
            })
        );
    }

    /// **Test: edited-message updates are flagged as edits, new messages are not.**
    #[test]
    fn test_incoming_from_update() {
        let edited: Update = serde_json::from_value(serde_json::json!({
            "update_id": 1,
            "edited_message": {
                "message_id": 7,
                "date": 1700000000,
                "edit_date": 1700000100,
                "chat": { "id": 4242, "type": "private", "first_name": "Menu" },
                "text": "Updated"
            }
        }))
        .unwrap();
        let incoming = incoming_from_update(&edited).unwrap();
        assert!(incoming.edited);
        assert_eq!(incoming.text.as_deref(), Some("Updated"));

        let fresh: Update = serde_json::from_value(serde_json::json!({
            "update_id": 2,
            "message": {
                "message_id": 8,
                "date": 1700000200,
                "chat": { "id": 4242, "type": "private", "first_name": "Menu" },
                "text": "Hi"
            }
        }))
        .unwrap();
        assert!(!incoming_from_update(&fresh).unwrap().edited);
    }
}
