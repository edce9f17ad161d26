//! Immutable snapshot of one turn and the views derived from it.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::LazyLock;

use chrono::{DateTime, Utc};
use regex::Regex;
use tgprobe_core::{IncomingMessage, KeyboardMarkup};

use crate::keyboard::{InlineKeyboard, ReplyKeyboard};

static COMMAND_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?:^|\s)/(\w+)").expect("command pattern is valid"));

/// Messages captured for one turn, in arrival order. Never mutated after construction.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Response {
    messages: Vec<IncomingMessage>,
}

impl Response {
    pub fn new(messages: Vec<IncomingMessage>) -> Self {
        Self { messages }
    }

    pub fn messages(&self) -> &[IncomingMessage] {
        &self.messages
    }

    pub fn first(&self) -> Option<&IncomingMessage> {
        self.messages.first()
    }

    pub fn last(&self) -> Option<&IncomingMessage> {
        self.messages.last()
    }

    pub fn count(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Message texts joined with newlines; messages without text contribute an empty line.
    pub fn full_text(&self) -> String {
        self.messages
            .iter()
            .map(|m| m.text.as_deref().unwrap_or(""))
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// One keyboard per message carrying inline markup, in message order.
    pub fn inline_keyboards(&self) -> Vec<InlineKeyboard> {
        self.messages
            .iter()
            .filter_map(|m| match &m.markup {
                Some(KeyboardMarkup::Inline(rows)) => Some(InlineKeyboard {
                    chat_id: m.chat_id,
                    message_id: m.id,
                    rows: rows.clone(),
                }),
                _ => None,
            })
            .collect()
    }

    /// The most recent reply keyboard, scanning from the last message backwards.
    pub fn reply_keyboard(&self) -> Option<ReplyKeyboard> {
        self.messages.iter().rev().find_map(|m| match &m.markup {
            Some(KeyboardMarkup::Reply(rows)) => Some(ReplyKeyboard {
                chat_id: m.chat_id,
                message_id: m.id,
                rows: rows.clone(),
            }),
            _ => None,
        })
    }

    /// Labels of the current reply keyboard.
    pub fn keyboard_buttons(&self) -> BTreeSet<String> {
        self.reply_keyboard()
            .map(|kb| kb.flat().into_iter().map(|b| b.text.clone()).collect())
            .unwrap_or_default()
    }

    /// Distinct `/word` tokens in the text, without the slash, in first-seen order. Only tokens
    /// at the start of the text or after whitespace count, so URL paths are skipped.
    pub fn commands(&self) -> Vec<String> {
        let text = self.full_text();
        let mut seen = BTreeSet::new();
        COMMAND_RE
            .captures_iter(&text)
            .filter_map(|c| c.get(1))
            .map(|m| m.as_str().to_string())
            .filter(|cmd| seen.insert(cmd.clone()))
            .collect()
    }

    pub fn last_message_datetime(&self) -> Option<DateTime<Utc>> {
        self.messages.last().and_then(|m| m.date)
    }
}

impl fmt::Display for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return writeln!(f, "Empty Response.");
        }
        writeln!(f, "Response with {} message(s):", self.count())?;
        for (i, m) in self.messages.iter().enumerate() {
            let edited = if m.edited { " (edited)" } else { "" };
            writeln!(f, "[{}]{} {}", i, edited, m.text.as_deref().unwrap_or("[no text]"))?;
            if let Some(media) = &m.media {
                writeln!(f, "    media: {}", media.kind)?;
            }
            match &m.markup {
                Some(KeyboardMarkup::Inline(rows)) | Some(KeyboardMarkup::Reply(rows)) => {
                    for row in rows {
                        let labels: Vec<String> = row
                            .iter()
                            .map(|b| match (&b.callback_data, &b.url) {
                                (Some(data), _) => format!("[{} -> {}]", b.text, data),
                                (None, Some(url)) => format!("[{} -> {}]", b.text, url),
                                (None, None) => format!("[{}]", b.text),
                            })
                            .collect();
                        writeln!(f, "    {}", labels.join(" "))?;
                    }
                }
                None => {}
            }
        }
        Ok(())
    }
}
