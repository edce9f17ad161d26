//! # tgprobe-telegram
//!
//! Adapters from Telegram (teloxide) types to [`tgprobe_core`] types, for [`tgprobe_core::ClientAdapter`]
//! implementations that receive Bot API objects. Conversion only; no network access.

mod adapters;

pub use adapters::{
    incoming_from_update, keyboard_from_reply_markup, InlineMarkupWrapper, ReplyMarkupWrapper,
    TelegramMessageWrapper,
};
