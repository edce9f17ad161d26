//! # tgprobe-core
//!
//! Core types and traits for driving a Telegram bot from a user account: [`ClientAdapter`],
//! [`IncomingMessage`], keyboard markup, inline results, the error taxonomy, and tracing
//! initialization. Transport-agnostic; used by chat-controller, bot-explorer and tgprobe-telegram.

pub mod client;
pub mod error;
pub mod logger;
#[cfg(any(test, feature = "testing"))]
pub mod testing;
pub mod types;

pub use client::{ClientAdapter, ListenerId, MessageListener};
pub use error::{AdapterError, AdapterResult, NotClickableReason, ProbeError, Result, Violation};
pub use logger::init_tracing;
pub use types::{
    Button, CallbackAnswer, GeoPoint, IncomingMessage, InlineResult, InlineResultPage,
    KeyboardMarkup, MediaDescriptor, MessageHandle, Peer, SwitchPmOffer, ToIncomingMessage,
    ToKeyboardMarkup,
};
