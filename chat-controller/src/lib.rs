//! # chat-controller
//!
//! Drives one conversation with a remote bot through a [`tgprobe_core::ClientAdapter`]: collects
//! the messages a stimulus produces into a [`Response`] under a [`TerminationPolicy`], clicks
//! inline and reply keyboard buttons, and runs paginated inline queries.

mod collector;
mod config;
mod controller;
mod inline_query;
mod keyboard;
mod policy;
mod response;

pub use collector::POLL_INTERVAL;
pub use config::ControllerConfig;
pub use controller::{ChatController, PingOptions, DEFAULT_GLOBAL_ACTION_DELAY};
pub use inline_query::{InlineQueryOptions, InlineResultContainer, ResultFilter};
pub use keyboard::{ButtonSelector, ClickOptions, ClickResult, InlineKeyboard, ReplyKeyboard};
pub use policy::{TerminationPolicy, Validator, DEFAULT_MAX_WAIT, DEFAULT_MIN_MESSAGES};
pub use response::Response;

// Turn collection and click protocol scenarios live in tests/controller_test.rs
