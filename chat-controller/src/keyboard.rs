//! Inline and reply keyboards extracted from a [`crate::Response`], button selection, and the
//! click protocols.
//!
//! Clicking an inline button only performs the callback exchange: it waits for the bot's
//! acknowledgement, not for follow-up messages. Wrap the click in [`ChatController::collect`]
//! when new messages are expected.

use std::fmt;
use std::time::Duration;

use regex::Regex;
use tgprobe_core::{
    AdapterError, Button, CallbackAnswer, NotClickableReason, ProbeError, Result,
};
use tracing::{info, instrument, warn};

use crate::controller::ChatController;
use crate::policy::TerminationPolicy;
use crate::response::Response;

/// Extra time given to the adapter's own callback timeout so it never fires before ours.
const CALLBACK_GRACE: Duration = Duration::from_millis(100);

/// How a button is picked from a keyboard.
#[derive(Debug, Clone)]
pub enum ButtonSelector {
    /// Exact label match.
    Text(String),
    Pattern(Regex),
    /// Position in the row-major flattened button list.
    Index(usize),
}

impl ButtonSelector {
    fn matches(&self, button: &Button) -> bool {
        match self {
            ButtonSelector::Text(text) => button.text == *text,
            ButtonSelector::Pattern(re) => re.is_match(&button.text),
            ButtonSelector::Index(_) => false,
        }
    }
}

impl fmt::Display for ButtonSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ButtonSelector::Text(text) => write!(f, "{:?}", text),
            ButtonSelector::Pattern(re) => write!(f, "/{}/", re.as_str()),
            ButtonSelector::Index(i) => write!(f, "#{}", i),
        }
    }
}

impl From<&str> for ButtonSelector {
    fn from(text: &str) -> Self {
        ButtonSelector::Text(text.to_string())
    }
}

impl From<String> for ButtonSelector {
    fn from(text: String) -> Self {
        ButtonSelector::Text(text)
    }
}

impl From<usize> for ButtonSelector {
    fn from(index: usize) -> Self {
        ButtonSelector::Index(index)
    }
}

impl From<Regex> for ButtonSelector {
    fn from(re: Regex) -> Self {
        ButtonSelector::Pattern(re)
    }
}

fn select<'a>(rows: &'a [Vec<Button>], selector: &ButtonSelector) -> Option<&'a Button> {
    let mut flat = rows.iter().flatten();
    match selector {
        ButtonSelector::Index(i) => flat.nth(*i),
        _ => flat.find(|b| selector.matches(b)),
    }
}

/// Inline keyboard attached to one message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InlineKeyboard {
    pub chat_id: i64,
    pub message_id: i32,
    pub rows: Vec<Vec<Button>>,
}

impl InlineKeyboard {
    /// Buttons in row-major order.
    pub fn flat(&self) -> Vec<&Button> {
        self.rows.iter().flatten().collect()
    }

    pub fn find_button(&self, selector: &ButtonSelector) -> Option<&Button> {
        select(&self.rows, selector)
    }
}

/// Reply keyboard (custom keyboard replacing the user's input) attached to one message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplyKeyboard {
    pub chat_id: i64,
    pub message_id: i32,
    pub rows: Vec<Vec<Button>>,
}

impl ReplyKeyboard {
    pub fn flat(&self) -> Vec<&Button> {
        self.rows.iter().flatten().collect()
    }

    pub fn find_button(&self, selector: &ButtonSelector) -> Option<&Button> {
        select(&self.rows, selector)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ClickOptions {
    /// How long the bot has to answer the callback query.
    pub max_wait: Duration,
    /// Return an unanswered result instead of failing when the bot stays silent.
    pub allow_unanswered: bool,
}

impl Default for ClickOptions {
    fn default() -> Self {
        Self {
            max_wait: Duration::from_secs(10),
            allow_unanswered: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClickResult {
    pub answer: Option<CallbackAnswer>,
    pub answered: bool,
}

impl ChatController {
    /// Presses an inline callback button and waits for the bot's acknowledgement.
    ///
    /// Errors: `ButtonNotFound` when nothing matches, `NotClickable` for URL-only or payload-less
    /// buttons, `CallbackQueryTimeout` when the bot does not answer and `allow_unanswered` is off.
    /// Other adapter errors are returned unchanged.
    #[instrument(skip(self, keyboard, selector), fields(message_id = keyboard.message_id))]
    pub async fn click_inline(
        &self,
        keyboard: &InlineKeyboard,
        selector: impl Into<ButtonSelector>,
        options: ClickOptions,
    ) -> Result<ClickResult> {
        let selector = selector.into();
        let button = keyboard
            .find_button(&selector)
            .ok_or_else(|| ProbeError::ButtonNotFound {
                selector: selector.to_string(),
            })?;

        let data = match (&button.callback_data, &button.url) {
            (Some(data), _) => data.clone(),
            (None, Some(url)) => {
                return Err(ProbeError::NotClickable {
                    text: button.text.clone(),
                    reason: NotClickableReason::Url(url.clone()),
                })
            }
            (None, None) => {
                return Err(ProbeError::NotClickable {
                    text: button.text.clone(),
                    reason: NotClickableReason::NoCallbackData,
                })
            }
        };

        info!(button = %button.text, data = %data, "step: clicking inline button");

        let adapter_wait = options.max_wait.saturating_add(CALLBACK_GRACE);
        let exchange = self.client().request_callback_answer(
            keyboard.chat_id,
            keyboard.message_id,
            &data,
            adapter_wait,
        );
        let outcome = match tokio::time::timeout(adapter_wait, exchange).await {
            Ok(outcome) => outcome,
            Err(_) => Err(AdapterError::Timeout(format!(
                "no callback answer within {:?}",
                adapter_wait
            ))),
        };

        match outcome {
            Ok(answer) => Ok(ClickResult {
                answer: Some(answer),
                answered: true,
            }),
            Err(e) if e.is_timeout() => {
                if options.allow_unanswered {
                    warn!(button = %button.text, "Callback query was not answered");
                    Ok(ClickResult {
                        answer: None,
                        answered: false,
                    })
                } else {
                    Err(ProbeError::CallbackQueryTimeout {
                        button_text: button.text.clone(),
                        callback_data: data,
                        timeout: options.max_wait,
                    })
                }
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Sends a reply-keyboard button's label and collects the turn it triggers.
    #[instrument(skip(self, keyboard, selector, policy), fields(message_id = keyboard.message_id))]
    pub async fn click_reply(
        &self,
        keyboard: &ReplyKeyboard,
        selector: impl Into<ButtonSelector>,
        policy: &TerminationPolicy,
    ) -> Result<Response> {
        let selector = selector.into();
        let button = keyboard
            .find_button(&selector)
            .ok_or_else(|| ProbeError::ButtonNotFound {
                selector: selector.to_string(),
            })?;
        let text = button.text.clone();
        let chat_id = keyboard.chat_id;

        info!(button = %text, "step: clicking reply button");

        self.collect(policy, || async move {
            self.client().send_text(chat_id, &text).await?;
            Ok::<_, ProbeError>(())
        })
        .await
    }
}
