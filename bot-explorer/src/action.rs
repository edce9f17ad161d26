//! Actions discoverable from a response, and their extraction in priority order.

use std::collections::HashSet;

use chat_controller::{InlineKeyboard, ReplyKeyboard, Response};

/// One stimulus the explorer can issue.
#[derive(Debug, Clone)]
pub enum Action {
    /// Press the callback button at `index` (row-major) of `keyboard`.
    InlineClick {
        keyboard: InlineKeyboard,
        index: usize,
        text: String,
    },
    ReplyClick {
        keyboard: ReplyKeyboard,
        text: String,
    },
    /// Command name without the slash.
    Command { name: String },
}

impl Action {
    /// Canonical description; two actions with the same description are the same logical action.
    pub fn description(&self) -> String {
        match self {
            Action::InlineClick { text, .. } => format!("click inline: {}", text),
            Action::ReplyClick { text, .. } => format!("click reply: {}", text),
            Action::Command { name } => format!("send command: /{}", name),
        }
    }

    /// Button-driven actions; their results are explored before command results.
    pub fn is_interactive(&self) -> bool {
        !matches!(self, Action::Command { .. })
    }
}

/// Candidate actions of `response` not yet in `visited`, in priority order: inline callback
/// buttons, reply buttons, known commands mentioned in the text, remaining known commands.
/// Every returned action is added to `visited`.
pub fn extract_actions(
    response: &Response,
    bot_commands: &[String],
    visited: &mut HashSet<String>,
) -> Vec<Action> {
    let mut candidates = Vec::new();

    for keyboard in response.inline_keyboards() {
        for (index, button) in keyboard.flat().into_iter().enumerate() {
            if button.is_clickable() {
                candidates.push(Action::InlineClick {
                    keyboard: keyboard.clone(),
                    index,
                    text: button.text.clone(),
                });
            }
        }
    }

    if let Some(keyboard) = response.reply_keyboard() {
        for button in keyboard.flat() {
            candidates.push(Action::ReplyClick {
                keyboard: keyboard.clone(),
                text: button.text.clone(),
            });
        }
    }

    for name in response.commands() {
        if bot_commands.contains(&name) {
            candidates.push(Action::Command { name });
        }
    }

    for name in bot_commands {
        candidates.push(Action::Command { name: name.clone() });
    }

    candidates
        .into_iter()
        .filter(|action| visited.insert(action.description()))
        .collect()
}
