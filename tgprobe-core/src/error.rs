use std::fmt;
use std::time::Duration;

use thiserror::Error;

/// Failures reported by a [`crate::ClientAdapter`]. These are passed through the engine unchanged.
#[derive(Error, Debug)]
pub enum AdapterError {
    #[error("Unresolvable peer: {0}")]
    UnresolvablePeer(String),

    /// Timeout-shaped failure (e.g. the bot never answered a callback query).
    #[error("Request timeout: {0}")]
    Timeout(String),

    #[error("Rate limited, retry after {retry_after:?}")]
    RateLimited { retry_after: Duration },

    #[error("Network error: {0}")]
    Network(String),

    #[error("API error: {0}")]
    Api(String),
}

impl AdapterError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, AdapterError::Timeout(_))
    }
}

#[derive(Error, Debug)]
pub enum ProbeError {
    #[error("Could not resolve peer: {peer}")]
    PeerUnresolved { peer: String },

    #[error("turn expectation violated: {0}")]
    ExpectationViolated(Violation),

    #[error("button not found for selector: {selector}")]
    ButtonNotFound { selector: String },

    #[error("button \"{text}\" is not clickable: {reason}")]
    NotClickable {
        text: String,
        reason: NotClickableReason,
    },

    /// The bot did not answer a callback query. Well-behaved bots answer every callback, so this is a bot defect.
    #[error(
        "callback query for button \"{button_text}\" (data: {callback_data:?}) was not answered within {timeout:?}"
    )]
    CallbackQueryTimeout {
        button_text: String,
        callback_data: String,
        timeout: Duration,
    },

    #[error("inline result {result_id} was sent but no message arrived")]
    InlineResultNotDelivered { result_id: String },

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error(transparent)]
    Adapter(#[from] AdapterError),
}

/// Which bound a strict turn failed to meet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Violation {
    TooFew { expected: usize, actual: usize },
    TooMany { expected: usize, actual: usize },
    ValidatorRejected { actual: usize },
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Violation::TooFew { expected, actual } => {
                write!(f, "expected at least {}, got {}", expected, actual)
            }
            Violation::TooMany { expected, actual } => {
                write!(f, "expected at most {}, got {}", expected, actual)
            }
            Violation::ValidatorRejected { actual } => {
                write!(f, "validator rejected {} message(s)", actual)
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotClickableReason {
    /// URL buttons open a link client-side; there is nothing to send to the bot.
    Url(String),
    NoCallbackData,
}

impl fmt::Display for NotClickableReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NotClickableReason::Url(url) => write!(f, "URL button ({})", url),
            NotClickableReason::NoCallbackData => f.write_str("no callback data"),
        }
    }
}

pub type Result<T> = std::result::Result<T, ProbeError>;
pub type AdapterResult<T> = std::result::Result<T, AdapterError>;
