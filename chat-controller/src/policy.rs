//! Termination policy for one turn: message-count bounds, waits, validator, strict mode.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tgprobe_core::IncomingMessage;

/// Custom acceptance check over the messages buffered so far.
pub type Validator = Arc<dyn Fn(&[IncomingMessage]) -> bool + Send + Sync>;

pub const DEFAULT_MIN_MESSAGES: usize = 1;
pub const DEFAULT_MAX_WAIT: Duration = Duration::from_secs(10);

/// Completion rules for one collected turn. Unset fields fall back to the controller defaults,
/// then to the crate defaults (at least one message, 10 s wait, non-strict).
#[derive(Clone, Default)]
pub struct TerminationPolicy {
    pub min_messages: Option<usize>,
    pub max_messages: Option<usize>,
    /// Exact count; overrides both `min_messages` and `max_messages`.
    pub num_messages: Option<usize>,
    pub max_wait: Option<Duration>,
    /// Quiet period: silence required after the last arrival before the turn settles.
    pub wait_consecutive: Option<Duration>,
    /// Strict mode: unmet bounds raise instead of returning a partial response.
    pub throw_on_timeout: Option<bool>,
    pub validator: Option<Validator>,
}

impl TerminationPolicy {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn min(mut self, n: usize) -> Self {
        self.min_messages = Some(n);
        self
    }

    pub fn max(mut self, n: usize) -> Self {
        self.max_messages = Some(n);
        self
    }

    pub fn exact(mut self, n: usize) -> Self {
        self.num_messages = Some(n);
        self.min_messages = None;
        self.max_messages = None;
        self
    }

    pub fn max_wait(mut self, wait: Duration) -> Self {
        self.max_wait = Some(wait);
        self
    }

    pub fn wait_consecutive(mut self, quiet: Duration) -> Self {
        self.wait_consecutive = Some(quiet);
        self
    }

    pub fn strict(mut self, strict: bool) -> Self {
        self.throw_on_timeout = Some(strict);
        self
    }

    pub fn validator<F>(mut self, f: F) -> Self
    where
        F: Fn(&[IncomingMessage]) -> bool + Send + Sync + 'static,
    {
        self.validator = Some(Arc::new(f));
        self
    }

    /// Fills every unset field from `defaults`. An exact count on either side keeps precedence
    /// over the other side's min/max.
    pub fn merged_over(&self, defaults: &TerminationPolicy) -> TerminationPolicy {
        let (min_messages, max_messages, num_messages) =
            if self.num_messages.is_some() || self.min_messages.is_some() || self.max_messages.is_some() {
                (self.min_messages, self.max_messages, self.num_messages)
            } else {
                (defaults.min_messages, defaults.max_messages, defaults.num_messages)
            };
        TerminationPolicy {
            min_messages,
            max_messages,
            num_messages,
            max_wait: self.max_wait.or(defaults.max_wait),
            wait_consecutive: self.wait_consecutive.or(defaults.wait_consecutive),
            throw_on_timeout: self.throw_on_timeout.or(defaults.throw_on_timeout),
            validator: self.validator.clone().or_else(|| defaults.validator.clone()),
        }
    }

    pub(crate) fn resolve(&self) -> ResolvedPolicy {
        let (min_messages, max_messages) = match self.num_messages {
            Some(n) => (n, Some(n)),
            None => (
                self.min_messages.unwrap_or(DEFAULT_MIN_MESSAGES),
                self.max_messages,
            ),
        };
        ResolvedPolicy {
            min_messages,
            max_messages,
            max_wait: self.max_wait.unwrap_or(DEFAULT_MAX_WAIT),
            wait_consecutive: self.wait_consecutive,
            strict: self.throw_on_timeout.unwrap_or(false),
            validator: self.validator.clone(),
        }
    }
}

impl fmt::Debug for TerminationPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TerminationPolicy")
            .field("min_messages", &self.min_messages)
            .field("max_messages", &self.max_messages)
            .field("num_messages", &self.num_messages)
            .field("max_wait", &self.max_wait)
            .field("wait_consecutive", &self.wait_consecutive)
            .field("throw_on_timeout", &self.throw_on_timeout)
            .field("validator", &self.validator.as_ref().map(|_| "<fn>"))
            .finish()
    }
}

/// Policy with every default applied; what the polling loop actually evaluates.
#[derive(Clone)]
pub(crate) struct ResolvedPolicy {
    pub min_messages: usize,
    pub max_messages: Option<usize>,
    pub max_wait: Duration,
    pub wait_consecutive: Option<Duration>,
    pub strict: bool,
    pub validator: Option<Validator>,
}

impl ResolvedPolicy {
    pub fn accepts(&self, messages: &[IncomingMessage]) -> bool {
        self.validator.as_ref().map_or(true, |v| v(messages))
    }
}
