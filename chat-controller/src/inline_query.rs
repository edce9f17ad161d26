//! Inline queries against the bot: paginated result collection, filtering, switch-to-PM and
//! sending a result.

use std::fmt;
use std::time::Duration;

use regex::Regex;
use tgprobe_core::{
    GeoPoint, IncomingMessage, InlineResult, MessageHandle, ProbeError, Result, SwitchPmOffer,
};
use tracing::{debug, info, instrument};

use crate::controller::ChatController;
use crate::policy::TerminationPolicy;

#[derive(Debug, Clone)]
pub struct InlineQueryOptions {
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    /// Maximum number of results to accumulate across pages.
    pub limit: usize,
    pub offset: String,
    /// Pause between page requests, to stay clear of flood limits.
    pub pagination_delay: Duration,
}

impl Default for InlineQueryOptions {
    fn default() -> Self {
        Self {
            latitude: None,
            longitude: None,
            limit: 100,
            offset: String::new(),
            pagination_delay: Duration::from_secs(3),
        }
    }
}

/// Regex filters over inline results; unset filters match everything.
#[derive(Debug, Clone, Default)]
pub struct ResultFilter {
    pub title: Option<Regex>,
    pub description: Option<Regex>,
    pub result_type: Option<Regex>,
    pub url: Option<Regex>,
}

fn field_matches(filter: &Option<Regex>, value: Option<&str>) -> bool {
    match filter {
        None => true,
        Some(re) => value.is_some_and(|v| re.is_match(v)),
    }
}

impl ResultFilter {
    pub fn matches(&self, result: &InlineResult) -> bool {
        field_matches(&self.title, result.title.as_deref())
            && field_matches(&self.description, result.description.as_deref())
            && field_matches(&self.result_type, Some(result.result_type.as_str()))
            && field_matches(&self.url, result.url.as_deref())
    }
}

/// Results accumulated for one inline query.
#[derive(Debug, Clone)]
pub struct InlineResultContainer {
    pub query: String,
    pub results: Vec<InlineResult>,
    pub is_gallery: bool,
    pub switch_pm: Option<SwitchPmOffer>,
    /// Offset of the page after the last one fetched, if the bot has more.
    pub next_offset: Option<String>,
}

impl InlineResultContainer {
    pub fn find_results(&self, filter: &ResultFilter) -> Vec<&InlineResult> {
        self.results.iter().filter(|r| filter.matches(r)).collect()
    }

    pub fn can_switch_pm(&self) -> bool {
        self.switch_pm.is_some()
    }

    pub fn count(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }
}

impl fmt::Display for InlineResultContainer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "InlineResultContainer(query={:?}, count={}, gallery={})",
            self.query,
            self.count(),
            self.is_gallery
        )
    }
}

impl ChatController {
    /// Queries the bot inline and accumulates results until `limit` is reached or the bot
    /// reports no further (or an unchanged) offset.
    #[instrument(skip(self, options), fields(peer = %self.peer()))]
    pub async fn inline_query(
        &self,
        query: &str,
        options: InlineQueryOptions,
    ) -> Result<InlineResultContainer> {
        if options.limit == 0 {
            return Err(ProbeError::InvalidArgument(
                "limit must be greater than 0".to_string(),
            ));
        }
        let bot_id = self.initialize().await?;
        let geo = match (options.latitude, options.longitude) {
            (Some(latitude), Some(longitude)) => Some(GeoPoint {
                latitude,
                longitude,
            }),
            _ => None,
        };

        let mut current_offset = options.offset.clone();
        let mut page = self
            .client()
            .get_inline_results(bot_id, query, &current_offset, geo)
            .await?;
        let mut results: Vec<InlineResult> = Vec::new();

        loop {
            let remaining = options.limit - results.len();
            results.extend(page.results.iter().take(remaining).cloned());
            if results.len() >= options.limit {
                break;
            }
            let next = match page.next_offset.as_deref() {
                Some(next) if !next.is_empty() && next != current_offset => next.to_string(),
                _ => break,
            };
            debug!(offset = %next, fetched = results.len(), "Fetching next inline results page");
            tokio::time::sleep(options.pagination_delay).await;
            current_offset = next;
            page = self
                .client()
                .get_inline_results(bot_id, query, &current_offset, geo)
                .await?;
        }

        info!(query = %query, count = results.len(), "step: inline query finished");

        Ok(InlineResultContainer {
            query: query.to_string(),
            results,
            is_gallery: page.is_gallery,
            switch_pm: page.switch_pm,
            next_offset: page.next_offset,
        })
    }

    /// Accepts the container's switch-to-PM offer by sending `/start <param>` to the bot.
    pub async fn switch_to_pm(&self, container: &InlineResultContainer) -> Result<MessageHandle> {
        let offer = container.switch_pm.as_ref().ok_or_else(|| {
            ProbeError::InvalidArgument("This inline query does not allow switching to PM.".to_string())
        })?;
        let text = format!("/start {}", offer.start_param);
        self.send_text(text.trim()).await
    }

    /// Sends an inline result to `chat_id` (the peer when `None`) and returns the message it
    /// produced in that chat.
    pub async fn send_inline_result(
        &self,
        result: &InlineResult,
        chat_id: Option<i64>,
    ) -> Result<IncomingMessage> {
        let target = match chat_id {
            Some(id) => id,
            None => self.initialize().await?,
        };
        let policy = TerminationPolicy::new()
            .exact(1)
            .max_wait(Duration::from_secs(10));
        let response = self
            .collect_in(target, &policy, || async move {
                self.client()
                    .send_inline_result(target, result.query_id, &result.id)
                    .await?;
                Ok::<_, ProbeError>(())
            })
            .await?;
        response
            .first()
            .cloned()
            .ok_or_else(|| ProbeError::InlineResultNotDelivered {
                result_id: result.id.clone(),
            })
    }
}
