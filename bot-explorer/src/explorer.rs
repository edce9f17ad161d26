use std::collections::{HashSet, VecDeque};
use std::fmt;
use std::time::Duration;

use chat_controller::{ButtonSelector, ChatController, ClickOptions, PingOptions, Response, TerminationPolicy};
use tgprobe_core::{ProbeError, Result};
use tracing::{debug, info, instrument, warn};

use crate::action::{extract_actions, Action};

pub const DEFAULT_MAX_DEPTH: usize = 5;
pub const DEFAULT_MAX_STEPS: usize = 100;

/// Node of the exploration tree: the response reached by following `path` from the root.
#[derive(Debug, Clone, Default)]
pub struct ExplorationNode {
    /// Action descriptions from the root; empty for the root.
    pub path: Vec<String>,
    pub response: Response,
    pub depth: usize,
    pub children: Vec<ExplorationNode>,
    /// Whether actions were extracted from this node.
    pub explored: bool,
}

impl ExplorationNode {
    pub fn node_count(&self) -> usize {
        1 + self.children.iter().map(ExplorationNode::node_count).sum::<usize>()
    }

    /// Deepest node depth in this subtree.
    pub fn max_depth(&self) -> usize {
        self.children
            .iter()
            .map(ExplorationNode::max_depth)
            .max()
            .unwrap_or(self.depth)
    }

    /// Pre-order traversal.
    pub fn iter(&self) -> impl Iterator<Item = &ExplorationNode> {
        let mut stack = vec![self];
        std::iter::from_fn(move || {
            let node = stack.pop()?;
            stack.extend(node.children.iter().rev());
            Some(node)
        })
    }
}

/// An action that failed during exploration. It still counts as a step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionFailure {
    /// Path of the node the action was issued from.
    pub path: Vec<String>,
    pub action: String,
    pub error: String,
}

impl fmt::Display for ActionFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (after {:?}): {}", self.action, self.path, self.error)
    }
}

#[derive(Debug, Clone)]
pub struct ExplorationResult {
    pub root: ExplorationNode,
    pub steps: usize,
    pub failures: Vec<ActionFailure>,
}

#[derive(Debug, Clone)]
pub struct ExplorerOptions {
    /// Messages sent as the first turn; their response becomes the root.
    pub bootstrap: Vec<String>,
    /// Policy for every turn issued while exploring.
    pub step_policy: TerminationPolicy,
    /// Wait for callback answers; unanswered callbacks are tolerated.
    pub click_wait: Duration,
}

impl Default for ExplorerOptions {
    fn default() -> Self {
        Self {
            bootstrap: vec!["/start".to_string(), "/help".to_string()],
            step_policy: TerminationPolicy::new()
                .min(1)
                .max(10)
                .max_wait(Duration::from_secs(3))
                .wait_consecutive(Duration::from_millis(500))
                .strict(false),
            click_wait: Duration::from_secs(3),
        }
    }
}

struct PendingNode {
    path: Vec<String>,
    response: Response,
    depth: usize,
    children: Vec<usize>,
    explored: bool,
}

/// Walks a bot's state space through a [`ChatController`].
pub struct BotExplorer<'a> {
    controller: &'a ChatController,
    options: ExplorerOptions,
}

impl<'a> BotExplorer<'a> {
    pub fn new(controller: &'a ChatController) -> Self {
        Self {
            controller,
            options: ExplorerOptions::default(),
        }
    }

    pub fn with_options(mut self, options: ExplorerOptions) -> Self {
        self.options = options;
        self
    }

    pub fn options(&self) -> &ExplorerOptions {
        &self.options
    }

    /// Bootstraps the conversation and explores depth-first until the frontier is empty or
    /// `max_steps` actions were issued. Nodes at `max_depth` are kept but not expanded.
    ///
    /// Only the bootstrap turn can fail the run; failed actions are recorded in
    /// [`ExplorationResult::failures`].
    #[instrument(skip(self), fields(peer = %self.controller.peer()))]
    pub async fn explore(&self, max_depth: usize, max_steps: usize) -> Result<ExplorationResult> {
        info!("step: exploration started");

        let root_response = self
            .controller
            .ping_bot(PingOptions {
                messages: self.options.bootstrap.clone(),
                max_wait: None,
            })
            .await?;
        let bot_commands = self.controller.get_bot_commands().await?;
        debug!(commands = ?bot_commands, "Known bot commands");

        let mut arena = vec![PendingNode {
            path: Vec::new(),
            response: root_response,
            depth: 0,
            children: Vec::new(),
            explored: false,
        }];
        let mut frontier = VecDeque::from([0usize]);
        let mut visited: HashSet<String> = HashSet::new();
        let mut failures = Vec::new();
        let mut steps = 0;

        while steps < max_steps {
            let Some(id) = frontier.pop_front() else {
                break;
            };
            if arena[id].explored || arena[id].depth >= max_depth {
                continue;
            }
            arena[id].explored = true;

            let actions = extract_actions(&arena[id].response, &bot_commands, &mut visited);
            debug!(node = ?arena[id].path, actions = actions.len(), "Expanding node");

            let mut interactive = Vec::new();
            for action in actions {
                if steps >= max_steps {
                    break;
                }
                steps += 1;
                let description = action.description();

                match self.perform(&action).await {
                    Ok(response) => {
                        let mut path = arena[id].path.clone();
                        path.push(description);
                        let depth = arena[id].depth + 1;
                        let child = arena.len();
                        arena.push(PendingNode {
                            path,
                            response,
                            depth,
                            children: Vec::new(),
                            explored: false,
                        });
                        arena[id].children.push(child);
                        if action.is_interactive() {
                            interactive.push(child);
                        } else {
                            frontier.push_back(child);
                        }
                    }
                    Err(e) => {
                        warn!(action = %description, error = %e, "Exploration action failed");
                        failures.push(ActionFailure {
                            path: arena[id].path.clone(),
                            action: description,
                            error: e.to_string(),
                        });
                    }
                }
            }
            for child in interactive.into_iter().rev() {
                frontier.push_front(child);
            }
        }

        let root = build_tree(&mut arena, 0);
        info!(
            steps,
            nodes = root.node_count(),
            failures = failures.len(),
            "step: exploration finished"
        );

        Ok(ExplorationResult {
            root,
            steps,
            failures,
        })
    }

    async fn perform(&self, action: &Action) -> Result<Response> {
        let controller = self.controller;
        let policy = &self.options.step_policy;
        match action {
            Action::InlineClick {
                keyboard, index, ..
            } => {
                let selector = ButtonSelector::Index(*index);
                let options = ClickOptions {
                    max_wait: self.options.click_wait,
                    allow_unanswered: true,
                };
                controller
                    .collect(policy, || async move {
                        controller.click_inline(keyboard, selector, options).await?;
                        Ok::<_, ProbeError>(())
                    })
                    .await
            }
            Action::ReplyClick { keyboard, text } => {
                controller.click_reply(keyboard, text.as_str(), policy).await
            }
            Action::Command { name } => {
                controller
                    .collect(policy, || async move {
                        controller.send_command(name, &[]).await?;
                        Ok::<_, ProbeError>(())
                    })
                    .await
            }
        }
    }
}

fn build_tree(arena: &mut [PendingNode], id: usize) -> ExplorationNode {
    let child_ids = std::mem::take(&mut arena[id].children);
    let children = child_ids
        .into_iter()
        .map(|child| build_tree(arena, child))
        .collect();
    let node = &mut arena[id];
    ExplorationNode {
        path: std::mem::take(&mut node.path),
        response: std::mem::take(&mut node.response),
        depth: node.depth,
        children,
        explored: node.explored,
    }
}
