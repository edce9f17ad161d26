//! # bot-explorer
//!
//! Discovers the states a bot can reach by pressing its buttons and sending its commands, and
//! records them as a tree of [`ExplorationNode`]s.
//!
//! ```ignore
//! let explorer = BotExplorer::new(&controller);
//! let result = explorer.explore(DEFAULT_MAX_DEPTH, DEFAULT_MAX_STEPS).await?;
//! println!("{} states in {} steps", result.root.node_count(), result.steps);
//! ```

mod action;
mod explorer;

pub use action::{extract_actions, Action};
pub use explorer::{
    ActionFailure, BotExplorer, ExplorationNode, ExplorationResult, ExplorerOptions,
    DEFAULT_MAX_DEPTH, DEFAULT_MAX_STEPS,
};
