//! Controller configuration loaded from environment variables.
//!
//! `TGPROBE_PEER` is required; `TGPROBE_ACTION_DELAY_MS`, `TGPROBE_MAX_WAIT_MS`,
//! `TGPROBE_WAIT_CONSECUTIVE_MS`, `TGPROBE_THROW_ON_TIMEOUT` and `LOG_FILE` are optional.
//! [`ControllerConfig::load_from_file`] reads a dotenv file first.

use std::env;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tgprobe_core::ClientAdapter;

use crate::controller::{ChatController, DEFAULT_GLOBAL_ACTION_DELAY};
use crate::policy::{TerminationPolicy, DEFAULT_MAX_WAIT};

#[derive(Debug, Clone)]
pub struct ControllerConfig {
    /// TGPROBE_PEER: bot username or numeric id
    pub peer: String,
    /// TGPROBE_ACTION_DELAY_MS
    pub global_action_delay: Duration,
    /// TGPROBE_MAX_WAIT_MS
    pub max_wait: Duration,
    /// TGPROBE_WAIT_CONSECUTIVE_MS
    pub wait_consecutive: Option<Duration>,
    /// TGPROBE_THROW_ON_TIMEOUT
    pub throw_on_timeout: bool,
    /// LOG_FILE
    pub log_file: Option<String>,
}

fn millis_var(name: &str) -> Result<Option<Duration>> {
    match env::var(name) {
        Ok(raw) => {
            let ms: u64 = raw
                .trim()
                .parse()
                .map_err(|_| anyhow::anyhow!("{} must be a number of milliseconds, got {:?}", name, raw))?;
            Ok(Some(Duration::from_millis(ms)))
        }
        Err(_) => Ok(None),
    }
}

impl ControllerConfig {
    /// Load from environment variables.
    pub fn load() -> Result<Self> {
        let peer = env::var("TGPROBE_PEER").map_err(|_| anyhow::anyhow!("TGPROBE_PEER not set"))?;
        let global_action_delay =
            millis_var("TGPROBE_ACTION_DELAY_MS")?.unwrap_or(DEFAULT_GLOBAL_ACTION_DELAY);
        let max_wait = millis_var("TGPROBE_MAX_WAIT_MS")?.unwrap_or(DEFAULT_MAX_WAIT);
        let wait_consecutive = millis_var("TGPROBE_WAIT_CONSECUTIVE_MS")?;
        let throw_on_timeout = env::var("TGPROBE_THROW_ON_TIMEOUT")
            .map(|v| matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
            .unwrap_or(false);
        let log_file = env::var("LOG_FILE").ok();

        Ok(Self {
            peer,
            global_action_delay,
            max_wait,
            wait_consecutive,
            throw_on_timeout,
            log_file,
        })
    }

    /// Load after applying variables from a dotenv file; variables already set win.
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self> {
        dotenvy::from_path(path.as_ref())
            .map_err(|e| anyhow::anyhow!("failed to read {}: {}", path.as_ref().display(), e))?;
        Self::load()
    }

    pub fn validate(&self) -> Result<()> {
        if self.peer.trim().is_empty() {
            anyhow::bail!("TGPROBE_PEER is empty");
        }
        if self.max_wait.is_zero() {
            anyhow::bail!("TGPROBE_MAX_WAIT_MS must be greater than 0");
        }
        Ok(())
    }

    /// Policy applied to every collect of a controller built from this config.
    pub fn default_policy(&self) -> TerminationPolicy {
        let mut policy = TerminationPolicy::new()
            .max_wait(self.max_wait)
            .strict(self.throw_on_timeout);
        policy.wait_consecutive = self.wait_consecutive;
        policy
    }

    /// Installs the global tracing subscriber, tee'd to `log_file` when set.
    pub fn init_tracing(&self) -> Result<()> {
        tgprobe_core::init_tracing(self.log_file.as_deref())
    }

    pub fn into_controller(self, client: Arc<dyn ClientAdapter>) -> ChatController {
        let defaults = self.default_policy();
        ChatController::new(client, self.peer.as_str())
            .with_defaults(defaults)
            .with_global_action_delay(self.global_action_delay)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use tgprobe_core::testing::ScriptedClient;
    use tgprobe_core::Peer;

    fn clear_env() {
        for name in [
            "TGPROBE_PEER",
            "TGPROBE_ACTION_DELAY_MS",
            "TGPROBE_MAX_WAIT_MS",
            "TGPROBE_WAIT_CONSECUTIVE_MS",
            "TGPROBE_THROW_ON_TIMEOUT",
            "LOG_FILE",
        ] {
            env::remove_var(name);
        }
    }

    #[test]
    #[serial]
    fn test_load_config_with_defaults() {
        clear_env();
        env::set_var("TGPROBE_PEER", "quiz_bot");

        let config = ControllerConfig::load().unwrap();
        config.validate().unwrap();

        assert_eq!(config.peer, "quiz_bot");
        assert_eq!(config.global_action_delay, Duration::from_millis(800));
        assert_eq!(config.max_wait, Duration::from_secs(10));
        assert!(config.wait_consecutive.is_none());
        assert!(!config.throw_on_timeout);
        assert!(config.log_file.is_none());
    }

    #[test]
    #[serial]
    fn test_load_config_with_custom_values() {
        clear_env();
        env::set_var("TGPROBE_PEER", "12345");
        env::set_var("TGPROBE_ACTION_DELAY_MS", "0");
        env::set_var("TGPROBE_MAX_WAIT_MS", "2500");
        env::set_var("TGPROBE_WAIT_CONSECUTIVE_MS", "400");
        env::set_var("TGPROBE_THROW_ON_TIMEOUT", "true");
        env::set_var("LOG_FILE", "logs/probe.log");

        let config = ControllerConfig::load().unwrap();
        assert_eq!(config.global_action_delay, Duration::ZERO);
        assert_eq!(config.max_wait, Duration::from_millis(2500));
        assert_eq!(config.wait_consecutive, Some(Duration::from_millis(400)));
        assert!(config.throw_on_timeout);
        assert_eq!(config.log_file.as_deref(), Some("logs/probe.log"));

        let policy = config.default_policy();
        assert_eq!(policy.max_wait, Some(Duration::from_millis(2500)));
        assert_eq!(policy.throw_on_timeout, Some(true));

        let controller = config.into_controller(Arc::new(ScriptedClient::new(12345)));
        assert_eq!(controller.peer(), &Peer::Id(12345));
        clear_env();
    }

    #[test]
    #[serial]
    fn test_load_config_from_dotenv_file() {
        clear_env();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".env");
        std::fs::write(&path, "TGPROBE_PEER=@menu_bot\nTGPROBE_MAX_WAIT_MS=1500\n").unwrap();
        env::set_var("TGPROBE_MAX_WAIT_MS", "3000");

        let config = ControllerConfig::load_from_file(&path).unwrap();

        assert_eq!(config.peer, "@menu_bot");
        assert_eq!(config.max_wait, Duration::from_millis(3000));
        assert!(ControllerConfig::load_from_file(dir.path().join("missing.env")).is_err());
        clear_env();
    }

    #[test]
    #[serial]
    fn test_load_config_errors() {
        clear_env();
        assert!(ControllerConfig::load().is_err());

        env::set_var("TGPROBE_PEER", "quiz_bot");
        env::set_var("TGPROBE_MAX_WAIT_MS", "soon");
        assert!(ControllerConfig::load().is_err());

        env::set_var("TGPROBE_MAX_WAIT_MS", "0");
        let config = ControllerConfig::load().unwrap();
        assert!(config.validate().is_err());
        clear_env();
    }
}
