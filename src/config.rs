//! Application configuration loaded by the CLI.

use std::time::Duration;

use devtools_session::SessionConfig;
use serde::{Deserialize, Serialize};

use crate::wait::WaitForSelectorOptions;

/// Top-level YAML document. Every field is optional; missing ones keep
/// their defaults, and `session` defaults honour the `DEVTOOLS_DOM_*`
/// environment variables.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub session: SessionConfig,
    pub navigation_timeout_ms: u64,
    pub wait_timeout_ms: u64,
    pub polling_interval_ms: u64,
    /// Pause between typed characters.
    pub type_delay_ms: Option<u64>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            session: SessionConfig::default(),
            navigation_timeout_ms: 30_000,
            wait_timeout_ms: 30_000,
            polling_interval_ms: 100,
            type_delay_ms: None,
        }
    }
}

impl AppConfig {
    pub fn navigation_timeout(&self) -> Duration {
        Duration::from_millis(self.navigation_timeout_ms)
    }

    pub fn type_delay(&self) -> Option<Duration> {
        self.type_delay_ms.map(Duration::from_millis)
    }

    pub fn wait_options(&self) -> WaitForSelectorOptions {
        WaitForSelectorOptions {
            timeout: Duration::from_millis(self.wait_timeout_ms),
            polling_interval: Duration::from_millis(self.polling_interval_ms.max(1)),
            ..Default::default()
        }
    }
}
