use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use ve_core::{Event, VeError};
use ve_script::ScriptLimits;

use crate::mailbox::{Backpressure, MailboxConfig, DEFAULT_MAILBOX_CAPACITY};

pub const DEFAULT_TICK_INTERVAL_MS: u64 = 250;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default, deny_unknown_fields)]
pub struct RuntimeConfig {
    pub tick_interval_ms: u64,
    pub mailbox_capacity: Option<usize>,
    pub backpressure: Backpressure,
    pub script_limits: ScriptLimits,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: DEFAULT_TICK_INTERVAL_MS,
            mailbox_capacity: Some(DEFAULT_MAILBOX_CAPACITY),
            backpressure: Backpressure::default(),
            script_limits: ScriptLimits::default(),
        }
    }
}

impl RuntimeConfig {
    pub fn from_json_str(text: &str) -> Result<Self, VeError> {
        let config: Self = serde_json::from_str(text).map_err(|error| {
            VeError::new(
                "CONFIG_INVALID",
                format!("Runtime config is not valid: {}", error),
            )
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self, VeError> {
        let text = fs::read_to_string(path).map_err(|error| {
            VeError::new(
                "CONFIG_READ",
                format!("Failed to read config {}: {}", path.display(), error),
            )
        })?;
        Self::from_json_str(&text)
    }

    pub fn validate(&self) -> Result<(), VeError> {
        if self.tick_interval_ms == 0 {
            return Err(VeError::new(
                "CONFIG_INVALID",
                "tickIntervalMs must be greater than zero.",
            ));
        }
        if self.mailbox_capacity == Some(0) {
            return Err(VeError::new(
                "CONFIG_INVALID",
                "mailboxCapacity must be greater than zero or null.",
            ));
        }
        Ok(())
    }

    pub fn entity_options(&self) -> EntityOptions {
        EntityOptions {
            tick_interval: Duration::from_millis(self.tick_interval_ms),
            mailbox: MailboxConfig {
                capacity: self.mailbox_capacity,
                backpressure: self.backpressure,
            },
            observer: None,
        }
    }
}

pub trait EventObserver: Send + Sync {
    fn observe(&self, entity_id: &str, event: &Event);
}

impl<F> EventObserver for F
where
    F: Fn(&str, &Event) + Send + Sync,
{
    fn observe(&self, entity_id: &str, event: &Event) {
        self(entity_id, event)
    }
}

#[derive(Clone)]
pub struct EntityOptions {
    pub tick_interval: Duration,
    pub mailbox: MailboxConfig,
    pub observer: Option<Arc<dyn EventObserver>>,
}

impl Default for EntityOptions {
    fn default() -> Self {
        RuntimeConfig::default().entity_options()
    }
}

impl EntityOptions {
    pub fn with_tick_interval(mut self, tick_interval: Duration) -> Self {
        self.tick_interval = tick_interval;
        self
    }

    pub fn with_observer(mut self, observer: Arc<dyn EventObserver>) -> Self {
        self.observer = Some(observer);
        self
    }
}
