use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Timing and retry constants for every pipeline stage.
///
/// Missing fields default to the production values, so a partial YAML section is valid.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineSettings {
    pub publish: PublishSettings,
    pub lifecycle: LifecycleSettings,
    pub task: TaskSettings,
    pub notify: NotifySettings,
}

impl PipelineSettings {
    pub fn trace_loaded(&self) {
        info!(
            tip_attempts = self.publish.branch_tip_attempts,
            task_attempts = self.task.max_attempts,
            notify_attempts = self.notify.max_attempts,
            "Loaded pipeline settings"
        );
        debug!(?self, "Pipeline settings (full debug)");
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PublishSettings {
    /// Reads of the branch tip before its absence is fatal.
    pub branch_tip_attempts: u32,
    pub branch_tip_pause_ms: u64,
}

impl PublishSettings {
    pub fn branch_tip_pause(&self) -> Duration {
        Duration::from_millis(self.branch_tip_pause_ms)
    }
}

impl Default for PublishSettings {
    fn default() -> Self {
        Self {
            branch_tip_attempts: 5,
            branch_tip_pause_ms: 2_000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LifecycleSettings {
    /// Grace period after deleting a repository before recreating it.
    pub settle_after_delete_ms: u64,
    /// Longer grace period before the single create retry on a name conflict.
    pub settle_before_retry_ms: u64,
}

impl LifecycleSettings {
    pub fn settle_after_delete(&self) -> Duration {
        Duration::from_millis(self.settle_after_delete_ms)
    }

    pub fn settle_before_retry(&self) -> Duration {
        Duration::from_millis(self.settle_before_retry_ms)
    }
}

impl Default for LifecycleSettings {
    fn default() -> Self {
        Self {
            settle_after_delete_ms: 2_000,
            settle_before_retry_ms: 3_000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TaskSettings {
    /// Attempts of a whole round before the failure is escalated.
    pub max_attempts: u32,
}

impl Default for TaskSettings {
    fn default() -> Self {
        Self { max_attempts: 3 }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NotifySettings {
    pub max_attempts: u32,
    /// First backoff delay; doubled after every failed attempt.
    pub initial_backoff_ms: u64,
    pub request_timeout_secs: u64,
}

impl NotifySettings {
    pub fn initial_backoff(&self) -> Duration {
        Duration::from_millis(self.initial_backoff_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl Default for NotifySettings {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_backoff_ms: 1_000,
            request_timeout_secs: 10,
        }
    }
}
