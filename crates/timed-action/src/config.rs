//! Timed action configuration
//!
//! A configuration is a partial record: every field may be absent. The same
//! type serves as the defaults bound at construction and as the overrides
//! passed to each schedule call. Resolution is per field:
//! 1. Bound default (highest priority - masks the override when present)
//! 2. Per-call override
//! 3. Fallback (zero delay, restart on re-entry)

use crate::action::Action;
use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Partial configuration of a timed action
#[derive(Debug, Clone, Default)]
pub struct TimedActionConfig {
    /// Callback to run when the timer fires
    pub action: Option<Action>,

    /// Time to wait before firing
    pub delay: Option<Duration>,

    /// Keep the pending timer (true) or restart it (false) on re-entry
    pub skip_if_pending: Option<bool>,
}

impl TimedActionConfig {
    /// Fully specified configuration
    pub fn new(action: Action, delay: Duration, skip_if_pending: bool) -> Self {
        Self {
            action: Some(action),
            delay: Some(delay),
            skip_if_pending: Some(skip_if_pending),
        }
    }

    /// Set the action
    pub fn with_action(mut self, action: Action) -> Self {
        self.action = Some(action);
        self
    }

    /// Set the delay
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Set the skip policy
    pub fn with_skip_if_pending(mut self, skip_if_pending: bool) -> Self {
        self.skip_if_pending = Some(skip_if_pending);
        self
    }

    /// Resolve `self` (the bound defaults) against per-call overrides
    ///
    /// The action stays optional; the coordinator decides what a missing
    /// action means.
    pub(crate) fn resolve(&self, overrides: &TimedActionConfig) -> ResolvedConfig {
        ResolvedConfig {
            action: self.action.as_ref().or(overrides.action.as_ref()).cloned(),
            delay: self.delay.or(overrides.delay).unwrap_or(Duration::ZERO),
            skip_if_pending: self
                .skip_if_pending
                .or(overrides.skip_if_pending)
                .unwrap_or(false),
        }
    }
}

/// Configuration with delay and skip policy decided
#[derive(Debug, Clone)]
pub(crate) struct ResolvedConfig {
    pub(crate) action: Option<Action>,
    pub(crate) delay: Duration,
    pub(crate) skip_if_pending: bool,
}

/// Serializable timing defaults
///
/// Everything except the action, which can't live in a config file:
///
/// ```toml
/// id = "search-box"
/// delay_ms = 250
/// skip_if_pending = false
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingDefaults {
    /// Diagnostic id attached to log events
    pub id: Option<String>,

    /// Delay in milliseconds
    pub delay_ms: Option<u64>,

    /// Skip policy
    pub skip_if_pending: Option<bool>,
}

impl TimingDefaults {
    /// Parse defaults from TOML text
    pub fn from_toml_str(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }

    /// Convert to a partial config (without an action)
    pub fn to_config(&self) -> TimedActionConfig {
        TimedActionConfig {
            action: None,
            delay: self.delay_ms.map(Duration::from_millis),
            skip_if_pending: self.skip_if_pending,
        }
    }
}
