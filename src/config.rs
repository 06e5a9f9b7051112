//! Session policy configuration
//!
//! Every threshold and increment the engine applies lives here. Defaults are
//! the interview policy constants; a JSON config can override any subset.

use serde::{Deserialize, Serialize};

use crate::error::SessionError;

/// Elapsed time between focus and first answer that counts as hesitation
pub const DEFAULT_HESITATION_THRESHOLD_MS: i64 = 12_000;

/// Edit count at which churn fires (once)
pub const DEFAULT_CHURN_EDIT_COUNT: u32 = 2;

/// Fatigue score that arms the fallback nudge
pub const DEFAULT_FATIGUE_THRESHOLD: u32 = 5;

/// Fatigue removed when a nudge is dismissed
pub const DEFAULT_DISMISS_DECAY: u32 = 3;

/// Capacity of the recent-signal history
pub const DEFAULT_SIGNAL_HISTORY_CAPACITY: usize = 20;

/// Session policy
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub hesitation_threshold_ms: i64,
    pub churn_edit_count: u32,
    pub fatigue_threshold: u32,
    pub dismiss_decay: u32,
    pub signal_history_capacity: usize,
    /// Fatigue added by a plain answer edit
    pub answer_edit_increment: u32,
    pub hesitation_severity: u32,
    pub churn_severity: u32,
    pub contradiction_severity: u32,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            hesitation_threshold_ms: DEFAULT_HESITATION_THRESHOLD_MS,
            churn_edit_count: DEFAULT_CHURN_EDIT_COUNT,
            fatigue_threshold: DEFAULT_FATIGUE_THRESHOLD,
            dismiss_decay: DEFAULT_DISMISS_DECAY,
            signal_history_capacity: DEFAULT_SIGNAL_HISTORY_CAPACITY,
            answer_edit_increment: 1,
            hesitation_severity: 1,
            churn_severity: 2,
            contradiction_severity: 2,
        }
    }
}

impl SessionConfig {
    /// Parse and validate a JSON config
    pub fn from_json(json: &str) -> Result<Self, SessionError> {
        let config: SessionConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize config to JSON
    pub fn to_json(&self) -> Result<String, SessionError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Reject policies the engine cannot honor
    pub fn validate(&self) -> Result<(), SessionError> {
        if self.hesitation_threshold_ms <= 0 {
            return Err(SessionError::InvalidConfig(
                "hesitation_threshold_ms must be positive".to_string(),
            ));
        }
        if self.churn_edit_count == 0 {
            return Err(SessionError::InvalidConfig(
                "churn_edit_count must be at least 1".to_string(),
            ));
        }
        if self.fatigue_threshold == 0 {
            return Err(SessionError::InvalidConfig(
                "fatigue_threshold must be at least 1".to_string(),
            ));
        }
        if self.signal_history_capacity == 0 {
            return Err(SessionError::InvalidConfig(
                "signal_history_capacity must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}
