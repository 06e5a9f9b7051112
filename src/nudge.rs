//! Nudge state machine
//!
//! Two states, idle and shown. At most one nudge is shown at a time: arming
//! while shown is absorbed, and only an explicit dismissal returns to idle.

use serde::{Deserialize, Serialize};

use crate::types::{BehaviorSignal, NudgeAction, SignalKind};

/// Reason used when fatigue crosses the threshold without a qualifying signal
pub const FALLBACK_REASON: &str = "General fatigue threshold reached";

/// The active intervention
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Nudge {
    pub reason: String,
    /// Signal that caused the nudge
    pub trigger: BehaviorSignal,
}

impl Nudge {
    /// Corrective suggestion for a renderer, keyed by the latest signal kind
    pub fn hint(latest: Option<SignalKind>) -> &'static str {
        match latest {
            Some(SignalKind::Churn) => {
                "Suggestion: hold a single answer and avoid repeated changes."
            }
            Some(SignalKind::Hesitation) => {
                "Suggestion: simplify language and answer with a best estimate."
            }
            Some(SignalKind::Contradiction) => {
                "Suggestion: review linked answers for consistency."
            }
            None => "Suggestion: reduce load with simpler phrasing.",
        }
    }
}

/// Nudge state
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum NudgeState {
    #[default]
    Idle,
    Shown(Nudge),
}

/// What a dismissal did
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NudgeDismissal {
    pub action: NudgeAction,
    pub reason: String,
    pub signal_kind: SignalKind,
    /// Fatigue after decay
    pub fatigue: u32,
}

#[derive(Debug, Clone, Default)]
pub struct NudgeMachine {
    state: NudgeState,
}

impl NudgeMachine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &NudgeState {
        &self.state
    }

    pub fn is_shown(&self) -> bool {
        matches!(self.state, NudgeState::Shown(_))
    }

    pub fn current(&self) -> Option<&Nudge> {
        match &self.state {
            NudgeState::Shown(nudge) => Some(nudge),
            NudgeState::Idle => None,
        }
    }

    /// idle → shown. Returns `None` when already shown; the first cause wins.
    pub fn show(&mut self, reason: &str, trigger: BehaviorSignal) -> Option<&Nudge> {
        if self.is_shown() {
            return None;
        }
        self.state = NudgeState::Shown(Nudge {
            reason: reason.to_string(),
            trigger,
        });
        self.current()
    }

    /// shown → idle. Returns the nudge that was dismissed, `None` when idle.
    pub fn dismiss(&mut self) -> Option<Nudge> {
        match std::mem::take(&mut self.state) {
            NudgeState::Shown(nudge) => Some(nudge),
            NudgeState::Idle => None,
        }
    }

    pub fn reset(&mut self) {
        self.state = NudgeState::Idle;
    }
}
