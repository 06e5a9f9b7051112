//! Core data types
//!
//! Value types shared by the answer store, signal detector, fatigue
//! accumulator and nudge state machine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::SessionError;

/// A recorded answer value.
///
/// `Absent` is the explicit "no value" sentinel, so an unanswered question
/// never collides with a legitimate `0` or empty choice.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum AnswerValue {
    #[default]
    Absent,
    Number(f64),
    Text(String),
    Choice(String),
}

impl AnswerValue {
    /// Whether this value counts as an answer (present and non-empty)
    pub fn is_answered(&self) -> bool {
        match self {
            AnswerValue::Absent => false,
            AnswerValue::Number(_) => true,
            AnswerValue::Text(s) | AnswerValue::Choice(s) => !s.is_empty(),
        }
    }

    /// Numeric view, if this is a number
    pub fn as_number(&self) -> Option<f64> {
        match self {
            AnswerValue::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// Textual view of a text or choice answer
    pub fn as_str(&self) -> Option<&str> {
        match self {
            AnswerValue::Text(s) | AnswerValue::Choice(s) => Some(s.as_str()),
            _ => None,
        }
    }
}

impl fmt::Display for AnswerValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AnswerValue::Absent => write!(f, "<absent>"),
            AnswerValue::Number(n) => write!(f, "{n}"),
            AnswerValue::Text(s) | AnswerValue::Choice(s) => write!(f, "{s}"),
        }
    }
}

/// Display mode controlling prompt wording complexity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReadingLevel {
    Simple,
    #[default]
    Standard,
    Clinical,
}

impl ReadingLevel {
    pub const ALL: [ReadingLevel; 3] = [
        ReadingLevel::Simple,
        ReadingLevel::Standard,
        ReadingLevel::Clinical,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ReadingLevel::Simple => "simple",
            ReadingLevel::Standard => "standard",
            ReadingLevel::Clinical => "clinical",
        }
    }
}

impl fmt::Display for ReadingLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReadingLevel {
    type Err = SessionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "simple" => Ok(ReadingLevel::Simple),
            "standard" => Ok(ReadingLevel::Standard),
            "clinical" => Ok(ReadingLevel::Clinical),
            other => Err(SessionError::InvalidReadingLevel(other.to_string())),
        }
    }
}

/// Kind of behavioral signal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalKind {
    /// Long delay between first engaging a question and answering it
    Hesitation,
    /// Repeated revision of the same answer
    Churn,
    /// Two recorded answers that are jointly implausible
    Contradiction,
}

impl SignalKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SignalKind::Hesitation => "hesitation",
            SignalKind::Churn => "churn",
            SignalKind::Contradiction => "contradiction",
        }
    }
}

impl fmt::Display for SignalKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A detected behavioral signal. Immutable once created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BehaviorSignal {
    pub kind: SignalKind,
    /// Originating question, absent for global signals
    #[serde(skip_serializing_if = "Option::is_none")]
    pub question_id: Option<String>,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

/// What a fatigue bump is attributed to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FatigueSource {
    /// Plain answer-edit activity
    Answer,
    /// A detected behavioral signal
    Signal,
}

impl FatigueSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            FatigueSource::Answer => "answer",
            FatigueSource::Signal => "signal",
        }
    }
}

/// Corrective action the subject takes to dismiss a nudge
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NudgeAction {
    /// Switch to simple wording, then dismiss
    Simplify,
    /// Dismiss without any other change
    Pause,
}

impl NudgeAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            NudgeAction::Simplify => "simplify",
            NudgeAction::Pause => "pause",
        }
    }
}

impl fmt::Display for NudgeAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NudgeAction {
    type Err = SessionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "simplify" => Ok(NudgeAction::Simplify),
            "pause" => Ok(NudgeAction::Pause),
            other => Err(SessionError::InvalidNudgeAction(other.to_string())),
        }
    }
}
