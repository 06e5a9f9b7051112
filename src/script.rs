//! Session scripts
//!
//! A session script is newline-delimited JSON, one UI event per line, each
//! stamped with a millisecond offset from the start of the interview:
//!
//! ```text
//! {"at_ms": 0,     "event": "focus",  "question_id": "brushing_frequency"}
//! {"at_ms": 13000, "event": "answer", "question_id": "brushing_frequency", "value": {"kind": "number", "value": 2}}
//! {"at_ms": 15000, "event": "dismiss", "action": "simplify"}
//! ```
//!
//! Replaying a script drives a [`Session`] on a manual clock, so timing
//! signals come out the same on every run.

use serde::{Deserialize, Serialize};

use crate::catalog::Catalog;
use crate::clock::ManualClock;
use crate::config::SessionConfig;
use crate::error::SessionError;
use crate::nudge::NudgeDismissal;
use crate::session::{Session, SessionSnapshot};
use crate::types::{AnswerValue, BehaviorSignal, NudgeAction, ReadingLevel};

/// A UI event from the interview surface
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ScriptEvent {
    Focus { question_id: String },
    Answer { question_id: String, value: AnswerValue },
    ReadingLevel { level: ReadingLevel },
    Dismiss { action: NudgeAction },
    Reset,
}

/// One script line
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScriptLine {
    /// Offset from the replay epoch
    pub at_ms: u64,
    #[serde(flatten)]
    pub event: ScriptEvent,
}

/// Problem found on a specific script line
#[derive(Debug, Clone, Serialize)]
pub struct ScriptIssue {
    pub line: usize,
    pub error: String,
}

fn parse_line(line_no: usize, text: &str) -> Result<ScriptLine, SessionError> {
    serde_json::from_str(text).map_err(|e| SessionError::InvalidScript {
        line: line_no,
        reason: e.to_string(),
    })
}

/// Parse a script, stopping at the first bad line
pub fn parse_script(input: &str) -> Result<Vec<ScriptLine>, SessionError> {
    let mut lines = Vec::new();
    let mut last_at = 0u64;

    for (idx, text) in input.lines().enumerate() {
        let text = text.trim();
        if text.is_empty() {
            continue;
        }
        let line = parse_line(idx + 1, text)?;
        if line.at_ms < last_at {
            return Err(SessionError::InvalidScript {
                line: idx + 1,
                reason: format!("at_ms {} is earlier than previous {}", line.at_ms, last_at),
            });
        }
        last_at = line.at_ms;
        lines.push(line);
    }

    Ok(lines)
}

/// Check every line and collect all problems
pub fn validate_script(input: &str) -> (usize, Vec<ScriptIssue>) {
    validate_lines(input, None)
}

/// Like [`validate_script`], and answers must name catalog questions and fit their shape
pub fn validate_script_against(input: &str, catalog: &Catalog) -> (usize, Vec<ScriptIssue>) {
    validate_lines(input, Some(catalog))
}

fn check_answer(catalog: &Catalog, line: &ScriptLine) -> Result<(), SessionError> {
    if let ScriptEvent::Answer { question_id, value } = &line.event {
        let question = catalog.require(question_id)?;
        if value.is_answered() {
            question.parse_answer(&value.to_string())?;
        }
    }
    Ok(())
}

fn validate_lines(input: &str, catalog: Option<&Catalog>) -> (usize, Vec<ScriptIssue>) {
    let mut total = 0;
    let mut issues = Vec::new();
    let mut last_at = 0u64;

    for (idx, text) in input.lines().enumerate() {
        let text = text.trim();
        if text.is_empty() {
            continue;
        }
        total += 1;
        match parse_line(idx + 1, text) {
            Ok(line) if line.at_ms < last_at => issues.push(ScriptIssue {
                line: idx + 1,
                error: format!("at_ms {} is earlier than previous {}", line.at_ms, last_at),
            }),
            Ok(line) => {
                last_at = line.at_ms;
                if let Some(Err(e)) = catalog.map(|c| check_answer(c, &line)) {
                    issues.push(ScriptIssue {
                        line: idx + 1,
                        error: e.to_string(),
                    });
                }
            }
            Err(e) => issues.push(ScriptIssue {
                line: idx + 1,
                error: e.to_string(),
            }),
        }
    }

    (total, issues)
}

/// What applying one event produced
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StepOutcome {
    pub signals: Vec<BehaviorSignal>,
    pub dismissal: Option<NudgeDismissal>,
}

/// Replays script events against a session on a manual clock
pub struct ScriptRunner {
    session: Session<ManualClock>,
    clock: ManualClock,
}

impl Default for ScriptRunner {
    fn default() -> Self {
        let clock = ManualClock::default();
        Self {
            session: Session::with_clock(clock.clone()),
            clock,
        }
    }
}

impl ScriptRunner {
    /// Runner with a custom policy; fails when the policy is invalid
    pub fn new(config: SessionConfig) -> Result<Self, SessionError> {
        let clock = ManualClock::default();
        Ok(Self {
            session: Session::with_config(config, clock.clone())?,
            clock,
        })
    }

    /// Apply one event at its timestamp
    pub fn apply(&mut self, line: &ScriptLine) -> StepOutcome {
        self.clock
            .set_offset_ms(i64::try_from(line.at_ms).unwrap_or(i64::MAX));

        let mut outcome = StepOutcome::default();
        match &line.event {
            ScriptEvent::Focus { question_id } => {
                self.session.note_focus(question_id);
            }
            ScriptEvent::Answer { question_id, value } => {
                outcome.signals = self.session.write_answer(question_id, value.clone());
            }
            ScriptEvent::ReadingLevel { level } => self.session.set_reading_level(*level),
            ScriptEvent::Dismiss { action } => {
                outcome.dismissal = self.session.dismiss_nudge(*action);
            }
            ScriptEvent::Reset => self.session.reset(),
        }
        outcome
    }

    /// Parse and apply a whole script
    pub fn run(&mut self, input: &str) -> Result<SessionSnapshot, SessionError> {
        let lines = parse_script(input)?;
        tracing::debug!(events = lines.len(), "script.replay");
        for line in &lines {
            self.apply(line);
        }
        Ok(self.session.snapshot())
    }

    pub fn session(&self) -> &Session<ManualClock> {
        &self.session
    }
}

/// Replay a script with the default policy (stateless, one-shot)
pub fn replay_script(input: &str) -> Result<SessionSnapshot, SessionError> {
    ScriptRunner::default().run(input)
}
