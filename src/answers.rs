//! Answer store
//!
//! Holds the subject's current answers together with per-question edit
//! counters and pre-answer focus timestamps. The store accepts any question
//! identifier; catalog validation is not its job.

use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashMap, HashSet};

use crate::types::AnswerValue;

/// Outcome of a single write, consumed by the signal detector
#[derive(Debug, Clone, PartialEq)]
pub struct AnswerWrite {
    pub question_id: String,
    pub previous: AnswerValue,
    pub value: AnswerValue,
    /// Previous value was present and non-empty
    pub was_answered: bool,
    /// Already answered and changed to a different value
    pub is_edit: bool,
    /// Edit counter after this write
    pub edit_count: u32,
    /// Focus timestamp consumed by this write (first answer only)
    pub focused_at: Option<DateTime<Utc>>,
}

/// Current answers plus edit and focus bookkeeping
#[derive(Debug, Clone, Default)]
pub struct AnswerStore {
    values: BTreeMap<String, AnswerValue>,
    edits: BTreeMap<String, u32>,
    focus: HashMap<String, DateTime<Utc>>,
    answered_once: HashSet<String>,
}

impl AnswerStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a value, replacing any prior one
    pub fn write(&mut self, question_id: &str, value: AnswerValue) -> AnswerWrite {
        let previous = self.get(question_id).clone();
        let was_answered = previous.is_answered();
        let is_edit = was_answered && previous != value;

        self.values.insert(question_id.to_string(), value.clone());

        let edit_count = {
            let count = self.edits.entry(question_id.to_string()).or_insert(0);
            if is_edit {
                *count += 1;
            }
            *count
        };

        // Focus only means something before the first answer.
        let focused_at = if !was_answered && value.is_answered() {
            self.answered_once.insert(question_id.to_string());
            self.focus.remove(question_id)
        } else {
            None
        };

        AnswerWrite {
            question_id: question_id.to_string(),
            previous,
            value,
            was_answered,
            is_edit,
            edit_count,
            focused_at,
        }
    }

    /// Record when the subject started looking at a question.
    ///
    /// First call wins while the question is unanswered; questions that have
    /// been answered before never re-arm. Returns whether a timestamp was stored.
    pub fn note_focus(&mut self, question_id: &str, now: DateTime<Utc>) -> bool {
        if self.answered_once.contains(question_id) || self.focus.contains_key(question_id) {
            return false;
        }
        self.focus.insert(question_id.to_string(), now);
        true
    }

    /// Current value, `Absent` if never written
    pub fn get(&self, question_id: &str) -> &AnswerValue {
        const ABSENT: &AnswerValue = &AnswerValue::Absent;
        self.values.get(question_id).unwrap_or(ABSENT)
    }

    pub fn edit_count(&self, question_id: &str) -> u32 {
        self.edits.get(question_id).copied().unwrap_or(0)
    }

    pub fn focused_at(&self, question_id: &str) -> Option<DateTime<Utc>> {
        self.focus.get(question_id).copied()
    }

    /// All recorded values keyed by question
    pub fn values(&self) -> &BTreeMap<String, AnswerValue> {
        &self.values
    }

    /// All edit counters keyed by question
    pub fn edit_counts(&self) -> &BTreeMap<String, u32> {
        &self.edits
    }

    pub fn clear(&mut self) {
        self.values.clear();
        self.edits.clear();
        self.focus.clear();
        self.answered_once.clear();
    }
}
