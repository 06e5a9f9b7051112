//! Behavioral signal detection
//!
//! Runs synchronously after every answer write. Three independent rule
//! families are evaluated on each write, and a single write may yield any
//! number of signals:
//!
//! - **Hesitation**: first answer arrived long after the question was focused
//! - **Churn**: the question's edit counter just reached the churn count
//! - **Contradiction**: the full answer set violates a rule in the table
//!
//! Detection is pure. Applying the signals (history, audit, fatigue, nudge)
//! is the session's job.

use chrono::{DateTime, Utc};
use std::collections::VecDeque;

use crate::answers::{AnswerStore, AnswerWrite};
use crate::audit::{AuditLog, AuditRecord};
use crate::config::SessionConfig;
use crate::contradiction::RuleTable;
use crate::types::{BehaviorSignal, SignalKind};

/// A signal together with everything needed to apply it
#[derive(Debug, Clone, PartialEq)]
pub struct DetectedSignal {
    pub signal: BehaviorSignal,
    /// Structured audit payload for the `*_detected` event
    pub record: AuditRecord,
    /// Fatigue added when applied
    pub severity: u32,
    /// Nudge reason used if this signal arms the nudge
    pub nudge_reason: &'static str,
}

/// Stateless evaluator over a write and the current session state
pub struct SignalDetector<'a> {
    config: &'a SessionConfig,
    rules: &'a RuleTable,
}

impl<'a> SignalDetector<'a> {
    pub fn new(config: &'a SessionConfig, rules: &'a RuleTable) -> Self {
        Self { config, rules }
    }

    /// Evaluate every rule family for one write, in order hesitation, churn, contradiction
    pub fn detect(
        &self,
        write: &AnswerWrite,
        answers: &AnswerStore,
        audit: &AuditLog,
        now: DateTime<Utc>,
    ) -> Vec<DetectedSignal> {
        let mut detected = Vec::new();

        if let Some(signal) = self.detect_hesitation(write, now) {
            detected.push(signal);
        }
        if let Some(signal) = self.detect_churn(write, now) {
            detected.push(signal);
        }
        detected.extend(self.detect_contradictions(write, answers, audit, now));

        detected
    }

    fn detect_hesitation(&self, write: &AnswerWrite, now: DateTime<Utc>) -> Option<DetectedSignal> {
        if write.was_answered {
            return None;
        }
        let focused_at = write.focused_at?;
        let elapsed_ms = (now - focused_at).num_milliseconds();
        if elapsed_ms < self.config.hesitation_threshold_ms {
            return None;
        }

        let seconds = (elapsed_ms as f64 / 1000.0).round() as i64;
        let message = format!(
            "Hesitation detected on {} ({}s before answering)",
            write.question_id, seconds
        );

        Some(DetectedSignal {
            signal: BehaviorSignal {
                kind: SignalKind::Hesitation,
                question_id: Some(write.question_id.clone()),
                message,
                timestamp: now,
            },
            record: AuditRecord::HesitationDetected {
                question_id: write.question_id.clone(),
                elapsed_ms,
            },
            severity: self.config.hesitation_severity,
            nudge_reason: "Hesitation detected",
        })
    }

    /// One-shot crossing: fires only on the edit that moves the counter onto the churn count
    fn detect_churn(&self, write: &AnswerWrite, now: DateTime<Utc>) -> Option<DetectedSignal> {
        if !write.is_edit || write.edit_count != self.config.churn_edit_count {
            return None;
        }

        let message = format!(
            "Churn detected on {} ({} edits)",
            write.question_id, write.edit_count
        );

        Some(DetectedSignal {
            signal: BehaviorSignal {
                kind: SignalKind::Churn,
                question_id: Some(write.question_id.clone()),
                message,
                timestamp: now,
            },
            record: AuditRecord::ChurnDetected {
                question_id: write.question_id.clone(),
                edits: write.edit_count,
            },
            severity: self.config.churn_severity,
            nudge_reason: "Churn detected",
        })
    }

    fn detect_contradictions(
        &self,
        write: &AnswerWrite,
        answers: &AnswerStore,
        audit: &AuditLog,
        now: DateTime<Utc>,
    ) -> Vec<DetectedSignal> {
        self.rules
            .evaluate(answers)
            .into_iter()
            .filter(|c| {
                let seen = audit.has_contradiction(c.key, &c.fields);
                if seen {
                    tracing::debug!(key = c.key, "contradiction already reported, suppressed");
                }
                !seen
            })
            .map(|c| DetectedSignal {
                signal: BehaviorSignal {
                    kind: SignalKind::Contradiction,
                    question_id: Some(write.question_id.clone()),
                    message: c.reason.to_string(),
                    timestamp: now,
                },
                record: AuditRecord::ContradictionDetected {
                    key: c.key.to_string(),
                    fields: c.fields,
                },
                severity: self.config.contradiction_severity,
                nudge_reason: "Contradiction detected",
            })
            .collect()
    }
}

/// Fixed-capacity ring buffer of recent signals, newest first.
///
/// Pushing onto a full buffer evicts the oldest entry.
#[derive(Debug, Clone)]
pub struct SignalHistory {
    signals: VecDeque<BehaviorSignal>,
    capacity: usize,
}

impl SignalHistory {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            signals: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Push to the front, evicting the oldest if full. Returns the evicted signal.
    pub fn push(&mut self, signal: BehaviorSignal) -> Option<BehaviorSignal> {
        let evicted = if self.signals.len() == self.capacity {
            self.signals.pop_back()
        } else {
            None
        };
        self.signals.push_front(signal);
        evicted
    }

    pub fn latest(&self) -> Option<&BehaviorSignal> {
        self.signals.front()
    }

    /// Signals, newest first
    pub fn iter(&self) -> impl Iterator<Item = &BehaviorSignal> {
        self.signals.iter()
    }

    pub fn len(&self) -> usize {
        self.signals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.signals.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn to_vec(&self) -> Vec<BehaviorSignal> {
        self.signals.iter().cloned().collect()
    }

    pub fn clear(&mut self) {
        self.signals.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::AnswerValue;
    use chrono::Duration;

    fn signal(n: usize) -> BehaviorSignal {
        BehaviorSignal {
            kind: SignalKind::Churn,
            question_id: Some(format!("q{n}")),
            message: format!("signal {n}"),
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn test_history_evicts_oldest() {
        let mut history = SignalHistory::new(20);
        for n in 0..20 {
            assert!(history.push(signal(n)).is_none());
        }
        let evicted = history.push(signal(20)).unwrap();

        assert_eq!(evicted.message, "signal 0");
        assert_eq!(history.len(), 20);
        assert_eq!(history.latest().unwrap().message, "signal 20");
        assert_eq!(history.iter().last().unwrap().message, "signal 1");
    }

    #[test]
    fn test_hesitation_at_threshold() {
        let config = SessionConfig::default();
        let rules = RuleTable::default();
        let detector = SignalDetector::new(&config, &rules);

        let t0 = Utc::now();
        let mut answers = AnswerStore::new();
        answers.note_focus("brushing_frequency", t0);
        let write = answers.write("brushing_frequency", AnswerValue::Number(1.0));

        let found = detector.detect(&write, &answers, &AuditLog::new(), t0 + Duration::milliseconds(12_000));
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].signal.kind, SignalKind::Hesitation);
        assert!(found[0].signal.message.contains("12s"));
        assert_eq!(found[0].severity, 1);
    }

    #[test]
    fn test_no_hesitation_below_threshold_or_without_focus() {
        let config = SessionConfig::default();
        let rules = RuleTable::default();
        let detector = SignalDetector::new(&config, &rules);
        let t0 = Utc::now();

        let mut answers = AnswerStore::new();
        answers.note_focus("sleep_hours", t0);
        let write = answers.write("sleep_hours", AnswerValue::Number(7.0));
        let found = detector.detect(&write, &answers, &AuditLog::new(), t0 + Duration::milliseconds(11_999));
        assert!(found.is_empty());

        let write = answers.write("household_size", AnswerValue::Number(2.0));
        let found = detector.detect(&write, &answers, &AuditLog::new(), t0 + Duration::seconds(60));
        assert!(found.is_empty());
    }

    #[test]
    fn test_churn_fires_only_on_crossing() {
        let config = SessionConfig::default();
        let rules = RuleTable::default();
        let detector = SignalDetector::new(&config, &rules);
        let audit = AuditLog::new();
        let now = Utc::now();

        let mut answers = AnswerStore::new();
        let mut churn_after = Vec::new();
        for (i, v) in [3.0, 4.0, 5.0, 6.0, 6.0, 7.0].iter().enumerate() {
            let write = answers.write("household_size", AnswerValue::Number(*v));
            let found = detector.detect(&write, &answers, &audit, now);
            if found.iter().any(|s| s.signal.kind == SignalKind::Churn) {
                churn_after.push(i);
            }
        }

        assert_eq!(churn_after, vec![2]);
    }

    #[test]
    fn test_contradiction_suppressed_when_already_logged() {
        let config = SessionConfig::default();
        let rules = RuleTable::default();
        let detector = SignalDetector::new(&config, &rules);
        let now = Utc::now();

        let mut answers = AnswerStore::new();
        answers.write("stress_level", AnswerValue::Choice("Low".to_string()));
        let write = answers.write("sleep_hours", AnswerValue::Number(3.0));

        let mut audit = AuditLog::new();
        let found = detector.detect(&write, &answers, &audit, now);
        assert_eq!(found.len(), 1);
        audit.record(now, "logged", found[0].record.clone());

        let found = detector.detect(&write, &answers, &audit, now);
        assert!(found.is_empty());
    }
}
