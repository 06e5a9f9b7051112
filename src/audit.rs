//! Append-only audit trail
//!
//! Every state change in the session produces exactly one audit event at the
//! moment it happens. The log is exposed newest-first; consumers rely on that
//! order. Entries are never edited or removed except by a full session reset.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, VecDeque};
use std::fmt;
use uuid::Uuid;

use crate::types::{AnswerValue, FatigueSource, NudgeAction, ReadingLevel, SignalKind};

/// Audit event kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditKind {
    ReadingLevelChanged,
    AnswerSaved,
    FatigueUpdated,
    NudgeShown,
    NudgeAction,
    ChurnDetected,
    HesitationDetected,
    ContradictionDetected,
}

impl AuditKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditKind::ReadingLevelChanged => "reading_level_changed",
            AuditKind::AnswerSaved => "answer_saved",
            AuditKind::FatigueUpdated => "fatigue_updated",
            AuditKind::NudgeShown => "nudge_shown",
            AuditKind::NudgeAction => "nudge_action",
            AuditKind::ChurnDetected => "churn_detected",
            AuditKind::HesitationDetected => "hesitation_detected",
            AuditKind::ContradictionDetected => "contradiction_detected",
        }
    }
}

impl fmt::Display for AuditKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Structured payload of an audit event, one variant per kind
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AuditRecord {
    ReadingLevelChanged {
        level: ReadingLevel,
    },
    AnswerSaved {
        question_id: String,
        value: AnswerValue,
    },
    FatigueUpdated {
        amount: u32,
        fatigue: u32,
        source: FatigueSource,
    },
    NudgeShown {
        reason: String,
        signal_kind: SignalKind,
    },
    NudgeAction {
        action: NudgeAction,
        reason: String,
        signal_kind: SignalKind,
        /// Fatigue after the dismissal decay
        reduced_to: u32,
    },
    ChurnDetected {
        question_id: String,
        edits: u32,
    },
    HesitationDetected {
        question_id: String,
        elapsed_ms: i64,
    },
    ContradictionDetected {
        key: String,
        /// Values of the conflicting fields at detection time
        fields: BTreeMap<String, AnswerValue>,
    },
}

impl AuditRecord {
    pub fn kind(&self) -> AuditKind {
        match self {
            AuditRecord::ReadingLevelChanged { .. } => AuditKind::ReadingLevelChanged,
            AuditRecord::AnswerSaved { .. } => AuditKind::AnswerSaved,
            AuditRecord::FatigueUpdated { .. } => AuditKind::FatigueUpdated,
            AuditRecord::NudgeShown { .. } => AuditKind::NudgeShown,
            AuditRecord::NudgeAction { .. } => AuditKind::NudgeAction,
            AuditRecord::ChurnDetected { .. } => AuditKind::ChurnDetected,
            AuditRecord::HesitationDetected { .. } => AuditKind::HesitationDetected,
            AuditRecord::ContradictionDetected { .. } => AuditKind::ContradictionDetected,
        }
    }
}

/// An immutable audit log entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEvent {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub message: String,
    #[serde(flatten)]
    pub record: AuditRecord,
}

impl AuditEvent {
    pub fn kind(&self) -> AuditKind {
        self.record.kind()
    }
}

/// Newest-first, append-only audit log
#[derive(Debug, Clone, Default)]
pub struct AuditLog {
    entries: VecDeque<AuditEvent>,
}

impl AuditLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an event, assigning identity and timestamp
    pub fn record(
        &mut self,
        timestamp: DateTime<Utc>,
        message: impl Into<String>,
        record: AuditRecord,
    ) -> &AuditEvent {
        let event = AuditEvent {
            id: Uuid::new_v4(),
            timestamp,
            message: message.into(),
            record,
        };
        tracing::trace!(kind = %event.kind(), id = %event.id, "audit.record");
        self.entries.push_front(event);
        &self.entries[0]
    }

    /// Entries, newest first
    pub fn iter(&self) -> impl Iterator<Item = &AuditEvent> {
        self.entries.iter()
    }

    /// Most recent entry
    pub fn latest(&self) -> Option<&AuditEvent> {
        self.entries.front()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of entries of the given kind
    pub fn count_of(&self, kind: AuditKind) -> usize {
        self.entries.iter().filter(|e| e.kind() == kind).count()
    }

    /// Whether a contradiction with this key and these exact field values was already reported
    pub fn has_contradiction(&self, key: &str, fields: &BTreeMap<String, AnswerValue>) -> bool {
        self.entries.iter().any(|e| match &e.record {
            AuditRecord::ContradictionDetected {
                key: logged_key,
                fields: logged_fields,
            } => logged_key == key && logged_fields == fields,
            _ => false,
        })
    }

    /// Owned copy of the log, newest first
    pub fn to_vec(&self) -> Vec<AuditEvent> {
        self.entries.iter().cloned().collect()
    }

    /// Drop every entry. Only a full session reset may call this.
    pub(crate) fn clear(&mut self) {
        self.entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn level_record(level: ReadingLevel) -> AuditRecord {
        AuditRecord::ReadingLevelChanged { level }
    }

    #[test]
    fn test_newest_first_ordering() {
        let mut log = AuditLog::new();
        let t0 = Utc::now();

        log.record(t0, "first", level_record(ReadingLevel::Simple));
        log.record(t0 + Duration::seconds(1), "second", level_record(ReadingLevel::Clinical));
        log.record(t0 + Duration::seconds(2), "third", level_record(ReadingLevel::Standard));

        let messages: Vec<&str> = log.iter().map(|e| e.message.as_str()).collect();
        assert_eq!(messages, vec!["third", "second", "first"]);
        assert_eq!(log.latest().unwrap().message, "third");
    }

    #[test]
    fn test_unique_identities() {
        let mut log = AuditLog::new();
        let now = Utc::now();
        let a = log.record(now, "a", level_record(ReadingLevel::Simple)).id;
        let b = log.record(now, "b", level_record(ReadingLevel::Simple)).id;
        assert_ne!(a, b);
    }

    #[test]
    fn test_has_contradiction_matches_key_and_values() {
        let mut log = AuditLog::new();
        let mut fields = BTreeMap::new();
        fields.insert("stress_level".to_string(), AnswerValue::Choice("Low".to_string()));
        fields.insert("sleep_hours".to_string(), AnswerValue::Number(3.0));

        log.record(
            Utc::now(),
            "conflict",
            AuditRecord::ContradictionDetected {
                key: "stress_sleep".to_string(),
                fields: fields.clone(),
            },
        );

        assert!(log.has_contradiction("stress_sleep", &fields));
        assert!(!log.has_contradiction("dental_visit_brushing", &fields));

        let mut other = fields.clone();
        other.insert("sleep_hours".to_string(), AnswerValue::Number(2.0));
        assert!(!log.has_contradiction("stress_sleep", &other));
    }

    #[test]
    fn test_event_serialization_is_flat() {
        let mut log = AuditLog::new();
        log.record(
            Utc::now(),
            "Fatigue +2 (now 2)",
            AuditRecord::FatigueUpdated {
                amount: 2,
                fatigue: 2,
                source: FatigueSource::Signal,
            },
        );

        let json = serde_json::to_value(log.latest().unwrap()).unwrap();
        assert_eq!(json["type"], "fatigue_updated");
        assert_eq!(json["amount"], 2);
        assert_eq!(json["source"], "signal");
        assert!(json["id"].is_string());

        let parsed: AuditEvent = serde_json::from_value(json).unwrap();
        assert_eq!(parsed.kind(), AuditKind::FatigueUpdated);
    }

    #[test]
    fn test_count_and_clear() {
        let mut log = AuditLog::new();
        let now = Utc::now();
        log.record(now, "a", level_record(ReadingLevel::Simple));
        log.record(now, "b", level_record(ReadingLevel::Standard));
        assert_eq!(log.count_of(AuditKind::ReadingLevelChanged), 2);
        assert_eq!(log.count_of(AuditKind::NudgeShown), 0);

        log.clear();
        assert!(log.is_empty());
    }
}
