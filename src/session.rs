//! Interview session
//!
//! `Session` is the single owned aggregate behind the interview UI. All state
//! lives in private fields and changes only through the operations below,
//! each of which runs to completion (read, compute, commit, audit) before the
//! next begins.
//!
//! Control flow for an answer write:
//! answer store → signal detector → fatigue accumulator → nudge state machine,
//! with every step emitting its own audit event.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, info};

use crate::answers::AnswerStore;
use crate::audit::{AuditEvent, AuditLog, AuditRecord};
use crate::clock::{Clock, SystemClock};
use crate::config::SessionConfig;
use crate::contradiction::RuleTable;
use crate::error::SessionError;
use crate::fatigue::FatigueAccumulator;
use crate::nudge::{Nudge, NudgeDismissal, NudgeMachine, FALLBACK_REASON};
use crate::signals::{DetectedSignal, SignalDetector, SignalHistory};
use crate::types::{
    AnswerValue, BehaviorSignal, FatigueSource, NudgeAction, ReadingLevel, SignalKind,
};

/// Read-only view of the nudge
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NudgeSnapshot {
    pub shown: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trigger: Option<BehaviorSignal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
    /// Recent signals, newest first
    pub recent_signals: Vec<BehaviorSignal>,
}

/// Read-only view of the whole session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub reading_level: ReadingLevel,
    pub answers: BTreeMap<String, AnswerValue>,
    pub edit_counts: BTreeMap<String, u32>,
    pub fatigue: u32,
    pub nudge: NudgeSnapshot,
    /// Audit log, newest first
    pub audit: Vec<AuditEvent>,
}

/// Interview session state
pub struct Session<C: Clock = SystemClock> {
    config: SessionConfig,
    clock: C,
    rules: RuleTable,
    reading_level: ReadingLevel,
    answers: AnswerStore,
    fatigue: FatigueAccumulator,
    nudge: NudgeMachine,
    signals: SignalHistory,
    audit: AuditLog,
}

impl Default for Session<SystemClock> {
    fn default() -> Self {
        Self::new()
    }
}

impl Session<SystemClock> {
    /// Session with the default policy and wall-clock time
    pub fn new() -> Self {
        Self::with_clock(SystemClock)
    }
}

impl<C: Clock> Session<C> {
    /// Session with the default policy on the given time source
    pub fn with_clock(clock: C) -> Self {
        Self::build(SessionConfig::default(), clock)
    }

    /// Session with a custom policy and time source.
    ///
    /// Fails with `InvalidConfig` when the policy does not pass [`SessionConfig::validate`].
    pub fn with_config(config: SessionConfig, clock: C) -> Result<Self, SessionError> {
        config.validate()?;
        Ok(Self::build(config, clock))
    }

    fn build(config: SessionConfig, clock: C) -> Self {
        Self {
            fatigue: FatigueAccumulator::new(config.fatigue_threshold, config.dismiss_decay),
            signals: SignalHistory::new(config.signal_history_capacity),
            config,
            clock,
            rules: RuleTable::default(),
            reading_level: ReadingLevel::default(),
            answers: AnswerStore::new(),
            nudge: NudgeMachine::new(),
            audit: AuditLog::new(),
        }
    }

    /// Replace the contradiction rule table
    pub fn with_rules(mut self, rules: RuleTable) -> Self {
        self.rules = rules;
        self
    }

    // ------------------------------------------------------------------
    // Mutations
    // ------------------------------------------------------------------

    /// Record an answer and run signal detection.
    ///
    /// Any question identifier is accepted. Returns the signals this write produced.
    pub fn write_answer(&mut self, question_id: &str, value: AnswerValue) -> Vec<BehaviorSignal> {
        let now = self.clock.now();
        let write = self.answers.write(question_id, value);

        self.audit.record(
            now,
            format!("Answer saved: {question_id}"),
            AuditRecord::AnswerSaved {
                question_id: question_id.to_string(),
                value: write.value.clone(),
            },
        );
        debug!(
            question_id,
            edit = write.is_edit,
            edits = write.edit_count,
            "answer.saved"
        );

        if write.is_edit {
            self.bump_fatigue(self.config.answer_edit_increment, FatigueSource::Answer, now);
        }

        let detected = SignalDetector::new(&self.config, &self.rules).detect(
            &write,
            &self.answers,
            &self.audit,
            now,
        );

        detected
            .into_iter()
            .map(|d| self.apply_signal(d, now))
            .collect()
    }

    /// Note that the subject started looking at a question.
    ///
    /// First call wins while the question is unanswered. Returns whether a
    /// focus timestamp was recorded.
    pub fn note_focus(&mut self, question_id: &str) -> bool {
        let recorded = self.answers.note_focus(question_id, self.clock.now());
        debug!(question_id, recorded, "question.focus");
        recorded
    }

    /// Change the reading level. Any level is reachable from any other.
    pub fn set_reading_level(&mut self, level: ReadingLevel) {
        let now = self.clock.now();
        self.apply_reading_level(level, now);
    }

    /// Dismiss the shown nudge with a corrective action.
    ///
    /// `Simplify` also switches the reading level to simple. Returns `None`
    /// and changes nothing when no nudge is shown.
    pub fn dismiss_nudge(&mut self, action: NudgeAction) -> Option<NudgeDismissal> {
        if !self.nudge.is_shown() {
            debug!(action = %action, "nudge dismissal ignored, no nudge shown");
            return None;
        }
        let now = self.clock.now();

        if action == NudgeAction::Simplify {
            self.apply_reading_level(ReadingLevel::Simple, now);
        }

        let nudge = self.nudge.dismiss()?;
        let fatigue = self.fatigue.decay();
        let message = match action {
            NudgeAction::Simplify => "Agent action: simplify language",
            NudgeAction::Pause => "Agent action: pause",
        };

        self.audit.record(
            now,
            message,
            AuditRecord::NudgeAction {
                action,
                reason: nudge.reason.clone(),
                signal_kind: nudge.trigger.kind,
                reduced_to: fatigue,
            },
        );
        info!(action = %action, reason = %nudge.reason, fatigue, "nudge.dismissed");

        Some(NudgeDismissal {
            action,
            reason: nudge.reason,
            signal_kind: nudge.trigger.kind,
            fatigue,
        })
    }

    /// Restore every field to its initial value, including the audit log
    pub fn reset(&mut self) {
        self.reading_level = ReadingLevel::default();
        self.answers.clear();
        self.fatigue.reset();
        self.nudge.reset();
        self.signals.clear();
        self.audit.clear();
        info!("session.reset");
    }

    // ------------------------------------------------------------------
    // Internal transitions
    // ------------------------------------------------------------------

    fn apply_reading_level(&mut self, level: ReadingLevel, now: DateTime<Utc>) {
        self.reading_level = level;
        self.audit.record(
            now,
            format!("Reading level set to {level}"),
            AuditRecord::ReadingLevelChanged { level },
        );
        debug!(level = %level, "reading_level.changed");
    }

    fn apply_signal(&mut self, detected: DetectedSignal, now: DateTime<Utc>) -> BehaviorSignal {
        let DetectedSignal {
            signal,
            record,
            severity,
            nudge_reason,
        } = detected;

        self.signals.push(signal.clone());
        self.audit.record(now, signal.message.clone(), record);
        info!(
            kind = %signal.kind,
            question_id = signal.question_id.as_deref().unwrap_or(""),
            "signal.detected"
        );

        self.bump_fatigue(severity, FatigueSource::Signal, now);
        if !self.nudge.is_shown() {
            self.show_nudge(nudge_reason, signal.clone(), now);
        }

        signal
    }

    fn bump_fatigue(&mut self, amount: u32, source: FatigueSource, now: DateTime<Utc>) {
        let bump = self.fatigue.bump(amount);
        self.audit.record(
            now,
            format!("Fatigue +{} (now {})", bump.amount, bump.fatigue),
            AuditRecord::FatigueUpdated {
                amount: bump.amount,
                fatigue: bump.fatigue,
                source,
            },
        );
        debug!(amount, fatigue = bump.fatigue, source = source.as_str(), "fatigue.updated");

        if bump.threshold_reached && !self.nudge.is_shown() {
            let fallback = BehaviorSignal {
                kind: SignalKind::Hesitation,
                question_id: None,
                message: FALLBACK_REASON.to_string(),
                timestamp: now,
            };
            self.show_nudge(FALLBACK_REASON, fallback, now);
        }
    }

    fn show_nudge(&mut self, reason: &str, trigger: BehaviorSignal, now: DateTime<Utc>) {
        let Some(signal_kind) = self.nudge.show(reason, trigger).map(|n| n.trigger.kind) else {
            debug!(reason, "nudge already shown, cause absorbed");
            return;
        };

        self.audit.record(
            now,
            format!("Nudge shown: {reason}"),
            AuditRecord::NudgeShown {
                reason: reason.to_string(),
                signal_kind,
            },
        );
        info!(reason, kind = %signal_kind, "nudge.shown");
    }

    // ------------------------------------------------------------------
    // Read-only views
    // ------------------------------------------------------------------

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    pub fn rules(&self) -> &RuleTable {
        &self.rules
    }

    pub fn reading_level(&self) -> ReadingLevel {
        self.reading_level
    }

    pub fn answer(&self, question_id: &str) -> &AnswerValue {
        self.answers.get(question_id)
    }

    pub fn answers(&self) -> &BTreeMap<String, AnswerValue> {
        self.answers.values()
    }

    pub fn edit_count(&self, question_id: &str) -> u32 {
        self.answers.edit_count(question_id)
    }

    pub fn fatigue(&self) -> u32 {
        self.fatigue.score()
    }

    pub fn nudge(&self) -> Option<&Nudge> {
        self.nudge.current()
    }

    pub fn nudge_shown(&self) -> bool {
        self.nudge.is_shown()
    }

    pub fn recent_signals(&self) -> &SignalHistory {
        &self.signals
    }

    pub fn audit(&self) -> &AuditLog {
        &self.audit
    }

    /// Owned snapshot of everything a renderer needs
    pub fn snapshot(&self) -> SessionSnapshot {
        let current = self.nudge.current();
        let hint = current.map(|_| Nudge::hint(self.signals.latest().map(|s| s.kind)).to_string());

        SessionSnapshot {
            reading_level: self.reading_level,
            answers: self.answers.values().clone(),
            edit_counts: self.answers.edit_counts().clone(),
            fatigue: self.fatigue.score(),
            nudge: NudgeSnapshot {
                shown: current.is_some(),
                reason: current.map(|n| n.reason.clone()),
                trigger: current.map(|n| n.trigger.clone()),
                hint,
                recent_signals: self.signals.to_vec(),
            },
            audit: self.audit.to_vec(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::AuditKind;
    use crate::clock::ManualClock;
    use pretty_assertions::assert_eq;

    fn session() -> (Session<ManualClock>, ManualClock) {
        let clock = ManualClock::default();
        (Session::with_clock(clock.clone()), clock)
    }

    fn num(n: f64) -> AnswerValue {
        AnswerValue::Number(n)
    }

    fn choice(s: &str) -> AnswerValue {
        AnswerValue::Choice(s.to_string())
    }

    fn kinds(session: &Session<ManualClock>) -> Vec<AuditKind> {
        session.audit().iter().map(|e| e.kind()).collect()
    }

    /// Four single edits on separate questions: fatigue 4, no churn, no nudge
    fn fatigue_at_four(session: &mut Session<ManualClock>) {
        for q in ["household_size", "dmft_score", "sleep_hours", "brushing_frequency"] {
            session.write_answer(q, num(1.0));
            session.write_answer(q, num(8.0));
        }
    }

    #[test]
    fn test_scenario_a_contradiction() {
        let (mut session, _) = session();
        session.write_answer("stress_level", choice("Low"));
        let before = session.fatigue();
        let signals = session.write_answer("sleep_hours", num(3.0));

        assert_eq!(signals.len(), 1);
        assert_eq!(signals[0].kind, SignalKind::Contradiction);

        let event = session
            .audit()
            .iter()
            .find(|e| e.kind() == AuditKind::ContradictionDetected)
            .unwrap();
        match &event.record {
            AuditRecord::ContradictionDetected { key, fields } => {
                assert_eq!(key, "stress_sleep");
                assert_eq!(fields["sleep_hours"], num(3.0));
            }
            other => panic!("unexpected record {other:?}"),
        }
        assert!(session.fatigue() >= before + 2);
        assert_eq!(session.nudge().unwrap().reason, "Contradiction detected");
    }

    #[test]
    fn test_scenario_b_hesitation() {
        let (mut session, clock) = session();
        session.note_focus("brushing_frequency");
        clock.set_offset_ms(13_000);
        session.write_answer("brushing_frequency", num(2.0));

        let event = session
            .audit()
            .iter()
            .find(|e| e.kind() == AuditKind::HesitationDetected)
            .unwrap();
        assert!(event.message.contains("13s"));
        assert_eq!(session.fatigue(), 1);

        let nudge = session.nudge().unwrap();
        assert_eq!(nudge.reason, "Hesitation detected");
        assert_eq!(nudge.trigger.kind, SignalKind::Hesitation);
    }

    #[test]
    fn test_scenario_c_churn_on_third_write() {
        let (mut session, _) = session();
        session.write_answer("household_size", num(3.0));
        let second = session.write_answer("household_size", num(4.0));
        assert!(second.is_empty());
        assert_eq!(session.edit_count("household_size"), 1);

        let third = session.write_answer("household_size", num(5.0));
        assert_eq!(session.edit_count("household_size"), 2);
        assert_eq!(third.len(), 1);
        assert_eq!(third[0].kind, SignalKind::Churn);
        assert_eq!(session.audit().count_of(AuditKind::ChurnDetected), 1);
    }

    #[test]
    fn test_scenario_d_fallback_nudge() {
        let (mut session, _) = session();
        fatigue_at_four(&mut session);
        assert_eq!(session.fatigue(), 4);
        assert!(!session.nudge_shown());

        session.write_answer("water_source", choice("City water"));
        session.write_answer("water_source", choice("Well water"));

        assert_eq!(session.fatigue(), 5);
        let nudge = session.nudge().unwrap();
        assert_eq!(nudge.reason, FALLBACK_REASON);
        assert_eq!(nudge.trigger.kind, SignalKind::Hesitation);
        assert_eq!(nudge.trigger.question_id, None);
        assert_eq!(session.audit().latest().unwrap().kind(), AuditKind::NudgeShown);
    }

    #[test]
    fn test_scenario_e_simplify() {
        let (mut session, _) = session();
        for v in [3.0, 4.0, 5.0] {
            session.write_answer("household_size", num(v));
        }
        assert_eq!(session.fatigue(), 4);
        assert!(session.nudge_shown());

        let dismissal = session.dismiss_nudge(NudgeAction::Simplify).unwrap();

        assert_eq!(dismissal.fatigue, 1);
        assert_eq!(dismissal.reason, "Churn detected");
        assert_eq!(session.reading_level(), ReadingLevel::Simple);
        assert_eq!(session.fatigue(), 1);
        assert!(!session.nudge_shown());

        let latest = session.audit().latest().unwrap();
        match &latest.record {
            AuditRecord::NudgeAction {
                action,
                reason,
                signal_kind,
                reduced_to,
            } => {
                assert_eq!(*action, NudgeAction::Simplify);
                assert_eq!(reason, "Churn detected");
                assert_eq!(*signal_kind, SignalKind::Churn);
                assert_eq!(*reduced_to, 1);
            }
            other => panic!("unexpected record {other:?}"),
        }
        assert_eq!(kinds(&session)[1], AuditKind::ReadingLevelChanged);
    }

    #[test]
    fn test_pause_leaves_reading_level() {
        let (mut session, _) = session();
        session.set_reading_level(ReadingLevel::Clinical);
        session.write_answer("stress_level", choice("Low"));
        session.write_answer("sleep_hours", num(3.0));

        let dismissal = session.dismiss_nudge(NudgeAction::Pause).unwrap();
        assert_eq!(dismissal.action, NudgeAction::Pause);
        assert_eq!(session.reading_level(), ReadingLevel::Clinical);
        assert_eq!(session.audit().count_of(AuditKind::NudgeAction), 1);
    }

    #[test]
    fn test_fatigue_floor_on_dismiss() {
        let (mut session, _) = session();
        session.write_answer("stress_level", choice("Low"));
        session.write_answer("sleep_hours", num(3.0));
        assert_eq!(session.fatigue(), 2);

        session.dismiss_nudge(NudgeAction::Pause);
        assert_eq!(session.fatigue(), 0);
    }

    #[test]
    fn test_dismiss_while_idle_is_noop() {
        let (mut session, _) = session();
        session.write_answer("household_size", num(3.0));
        let len = session.audit().len();

        assert!(session.dismiss_nudge(NudgeAction::Simplify).is_none());
        assert_eq!(session.audit().len(), len);
        assert_eq!(session.reading_level(), ReadingLevel::Standard);
    }

    #[test]
    fn test_at_most_one_nudge() {
        let (mut session, _) = session();
        session.write_answer("stress_level", choice("Low"));
        session.write_answer("sleep_hours", num(3.0));
        for v in [5.0, 6.0, 7.0] {
            session.write_answer("household_size", num(v));
        }
        session.write_answer("last_dental_visit", choice("Never"));
        session.write_answer("brushing_frequency", num(2.0));

        assert_eq!(session.audit().count_of(AuditKind::NudgeShown), 1);
        assert_eq!(session.nudge().unwrap().reason, "Contradiction detected");
        assert_eq!(session.audit().count_of(AuditKind::ChurnDetected), 1);
        assert_eq!(session.audit().count_of(AuditKind::ContradictionDetected), 2);
    }

    #[test]
    fn test_nudge_rearms_after_dismissal() {
        let (mut session, _) = session();
        session.write_answer("stress_level", choice("Low"));
        session.write_answer("sleep_hours", num(3.0));
        session.dismiss_nudge(NudgeAction::Pause);

        for v in [5.0, 6.0, 7.0] {
            session.write_answer("household_size", num(v));
        }
        assert_eq!(session.nudge().unwrap().reason, "Churn detected");
        assert_eq!(session.audit().count_of(AuditKind::NudgeShown), 2);
    }

    #[test]
    fn test_contradiction_idempotence() {
        let (mut session, _) = session();
        session.write_answer("stress_level", choice("Low"));
        session.write_answer("sleep_hours", num(3.0));
        session.write_answer("sleep_hours", num(3.0));
        session.write_answer("household_size", num(2.0));
        assert_eq!(session.audit().count_of(AuditKind::ContradictionDetected), 1);

        session.write_answer("sleep_hours", num(2.0));
        assert_eq!(session.audit().count_of(AuditKind::ContradictionDetected), 2);

        session.write_answer("sleep_hours", num(3.0));
        assert_eq!(session.audit().count_of(AuditKind::ContradictionDetected), 2);
    }

    #[test]
    fn test_signal_storm_all_recorded() {
        let (mut session, clock) = session();
        session.write_answer("last_dental_visit", choice("Never"));
        session.note_focus("brushing_frequency");
        clock.advance_ms(20_000);

        let signals = session.write_answer("brushing_frequency", num(2.0));
        let found: Vec<SignalKind> = signals.iter().map(|s| s.kind).collect();
        assert_eq!(found, vec![SignalKind::Hesitation, SignalKind::Contradiction]);

        assert_eq!(session.fatigue(), 3);
        assert_eq!(session.recent_signals().len(), 2);
        assert_eq!(
            session.recent_signals().latest().unwrap().kind,
            SignalKind::Contradiction
        );
        assert_eq!(session.nudge().unwrap().reason, "Hesitation detected");
    }

    #[test]
    fn test_audit_completeness_and_order() {
        let (mut session, clock) = session();

        session.set_reading_level(ReadingLevel::Clinical);
        assert_eq!(session.audit().len(), 1);

        clock.advance_ms(10);
        session.write_answer("household_size", num(3.0));
        assert_eq!(session.audit().len(), 2);

        clock.advance_ms(10);
        session.write_answer("household_size", num(4.0));
        assert_eq!(session.audit().len(), 4);

        assert_eq!(
            kinds(&session),
            vec![
                AuditKind::FatigueUpdated,
                AuditKind::AnswerSaved,
                AuditKind::AnswerSaved,
                AuditKind::ReadingLevelChanged,
            ]
        );

        let timestamps: Vec<_> = session.audit().iter().map(|e| e.timestamp).collect();
        assert!(timestamps.windows(2).all(|w| w[0] >= w[1]));
    }

    #[test]
    fn test_hesitation_not_rearmed_after_clear() {
        let (mut session, clock) = session();
        session.note_focus("sleep_hours");
        session.write_answer("sleep_hours", num(7.0));
        session.write_answer("sleep_hours", AnswerValue::Absent);

        assert!(!session.note_focus("sleep_hours"));
        clock.advance_ms(30_000);
        let signals = session.write_answer("sleep_hours", num(6.0));
        assert!(signals.iter().all(|s| s.kind != SignalKind::Hesitation));
    }

    #[test]
    fn test_unknown_question_accepted() {
        let (mut session, _) = session();
        session.write_answer("not_a_question", AnswerValue::Text("free text".to_string()));
        assert_eq!(
            session.answer("not_a_question"),
            &AnswerValue::Text("free text".to_string())
        );
    }

    #[test]
    fn test_reset_clears_everything() {
        let (mut session, _) = session();
        session.set_reading_level(ReadingLevel::Simple);
        for v in [3.0, 4.0, 5.0] {
            session.write_answer("household_size", num(v));
        }
        session.reset();

        let snapshot = session.snapshot();
        assert_eq!(snapshot.reading_level, ReadingLevel::Standard);
        assert!(snapshot.answers.is_empty());
        assert!(snapshot.edit_counts.is_empty());
        assert_eq!(snapshot.fatigue, 0);
        assert!(!snapshot.nudge.shown);
        assert!(snapshot.nudge.recent_signals.is_empty());
        assert!(snapshot.audit.is_empty());
    }

    #[test]
    fn test_snapshot_reflects_nudge() {
        let (mut session, _) = session();
        for v in [3.0, 4.0, 5.0] {
            session.write_answer("household_size", num(v));
        }

        let snapshot = session.snapshot();
        assert!(snapshot.nudge.shown);
        assert_eq!(snapshot.nudge.reason.as_deref(), Some("Churn detected"));
        assert!(snapshot.nudge.hint.unwrap().contains("single answer"));
        assert_eq!(snapshot.edit_counts["household_size"], 2);

        let json = serde_json::to_value(&session.snapshot()).unwrap();
        assert_eq!(json["reading_level"], "standard");
        assert_eq!(json["audit"][0]["type"], "nudge_shown");
    }

    #[test]
    fn test_whitespace_text_counts_as_answered() {
        let (mut session, _) = session();
        session.write_answer("notes", AnswerValue::Text("  ".to_string()));
        session.write_answer("notes", AnswerValue::Text("x".to_string()));

        assert_eq!(session.edit_count("notes"), 1);
        assert_eq!(session.fatigue(), 1);
    }

    #[test]
    fn test_with_config_rejects_invalid_policy() {
        let config = SessionConfig {
            fatigue_threshold: 0,
            ..SessionConfig::default()
        };
        let result = Session::with_config(config, ManualClock::default());
        assert!(matches!(result, Err(SessionError::InvalidConfig(_))));

        let config = SessionConfig {
            fatigue_threshold: 8,
            ..SessionConfig::default()
        };
        let session = Session::with_config(config, ManualClock::default()).unwrap();
        assert_eq!(session.config().fatigue_threshold, 8);
    }
}
