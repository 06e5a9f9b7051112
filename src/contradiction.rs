//! Cross-question contradiction rules
//!
//! A rule inspects the full answer set and, when its conflict holds, returns
//! the values of the fields involved. Rules are keyed so repeated reports of
//! the same conflict with the same values can be suppressed.

use std::collections::BTreeMap;

use crate::answers::AnswerStore;
use crate::types::AnswerValue;

/// Field values captured when a rule fires
pub type ConflictFields = BTreeMap<String, AnswerValue>;

/// A single logical conflict rule
#[derive(Debug, Clone)]
pub struct ContradictionRule {
    /// Stable rule key
    pub key: &'static str,
    /// Human-readable reason logged with the signal
    pub reason: &'static str,
    check: fn(&AnswerStore) -> Option<ConflictFields>,
}

impl ContradictionRule {
    pub fn new(
        key: &'static str,
        reason: &'static str,
        check: fn(&AnswerStore) -> Option<ConflictFields>,
    ) -> Self {
        Self { key, reason, check }
    }

    /// Evaluate against the current answers
    pub fn evaluate(&self, answers: &AnswerStore) -> Option<ConflictFields> {
        (self.check)(answers)
    }
}

/// A conflict found by a rule
#[derive(Debug, Clone, PartialEq)]
pub struct Contradiction {
    pub key: &'static str,
    pub reason: &'static str,
    pub fields: ConflictFields,
}

/// Ordered, extensible set of contradiction rules
#[derive(Debug, Clone)]
pub struct RuleTable {
    rules: Vec<ContradictionRule>,
}

impl Default for RuleTable {
    fn default() -> Self {
        Self {
            rules: vec![
                ContradictionRule::new(
                    "stress_sleep",
                    "Contradiction detected: low stress with very low sleep",
                    stress_sleep,
                ),
                ContradictionRule::new(
                    "dental_visit_brushing",
                    "Contradiction detected: never dental visit with regular brushing",
                    dental_visit_brushing,
                ),
            ],
        }
    }
}

impl RuleTable {
    /// A table with no rules
    pub fn empty() -> Self {
        Self { rules: Vec::new() }
    }

    /// Add a rule. A rule reusing an existing key replaces it.
    pub fn push(&mut self, rule: ContradictionRule) {
        if let Some(existing) = self.rules.iter_mut().find(|r| r.key == rule.key) {
            *existing = rule;
        } else {
            self.rules.push(rule);
        }
    }

    pub fn keys(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.rules.iter().map(|r| r.key)
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Every rule that currently holds, in table order
    pub fn evaluate(&self, answers: &AnswerStore) -> Vec<Contradiction> {
        self.rules
            .iter()
            .filter_map(|rule| {
                rule.evaluate(answers).map(|fields| Contradiction {
                    key: rule.key,
                    reason: rule.reason,
                    fields,
                })
            })
            .collect()
    }
}

fn fields_of(answers: &AnswerStore, ids: &[&str]) -> ConflictFields {
    ids.iter()
        .map(|id| (id.to_string(), answers.get(id).clone()))
        .collect()
}

/// "Low" stress reported alongside four hours of sleep or less
fn stress_sleep(answers: &AnswerStore) -> Option<ConflictFields> {
    let stress = answers.get("stress_level").as_str()?;
    let sleep = answers.get("sleep_hours").as_number()?;
    (stress == "Low" && sleep <= 4.0).then(|| fields_of(answers, &["stress_level", "sleep_hours"]))
}

/// Never visited a dentist yet brushing twice a day or more
fn dental_visit_brushing(answers: &AnswerStore) -> Option<ConflictFields> {
    let last_visit = answers.get("last_dental_visit").as_str()?;
    let brushing = answers.get("brushing_frequency").as_number()?;
    (last_visit == "Never" && brushing >= 2.0)
        .then(|| fields_of(answers, &["last_dental_visit", "brushing_frequency"]))
}
