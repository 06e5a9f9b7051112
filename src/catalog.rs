//! Question catalog
//!
//! Ordered question descriptors with a prompt per reading level. The session
//! core only ever reads identifiers from here; it never validates prompts.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::error::SessionError;
use crate::types::{AnswerValue, ReadingLevel};

/// Shape of the answer a question expects
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnswerShape {
    Number,
    Text,
    Choice,
}

/// A question descriptor
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Question {
    pub id: String,
    /// Interview module the question belongs to
    pub module: String,
    pub shape: AnswerShape,
    /// Fixed choices, for `Choice` questions
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<String>,
    pub prompts: HashMap<ReadingLevel, String>,
}

impl Question {
    fn new(
        id: &str,
        module: &str,
        shape: AnswerShape,
        options: &[&str],
        [simple, standard, clinical]: [&str; 3],
    ) -> Self {
        let prompts = HashMap::from([
            (ReadingLevel::Simple, simple.to_string()),
            (ReadingLevel::Standard, standard.to_string()),
            (ReadingLevel::Clinical, clinical.to_string()),
        ]);
        Self {
            id: id.to_string(),
            module: module.to_string(),
            shape,
            options: options.iter().map(|o| o.to_string()).collect(),
            prompts,
        }
    }

    /// Prompt for a reading level, falling back to standard wording
    pub fn prompt(&self, level: ReadingLevel) -> &str {
        self.prompts
            .get(&level)
            .or_else(|| self.prompts.get(&ReadingLevel::Standard))
            .map(String::as_str)
            .unwrap_or(self.id.as_str())
    }

    /// Build a typed answer from raw input text
    pub fn parse_answer(&self, raw: &str) -> Result<AnswerValue, SessionError> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Ok(AnswerValue::Absent);
        }
        match self.shape {
            AnswerShape::Number => raw.parse::<f64>().map(AnswerValue::Number).map_err(|e| {
                SessionError::ParseError(format!("{}: expected a number, got {raw:?}: {e}", self.id))
            }),
            AnswerShape::Text => Ok(AnswerValue::Text(raw.to_string())),
            AnswerShape::Choice => {
                if self.options.iter().any(|o| o == raw) {
                    Ok(AnswerValue::Choice(raw.to_string()))
                } else {
                    Err(SessionError::ParseError(format!(
                        "{}: {raw:?} is not one of {:?}",
                        self.id, self.options
                    )))
                }
            }
        }
    }
}

/// Ordered list of questions
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Catalog {
    questions: Vec<Question>,
}

impl Default for Catalog {
    fn default() -> Self {
        use AnswerShape::{Choice, Number};

        Self {
            questions: vec![
                Question::new(
                    "household_size",
                    "household",
                    Number,
                    &[],
                    [
                        "How many people live in your home?",
                        "How many people live in your household?",
                        "Household size (number of residents)?",
                    ],
                ),
                Question::new(
                    "brushing_frequency",
                    "oral",
                    Number,
                    &[],
                    [
                        "How many times do you brush your teeth each day?",
                        "On average, how many times per day do you brush your teeth?",
                        "Mean daily toothbrushing frequency?",
                    ],
                ),
                Question::new(
                    "last_dental_visit",
                    "oral",
                    Choice,
                    &["Within 6 months", "6–12 months", "More than 1 year", "Never"],
                    [
                        "When was your last dental visit?",
                        "When did you most recently see a dentist?",
                        "Most recent dental examination timeframe?",
                    ],
                ),
                Question::new(
                    "stress_level",
                    "stress",
                    Choice,
                    &["Low", "Moderate", "High"],
                    [
                        "How stressed do you feel most days?",
                        "How would you rate your typical stress level?",
                        "Self-reported perceived stress level?",
                    ],
                ),
                Question::new(
                    "sleep_hours",
                    "stress",
                    Number,
                    &[],
                    [
                        "About how many hours do you sleep most nights?",
                        "On average, how many hours of sleep do you get per night?",
                        "Average nightly sleep duration (hours)?",
                    ],
                ),
                Question::new(
                    "dmft_score",
                    "exam",
                    Number,
                    &[],
                    [
                        "Dental exam score (demo): enter a number",
                        "DMFT score (demo): enter a number",
                        "DMFT index value (Decayed, Missing, Filled Teeth)?",
                    ],
                ),
                Question::new(
                    "dna_sample_collected",
                    "samples",
                    Choice,
                    &["Yes", "No"],
                    [
                        "Did we collect a DNA sample today?",
                        "Was a DNA sample collected during this visit?",
                        "DNA specimen collected (Y/N)?",
                    ],
                ),
                Question::new(
                    "water_source",
                    "environment",
                    Choice,
                    &["City water", "Well water", "Bottled water", "Other"],
                    [
                        "What kind of water do you drink most often?",
                        "Primary drinking water source?",
                        "Primary household drinking water source classification?",
                    ],
                ),
            ],
        }
    }
}

impl Catalog {
    /// Load a catalog from JSON
    pub fn from_json(json: &str) -> Result<Self, SessionError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn questions(&self) -> &[Question] {
        &self.questions
    }

    pub fn get(&self, id: &str) -> Option<&Question> {
        self.questions.iter().find(|q| q.id == id)
    }

    /// Lookup that reports unknown identifiers as an error
    pub fn require(&self, id: &str) -> Result<&Question, SessionError> {
        self.get(id)
            .ok_or_else(|| SessionError::UnknownQuestion(id.to_string()))
    }

    /// Module tags in first-appearance order
    pub fn modules(&self) -> Vec<&str> {
        let mut modules: Vec<&str> = Vec::new();
        for q in &self.questions {
            if !modules.contains(&q.module.as_str()) {
                modules.push(q.module.as_str());
            }
        }
        modules
    }

    /// Questions in a module, in catalog order
    pub fn in_module<'a>(&'a self, module: &'a str) -> impl Iterator<Item = &'a Question> + 'a {
        self.questions.iter().filter(move |q| q.module == module)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_catalog_modules() {
        let catalog = Catalog::default();
        assert_eq!(catalog.questions().len(), 8);
        assert_eq!(
            catalog.modules(),
            vec!["household", "oral", "stress", "exam", "samples", "environment"]
        );
        assert_eq!(catalog.in_module("oral").count(), 2);
    }

    #[test]
    fn test_prompt_per_level() {
        let catalog = Catalog::default();
        let q = catalog.get("sleep_hours").unwrap();
        assert_eq!(
            q.prompt(ReadingLevel::Clinical),
            "Average nightly sleep duration (hours)?"
        );
        assert_eq!(
            q.prompt(ReadingLevel::Simple),
            "About how many hours do you sleep most nights?"
        );
    }

    #[test]
    fn test_parse_answer_by_shape() {
        let catalog = Catalog::default();

        let sleep = catalog.require("sleep_hours").unwrap();
        assert_eq!(sleep.parse_answer("3").unwrap(), AnswerValue::Number(3.0));
        assert!(sleep.parse_answer("three").is_err());
        assert_eq!(sleep.parse_answer("").unwrap(), AnswerValue::Absent);

        let stress = catalog.require("stress_level").unwrap();
        assert_eq!(
            stress.parse_answer("Low").unwrap(),
            AnswerValue::Choice("Low".to_string())
        );
        assert!(stress.parse_answer("Extreme").is_err());
    }

    #[test]
    fn test_unknown_question() {
        let catalog = Catalog::default();
        assert!(matches!(
            catalog.require("favorite_color"),
            Err(SessionError::UnknownQuestion(_))
        ));
    }

    #[test]
    fn test_catalog_json_roundtrip() {
        let json = serde_json::to_string(&Catalog::default()).unwrap();
        let loaded = Catalog::from_json(&json).unwrap();
        assert_eq!(loaded.questions().len(), 8);
        assert_eq!(loaded.get("water_source").unwrap().options.len(), 4);
    }
}
