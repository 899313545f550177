// src/models/test.rs

use serde::{Deserialize, Serialize};

/// Coarse classification of a question.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionKind {
    MultipleChoice,
    ShortAnswer,
    Unknown,
}

/// One entry of a test's question sequence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Question {
    /// Optional identifier as stored in the test definition.
    pub id: Option<String>,

    pub kind: QuestionKind,

    /// Point value. Always > 0 after normalization (defaults to 1).
    pub points: f64,
}

/// Represents a row of the 'tests' table, normalized.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestDefinition {
    pub id: String,
    pub name: String,
    pub subject: Option<String>,
    pub teacher_name: Option<String>,
    pub questions: Vec<Question>,

    /// `total_questions` as declared on the test row. May be stale.
    pub declared_question_count: usize,

    /// Declared maximum points for the whole test.
    pub max_points: Option<f64>,

    pub declared_mc_questions: usize,
    pub declared_short_questions: usize,
}

impl TestDefinition {
    /// The question sequence length wins over the declared count whenever it is non-empty.
    pub fn effective_question_count(&self) -> usize {
        if self.questions.is_empty() {
            self.declared_question_count
        } else {
            self.questions.len()
        }
    }

    /// Returns `(multiple_choice, short_answer)` counts.
    ///
    /// Declared counts are kept when non-zero; zeros are filled in by classifying the
    /// question list. Unclassifiable questions count as multiple choice.
    pub fn question_type_counts(&self) -> (usize, usize) {
        let mut mc = self.declared_mc_questions;
        let mut short = self.declared_short_questions;

        if (mc == 0 || short == 0) && !self.questions.is_empty() {
            let mut mc_count = 0;
            let mut short_count = 0;
            for q in &self.questions {
                match q.kind {
                    QuestionKind::ShortAnswer => short_count += 1,
                    QuestionKind::MultipleChoice | QuestionKind::Unknown => mc_count += 1,
                }
            }

            if mc == 0 {
                mc = mc_count;
            }
            if short == 0 {
                short = short_count;
            }
            if mc == 0 && short == 0 {
                tracing::warn!(
                    "Could not determine question types, defaulting all {} to MC",
                    self.questions.len()
                );
                mc = self.questions.len();
            }
        }

        (mc, short)
    }
}

/// Represents a row of the 'classes' table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassInfo {
    pub id: String,
    pub name: String,
    pub teacher_name: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn question(kind: QuestionKind) -> Question {
        Question {
            id: None,
            kind,
            points: 1.0,
        }
    }

    fn test_with(questions: Vec<Question>, declared: usize) -> TestDefinition {
        TestDefinition {
            id: "t1".to_string(),
            name: "Test".to_string(),
            subject: None,
            teacher_name: None,
            questions,
            declared_question_count: declared,
            max_points: None,
            declared_mc_questions: 0,
            declared_short_questions: 0,
        }
    }

    #[test]
    fn test_sequence_length_overrides_declared_count() {
        let test = test_with(vec![question(QuestionKind::Unknown); 19], 3);
        assert_eq!(test.effective_question_count(), 19);
    }

    #[test]
    fn test_declared_count_used_when_sequence_empty() {
        let test = test_with(vec![], 12);
        assert_eq!(test.effective_question_count(), 12);
    }

    #[test]
    fn test_question_type_counts_from_sequence() {
        let test = test_with(
            vec![
                question(QuestionKind::MultipleChoice),
                question(QuestionKind::ShortAnswer),
                question(QuestionKind::Unknown),
            ],
            3,
        );
        assert_eq!(test.question_type_counts(), (2, 1));
    }

    #[test]
    fn test_declared_type_counts_are_kept() {
        let mut test = test_with(vec![question(QuestionKind::ShortAnswer)], 1);
        test.declared_mc_questions = 4;
        test.declared_short_questions = 2;
        assert_eq!(test.question_type_counts(), (4, 2));
    }
}
