// src/models/result.rs

use serde::{Deserialize, Serialize};

/// How a per-question sub-result names its question.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum QuestionRef {
    Number(f64),
    Key(String),
}

impl QuestionRef {
    /// Lowercased textual form used for key comparison (`3.0` reads as `"3"`).
    pub fn key(&self) -> String {
        match self {
            QuestionRef::Key(k) => k.trim().to_lowercase(),
            QuestionRef::Number(n) if n.fract() == 0.0 => format!("{}", *n as i64),
            QuestionRef::Number(n) => n.to_string(),
        }
    }
}

/// Points earned on a single question by one student.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestionResult {
    pub question_ref: Option<QuestionRef>,

    /// Missing, unparsable or negative values are stored as 0.
    pub points: f64,
}

/// Represents a row of the 'results' table, normalized.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultRecord {
    pub student_id: Option<String>,

    /// `None` marks the result as not valid for points statistics.
    pub points: Option<f64>,

    pub grade: Option<f64>,

    /// Percentage stored on the row, if any.
    pub percentage: Option<f64>,

    pub participated: bool,
    pub cancelled: bool,

    /// `None` when the row has no usable per-question data.
    pub question_results: Option<Vec<QuestionResult>>,

    pub created_at: Option<String>,
}

impl ResultRecord {
    /// `participated` and not `cancelled`.
    pub fn is_participating(&self) -> bool {
        self.participated && !self.cancelled
    }
}
