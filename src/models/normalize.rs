// src/models/normalize.rs

//! Maps raw record rows (as JSON objects) into the internal model.
//!
//! Rows in the records store are not uniform: the same concept shows up under
//! alternate field names, numbers arrive as strings, and nested lists may be
//! stored as JSON-encoded text. Every "try field A, then B" rule lives here so
//! the calculators only ever see normalized types.

use serde_json::Value;

use crate::models::{
    result::{QuestionRef, QuestionResult, ResultRecord},
    student::{Gender, StudentRecord},
    test::{ClassInfo, Question, QuestionKind, TestDefinition},
};

const MC_PATTERNS: [&str; 8] = [
    "multiple", "mc", "choice", "select", "radio", "checkbox", "избор", "множествен",
];
const SHORT_PATTERNS: [&str; 8] = [
    "short", "text", "answer", "open", "essay", "string", "кратък", "отворен",
];

/// First present, non-null field among `names`.
fn field<'a>(row: &'a Value, names: &[&str]) -> Option<&'a Value> {
    names
        .iter()
        .filter_map(|name| row.get(name))
        .find(|v| !v.is_null())
}

/// Strings and numbers as text. Blank strings count as absent.
fn text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => {
            let s = s.trim();
            (!s.is_empty()).then(|| s.to_string())
        }
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn text_field(row: &Value, names: &[&str]) -> Option<String> {
    field(row, names).and_then(text)
}

/// Numbers and numeric strings.
fn number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok().filter(|n| n.is_finite()),
        _ => None,
    }
}

fn number_field(row: &Value, names: &[&str]) -> Option<f64> {
    field(row, names).and_then(number)
}

fn count_field(row: &Value, names: &[&str]) -> usize {
    number_field(row, names)
        .filter(|n| *n > 0.0)
        .map(|n| n as usize)
        .unwrap_or(0)
}

fn bool_field(row: &Value, name: &str, default: bool) -> bool {
    match row.get(name) {
        Some(Value::Bool(b)) => *b,
        Some(Value::Number(n)) => n.as_f64().map(|n| n != 0.0).unwrap_or(default),
        Some(Value::String(s)) => match s.trim().to_lowercase().as_str() {
            "true" | "1" | "yes" | "t" => true,
            "false" | "0" | "no" | "f" => false,
            _ => default,
        },
        _ => default,
    }
}

/// A JSON array, possibly stored as JSON-encoded text.
fn list(value: &Value, what: &str) -> Option<Vec<Value>> {
    match value {
        Value::Array(items) => Some(items.clone()),
        Value::String(s) => match serde_json::from_str::<Value>(s) {
            Ok(Value::Array(items)) => Some(items),
            Ok(_) => {
                tracing::warn!("{} is not a JSON array", what);
                None
            }
            Err(e) => {
                tracing::warn!("Failed to parse {} JSON: {}", what, e);
                None
            }
        },
        _ => None,
    }
}

/// Point value of a question: positive, defaulting to 1.
fn question_points(raw: &Value) -> f64 {
    number_field(raw, &["points", "max_points"])
        .filter(|p| *p > 0.0)
        .unwrap_or(1.0)
}

fn question_kind(raw: &Value) -> QuestionKind {
    let declared = text_field(raw, &["type", "question_type", "kind", "questionType"])
        .map(|t| t.to_lowercase());

    if let Some(t) = declared {
        if MC_PATTERNS.iter().any(|p| t.contains(p)) {
            return QuestionKind::MultipleChoice;
        }
        if SHORT_PATTERNS.iter().any(|p| t.contains(p)) {
            return QuestionKind::ShortAnswer;
        }
    }

    if has_options(raw) {
        QuestionKind::MultipleChoice
    } else {
        QuestionKind::Unknown
    }
}

fn has_options(raw: &Value) -> bool {
    ["options", "choices", "answers"]
        .iter()
        .any(|k| raw.get(k).is_some())
}

pub fn question(raw: &Value) -> Question {
    Question {
        id: text_field(raw, &["id"]),
        kind: question_kind(raw),
        points: question_points(raw),
    }
}

/// Normalizes a 'tests' row.
pub fn test_definition(row: &Value) -> TestDefinition {
    let questions: Vec<Question> = match row.get("questions") {
        Some(raw) => list(raw, "questions")
            .unwrap_or_default()
            .iter()
            .map(question)
            .collect(),
        None => {
            tracing::warn!("Test does not have 'questions' field");
            Vec::new()
        }
    };

    TestDefinition {
        id: text_field(row, &["id"]).unwrap_or_default(),
        name: text_field(row, &["name", "title"]).unwrap_or_else(|| "Unknown Test".to_string()),
        subject: text_field(row, &["subject"]),
        teacher_name: text_field(row, &["teacher_name"]),
        questions,
        declared_question_count: count_field(row, &["total_questions"]),
        max_points: number_field(row, &["max_points"]).filter(|p| *p > 0.0),
        declared_mc_questions: count_field(row, &["mc_questions"]),
        declared_short_questions: count_field(row, &["short_questions"]),
    }
}

pub fn class_info(row: &Value) -> ClassInfo {
    ClassInfo {
        id: text_field(row, &["id"]).unwrap_or_default(),
        name: text_field(row, &["name"]).unwrap_or_else(|| "Unknown Class".to_string()),
        teacher_name: text_field(row, &["teacher_name"]),
    }
}

pub fn student(row: &Value) -> StudentRecord {
    StudentRecord {
        id: text_field(row, &["id", "student_id"]).unwrap_or_default(),
        name: text_field(row, &["name"]),
        gender: text_field(row, &["gender"])
            .map(|g| Gender::parse(&g))
            .unwrap_or(Gender::Unknown),
        class_id: text_field(row, &["class_id"]),
    }
}

fn question_ref(raw: &Value) -> Option<QuestionRef> {
    match field(raw, &["questionId", "question_id", "id"])? {
        Value::Number(n) => n
            .as_f64()
            .filter(|n| *n != 0.0)
            .map(QuestionRef::Number),
        Value::String(s) => {
            let s = s.trim();
            (!s.is_empty()).then(|| QuestionRef::Key(s.to_string()))
        }
        _ => None,
    }
}

pub fn question_result(raw: &Value) -> QuestionResult {
    // An explicit 0 is a real score; only absent or unparsable values default.
    let points = number_field(raw, &["points", "point"])
        .map(|p| p.max(0.0))
        .unwrap_or(0.0);

    QuestionResult {
        question_ref: question_ref(raw),
        points,
    }
}

/// Normalizes a 'results' row.
pub fn result(row: &Value) -> ResultRecord {
    let grade = match field(row, &["grade"]) {
        Some(raw) => {
            let parsed = number(raw);
            if parsed.is_none() {
                tracing::warn!("Invalid grade value: {}", raw);
            }
            parsed
        }
        None => None,
    };

    let question_results = field(row, &["question_results", "questionResults"])
        .and_then(|raw| list(raw, "question_results"))
        .map(|items| items.iter().map(question_result).collect());

    ResultRecord {
        student_id: text_field(row, &["student_id", "student"]),
        points: number_field(row, &["points", "total_points"]),
        grade,
        percentage: number_field(row, &["percentage"]),
        participated: bool_field(row, "participated", true),
        cancelled: bool_field(row, "cancelled", false),
        question_results,
        created_at: text_field(row, &["created_at"]),
    }
}
