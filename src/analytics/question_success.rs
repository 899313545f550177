// src/analytics/question_success.rs

use crate::{
    analytics::round_to,
    models::{
        analytics::QuestionSuccessRates,
        result::{QuestionRef, QuestionResult, ResultRecord},
        test::TestDefinition,
    },
};

/// Accepted keys for ordinal `i`: the real question id first, then positional aliases.
fn accepted_keys(question_id: Option<&str>, i: usize) -> Vec<String> {
    let mut keys = Vec::with_capacity(5);
    if let Some(id) = question_id {
        keys.push(id.trim().to_lowercase());
    }
    keys.push(format!("q{}", i));
    keys.push(i.to_string());
    keys.push(format!("question{}", i));
    keys.push(format!("question_{}", i));
    keys
}

fn matches(question_ref: &QuestionRef, keys: &[String], i: usize) -> bool {
    if keys.contains(&question_ref.key()) {
        return true;
    }
    matches!(question_ref, QuestionRef::Number(n) if n.trunc() as i64 == i as i64)
}

/// Finds the sub-result for ordinal `i` in one student's answers.
///
/// Falls back to position `i - 1`, but only while `i` lies within the question
/// list and the candidate carries no id or an accepted one.
fn find_sub_result<'a>(
    sub_results: &'a [QuestionResult],
    keys: &[String],
    i: usize,
    question_count: usize,
) -> Option<&'a QuestionResult> {
    let by_key = sub_results.iter().find(|qr| {
        qr.question_ref
            .as_ref()
            .is_some_and(|r| matches(r, keys, i))
    });
    if by_key.is_some() {
        return by_key;
    }

    if i > question_count {
        return None;
    }
    let candidate = sub_results.get(i - 1)?;
    match &candidate.question_ref {
        None => Some(candidate),
        Some(r) if keys.contains(&r.key()) => Some(candidate),
        Some(r) => {
            tracing::debug!(
                "Q{}: skipped positional match, id mismatch (result id: {})",
                i,
                r.key()
            );
            None
        }
    }
}

/// Computes the success rate of every question ordinal in `1..=effective_question_count`.
///
/// The rate is relative to every participating result, so a missing answer lowers it.
pub fn calculate_question_success(
    results: &[ResultRecord],
    test: &TestDefinition,
) -> QuestionSuccessRates {
    let total_questions = test.effective_question_count();
    let participating: Vec<&ResultRecord> =
        results.iter().filter(|r| r.is_participating()).collect();

    if participating.is_empty() {
        tracing::debug!(
            "No valid results - returning 0% for all {} questions",
            total_questions
        );
        return (1..=total_questions).map(|i| (i, "0%".to_string())).collect();
    }

    tracing::info!(
        "Calculating question success for {} questions over {} results",
        total_questions,
        participating.len()
    );

    let question_count = test.questions.len();
    let mut rates = QuestionSuccessRates::new();

    for i in 1..=total_questions {
        let question = test.questions.get(i - 1);
        let max_points = question.map(|q| q.points).filter(|p| *p > 0.0).unwrap_or(1.0);
        let keys = accepted_keys(question.and_then(|q| q.id.as_deref()), i);

        let mut earned = 0.0;
        let mut answered = 0usize;
        for result in &participating {
            let Some(sub_results) = result.question_results.as_deref() else {
                continue;
            };
            if let Some(qr) = find_sub_result(sub_results, &keys, i, question_count) {
                earned += qr.points.max(0.0);
                answered += 1;
            }
        }

        let possible = max_points * participating.len() as f64;
        let rate = round_to(earned / possible * 100.0, 0).clamp(0.0, 100.0) as u32;

        if answered == 0 {
            tracing::warn!("Q{}: no matching answers found (looked for {:?})", i, keys);
        } else {
            tracing::debug!(
                "Q{}: {}% (earned {:.2} of {:.1}, answered {}/{})",
                i,
                rate,
                earned,
                possible,
                answered,
                participating.len()
            );
        }

        rates.insert(i, format!("{}%", rate));
    }

    rates
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::test::{Question, QuestionKind};

    fn question(id: Option<&str>, points: f64) -> Question {
        Question {
            id: id.map(str::to_string),
            kind: QuestionKind::MultipleChoice,
            points,
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

    fn answer(question_ref: Option<QuestionRef>, points: f64) -> QuestionResult {
        QuestionResult { question_ref, points }
    }

    fn key(k: &str) -> Option<QuestionRef> {
        Some(QuestionRef::Key(k.to_string()))
    }

    fn result_with(answers: Option<Vec<QuestionResult>>) -> ResultRecord {
        ResultRecord {
            student_id: Some("s".to_string()),
            points: Some(10.0),
            grade: Some(4.0),
            percentage: None,
            participated: true,
            cancelled: false,
            question_results: answers,
            created_at: None,
        }
    }

    #[test]
    fn test_unanswered_lowers_the_rate() {
        let test = test_with(vec![question(Some("A1"), 2.0)], 1);
        let mut results: Vec<ResultRecord> = (0..6)
            .map(|_| result_with(Some(vec![answer(key("a1"), 2.0)])))
            .collect();
        results.extend((0..4).map(|_| result_with(Some(vec![]))));

        let rates = calculate_question_success(&results, &test);
        assert_eq!(rates[&1], "60%");
    }

    #[test]
    fn test_every_ordinal_present_and_bounded() {
        let questions = (0..19).map(|_| question(None, 1.0)).collect();
        let test = test_with(questions, 3);
        let results = vec![result_with(Some(vec![
            answer(None, 1.0),
            answer(None, 5.0),
        ]))];

        let rates = calculate_question_success(&results, &test);
        assert_eq!(rates.len(), 19);
        assert_eq!(rates[&1], "100%");
        // over-scoring is clamped
        assert_eq!(rates[&2], "100%");
        assert_eq!(rates[&19], "0%");
        for label in rates.values() {
            let value: u32 = label.trim_end_matches('%').parse().unwrap();
            assert!(value <= 100);
        }
    }

    #[test]
    fn test_matching_by_aliases_and_numeric_id() {
        let test = test_with(vec![question(None, 1.0); 4], 4);
        let results = vec![result_with(Some(vec![
            answer(Some(QuestionRef::Number(4.0)), 1.0),
            answer(key("Question_3"), 1.0),
            answer(key("Q1"), 1.0),
            answer(key("2"), 0.0),
        ]))];

        let rates = calculate_question_success(&results, &test);
        assert_eq!(rates[&1], "100%");
        assert_eq!(rates[&2], "0%");
        assert_eq!(rates[&3], "100%");
        assert_eq!(rates[&4], "100%");
    }

    #[test]
    fn test_positional_fallback_rejects_mismatched_id() {
        let test = test_with(
            vec![question(Some("x1"), 1.0), question(Some("x2"), 1.0)],
            2,
        );
        // The second entry sits at position 2 but names an unknown question.
        let results = vec![result_with(Some(vec![
            answer(None, 1.0),
            answer(key("zzz"), 1.0),
        ]))];

        let rates = calculate_question_success(&results, &test);
        assert_eq!(rates[&1], "100%");
        assert_eq!(rates[&2], "0%");
    }

    #[test]
    fn test_declared_count_without_question_list() {
        let test = test_with(vec![], 3);
        let results = vec![result_with(Some(vec![
            answer(key("q1"), 1.0),
            answer(None, 1.0),
        ]))];

        let rates = calculate_question_success(&results, &test);
        assert_eq!(rates.len(), 3);
        assert_eq!(rates[&1], "100%");
        // no positional fallback beyond the question list
        assert_eq!(rates[&2], "0%");
    }

    #[test]
    fn test_no_participants() {
        let test = test_with(vec![question(None, 1.0); 5], 5);
        let mut cancelled = result_with(Some(vec![answer(None, 1.0)]));
        cancelled.cancelled = true;

        let rates = calculate_question_success(&[cancelled], &test);
        assert_eq!(rates.len(), 5);
        assert!(rates.values().all(|r| r == "0%"));
    }

    #[test]
    fn test_results_without_answers_count_in_denominator() {
        let test = test_with(vec![question(Some("a"), 1.0)], 1);
        let results = vec![
            result_with(Some(vec![answer(key("a"), 1.0)])),
            result_with(None),
        ];
        let rates = calculate_question_success(&results, &test);
        assert_eq!(rates[&1], "50%");
    }

    #[test]
    fn test_idempotent() {
        let test = test_with(vec![question(Some("a"), 3.0); 3], 3);
        let results = vec![
            result_with(Some(vec![answer(key("a"), 2.0)])),
            result_with(Some(vec![answer(None, 1.0)])),
        ];
        assert_eq!(
            calculate_question_success(&results, &test),
            calculate_question_success(&results, &test)
        );
    }
}
