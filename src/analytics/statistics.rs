// src/analytics/statistics.rs

use std::collections::{BTreeMap, HashSet};

use crate::{
    analytics::round_to,
    models::{
        analytics::{AggregateStatistics, GRADE_BUCKETS},
        result::ResultRecord,
        student::{Gender, StudentRecord},
        test::TestDefinition,
    },
};

/// Maps a grade onto the five-bucket scale. Grades below 2.00 fall in no bucket.
pub fn grade_bucket(grade: f64) -> Option<u8> {
    if grade >= 5.50 {
        Some(6)
    } else if grade >= 4.50 {
        Some(5)
    } else if grade >= 3.50 {
        Some(4)
    } else if grade >= 2.50 {
        Some(3)
    } else if grade >= 2.00 {
        Some(2)
    } else {
        None
    }
}

fn percent(part: usize, whole: usize) -> f64 {
    if whole == 0 {
        0.0
    } else {
        round_to(part as f64 / whole as f64 * 100.0, 1)
    }
}

fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}

/// Computes aggregate statistics for one test over a class.
///
/// Never fails: malformed or missing data degrades to zeros.
/// Question success rates are computed separately (see `question_success`).
pub fn calculate_statistics(
    students: &[StudentRecord],
    results: &[ResultRecord],
    test: &TestDefinition,
) -> AggregateStatistics {
    tracing::debug!("Calculating statistics for test '{}'", test.name);

    let total_students = students.len();
    let boys_count = students.iter().filter(|s| s.gender == Gender::Male).count();
    let girls_count = students.iter().filter(|s| s.gender == Gender::Female).count();

    // Valid results carry a points value.
    let valid: Vec<&ResultRecord> = results.iter().filter(|r| r.points.is_some()).collect();
    let points: Vec<f64> = valid.iter().filter_map(|r| r.points).collect();

    let (min_points, max_points, avg_points) = match mean(&points) {
        Some(avg) => (
            points.iter().copied().fold(f64::INFINITY, f64::min),
            points.iter().copied().fold(f64::NEG_INFINITY, f64::max),
            round_to(avg, 1),
        ),
        None => {
            tracing::warn!("No valid results found - using default statistics");
            (0.0, 0.0, 0.0)
        }
    };

    let grades: Vec<f64> = valid.iter().filter_map(|r| r.grade).collect();
    let avg_grade = mean(&grades).map(|g| round_to(g, 2)).unwrap_or(0.0);

    let participated: Vec<&ResultRecord> = valid
        .iter()
        .copied()
        .filter(|r| r.is_participating())
        .collect();
    let participated_count = participated.len();

    let mut grade_distribution: BTreeMap<u8, usize> =
        GRADE_BUCKETS.iter().map(|b| (*b, 0)).collect();
    for bucket in participated.iter().filter_map(|r| r.grade).filter_map(grade_bucket) {
        *grade_distribution.entry(bucket).or_insert(0) += 1;
    }

    let grade_percentages: BTreeMap<u8, f64> = grade_distribution
        .iter()
        .map(|(bucket, count)| (*bucket, percent(*count, participated_count)))
        .collect();

    let bucket = |b: u8| grade_distribution.get(&b).copied().unwrap_or(0);
    let good_grades_count = bucket(5) + bucket(6);
    let good_grades_percentage = percent(good_grades_count, participated_count);

    // Everyone with a bucket other than 2 passed; sub-2.00 grades are neither.
    let bucketed: usize = grade_distribution.values().sum();
    let pass_rate = percent(bucketed - bucket(2), participated_count);

    let percentages: Vec<f64> = participated.iter().filter_map(|r| r.percentage).collect();
    let avg_percentage = mean(&percentages).map(|p| round_to(p, 1)).unwrap_or(0.0);

    let participating_students: HashSet<&str> = results
        .iter()
        .filter(|r| r.is_participating())
        .filter_map(|r| r.student_id.as_deref())
        .collect();
    let non_participating_count = total_students.saturating_sub(participating_students.len());

    tracing::debug!(
        "Grade distribution: 6={}, 5={}, 4={}, 3={}, 2={}; pass rate {}%",
        bucket(6),
        bucket(5),
        bucket(4),
        bucket(3),
        bucket(2),
        pass_rate
    );

    AggregateStatistics {
        total_students,
        boys_count,
        girls_count,
        min_points,
        max_points,
        avg_points,
        avg_grade,
        avg_percentage,
        participated_count,
        non_participating_count,
        grade_distribution,
        grade_percentages,
        good_grades_count,
        good_grades_percentage,
        pass_rate,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn student(id: usize, gender: Gender) -> StudentRecord {
        StudentRecord {
            id: format!("s{}", id),
            name: None,
            gender,
            class_id: Some("c1".to_string()),
        }
    }

    fn result(student: usize, points: Option<f64>, grade: Option<f64>) -> ResultRecord {
        ResultRecord {
            student_id: Some(format!("s{}", student)),
            points,
            grade,
            percentage: None,
            participated: true,
            cancelled: false,
            question_results: None,
            created_at: None,
        }
    }

    fn empty_test() -> TestDefinition {
        TestDefinition {
            id: "t1".to_string(),
            name: "Test".to_string(),
            subject: None,
            teacher_name: None,
            questions: vec![],
            declared_question_count: 0,
            max_points: None,
            declared_mc_questions: 0,
            declared_short_questions: 0,
        }
    }

    fn class_of(n: usize) -> Vec<StudentRecord> {
        (0..n)
            .map(|i| student(i, if i % 2 == 0 { Gender::Male } else { Gender::Female }))
            .collect()
    }

    #[test]
    fn test_grade_buckets() {
        assert_eq!(grade_bucket(6.0), Some(6));
        assert_eq!(grade_bucket(5.50), Some(6));
        assert_eq!(grade_bucket(5.49), Some(5));
        assert_eq!(grade_bucket(4.50), Some(5));
        assert_eq!(grade_bucket(3.50), Some(4));
        assert_eq!(grade_bucket(2.50), Some(3));
        assert_eq!(grade_bucket(2.49), Some(2));
        assert_eq!(grade_bucket(2.00), Some(2));
        assert_eq!(grade_bucket(1.99), None);
    }

    #[test]
    fn test_class_of_twenty_with_fifteen_results() {
        let students = class_of(20);
        let grades = [6., 6., 5., 5., 4., 4., 4., 3., 3., 3., 3., 2., 2., 2., 2.];
        let results: Vec<ResultRecord> = grades
            .iter()
            .enumerate()
            .map(|(i, g)| result(i, Some(10.0 + i as f64), Some(*g)))
            .collect();

        let stats = calculate_statistics(&students, &results, &empty_test());

        assert_eq!(stats.total_students, 20);
        assert_eq!(stats.boys_count, 10);
        assert_eq!(stats.girls_count, 10);
        assert_eq!(stats.participated_count, 15);
        assert_eq!(stats.non_participating_count, 5);

        let expected: BTreeMap<u8, usize> =
            [(6, 2), (5, 2), (4, 3), (3, 4), (2, 4)].into_iter().collect();
        assert_eq!(stats.grade_distribution, expected);

        let total_pct: f64 = stats.grade_percentages.values().sum();
        assert!((total_pct - 100.0).abs() <= 0.5, "got {}", total_pct);

        assert_eq!(stats.pass_rate, 73.3);
        assert_eq!(stats.good_grades_count, 4);
        assert_eq!(stats.good_grades_percentage, 26.7);
        assert_eq!(stats.min_points, 10.0);
        assert_eq!(stats.max_points, 24.0);
        assert_eq!(stats.avg_points, 17.0);
        assert_eq!(stats.avg_grade, 3.6);
    }

    #[test]
    fn test_sub_two_grades_are_outside_every_bucket() {
        let students = class_of(3);
        let results = vec![
            result(0, Some(5.0), Some(1.5)),
            result(1, Some(20.0), Some(6.0)),
            result(2, Some(12.0), Some(3.0)),
        ];
        let stats = calculate_statistics(&students, &results, &empty_test());

        let bucketed: usize = stats.grade_distribution.values().sum();
        assert_eq!(stats.participated_count, 3);
        assert_eq!(bucketed, 2);
        assert!(bucketed < stats.participated_count);
        assert_eq!(stats.pass_rate, 66.7);
    }

    #[test]
    fn test_distribution_skips_cancelled_and_absent() {
        let students = class_of(4);
        let mut cancelled = result(0, Some(10.0), Some(6.0));
        cancelled.cancelled = true;
        let mut absent = result(1, Some(0.0), Some(2.0));
        absent.participated = false;
        let results = vec![cancelled, absent, result(2, Some(15.0), Some(5.0))];

        let stats = calculate_statistics(&students, &results, &empty_test());
        assert_eq!(stats.participated_count, 1);
        assert_eq!(stats.grade_distribution[&5], 1);
        assert_eq!(stats.grade_distribution[&6], 0);
        assert_eq!(stats.non_participating_count, 3);
        // min/max cover every valid result, participating or not
        assert_eq!(stats.min_points, 0.0);
        assert_eq!(stats.max_points, 15.0);
    }

    #[test]
    fn test_results_without_points_are_not_valid() {
        let students = class_of(2);
        let results = vec![result(0, None, Some(6.0)), result(1, None, Some(5.0))];
        let stats = calculate_statistics(&students, &results, &empty_test());
        assert_eq!(stats.participated_count, 0);
        assert_eq!(stats.avg_grade, 0.0);
        assert_eq!(stats.pass_rate, 0.0);
        assert!(stats.grade_percentages.values().all(|p| *p == 0.0));
        // still counted as participating students
        assert_eq!(stats.non_participating_count, 0);
    }

    #[test]
    fn test_avg_percentage_uses_stored_values_only() {
        let students = class_of(3);
        let mut a = result(0, Some(10.0), Some(4.0));
        a.percentage = Some(50.0);
        let mut b = result(1, Some(18.0), Some(6.0));
        b.percentage = Some(90.0);
        let c = result(2, Some(12.0), Some(4.0));

        let stats = calculate_statistics(&students, &[a, b, c], &empty_test());
        assert_eq!(stats.avg_percentage, 70.0);
    }

    #[test]
    fn test_empty_inputs() {
        let stats = calculate_statistics(&[], &[], &empty_test());
        assert_eq!(stats.total_students, 0);
        assert_eq!(stats.avg_points, 0.0);
        assert_eq!(stats.grade_distribution.len(), 5);
    }

    #[test]
    fn test_pure_function() {
        let students = class_of(5);
        let results: Vec<ResultRecord> = (0..5)
            .map(|i| result(i, Some(i as f64 * 3.0), Some(2.0 + i as f64)))
            .collect();
        let first = calculate_statistics(&students, &results, &empty_test());
        let second = calculate_statistics(&students, &results, &empty_test());
        assert_eq!(first, second);
    }
}
