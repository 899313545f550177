// src/ai/prompt.rs

use std::fmt::Write;

use crate::{
    analytics::round_to,
    config::TEMPLATE_QUESTION_ROWS,
    models::{analytics::AnalysisData, student::Gender},
};

const MAX_LISTED_STUDENTS: usize = 15;

const INSTRUCTIONS: &str = r#"
Генерирай 5 ОТДЕЛНИ анализа (всеки до 150 думи):

1. LOWEST_RESULTS: Анализ на най-ниските резултати - защо учениците имат затруднения,
   конкретни теми с проблеми, възможни причини.

2. HIGHEST_RESULTS: Анализ на най-високите резултати - какво учениците владеят добре,
   силни страни, теми които са усвоени отлично.

3. GAPS_ANALYSIS: Основни пропуски в учебното съдържание - конкретни теми,
   области които се нуждаят от внимание, какво липсва.

4. RESULTS_ANALYSIS: Общ анализ на резултатите - сравнение на силни и слаби,
   разпределение, причини за резултатите, общи тенденции.

5. IMPROVEMENT_MEASURES: Конкретни мерки за подобрение - поне 5 точки,
   практически препоръки, методи за преодоляване на пропуските.

ВАЖНО:
- Пиши на професионален, но разбираем български език
- Бъди конкретен и конструктивен
- Използвай данните за анализ
- Всеки анализ трябва да е отделен параграф
- НЕ използвай markdown форматиране (**, ##, и т.н.)

ФОРМАТ НА ОТГОВОРА - ЗАДЪЛЖИТЕЛНО използвай ТОЧНО тези заглавия:
LOWEST_RESULTS:
[текст тук]

HIGHEST_RESULTS:
[текст тук]

GAPS_ANALYSIS:
[текст тук]

RESULTS_ANALYSIS:
[текст тук]

IMPROVEMENT_MEASURES:
[текст тук]
"#;

fn gender_label(gender: Gender) -> &'static str {
    match gender {
        Gender::Male => "М",
        Gender::Female => "Ж",
        Gender::Unknown => "",
    }
}

/// Per-student lines, best first. Only available after a fresh computation.
fn student_details(data: &AnalysisData) -> String {
    let mut rows: Vec<(&str, &str, f64, Option<f64>, f64)> = data
        .students
        .iter()
        .filter_map(|student| {
            let result = data
                .results
                .iter()
                .find(|r| r.student_id.as_deref() == Some(student.id.as_str()))?;
            if !result.is_participating() {
                return None;
            }
            let points = result.points.unwrap_or(0.0);
            let percentage = result.percentage.or_else(|| {
                (data.max_points_test > 0.0)
                    .then(|| round_to(points / data.max_points_test * 100.0, 1))
            });
            Some((
                student.name.as_deref().unwrap_or("Unknown"),
                gender_label(student.gender),
                points,
                percentage,
                result.grade.unwrap_or(0.0),
            ))
        })
        .collect();

    if rows.is_empty() {
        return String::new();
    }
    rows.sort_by(|a, b| b.2.total_cmp(&a.2));

    let mut out = String::from("\n\nДЕТАЙЛИ ЗА УЧЕНИЦИТЕ:\n");
    for (name, gender, points, percentage, grade) in rows.into_iter().take(MAX_LISTED_STUDENTS) {
        let _ = write!(out, "- {} ({}): {}т.", name, gender, points);
        if let Some(p) = percentage {
            let _ = write!(out, " ({}%)", p);
        }
        let _ = writeln!(out, ", Оценка: {}/6.00", grade);
    }
    out
}

/// Builds the analysis prompt from the assembled test data.
pub fn build_prompt(data: &AnalysisData) -> String {
    let stats = &data.statistics;
    let mut prompt = String::new();

    let _ = writeln!(
        prompt,
        "Ти си опитен учител по {}. Направи професионален анализ на резултатите от тест.\n",
        data.subject
    );
    let _ = writeln!(prompt, "ДАННИ ЗА ТЕСТА:");
    let _ = writeln!(prompt, "- Име на теста: {}", data.test_name);
    let _ = writeln!(prompt, "- Клас: {}", data.class_name);
    let _ = writeln!(prompt, "- Предмет: {}", data.subject);
    let _ = writeln!(prompt, "- Общ брой точки на теста: {}т.", data.max_points_test);

    if data.total_questions > 0 {
        let _ = write!(prompt, "- Структура на теста: {} общо въпроси", data.total_questions);
        if data.mc_questions > 0 {
            let _ = write!(prompt, ", {} изборни", data.mc_questions);
        }
        if data.short_questions > 0 {
            let _ = write!(prompt, ", {} кратки", data.short_questions);
        }
        prompt.push('\n');
    }

    let _ = writeln!(prompt, "- Брой ученици в класа: {}", stats.total_students);
    let _ = writeln!(prompt, "- Ученици, които са взели теста: {}", stats.participated_count);
    if stats.boys_count > 0 || stats.girls_count > 0 {
        let _ = writeln!(
            prompt,
            "- Ученици: {} момчета, {} момичета",
            stats.boys_count, stats.girls_count
        );
    }
    let _ = writeln!(
        prompt,
        "- Резултати: Минимум {}т., Максимум {}т., Средно {}т.",
        stats.min_points, stats.max_points, stats.avg_points
    );
    let _ = writeln!(prompt, "- Средна оценка: {}/6.00", stats.avg_grade);

    let distribution: Vec<String> = stats
        .grade_distribution
        .iter()
        .rev()
        .filter(|(_, count)| **count > 0)
        .map(|(grade, count)| {
            let pct = stats.grade_percentages.get(grade).copied().unwrap_or(0.0);
            format!("{} ученика с оценка {} ({}%)", count, grade, pct)
        })
        .collect();
    if !distribution.is_empty() {
        let _ = writeln!(prompt, "- Разпределение по оценки: {}", distribution.join(", "));
    }

    if stats.good_grades_percentage > 0.0 || stats.pass_rate > 0.0 {
        let _ = writeln!(prompt, "\nСТАТИСТИКИ (изчислени с формули):");
        let _ = writeln!(
            prompt,
            "- Процент на добри оценки (5-6): {}%",
            stats.good_grades_percentage
        );
        let _ = writeln!(prompt, "- Процент на успеваемост (≥3.00): {}%", stats.pass_rate);
        if stats.avg_percentage > 0.0 {
            let _ = writeln!(prompt, "- Среден процент: {}%", stats.avg_percentage);
        }
        if stats.non_participating_count > 0 {
            let _ = writeln!(
                prompt,
                "- Ученици, които НЕ са участвали: {}",
                stats.non_participating_count
            );
        }
    }

    prompt.push_str(&student_details(data));

    if data.total_questions > 0 {
        let _ = writeln!(
            prompt,
            "\nУСПЕХ ПО ВЪПРОСИ (колко % от учениците са отговорили правилно):"
        );
        for i in 1..=data.total_questions.min(TEMPLATE_QUESTION_ROWS) {
            let _ = writeln!(prompt, "- Въпрос {}: {}", i, data.success_label(i));
        }
    }

    prompt.push_str(INSTRUCTIONS);
    prompt
}
