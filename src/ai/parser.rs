// src/ai/parser.rs

//! Turns free-form AI output into the five analysis sections.
//!
//! Strategies run in order until one recovers every section:
//! labeled regex extraction, then line scanning, then an equal split of the
//! raw text. Whatever comes out is finally checked section by section and
//! anything too short is replaced by its placeholder.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;

use crate::{
    config::MIN_SECTION_LEN,
    models::analytics::{AiAnalysisSections, Section},
};

const EQUAL_SPLIT_MIN_CHUNK: usize = 100;

type Extracted = [Option<String>; 5];

fn found_count(extracted: &Extracted) -> usize {
    extracted.iter().filter(|s| s.is_some()).count()
}

fn complete(extracted: Extracted) -> Option<[String; 5]> {
    if found_count(&extracted) < Section::ALL.len() {
        return None;
    }
    Some(extracted.map(Option::unwrap_or_default))
}

/// One way of recovering sections from text.
pub trait Strategy: Sync {
    fn name(&self) -> &'static str;

    /// `Some` only when every section was recovered.
    fn extract(&self, text: &str) -> Option<[String; 5]>;
}

fn regex(pattern: &str) -> Regex {
    Regex::new(pattern).expect("valid section regex")
}

/// A label and the pattern that ends its content.
struct LabelPattern {
    label: Regex,
    terminator: Option<Regex>,
}

impl LabelPattern {
    fn new(label: &str, terminator: Option<&str>) -> Self {
        Self {
            label: regex(&format!("(?i){}", label)),
            terminator: terminator.map(|t| regex(&format!(r"(?i)\n\s*(?:{})", t))),
        }
    }

    /// Text after the first label up to the next terminator or the end.
    fn capture<'a>(&self, text: &'a str) -> Option<&'a str> {
        let start = self.label.find(text)?.end();
        let rest = &text[start..];
        let end = self
            .terminator
            .as_ref()
            .and_then(|t| t.find(rest))
            .map(|m| m.start())
            .unwrap_or(rest.len());
        let content = rest[..end].trim();
        (!content.is_empty()).then_some(content)
    }
}

static LABELED_PATTERNS: LazyLock<[Vec<LabelPattern>; 5]> = LazyLock::new(|| {
    [
        vec![
            LabelPattern::new(r"LOWEST[\s_-]*RESULTS?:?\s*", Some("HIGHEST|GAPS|RESULTS|IMPROVEMENT")),
            LabelPattern::new(r"най-ниски\s+резултати:?\s*", Some("най-високи|пропуски|общ|мерки")),
        ],
        vec![
            LabelPattern::new(
                r"HIGHEST[\s_-]*RESULTS?:?\s*",
                Some(r"GAPS|RESULTS[\s_-]*ANALYSIS|IMPROVEMENT"),
            ),
            LabelPattern::new(r"най-високи\s+резултати:?\s*", Some("пропуски|общ|мерки")),
        ],
        vec![
            LabelPattern::new(
                r"GAPS[\s_-]*ANALYSIS:?\s*",
                Some(r"RESULTS[\s_-]*ANALYSIS|IMPROVEMENT"),
            ),
            LabelPattern::new(r"пропуски:?\s*", Some("общ|мерки")),
        ],
        vec![
            LabelPattern::new(r"RESULTS[\s_-]*ANALYSIS:?\s*", Some("IMPROVEMENT")),
            LabelPattern::new(r"общ\s+анализ:?\s*", Some("мерки")),
        ],
        vec![
            LabelPattern::new(r"IMPROVEMENT[\s_-]*MEASURES?:?\s*", None),
            LabelPattern::new(r"мерки:?\s*", None),
        ],
    ]
});

/// Per section, the first label pattern (English, then Bulgarian) with non-empty content.
pub struct LabeledRegex;

impl Strategy for LabeledRegex {
    fn name(&self) -> &'static str {
        "labeled regex"
    }

    fn extract(&self, text: &str) -> Option<[String; 5]> {
        let extracted: Extracted = std::array::from_fn(|i| {
            LABELED_PATTERNS[i]
                .iter()
                .find_map(|p| p.capture(text))
                .map(str::to_string)
        });
        tracing::debug!("Labeled regex found {}/5 sections", found_count(&extracted));
        complete(extracted)
    }
}

// Leading list markers and markdown emphasis are tolerated before a header.
const HEADER_PREFIX: &str = r"(?i)^[\s*#\d.)-]*";
const HEADER_SUFFIX: &str = r"[\s*:]*(.*)$";

static LINE_HEADERS: LazyLock<[Regex; 5]> = LazyLock::new(|| {
    [
        r"(?:LOWEST|най-ниски)[\s_-]*(?:RESULTS?|резултати):?",
        r"(?:HIGHEST|най-високи)[\s_-]*(?:RESULTS?|резултати):?",
        r"(?:GAPS?|пропуски)[\s_-]*(?:ANALYSIS|анализ)?:?",
        r"(?:RESULTS?[\s_-]*ANALYSIS|общ\s+анализ):?",
        r"(?:IMPROVEMENT[\s_-]*MEASURES?|мерки):?",
    ]
    .map(|header| regex(&format!("{}{}{}", HEADER_PREFIX, header, HEADER_SUFFIX)))
});

/// Walks the text line by line; a header line opens a new section.
pub struct LineScan;

impl LineScan {
    fn header(line: &str) -> Option<(usize, &str)> {
        LINE_HEADERS.iter().enumerate().find_map(|(i, re)| {
            re.captures(line).map(|c| {
                let inline = c.get(1).map(|m| m.as_str()).unwrap_or("");
                (i, inline.trim().trim_end_matches('*').trim())
            })
        })
    }

    /// Stores the buffered lines under the open section. A repeated header overwrites.
    fn close(extracted: &mut Extracted, section: Option<usize>, buffer: &mut Vec<&str>) {
        if let Some(i) = section {
            if !buffer.is_empty() {
                extracted[i] = Some(buffer.join("\n").trim().to_string());
            }
        }
        buffer.clear();
    }
}

impl Strategy for LineScan {
    fn name(&self) -> &'static str {
        "line scan"
    }

    fn extract(&self, text: &str) -> Option<[String; 5]> {
        let mut extracted: Extracted = Default::default();
        let mut current: Option<usize> = None;
        let mut buffer: Vec<&str> = Vec::new();

        for line in text.lines() {
            let line = line.trim();
            if let Some((index, inline)) = Self::header(line) {
                Self::close(&mut extracted, current, &mut buffer);
                current = Some(index);
                if !inline.is_empty() {
                    buffer.push(inline);
                }
            } else if !line.is_empty() && current.is_some() {
                buffer.push(line);
            }
        }
        Self::close(&mut extracted, current, &mut buffer);

        tracing::debug!("Line scan found {}/5 sections", found_count(&extracted));
        complete(extracted)
    }
}

/// Splits the raw text into five contiguous chunks. Always succeeds.
pub struct EqualSplit;

impl Strategy for EqualSplit {
    fn name(&self) -> &'static str {
        "equal split"
    }

    fn extract(&self, text: &str) -> Option<[String; 5]> {
        let chars: Vec<char> = text.chars().collect();
        let chunk = (chars.len() / 5).max(EQUAL_SPLIT_MIN_CHUNK);

        Some(std::array::from_fn(|i| {
            let start = (i * chunk).min(chars.len());
            let end = if i == 4 { chars.len() } else { ((i + 1) * chunk).min(chars.len()) };
            let piece: String = chars[start..end].iter().collect();
            let piece = piece.trim();
            if piece.is_empty() {
                Section::ALL[i].placeholder().to_string()
            } else {
                piece.to_string()
            }
        }))
    }
}

static STRATEGIES: [&dyn Strategy; 3] = [&LabeledRegex, &LineScan, &EqualSplit];

/// Replaces missing or too-short sections by their placeholders.
fn finalize(parts: [String; 5]) -> AiAnalysisSections {
    let mut index = 0;
    AiAnalysisSections::from_parts(parts.map(|text| {
        let section = Section::ALL[index];
        index += 1;
        let text = text.trim();
        if text.chars().count() < MIN_SECTION_LEN {
            tracing::warn!("Section {} too short, using placeholder", section.key());
            section.placeholder().to_string()
        } else {
            text.to_string()
        }
    }))
}

/// Parses AI output into five populated sections. Never fails.
pub fn parse_ai_response(text: &str) -> AiAnalysisSections {
    if text.trim().is_empty() {
        tracing::warn!("AI text is empty, using default sections");
        return AiAnalysisSections::placeholders();
    }

    for strategy in STRATEGIES {
        if let Some(parts) = strategy.extract(text) {
            tracing::info!("Parsed AI response with {} strategy", strategy.name());
            return finalize(parts);
        }
        tracing::warn!("{} strategy incomplete, falling back", strategy.name());
    }

    AiAnalysisSections::placeholders()
}

/// Text form of a backend payload that was not a plain string.
///
/// Lists of `{"text": ...}` parts are concatenated; anything else is rendered as JSON.
pub fn coerce_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        Value::Array(parts) if parts.iter().all(|p| p.get("text").is_some_and(Value::is_string)) => {
            parts
                .iter()
                .filter_map(|p| p.get("text").and_then(Value::as_str))
                .collect()
        }
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const WELL_FORMED: &str = "LOWEST_RESULTS:
Учениците с най-ниски резултати имат затруднения с дробите.

HIGHEST_RESULTS:
Най-добре представилите се владеят уравненията отлично.

GAPS_ANALYSIS:
Основни пропуски има при текстовите задачи.

RESULTS_ANALYSIS:
Като цяло класът се представя добре, със средна оценка 4.50.

IMPROVEMENT_MEASURES:
Допълнителни упражнения по дроби и текстови задачи.";

    fn assert_total_coverage(sections: &AiAnalysisSections) {
        for section in Section::ALL {
            let text = sections.get(section);
            assert!(text.chars().count() >= MIN_SECTION_LEN, "{:?}: {:?}", section, text);
        }
    }

    #[test]
    fn test_empty_input_gives_placeholders() {
        assert_eq!(parse_ai_response(""), AiAnalysisSections::placeholders());
        assert_eq!(parse_ai_response("  \n "), AiAnalysisSections::placeholders());
    }

    #[test]
    fn test_well_formed_response() {
        let sections = parse_ai_response(WELL_FORMED);
        assert_eq!(
            sections.lowest_results_analysis,
            "Учениците с най-ниски резултати имат затруднения с дробите."
        );
        assert_eq!(
            sections.results_analysis,
            "Като цяло класът се представя добре, със средна оценка 4.50."
        );
        assert_eq!(
            sections.improvement_measures,
            "Допълнителни упражнения по дроби и текстови задачи."
        );
        assert_total_coverage(&sections);
    }

    #[test]
    fn test_labeled_regex_needs_all_sections() {
        assert!(LabeledRegex.extract(WELL_FORMED).is_some());
        assert!(LabeledRegex.extract("LOWEST_RESULTS: only this one").is_none());
    }

    #[test]
    fn test_three_of_five_labels_recovered_by_line_scan() {
        let text = "LOWEST_RESULTS:
Слабите резултати са при геометрията.
HIGHEST_RESULTS:
Силните ученици решават алгебра безпроблемно.
**Gaps:** Липсват знания за обиколка и лице.
Result analysis: Резултатите са над средното ниво.
1. Мерки: Повече практика с чертежи и модели.";

        assert!(LabeledRegex.extract(text).is_none());
        let parts = LineScan.extract(text).expect("line scan recovers all five");
        assert_eq!(parts[2], "Липсват знания за обиколка и лице.");
        assert_eq!(parts[4], "Повече практика с чертежи и модели.");

        let sections = parse_ai_response(text);
        assert_total_coverage(&sections);
    }

    #[test]
    fn test_unstructured_text_is_split_equally() {
        let text = "а".repeat(1000);
        let sections = parse_ai_response(&text);
        assert_eq!(sections.lowest_results_analysis.chars().count(), 200);
        assert_eq!(sections.improvement_measures.chars().count(), 200);
        assert_total_coverage(&sections);
    }

    #[test]
    fn test_short_garbage_gets_placeholders_where_empty() {
        let sections = parse_ai_response("Nothing useful was produced here at all.");
        // Shorter than one chunk: everything lands in the first section.
        assert_eq!(
            sections.lowest_results_analysis,
            "Nothing useful was produced here at all."
        );
        assert_eq!(sections.gaps_analysis, Section::Gaps.placeholder());
        assert_total_coverage(&sections);
    }

    #[test]
    fn test_too_short_sections_are_replaced() {
        let text = "LOWEST_RESULTS: ok
HIGHEST_RESULTS: Достатъчно дълъг текст.
GAPS_ANALYSIS: Достатъчно дълъг текст.
RESULTS_ANALYSIS: Достатъчно дълъг текст.
IMPROVEMENT_MEASURES: Достатъчно дълъг текст.";
        let sections = parse_ai_response(text);
        assert_eq!(
            sections.lowest_results_analysis,
            Section::LowestResults.placeholder()
        );
        assert_eq!(sections.gaps_analysis, "Достатъчно дълъг текст.");
    }

    #[test]
    fn test_coerce_text() {
        assert_eq!(coerce_text(&json!("текст")), "текст");
        assert_eq!(coerce_text(&json!(null)), "");
        assert_eq!(coerce_text(&json!(42)), "42");
        assert_eq!(
            coerce_text(&json!([{"type": "text", "text": "a"}, {"text": "b"}])),
            "ab"
        );
        assert_total_coverage(&parse_ai_response(&coerce_text(&json!({"a": 1}))));
    }
}
