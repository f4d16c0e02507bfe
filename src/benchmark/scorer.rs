//! GAIA answer extraction and scoring.
//!
//! Scoring follows the official GAIA rules: numeric ground truths compare
//! as numbers after stripping `$`, `%` and `,`; ground truths containing
//! `,` or `;` are lists compared element by element; anything else compares
//! as a string with whitespace and punctuation removed, case-insensitively.

use crate::society::FINAL_ANSWER_PREFIX;

/// Parses a ground-truth style number, `None` when it is not one.
fn parse_float(s: &str) -> Option<f64> {
    s.trim().parse::<f64>().ok()
}

/// A model answer as a number, with `$`, `%` and `,` removed.
fn normalize_number_str(s: &str) -> Option<f64> {
    let cleaned: String = s.chars().filter(|c| !matches!(c, '$' | '%' | ',')).collect();
    parse_float(&cleaned)
}

fn split_list(s: &str) -> Vec<&str> {
    s.split([',', ';']).collect()
}

/// Whitespace removed, optionally ASCII punctuation removed, lowercased.
fn normalize_str(s: &str, remove_punct: bool) -> String {
    s.chars()
        .filter(|c| !c.is_whitespace())
        .filter(|c| !(remove_punct && c.is_ascii_punctuation()))
        .flat_map(char::to_lowercase)
        .collect()
}

fn numbers_equal(model: &str, truth: f64) -> bool {
    normalize_number_str(model).is_some_and(|m| m == truth)
}

/// True when `model_answer` matches `ground_truth` under the GAIA rules.
pub fn question_scorer(model_answer: &str, ground_truth: &str) -> bool {
    if let Some(truth) = parse_float(ground_truth) {
        return numbers_equal(model_answer, truth);
    }

    if ground_truth.contains([',', ';']) {
        let truths = split_list(ground_truth);
        let answers = split_list(model_answer);
        if truths.len() != answers.len() {
            return false;
        }
        return truths.iter().zip(answers.iter()).all(|(truth, answer)| {
            match parse_float(truth) {
                Some(t) => numbers_equal(answer, t),
                None => normalize_str(answer, false) == normalize_str(truth, false),
            }
        });
    }

    normalize_str(model_answer, true) == normalize_str(ground_truth, true)
}

/// The answer after the last `FINAL ANSWER:` marker.
///
/// Falls back to the last non-empty line when the marker is absent.
/// Markdown emphasis, backticks and surrounding quotes are removed.
pub fn extract_final_answer(text: &str) -> String {
    // ASCII uppercasing keeps byte offsets aligned with `text`.
    let upper = text.to_ascii_uppercase();
    let raw = match upper.rfind(FINAL_ANSWER_PREFIX) {
        Some(pos) => text[pos + FINAL_ANSWER_PREFIX.len()..]
            .lines()
            .find(|l| !l.trim().is_empty())
            .unwrap_or(""),
        None => text.lines().rev().find(|l| !l.trim().is_empty()).unwrap_or(""),
    };

    raw.trim()
        .trim_end_matches('.')
        .trim_matches(|c: char| matches!(c, '*' | '`' | '"' | '\'') || c.is_whitespace())
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_numeric_answers() {
        assert!(question_scorer("8", "8"));
        assert!(question_scorer("$1,234", "1234"));
        assert!(question_scorer("45%", "45"));
        assert!(question_scorer("3.50", "3.5"));
        assert!(!question_scorer("eight", "8"));
        assert!(!question_scorer("9", "8"));
    }

    #[test]
    fn test_list_answers() {
        assert!(question_scorer("apple, Banana; 3", "apple,banana,3"));
        assert!(question_scorer("a ,b", "a, b"));
        assert!(!question_scorer("a, b", "a, b, c"));
        assert!(!question_scorer("a, c", "a, b"));
        // punctuation inside list elements is significant
        assert!(!question_scorer("st. louis, x", "st louis, x"));
    }

    #[test]
    fn test_string_answers() {
        assert!(question_scorer("Paris", "paris"));
        assert!(question_scorer("  New   York ", "new york"));
        assert!(question_scorer("St. Louis!", "st louis"));
        assert!(!question_scorer("Lyon", "Paris"));
    }

    #[test]
    fn test_extract_final_answer() {
        assert_eq!(extract_final_answer("Reasoning...\nFINAL ANSWER: 42"), "42");
        assert_eq!(extract_final_answer("final answer: **Paris**."), "Paris");
        assert_eq!(extract_final_answer("FINAL ANSWER: a\nFINAL ANSWER: `b`"), "b");
        assert_eq!(extract_final_answer("FINAL ANSWER:\n  \"x, y\"  \n"), "x, y");
        assert_eq!(extract_final_answer("no marker\nlast line\n\n"), "last line");
        assert_eq!(extract_final_answer(""), "");
    }

    #[test]
    fn test_extract_then_score() {
        let reply = "Solution: counted.\nFINAL ANSWER: $1,000";
        assert!(question_scorer(&extract_final_answer(reply), "1000"));
    }
}
