//! Response normalizer: turns raw model output into a [`VerdictResult`].
//!
//! The model is asked for a bare JSON object but routinely wraps it in a
//! markdown fence or surrounds it with prose. Only `score` has a fallback;
//! `verdict` and `justification` pass through unchanged.

use std::sync::OnceLock;

use regex::Regex;
use serde_json::Value;
use thiserror::Error;

use crate::models::VerdictResult;

const MIN_SCORE: i32 = 0;
const MAX_SCORE: i32 = 100;

#[derive(Error, Debug)]
pub enum NormalizeError {
    #[error("no JSON object found in model output")]
    NoObject,

    #[error("invalid JSON in model output: {0}")]
    InvalidJson(#[from] serde_json::Error),

    #[error("model output is JSON but not an object")]
    NotAnObject,
}

fn leading_fence() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)^```json").expect("static regex"))
}

fn trailing_fence() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"```$").expect("static regex"))
}

/// Widest `{ ... }` span: first opening brace to last closing brace.
pub fn extract_json_object(raw: &str) -> Option<&str> {
    let start = raw.find('{')?;
    let end = raw.rfind('}')?;
    (end >= start).then_some(&raw[start..=end])
}

pub fn normalize(raw: &str) -> Result<VerdictResult, NormalizeError> {
    let text = raw.trim();
    let text = leading_fence().replace(text, "");
    let text = text.trim();
    let text = trailing_fence().replace(text, "");
    let text = text.trim();

    let span = extract_json_object(text).ok_or(NormalizeError::NoObject)?;
    let value: Value = serde_json::from_str(span)?;
    let object = value.as_object().ok_or(NormalizeError::NotAnObject)?;

    Ok(VerdictResult {
        score: coerce_score(object.get("score")),
        verdict: coerce_text(object.get("verdict")),
        justification: coerce_text(object.get("justification")),
    })
}

/// Numeric or numeric-string score, truncated toward zero and clamped.
/// Anything else becomes 0.
pub fn coerce_score(value: Option<&Value>) -> i32 {
    let number = match value {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
        _ => None,
    };

    match number {
        Some(n) if n.is_finite() => (n.trunc() as i64).clamp(MIN_SCORE as i64, MAX_SCORE as i64) as i32,
        _ => 0,
    }
}

fn coerce_text(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const BODY: &str = r#"{"score": 82, "verdict": "মিথ্যা", "justification": "কোনো সরকারি ঘোষণা নেই"}"#;

    fn expected() -> VerdictResult {
        VerdictResult {
            score: 82,
            verdict: "মিথ্যা".to_string(),
            justification: "কোনো সরকারি ঘোষণা নেই".to_string(),
        }
    }

    #[test]
    fn bare_object() {
        assert_eq!(normalize(BODY).unwrap(), expected());
    }

    #[test]
    fn fenced_object() {
        let raw = format!("```json\n{}\n```", BODY);
        assert_eq!(normalize(&raw).unwrap(), expected());
    }

    #[test]
    fn fence_marker_is_case_insensitive() {
        let raw = format!("```JSON\n{}\n```", BODY);
        assert_eq!(normalize(&raw).unwrap(), expected());
    }

    #[test]
    fn surrounding_prose_is_ignored() {
        let raw = format!("Here is my analysis:\n{}\nHope this helps.", BODY);
        assert_eq!(normalize(&raw).unwrap(), expected());

        let fenced = format!("  ```json\n{}\n```  ", BODY);
        assert_eq!(normalize(&fenced).unwrap(), expected());
    }

    #[test]
    fn score_string_numeral_and_float_are_truncated() {
        let r = normalize(r#"{"score": "64", "verdict": "x", "justification": ""}"#).unwrap();
        assert_eq!(r.score, 64);
        let r = normalize(r#"{"score": 77.9, "verdict": "x"}"#).unwrap();
        assert_eq!(r.score, 77);
        let r = normalize(r#"{"score": "55.5"}"#).unwrap();
        assert_eq!(r.score, 55);
    }

    #[test]
    fn score_absent_or_garbage_is_zero() {
        assert_eq!(normalize(r#"{"verdict": "x"}"#).unwrap().score, 0);
        assert_eq!(normalize(r#"{"score": "অনেক বেশি"}"#).unwrap().score, 0);
        assert_eq!(normalize(r#"{"score": null}"#).unwrap().score, 0);
        assert_eq!(normalize(r#"{"score": [80]}"#).unwrap().score, 0);
        assert_eq!(normalize(r#"{"score": "NaN"}"#).unwrap().score, 0);
        assert_eq!(normalize(r#"{"score": "1e400"}"#).unwrap().score, 0);
        assert_eq!(normalize(r#"{"score": -1e400}"#).unwrap().score, 0);

        // a score literal past f64 range must not take the verdict down with it
        let r = normalize(r#"{"score": 1e400, "verdict": "মিথ্যা", "justification": "x"}"#).unwrap();
        assert_eq!(r.score, 0);
        assert_eq!(r.verdict, "মিথ্যা");
        assert_eq!(r.justification, "x");
    }

    #[test]
    fn score_is_clamped() {
        assert_eq!(normalize(r#"{"score": 140}"#).unwrap().score, 100);
        assert_eq!(normalize(r#"{"score": -3}"#).unwrap().score, 0);
    }

    #[test]
    fn unlisted_verdict_passes_through() {
        let r = normalize(r#"{"score": 10, "verdict": "অজানা"}"#).unwrap();
        assert_eq!(r.verdict, "অজানা");
        assert_eq!(r.justification, "");
    }

    #[test]
    fn non_string_text_fields_keep_json_text() {
        assert_eq!(coerce_text(Some(&json!(5))), "5");
        assert_eq!(coerce_text(Some(&json!(null))), "");
    }

    #[test]
    fn malformed_output_is_an_error_not_a_panic() {
        assert!(matches!(normalize("no json here"), Err(NormalizeError::NoObject)));
        assert!(matches!(normalize("} backwards {"), Err(NormalizeError::NoObject)));
        assert!(matches!(
            normalize(r#"{"score": 82, "verdict": "মিথ্যা""#),
            Err(NormalizeError::NoObject)
        ));
        assert!(matches!(
            normalize(r#"{"score": 82,, }"#),
            Err(NormalizeError::InvalidJson(_))
        ));
        assert!(matches!(
            normalize(r#"{"a": 1} and {"b": 2}"#),
            Err(NormalizeError::InvalidJson(_))
        ));
    }

    #[test]
    fn extract_json_object_takes_widest_span() {
        assert_eq!(extract_json_object(r#"x {"a": {"b": 1}} y"#), Some(r#"{"a": {"b": 1}}"#));
        assert_eq!(extract_json_object("nothing"), None);
    }
}
