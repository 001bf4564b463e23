use tracing::warn;

use crate::{
    client::gemini_client_error::GenerationError,
    quiz::models::{Quiz, QuizQuestion, QuizRequest},
};

static FENCE: &str = "```";

/// Returns the part of the model output that should hold the JSON array.
///
/// Fenced output yields the body of the first fence, with any language tag
/// (`json`, `js`, ...) on the opening line dropped. Anything that still does
/// not start with `[` is narrowed to the outermost bracket pair.
pub fn clean_model_output(raw: &str) -> &str {
    let mut text = raw.trim();

    if let Some(start) = text.find(FENCE) {
        let after_open = &text[start + FENCE.len()..];
        let body = match after_open.find('\n') {
            Some(newline) if is_language_tag(&after_open[..newline]) => &after_open[newline + 1..],
            _ if is_language_tag(after_open.split_whitespace().next().unwrap_or("")) => {
                after_open.trim_start_matches(|c: char| c.is_ascii_alphabetic())
            }
            _ => after_open,
        };
        text = match body.find(FENCE) {
            Some(end) => &body[..end],
            None => body,
        };
        text = text.trim();
    }

    if !text.starts_with('[') {
        if let (Some(open), Some(close)) = (text.find('['), text.rfind(']')) {
            if open < close {
                text = &text[open..=close];
            }
        }
    }

    text.trim()
}

fn is_language_tag(candidate: &str) -> bool {
    let candidate = candidate.trim();
    candidate.is_empty() || candidate.chars().all(|c| c.is_ascii_alphanumeric())
}

/// Turns raw model text into a validated quiz for `request`.
pub fn parse_quiz(raw: &str, request: &QuizRequest) -> Result<Quiz, GenerationError> {
    let cleaned = clean_model_output(raw);

    let value: serde_json::Value =
        serde_json::from_str(cleaned).map_err(|source| GenerationError::MalformedOutput {
            source,
            raw: raw.to_string(),
        })?;

    let questions: Vec<QuizQuestion> = serde_json::from_value(value)
        .map_err(|e| GenerationError::SchemaMismatch(format!("unexpected quiz shape: {}", e)))?;

    if questions.is_empty() {
        return Err(GenerationError::SchemaMismatch("model returned no questions".into()));
    }

    let mut quiz = questions
        .into_iter()
        .enumerate()
        .map(|(idx, q)| q.validated(idx))
        .collect::<Result<Quiz, String>>()
        .map_err(GenerationError::SchemaMismatch)?;

    let wanted = request.question_count as usize;
    if quiz.len() > wanted {
        warn!(
            "Model returned {} questions for {} requested, truncating",
            quiz.len(),
            wanted
        );
        quiz.truncate(wanted);
    } else if quiz.len() < wanted {
        warn!(
            "Model returned {} questions for {} requested",
            quiz.len(),
            wanted
        );
    }

    Ok(quiz)
}

#[cfg(test)]
mod tests {
    use super::*;

    const ARRAY: &str = r#"[{"question":"Q1","options":["A","B"],"answer":"A"}]"#;

    fn request(count: u8) -> QuizRequest {
        QuizRequest::new("Roman History", count).unwrap()
    }

    #[test]
    fn clean_leaves_bare_array_alone() {
        assert_eq!(clean_model_output(ARRAY), ARRAY);
        assert_eq!(clean_model_output(&format!("\n  {}  \n", ARRAY)), ARRAY);
    }

    #[test]
    fn clean_strips_known_fences() {
        for tag in ["json", "js", ""] {
            let wrapped = format!("```{}\n{}\n```", tag, ARRAY);
            assert_eq!(clean_model_output(&wrapped), ARRAY, "tag {:?}", tag);
        }
    }

    #[test]
    fn clean_rewrapped_matches_original_modulo_whitespace() {
        let strip_ws = |s: &str| s.split_whitespace().collect::<String>();

        for tag in ["json", "js", ""] {
            let original = format!("```{}\n  {}\n\n```", tag, ARRAY);
            let rewrapped = format!("```{}\n{}\n```", tag, clean_model_output(&original));
            assert_eq!(strip_ws(&rewrapped), strip_ws(&original));
        }
    }

    #[test]
    fn clean_handles_prose_before_fence() {
        let raw = format!("Sure! ```json\n{}\n```", ARRAY);
        assert_eq!(clean_model_output(&raw), ARRAY);

        let raw = format!("Here you go: {} Enjoy!", ARRAY);
        assert_eq!(clean_model_output(&raw), ARRAY);
    }

    #[test]
    fn clean_handles_fence_tag_on_same_line() {
        let raw = format!("```json {}```", ARRAY);
        assert_eq!(clean_model_output(&raw), ARRAY);
    }

    #[test]
    fn parse_returns_inner_array() {
        let raw = format!("Sure! ```json\n{}\n```", ARRAY);
        let quiz = parse_quiz(&raw, &request(1)).unwrap();

        assert_eq!(quiz.len(), 1);
        assert_eq!(quiz[0].answer, "A");
    }

    #[test]
    fn parse_prose_is_malformed() {
        let err = parse_quiz("I cannot help with that.", &request(3)).unwrap_err();
        assert!(matches!(err, GenerationError::MalformedOutput { .. }));
    }

    #[test]
    fn parse_truncated_json_is_malformed() {
        let err = parse_quiz(r#"[{"question":"Q1","options":["A""#, &request(1)).unwrap_err();
        assert!(matches!(err, GenerationError::MalformedOutput { .. }));
    }

    #[test]
    fn parse_wrong_shape_is_schema_mismatch() {
        for raw in [
            r#"{"question":"Q1"}"#,
            r#"[{"question":"Q1","options":"A","answer":"A"}]"#,
            r#"[{"question":"Q1","options":["A","B"],"answer":"C"}]"#,
            "[]",
        ] {
            let err = parse_quiz(raw, &request(1)).unwrap_err();
            assert!(
                matches!(err, GenerationError::SchemaMismatch(_)),
                "{} -> {:?}",
                raw,
                err
            );
        }
    }

    #[test]
    fn parse_truncates_extra_questions() {
        let raw = r#"[
            {"question":"Q1","options":["A","B"],"answer":"A"},
            {"question":"Q2","options":["A","B"],"answer":"B"},
            {"question":"Q3","options":["A","B"],"answer":"A"}
        ]"#;

        let quiz = parse_quiz(raw, &request(2)).unwrap();
        assert_eq!(quiz.len(), 2);
        assert_eq!(quiz[1].question, "Q2");
    }

    #[test]
    fn parse_accepts_short_quiz() {
        let quiz = parse_quiz(ARRAY, &request(5)).unwrap();
        assert_eq!(quiz.len(), 1);
    }
}
