//! ABOUTME: Output-shape validators enforcing the Gateway's closed-set and JSON contracts
//! ABOUTME: A violation here drives the retry-once-then-ModelContractError policy

use serde::Deserialize;

#[derive(Debug, Deserialize)]
struct AnswerPayload {
    answer: String,
}

/// Validates that `raw` is exactly one of `allowed` (case-insensitive,
/// trimmed). Used for `classify_mode` (4-token set) and `plan_reuse`
/// (2-token set).
pub fn parse_closed_set<'a>(raw: &str, allowed: &'a [&'a str]) -> Option<&'a str> {
    let normalized = raw.trim().to_ascii_uppercase();
    allowed
        .iter()
        .find(|candidate| candidate.eq_ignore_ascii_case(&normalized))
        .copied()
}

/// Validates a `{"answer": "..."}` JSON object, tolerating a surrounding
/// code fence the way chat-style JSON-mode responses sometimes add one.
pub fn parse_answer_object(raw: &str) -> Option<String> {
    let trimmed = strip_code_fence(raw.trim());
    serde_json::from_str::<AnswerPayload>(trimmed)
        .ok()
        .map(|payload| payload.answer)
}

fn strip_code_fence(text: &str) -> &str {
    text.strip_prefix("```json")
        .or_else(|| text.strip_prefix("```"))
        .unwrap_or(text)
        .strip_suffix("```")
        .unwrap_or(text)
        .trim()
}

/// A drafted query is valid shape if it is non-empty after trimming.
/// Deeper dialect validation is the structured-retrieval collaborator's
/// job (`spec.md` Non-goals §1).
pub fn parse_query_text(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_closed_set_is_case_insensitive() {
        let allowed = ["REUSE", "REFRESH"];
        assert_eq!(parse_closed_set("reuse", &allowed), Some("REUSE"));
        assert_eq!(parse_closed_set(" Refresh \n", &allowed), Some("REFRESH"));
        assert_eq!(parse_closed_set("maybe", &allowed), None);
    }

    #[test]
    fn parse_answer_object_accepts_code_fence() {
        let raw = "```json\n{\"answer\": \"42 requests\"}\n```";
        assert_eq!(parse_answer_object(raw), Some("42 requests".to_string()));
    }

    #[test]
    fn parse_answer_object_rejects_bare_text() {
        assert_eq!(parse_answer_object("42 requests"), None);
    }

    #[test]
    fn parse_query_text_rejects_blank() {
        assert_eq!(parse_query_text("   \n"), None);
        assert_eq!(parse_query_text("SELECT 1"), Some("SELECT 1".to_string()));
    }
}
