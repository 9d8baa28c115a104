//! ABOUTME: Bounded calendar-pattern detection for the Reuse Judge's temporal-shift policy
//! ABOUTME: Matches month names, years, and numeric dates; never attempts full NLP date parsing

use once_cell::sync::Lazy;
use regex::Regex;

static CALENDAR_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?ix)
        \b(
            jan(?:uary)? | feb(?:ruary)? | mar(?:ch)? | apr(?:il)? | may |
            jun(?:e)? | jul(?:y)? | aug(?:ust)? | sep(?:t(?:ember)?)? |
            oct(?:ober)? | nov(?:ember)? | dec(?:ember)?
        )\b
        | \b(19|20)\d{2}\b
        | \b\d{1,2}/\d{1,2}/\d{2,4}\b
        | \bq[1-4]\s?(19|20)\d{2}\b
        ",
    )
    .expect("calendar pattern is a fixed, valid regex")
});

/// Extracts the bounded set of calendar anchors present in `text`, lowercased.
#[must_use]
pub fn extract_anchors(text: &str) -> Vec<String> {
    CALENDAR_PATTERN
        .find_iter(text)
        .map(|m| m.as_str().to_ascii_lowercase())
        .collect()
}

/// A temporal shift is forced only when both sides name an anchor and the
/// sets are disjoint; a question introducing a first anchor (digest silent)
/// is ambiguous and falls through to the Gateway, per `spec.md` §4.5.
#[must_use]
pub fn is_temporal_shift(question: &str, digest_text: &str) -> bool {
    let question_anchors = extract_anchors(question);
    let digest_anchors = extract_anchors(digest_text);

    if question_anchors.is_empty() || digest_anchors.is_empty() {
        return false;
    }

    question_anchors
        .iter()
        .all(|anchor| !digest_anchors.contains(anchor))
}
