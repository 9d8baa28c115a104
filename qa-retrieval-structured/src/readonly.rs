//! ABOUTME: Read-only shape check applied to a drafted query before execution
//! ABOUTME: Defense in depth — the executor collaborator must refuse writes too (spec.md §6)

const WRITE_KEYWORDS: &[&str] = &[
    "insert", "update", "delete", "drop", "alter", "create", "truncate", "grant", "revoke",
    "merge", "replace", "call", "exec", "execute",
];

/// Conservative keyword scan for a single leading read statement.
///
/// This is deliberately simple: the core's Non-goals (`spec.md` §1) put
/// dialect-aware SQL validation on the structured-retrieval collaborator,
/// not the core. This check only rejects queries that are obviously not
/// read-only before spending an executor round-trip on them.
#[must_use]
pub fn is_read_only(query_text: &str) -> bool {
    let normalized = query_text.trim().to_ascii_lowercase();
    if !(normalized.starts_with("select") || normalized.starts_with("with")) {
        return false;
    }
    let tokens: Vec<&str> = normalized
        .split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|t| !t.is_empty())
        .collect();
    !tokens.iter().any(|token| WRITE_KEYWORDS.contains(token))
}
