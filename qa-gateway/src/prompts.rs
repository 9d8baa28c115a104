//! ABOUTME: Prompt builders, one per Gateway operation
//! ABOUTME: Each fixes the exact ordered context fields the operation's contract names

use qa_core::{Chunk, ColumnDescriptor, Row, Turn, CachedDigest};

fn render_history(history: &[Turn]) -> String {
    if history.is_empty() {
        return "(no prior turns)".to_string();
    }
    history
        .iter()
        .map(|turn| format!("{:?}: {}", turn.role, turn.content))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Ordered fields: question, history_slice, cached_digest.
pub fn plan_reuse_prompt(question: &str, history: &[Turn], digest: &CachedDigest) -> String {
    format!(
        "QUESTION:\n{question}\n\nHISTORY:\n{history}\n\nCACHED_DIGEST:\n{digest}\n\n\
         Respond with exactly one word: REUSE or REFRESH.",
        history = render_history(history),
        digest = serde_json::to_string(digest).unwrap_or_default(),
    )
}

/// Ordered fields: question, history_slice.
pub fn classify_mode_prompt(question: &str, history: &[Turn]) -> String {
    format!(
        "QUESTION:\n{question}\n\nHISTORY:\n{history}\n\n\
         Respond with exactly one word: STRUCTURED, UNSTRUCTURED, HYBRID, or HISTORY.",
        history = render_history(history),
    )
}

/// Ordered fields: question, schema_hint.
pub fn draft_query_prompt(question: &str, schema_hint: &str) -> String {
    format!(
        "QUESTION:\n{question}\n\nSCHEMA:\n{schema_hint}\n\n\
         Draft a single read-only query against this schema. Output only the query text."
    )
}

/// Ordered fields: question, rows, columns, tables.
pub fn draft_sql_answer_prompt(
    question: &str,
    rows: &[Row],
    columns: &[ColumnDescriptor],
    tables: &[String],
) -> String {
    format!(
        "QUESTION:\n{question}\n\nCOLUMNS:\n{columns}\n\nROWS:\n{rows}\n\nTABLES:\n{tables}\n\n\
         Respond with a JSON object: {{\"answer\": \"...\"}}.",
        columns = serde_json::to_string(columns).unwrap_or_default(),
        rows = serde_json::to_string(rows).unwrap_or_default(),
        tables = tables.join(", "),
    )
}

/// Ordered fields: question, chunks.
pub fn draft_rag_answer_prompt(question: &str, chunks: &[Chunk]) -> String {
    format!(
        "QUESTION:\n{question}\n\nCHUNKS:\n{chunks}\n\n\
         Respond with a JSON object: {{\"answer\": \"...\"}}.",
        chunks = serde_json::to_string(chunks).unwrap_or_default(),
    )
}

/// Ordered fields: question, sql_fragment, rag_fragment.
pub fn merge_answers_prompt(question: &str, sql_fragment: &str, rag_fragment: &str) -> String {
    format!(
        "QUESTION:\n{question}\n\nSQL_FRAGMENT:\n{sql_fragment}\n\nRAG_FRAGMENT:\n{rag_fragment}\n\n\
         Merge both fragments into one paragraph. The merge is commutative: do not assume \
         which fragment was computed first. Respond with a JSON object: {{\"answer\": \"...\"}}."
    )
}
