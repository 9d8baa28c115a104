//! ABOUTME: Data model shared across the civic QA router core
//! ABOUTME: Routing Plan, Reuse Verdict, retrieval results, and the reply envelope

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque session key chosen by the HTTP collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(String);

impl SessionId {
    #[must_use]
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for SessionId {
    fn from(raw: String) -> Self {
        Self(raw)
    }
}

impl From<&str> for SessionId {
    fn from(raw: &str) -> Self {
        Self(raw.to_string())
    }
}

/// Role of a conversation turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// An immutable conversation turn, owned by the HTTP collaborator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Turn {
    pub role: Role,
    pub content: String,
}

/// The four execution modes a turn can resolve to.
///
/// Reused both as the Mode Classifier's Routing Plan (the intended path,
/// decided before retrieval runs) and as the Reply Envelope's `mode` (the
/// path that actually contributed content) — the two are the same closed
/// set, and a Hybrid turn whose one side fails demotes its Routing Plan
/// into a single-source `Mode` per the rule in `spec.md` §4.7.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    Structured,
    Unstructured,
    Hybrid,
    History,
}

pub type RoutingPlan = Mode;

/// Why the Reuse Judge chose to reuse the cached artifacts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReuseReason {
    /// The Gateway judged the question answerable from the cached digest.
    ModelJudged,
}

/// Why the Reuse Judge chose to refresh (retrieve again).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RefreshReason {
    /// No prior retrieval artifacts exist for this session.
    NoHistory,
    /// The question carries a temporal anchor absent from the digest.
    TemporalShift,
    /// The Gateway's output was not one of the two literal tokens.
    ParseFallback,
    /// The Gateway judged the question not answerable from the digest.
    ModelJudged,
}

/// The Reuse Judge's decision for a turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReuseVerdict {
    Reuse { reason: ReuseReason },
    Refresh { reason: RefreshReason },
}

impl ReuseVerdict {
    #[must_use]
    pub const fn is_reuse(&self) -> bool {
        matches!(self, Self::Reuse { .. })
    }
}

/// A column of a structured result, in declaration order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnDescriptor {
    pub name: String,
    pub type_hint: Option<String>,
}

/// One row of a structured result, positional to `StructuredResult::columns`.
pub type Row = Vec<serde_json::Value>;

/// Result of a successful structured retrieval.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StructuredResult {
    pub columns: Vec<ColumnDescriptor>,
    pub rows: Vec<Row>,
    /// Tables actually consulted, ground truth from the executor, in
    /// first-referenced order. Non-empty whenever `rows` is non-empty.
    pub tables: Vec<String>,
    pub answer_fragment: String,
    /// The drafted query text, kept for diagnostics only — never shown
    /// to the end user and never used to derive citations.
    pub sql_text: String,
    /// Whether the executor reported the row cap was hit.
    pub truncated: bool,
}

impl StructuredResult {
    /// Checks the invariants of §3: column/row arity match, and a
    /// non-empty `tables` set whenever rows were returned.
    #[must_use]
    pub fn is_well_formed(&self) -> bool {
        let arity_ok = self
            .rows
            .iter()
            .all(|row| row.len() == self.columns.len());
        let tables_ok = self.rows.is_empty() || !self.tables.is_empty();
        arity_ok && tables_ok
    }
}

/// Why the Structured Retriever could not produce a result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum StructuredFailure {
    SchemaMiss,
    DraftInvalid,
    ExecutorError(String),
    NonReadOnlyQuery,
}

/// Recognised metadata attributes of an unstructured chunk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkMetadata {
    /// Document identifier. Never absent on the wire — normalised to
    /// the literal `"Unknown"` when the index reports none.
    pub source: String,
    pub doc_type: Option<String>,
}

/// One retrieved document chunk, ordered by descending relevance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chunk {
    pub text: String,
    pub metadata: ChunkMetadata,
}

/// Result of a successful unstructured retrieval.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnstructuredResult {
    pub chunks: Vec<Chunk>,
    pub answer_fragment: String,
}

/// Why the Unstructured Retriever could not produce a result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnstructuredFailure {
    IndexUnavailable,
    EmbeddingFailure,
}

/// A structured reference to the origin of evidence used in an answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum SourceCitation {
    Sql {
        table: String,
    },
    Rag {
        source: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        doc_type: Option<String>,
    },
}

/// The reply returned from `handle_turn`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplyEnvelope {
    pub answer: String,
    pub sources: Vec<SourceCitation>,
    pub mode: Mode,
}

/// Per-session bundle of the most recent retrieval artifacts, owned
/// exclusively by the Session Cache.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry {
    pub session_id: SessionId,
    pub last_touched_at: DateTime<Utc>,
    pub structured_result: Option<StructuredResult>,
    pub unstructured_result: Option<UnstructuredResult>,
    pub last_answer: Option<String>,
    pub last_mode: Option<Mode>,
}

impl CacheEntry {
    #[must_use]
    pub fn new(session_id: SessionId) -> Self {
        Self {
            session_id,
            last_touched_at: Utc::now(),
            structured_result: None,
            unstructured_result: None,
            last_answer: None,
            last_mode: None,
        }
    }

    #[must_use]
    pub fn has_artifacts(&self) -> bool {
        self.structured_result.is_some() || self.unstructured_result.is_some()
    }
}

/// Fields to merge into an existing (or new) `CacheEntry` via `put`.
/// Unset fields leave the corresponding `CacheEntry` field untouched.
#[derive(Debug, Clone, Default)]
pub struct CacheEntryUpdate {
    pub structured_result: Option<StructuredResult>,
    pub unstructured_result: Option<UnstructuredResult>,
    pub last_answer: Option<String>,
    pub last_mode: Option<Mode>,
}

/// Compact summary of a `CacheEntry`'s artifacts, passed to the Reuse
/// Judge so the LLM Gateway never has to receive full result payloads.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CachedDigest {
    pub last_mode: Option<Mode>,
    pub tables_seen: Vec<String>,
    pub source_documents_seen: Vec<(String, Option<String>)>,
    pub row_count: usize,
    pub chunk_count: usize,
    pub last_answer_summary: Option<String>,
}

impl CachedDigest {
    #[must_use]
    pub fn from_entry(entry: &CacheEntry) -> Self {
        let tables_seen = entry
            .structured_result
            .as_ref()
            .map(|r| r.tables.clone())
            .unwrap_or_default();
        let row_count = entry
            .structured_result
            .as_ref()
            .map_or(0, |r| r.rows.len());
        let source_documents_seen = entry
            .unstructured_result
            .as_ref()
            .map(|r| {
                r.chunks
                    .iter()
                    .map(|c| (c.metadata.source.clone(), c.metadata.doc_type.clone()))
                    .collect()
            })
            .unwrap_or_default();
        let chunk_count = entry
            .unstructured_result
            .as_ref()
            .map_or(0, |r| r.chunks.len());
        let last_answer_summary = entry
            .last_answer
            .as_ref()
            .map(|a| one_line_summary(a));

        Self {
            last_mode: entry.last_mode,
            tables_seen,
            source_documents_seen,
            row_count,
            chunk_count,
            last_answer_summary,
        }
    }
}

/// Truncates text to a single line, bounded length, for digest summaries.
fn one_line_summary(text: &str) -> String {
    const MAX_LEN: usize = 160;
    let single_line = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if single_line.chars().count() > MAX_LEN {
        let truncated: String = single_line.chars().take(MAX_LEN).collect();
        format!("{truncated}…")
    } else {
        single_line
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn structured_result_well_formed_requires_matching_arity() {
        let result = StructuredResult {
            columns: vec![ColumnDescriptor {
                name: "id".into(),
                type_hint: None,
            }],
            rows: vec![vec![serde_json::json!(1), serde_json::json!("extra")]],
            tables: vec!["incidents".into()],
            answer_fragment: String::new(),
            sql_text: String::new(),
            truncated: false,
        };
        assert!(!result.is_well_formed());
    }

    #[test]
    fn structured_result_well_formed_requires_nonempty_tables_with_rows() {
        let result = StructuredResult {
            columns: vec![],
            rows: vec![vec![]],
            tables: vec![],
            answer_fragment: String::new(),
            sql_text: String::new(),
            truncated: false,
        };
        assert!(!result.is_well_formed());
    }

    #[test]
    fn zero_rows_is_well_formed_with_empty_tables() {
        let result = StructuredResult {
            columns: vec![],
            rows: vec![],
            tables: vec![],
            answer_fragment: "No matching records found.".into(),
            sql_text: String::new(),
            truncated: false,
        };
        assert!(result.is_well_formed());
    }

    #[test]
    fn one_line_summary_collapses_whitespace_and_truncates() {
        let long = "word ".repeat(100);
        let summary = one_line_summary(&long);
        assert!(summary.ends_with('…'));
        assert!(!summary.contains('\n'));
    }
}
