//! ABOUTME: Trait boundaries for every outbound collaborator named in §6
//! ABOUTME: Real implementations live in their own crates; tests use in-memory fakes

use crate::types::{CachedDigest, Chunk, ChunkMetadata, ColumnDescriptor, Row, RoutingPlan, ReuseVerdict, Turn};
use async_trait::async_trait;
use thiserror::Error;

/// Single choke-point for all model calls (§4.1).
///
/// Every operation is a pure function of its prompt inputs; implementations
/// own the retry-once-then-contract-error policy internally and never leak
/// a raw provider error to callers.
#[async_trait]
pub trait LlmGateway: Send + Sync {
    /// `plan_reuse(question, history_slice, cached_digest) -> Reuse Verdict`
    async fn plan_reuse(
        &self,
        question: &str,
        history: &[Turn],
        digest: &CachedDigest,
    ) -> anyhow::Result<ReuseVerdict>;

    /// `classify_mode(question, history_slice) -> Routing Plan`
    async fn classify_mode(&self, question: &str, history: &[Turn]) -> anyhow::Result<RoutingPlan>;

    /// Drafts a single read-only query against the given schema hint.
    ///
    /// Not one of the five answer-composition operations named in
    /// `spec.md` §4.1's bullet list, but required by §4.2's prose
    /// ("asks the LLM Gateway to draft a single read-only query"); see
    /// `DESIGN.md` for why this is modeled as a sixth Gateway operation
    /// rather than folded into the Structured Retriever.
    async fn draft_query(&self, question: &str, schema_hint: &str) -> anyhow::Result<String>;

    /// `draft_sql_answer(question, rows, columns, tables) -> text`
    async fn draft_sql_answer(
        &self,
        question: &str,
        rows: &[Row],
        columns: &[ColumnDescriptor],
        tables: &[String],
    ) -> anyhow::Result<String>;

    /// `draft_rag_answer(question, chunks) -> text`
    async fn draft_rag_answer(&self, question: &str, chunks: &[Chunk]) -> anyhow::Result<String>;

    /// `merge_answers(question, sql_fragment, rag_fragment) -> text`
    async fn merge_answers(
        &self,
        question: &str,
        sql_fragment: &str,
        rag_fragment: &str,
    ) -> anyhow::Result<String>;
}

/// Read-only, cacheable schema description (§6).
#[async_trait]
pub trait SchemaCatalog: Send + Sync {
    async fn list_tables(&self) -> anyhow::Result<Vec<TableInfo>>;

    /// Candidate table names for a question, used to detect structured-data
    /// identifiers when deciding whether to promote an empty Unstructured
    /// result to Hybrid (§4.7).
    async fn keyword_hint(&self, question: &str) -> anyhow::Result<Vec<String>>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableInfo {
    pub name: String,
    pub description: String,
    pub columns: Vec<ColumnDescriptor>,
}

/// Read-only query execution against the relational store (§6).
#[async_trait]
pub trait QueryExecutor: Send + Sync {
    async fn execute_readonly(
        &self,
        query_text: &str,
        row_limit: usize,
    ) -> anyhow::Result<ExecutorResponse>;
}

#[derive(Debug, Clone)]
pub struct ExecutorResponse {
    pub columns: Vec<ColumnDescriptor>,
    pub rows: Vec<Row>,
    pub tables_referenced: Vec<String>,
    pub truncated: bool,
}

/// Why a vector search call failed — distinguishes an unreachable index
/// from a failure generating the query's own embedding, since the two map
/// to different entries in the Unstructured Retriever's failure taxonomy
/// (`spec.md` §4.3).
#[derive(Debug, Error)]
pub enum VectorIndexError {
    #[error("vector index unavailable")]
    Unavailable(#[source] anyhow::Error),
    #[error("failed to embed the query")]
    Embedding(#[source] anyhow::Error),
}

/// Semantic-similarity search against the vector store (§6).
#[async_trait]
pub trait VectorIndex: Send + Sync {
    async fn search(&self, question_text: &str, k: usize) -> Result<Vec<SearchHit>, VectorIndexError>;
}

#[derive(Debug, Clone)]
pub struct SearchHit {
    pub text: String,
    /// `source` is left optional here; normalisation to `"Unknown"` is the
    /// Unstructured Retriever's job (§4.3), not the index's.
    pub source: Option<String>,
    pub doc_type: Option<String>,
    /// Lower-is-more-similar distance.
    pub distance: f32,
}

impl SearchHit {
    #[must_use]
    pub fn into_chunk(self) -> Chunk {
        Chunk {
            text: self.text,
            metadata: ChunkMetadata {
                source: self.source.unwrap_or_else(|| "Unknown".to_string()),
                doc_type: self.doc_type,
            },
        }
    }
}

/// Optional fire-and-forget interaction sink (§6). Failures never affect
/// the reply; implementations log and swallow errors internally.
#[async_trait]
pub trait InteractionLog: Send + Sync {
    async fn record(&self, summary: TurnSummary);
}

#[derive(Debug, Clone)]
pub struct TurnSummary {
    pub session_id: String,
    pub question: String,
    pub mode: RoutingPlan,
    pub answer_len: usize,
}

/// No-op sink used when no interaction log collaborator is configured.
pub struct NullInteractionLog;

#[async_trait]
impl InteractionLog for NullInteractionLog {
    async fn record(&self, _summary: TurnSummary) {}
}
