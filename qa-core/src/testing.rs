//! ABOUTME: In-memory fake collaborators shared across crate test suites
//! ABOUTME: Gated behind the `testing` feature, mirroring the teacher's mockall `testing` feature

use crate::collaborators::{
    ExecutorResponse, InteractionLog, LlmGateway, QueryExecutor, SchemaCatalog, SearchHit,
    TableInfo, TurnSummary, VectorIndex, VectorIndexError,
};
use crate::types::{
    CachedDigest, Chunk, ColumnDescriptor, Row, RoutingPlan, ReuseReason, ReuseVerdict, Turn,
};
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

/// Scripted Gateway: each operation returns a fixed value and increments a
/// per-operation call counter, so pipeline tests can assert a retriever was
/// (or was not) invoked without standing up a real model vendor.
#[derive(Default)]
pub struct FakeLlmGateway {
    pub plan_reuse_response: Mutex<Option<ReuseVerdict>>,
    pub classify_mode_response: Mutex<Option<RoutingPlan>>,
    pub draft_query_response: Mutex<Option<anyhow::Result<String>>>,
    pub draft_sql_answer_response: Mutex<Option<String>>,
    pub draft_rag_answer_response: Mutex<Option<String>>,
    pub merge_answers_response: Mutex<Option<String>>,
    pub plan_reuse_calls: AtomicUsize,
    pub classify_mode_calls: AtomicUsize,
}

#[async_trait]
impl LlmGateway for FakeLlmGateway {
    async fn plan_reuse(
        &self,
        _question: &str,
        _history: &[Turn],
        _digest: &CachedDigest,
    ) -> anyhow::Result<ReuseVerdict> {
        self.plan_reuse_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .plan_reuse_response
            .lock()
            .unwrap()
            .unwrap_or(ReuseVerdict::Reuse {
                reason: ReuseReason::ModelJudged,
            }))
    }

    async fn classify_mode(&self, _question: &str, _history: &[Turn]) -> anyhow::Result<RoutingPlan> {
        self.classify_mode_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .classify_mode_response
            .lock()
            .unwrap()
            .unwrap_or(RoutingPlan::Hybrid))
    }

    async fn draft_query(&self, _question: &str, _schema_hint: &str) -> anyhow::Result<String> {
        match self.draft_query_response.lock().unwrap().take() {
            Some(result) => result,
            None => Ok("SELECT 1".to_string()),
        }
    }

    async fn draft_sql_answer(
        &self,
        _question: &str,
        _rows: &[Row],
        _columns: &[ColumnDescriptor],
        _tables: &[String],
    ) -> anyhow::Result<String> {
        Ok(self
            .draft_sql_answer_response
            .lock()
            .unwrap()
            .clone()
            .unwrap_or_else(|| "structured answer".to_string()))
    }

    async fn draft_rag_answer(&self, _question: &str, _chunks: &[Chunk]) -> anyhow::Result<String> {
        Ok(self
            .draft_rag_answer_response
            .lock()
            .unwrap()
            .clone()
            .unwrap_or_else(|| "unstructured answer".to_string()))
    }

    async fn merge_answers(
        &self,
        _question: &str,
        sql_fragment: &str,
        rag_fragment: &str,
    ) -> anyhow::Result<String> {
        Ok(self.merge_answers_response.lock().unwrap().clone().unwrap_or_else(|| {
            format!("{sql_fragment} {rag_fragment}")
        }))
    }
}

/// In-memory schema catalog backed by a fixed table list and a keyword
/// matcher over table names appearing (case-insensitively) in the question.
pub struct FakeSchemaCatalog {
    pub tables: Vec<TableInfo>,
}

impl FakeSchemaCatalog {
    #[must_use]
    pub fn new(tables: Vec<TableInfo>) -> Self {
        Self { tables }
    }
}

#[async_trait]
impl SchemaCatalog for FakeSchemaCatalog {
    async fn list_tables(&self) -> anyhow::Result<Vec<TableInfo>> {
        Ok(self.tables.clone())
    }

    async fn keyword_hint(&self, question: &str) -> anyhow::Result<Vec<String>> {
        let normalized = question.to_ascii_lowercase();
        Ok(self
            .tables
            .iter()
            .filter(|t| {
                t.name
                    .split('_')
                    .any(|part| normalized.contains(part))
            })
            .map(|t| t.name.clone())
            .collect())
    }
}

/// Scripted query executor returning a fixed response (or error) regardless
/// of the query text, used to drive zero-row and truncation boundary tests.
pub struct FakeQueryExecutor {
    pub response: Mutex<Option<anyhow::Result<ExecutorResponse>>>,
}

impl FakeQueryExecutor {
    #[must_use]
    pub fn new(response: anyhow::Result<ExecutorResponse>) -> Self {
        Self {
            response: Mutex::new(Some(response)),
        }
    }
}

#[async_trait]
impl QueryExecutor for FakeQueryExecutor {
    async fn execute_readonly(
        &self,
        _query_text: &str,
        _row_limit: usize,
    ) -> anyhow::Result<ExecutorResponse> {
        self.response
            .lock()
            .unwrap()
            .take()
            .unwrap_or_else(|| Err(anyhow::anyhow!("fake executor exhausted")))
    }
}

/// Scripted vector index returning a fixed hit list.
pub struct FakeVectorIndex {
    pub response: Mutex<Option<Result<Vec<SearchHit>, VectorIndexError>>>,
}

impl FakeVectorIndex {
    #[must_use]
    pub fn new(response: Result<Vec<SearchHit>, VectorIndexError>) -> Self {
        Self {
            response: Mutex::new(Some(response)),
        }
    }
}

#[async_trait]
impl VectorIndex for FakeVectorIndex {
    async fn search(
        &self,
        _question_text: &str,
        _k: usize,
    ) -> Result<Vec<SearchHit>, VectorIndexError> {
        self.response.lock().unwrap().take().unwrap_or_else(|| {
            Err(VectorIndexError::Unavailable(anyhow::anyhow!(
                "fake index exhausted"
            )))
        })
    }
}

/// Interaction log that records every summary it receives, for assertions.
#[derive(Default)]
pub struct RecordingInteractionLog {
    pub recorded: Mutex<Vec<TurnSummary>>,
}

#[async_trait]
impl InteractionLog for RecordingInteractionLog {
    async fn record(&self, summary: TurnSummary) {
        self.recorded.lock().unwrap().push(summary);
    }
}
