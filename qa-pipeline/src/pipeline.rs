//! ABOUTME: The Execution Pipeline — top-level `handle_turn` orchestrator (`spec.md` §4.7)
//! ABOUTME: Per-session turn serialization, concurrent Hybrid dispatch, and a per-turn deadline

use crate::sources::build_sources;
use dashmap::DashMap;
use parking_lot::Mutex as PlMutex;
use qa_config::RouterConfig;
use qa_core::{
    CacheEntryUpdate, InteractionLog, LlmGateway, Mode, NullInteractionLog, QueryExecutor,
    ReplyEnvelope, SchemaCatalog, SessionId, SourceCitation, Turn, TurnSummary,
    UnstructuredResult, VectorIndex,
};
use qa_retrieval_structured::{StructuredError, StructuredRetriever};
use qa_retrieval_unstructured::{UnstructuredError, UnstructuredRetriever};
use qa_router::{ModeClassifier, ReuseJudge};
use qa_session_cache::SessionCache;
use std::sync::Arc;
use tokio::sync::Mutex as AsyncMutex;

const GENERIC_FAILURE_TEXT: &str = "Unable to retrieve information at this time.";
const BLANK_QUESTION_TEXT: &str = "Please enter a question.";

pub struct Pipeline {
    config: RouterConfig,
    cache: SessionCache,
    gateway: Arc<dyn LlmGateway>,
    schema: Arc<dyn SchemaCatalog>,
    structured_retriever: StructuredRetriever,
    unstructured_retriever: UnstructuredRetriever,
    reuse_judge: ReuseJudge,
    mode_classifier: ModeClassifier,
    interaction_log: Arc<dyn InteractionLog>,
    session_locks: DashMap<SessionId, Arc<AsyncMutex<()>>>,
}

impl Pipeline {
    #[must_use]
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        config: RouterConfig,
        gateway: Arc<dyn LlmGateway>,
        schema: Arc<dyn SchemaCatalog>,
        executor: Arc<dyn QueryExecutor>,
        vector_index: Arc<dyn VectorIndex>,
        interaction_log: Option<Arc<dyn InteractionLog>>,
    ) -> Self {
        let cache = SessionCache::new(
            config.max_sessions,
            chrono::Duration::minutes(config.idle_ttl_minutes as i64),
        );
        let structured_retriever = StructuredRetriever::new(
            schema.clone(),
            executor,
            gateway.clone(),
            config.row_limit,
        );
        let unstructured_retriever = UnstructuredRetriever::new(
            vector_index,
            gateway.clone(),
            config.k_default,
            config.k_max,
            config.max_distance,
        );
        let reuse_judge = ReuseJudge::new(gateway.clone());
        let mode_classifier = ModeClassifier::new(gateway.clone());

        Self {
            config,
            cache,
            gateway,
            schema,
            structured_retriever,
            unstructured_retriever,
            reuse_judge,
            mode_classifier,
            interaction_log: interaction_log.unwrap_or_else(|| Arc::new(NullInteractionLog)),
            session_locks: DashMap::new(),
        }
    }

    pub async fn handle_turn(
        &self,
        session_id: SessionId,
        question: &str,
        history: &[Turn],
    ) -> ReplyEnvelope {
        if question.trim().is_empty() {
            return ReplyEnvelope {
                answer: BLANK_QUESTION_TEXT.to_string(),
                sources: Vec::new(),
                mode: Mode::History,
            };
        }

        self.cache.sweep();
        self.prune_session_locks();

        let lock = self.session_lock(&session_id);
        let _guard = lock.lock().await;

        let attempted_mode = Arc::new(PlMutex::new(Mode::Hybrid));
        let deadline = std::time::Duration::from_secs(self.config.turn_deadline_seconds);
        let recent_turns = trailing_window(history, self.config.history_window);

        let envelope = tokio::time::timeout(
            deadline,
            self.run_turn(&session_id, question, recent_turns, attempted_mode.clone()),
        )
        .await
        .unwrap_or_else(|_| {
            tracing::warn!(session = %session_id, "turn timed out; cache left untouched");
            degraded_envelope(*attempted_mode.lock())
        });

        self.interaction_log
            .record(TurnSummary {
                session_id: session_id.to_string(),
                question: question.to_string(),
                mode: envelope.mode,
                answer_len: envelope.answer.len(),
            })
            .await;

        envelope
    }

    fn session_lock(&self, session_id: &SessionId) -> Arc<AsyncMutex<()>> {
        self.session_locks
            .entry(session_id.clone())
            .or_insert_with(|| Arc::new(AsyncMutex::new(())))
            .clone()
    }

    /// Drops per-session lock entries for sessions the cache has already
    /// evicted, so the lock map does not grow without bound across the
    /// lifetime of a long-lived process — the same leak the Session Cache
    /// itself guards against (`spec.md` §1), just one layer up. A lock
    /// currently held by an in-flight turn (`strong_count > 1`) is never
    /// pruned even if its session was just evicted.
    fn prune_session_locks(&self) {
        self.session_locks
            .retain(|session_id, lock| Arc::strong_count(lock) > 1 || self.cache.contains(session_id));
    }

    async fn run_turn(
        &self,
        session_id: &SessionId,
        question: &str,
        recent_turns: &[Turn],
        attempted_mode: Arc<PlMutex<Mode>>,
    ) -> ReplyEnvelope {
        // `peek`, not `get`: the Reuse Judge call below awaits the Gateway
        // and can be cancelled by the turn deadline. Touching
        // `last_touched_at` here would survive that cancellation and break
        // the "cache entry preserved verbatim on timeout" guarantee
        // (`spec.md` §5, §8.5). Activity is only recorded once a path below
        // is known to complete, via an explicit `touch` or `put`.
        let entry = self.cache.peek(session_id);

        let verdict = self
            .reuse_judge
            .should_reuse(question, recent_turns, entry.as_ref())
            .await;

        if verdict.is_reuse() {
            *attempted_mode.lock() = Mode::History;
            if let Some(cached) = entry.as_ref() {
                self.cache.touch(session_id);
                return reply_from_cache(cached);
            }
        }

        let mut plan = self.mode_classifier.classify(question, recent_turns).await;
        if plan == Mode::History && !entry.as_ref().is_some_and(qa_core::CacheEntry::has_artifacts) {
            plan = Mode::Hybrid;
        }
        *attempted_mode.lock() = plan;

        let (answer, sources, mode, update) = match plan {
            Mode::History => {
                let cached = entry
                    .as_ref()
                    .expect("History plan requires a warm cache entry");
                let reply = reply_from_cache(cached);
                (reply.answer, reply.sources, reply.mode, None)
            }
            Mode::Structured => self.dispatch_structured(question, recent_turns).await,
            Mode::Unstructured => self.dispatch_unstructured(question).await,
            Mode::Hybrid => self.dispatch_hybrid(question, recent_turns).await,
        };

        if let Some(update) = update {
            self.cache.put(session_id, update);
        } else if mode == Mode::History {
            self.cache.touch(session_id);
        }

        ReplyEnvelope {
            answer,
            sources,
            mode,
        }
    }

    async fn dispatch_structured(
        &self,
        question: &str,
        recent_turns: &[Turn],
    ) -> (String, Vec<SourceCitation>, Mode, Option<CacheEntryUpdate>) {
        match self
            .structured_retriever
            .retrieve_structured(question, recent_turns)
            .await
        {
            Ok(result) => {
                let sources = build_sources(Some(&result), None);
                let update = CacheEntryUpdate {
                    structured_result: Some(result.clone()),
                    last_answer: Some(result.answer_fragment.clone()),
                    last_mode: Some(Mode::Structured),
                    ..Default::default()
                };
                (result.answer_fragment, sources, Mode::Structured, Some(update))
            }
            Err(StructuredError::Known(qa_core::StructuredFailure::SchemaMiss)) => {
                self.dispatch_unstructured(question).await
            }
            Err(err) => {
                tracing::warn!(error = %err, "structured retrieval failed for this turn");
                (GENERIC_FAILURE_TEXT.to_string(), Vec::new(), Mode::Structured, None)
            }
        }
    }

    async fn dispatch_unstructured(
        &self,
        question: &str,
    ) -> (String, Vec<SourceCitation>, Mode, Option<CacheEntryUpdate>) {
        match self.unstructured_retriever.retrieve_unstructured(question, None).await {
            Ok(result) if result.chunks.is_empty() => {
                if self.mentions_structured_identifiers(question).await {
                    self.retry_as_hybrid_promotion(question, result).await
                } else {
                    let sources = build_sources(None, Some(&result.chunks));
                    let update = unstructured_update(&result);
                    (result.answer_fragment, sources, Mode::Unstructured, Some(update))
                }
            }
            Ok(result) => {
                let sources = build_sources(None, Some(&result.chunks));
                let update = unstructured_update(&result);
                (result.answer_fragment, sources, Mode::Unstructured, Some(update))
            }
            Err(err) => {
                tracing::warn!(error = %err, "unstructured retrieval failed for this turn");
                (GENERIC_FAILURE_TEXT.to_string(), Vec::new(), Mode::Unstructured, None)
            }
        }
    }

    /// One-shot Hybrid retry after an empty-chunk Unstructured result, when
    /// the question names structured-data identifiers (`spec.md` §4.7).
    async fn retry_as_hybrid_promotion(
        &self,
        question: &str,
        empty_unstructured: UnstructuredResult,
    ) -> (String, Vec<SourceCitation>, Mode, Option<CacheEntryUpdate>) {
        match self.structured_retriever.retrieve_structured(question, &[]).await {
            Ok(structured) => {
                let merged = self
                    .gateway
                    .merge_answers(question, &structured.answer_fragment, &empty_unstructured.answer_fragment)
                    .await
                    .unwrap_or_else(|_| structured.answer_fragment.clone());
                let sources = build_sources(Some(&structured), Some(&empty_unstructured.chunks));
                let update = CacheEntryUpdate {
                    structured_result: Some(structured),
                    last_answer: Some(merged.clone()),
                    last_mode: Some(Mode::Structured),
                    ..Default::default()
                };
                (merged, sources, Mode::Structured, Some(update))
            }
            Err(_) => {
                let sources = build_sources(None, Some(&empty_unstructured.chunks));
                let update = unstructured_update(&empty_unstructured);
                (empty_unstructured.answer_fragment, sources, Mode::Unstructured, Some(update))
            }
        }
    }

    async fn mentions_structured_identifiers(&self, question: &str) -> bool {
        self.schema
            .keyword_hint(question)
            .await
            .map(|hints| !hints.is_empty())
            .unwrap_or(false)
    }

    async fn dispatch_hybrid(
        &self,
        question: &str,
        recent_turns: &[Turn],
    ) -> (String, Vec<SourceCitation>, Mode, Option<CacheEntryUpdate>) {
        let (structured_res, unstructured_res) = tokio::join!(
            self.structured_retriever.retrieve_structured(question, recent_turns),
            self.unstructured_retriever.retrieve_unstructured(question, None),
        );

        match (structured_res, unstructured_res) {
            (Ok(s), Ok(u)) => {
                let merged = self
                    .gateway
                    .merge_answers(question, &s.answer_fragment, &u.answer_fragment)
                    .await
                    .unwrap_or_else(|_| format!("{} {}", s.answer_fragment, u.answer_fragment));
                let sources = build_sources(Some(&s), Some(&u.chunks));
                let update = CacheEntryUpdate {
                    structured_result: Some(s),
                    unstructured_result: Some(u),
                    last_answer: Some(merged.clone()),
                    last_mode: Some(Mode::Hybrid),
                    ..Default::default()
                };
                (merged, sources, Mode::Hybrid, Some(update))
            }
            (Ok(s), Err(err)) => {
                tracing::warn!(error = %err, "unstructured side of hybrid turn failed; using structured fragment");
                let sources = build_sources(Some(&s), None);
                let update = CacheEntryUpdate {
                    structured_result: Some(s.clone()),
                    last_answer: Some(s.answer_fragment.clone()),
                    last_mode: Some(Mode::Structured),
                    ..Default::default()
                };
                (s.answer_fragment, sources, Mode::Structured, Some(update))
            }
            (Err(err), Ok(u)) => {
                tracing::warn!(error = %err, "structured side of hybrid turn failed; using unstructured fragment");
                let sources = build_sources(None, Some(&u.chunks));
                let update = unstructured_update(&u);
                (u.answer_fragment, sources, Mode::Unstructured, Some(update))
            }
            (Err(s_err), Err(u_err)) => {
                tracing::warn!(structured_error = %s_err, unstructured_error = %u_err, "both sides of hybrid turn failed");
                (GENERIC_FAILURE_TEXT.to_string(), Vec::new(), Mode::Hybrid, None)
            }
        }
    }
}

fn unstructured_update(result: &UnstructuredResult) -> CacheEntryUpdate {
    CacheEntryUpdate {
        unstructured_result: Some(result.clone()),
        last_answer: Some(result.answer_fragment.clone()),
        last_mode: Some(Mode::Unstructured),
        ..Default::default()
    }
}

fn reply_from_cache(entry: &qa_core::CacheEntry) -> ReplyEnvelope {
    let sources = build_sources(
        entry.structured_result.as_ref(),
        entry.unstructured_result.as_ref().map(|r| r.chunks.as_slice()),
    );
    ReplyEnvelope {
        answer: entry
            .last_answer
            .clone()
            .unwrap_or_else(|| GENERIC_FAILURE_TEXT.to_string()),
        sources,
        mode: Mode::History,
    }
}

fn degraded_envelope(mode: Mode) -> ReplyEnvelope {
    ReplyEnvelope {
        answer: GENERIC_FAILURE_TEXT.to_string(),
        sources: Vec::new(),
        mode,
    }
}

fn trailing_window(history: &[Turn], window: usize) -> &[Turn] {
    let start = history.len().saturating_sub(window);
    &history[start..]
}
