//! ABOUTME: End-to-end turn scenarios exercising handle_turn's mode dispatch
//! ABOUTME: Mirrors the literal-input/expected-output scenarios the pipeline is built against

use qa_config::RouterConfig;
use qa_core::testing::{FakeLlmGateway, FakeQueryExecutor, FakeSchemaCatalog, FakeVectorIndex};
use qa_core::{
    ColumnDescriptor, ExecutorResponse, Mode, SearchHit, SessionId, SourceCitation, TableInfo,
};
use qa_pipeline::Pipeline;
use std::sync::Arc;

fn incident_reports_table() -> TableInfo {
    TableInfo {
        name: "incident_reports".to_string(),
        description: "Civic incident reports".to_string(),
        columns: vec![ColumnDescriptor {
            name: "id".to_string(),
            type_hint: Some("int".to_string()),
        }],
    }
}

fn events_table() -> TableInfo {
    TableInfo {
        name: "events".to_string(),
        description: "Upcoming civic events".to_string(),
        columns: vec![ColumnDescriptor {
            name: "id".to_string(),
            type_hint: Some("int".to_string()),
        }],
    }
}

fn new_pipeline(
    gateway: Arc<FakeLlmGateway>,
    schema: Arc<FakeSchemaCatalog>,
    executor: Arc<FakeQueryExecutor>,
    index: Arc<FakeVectorIndex>,
) -> Pipeline {
    Pipeline::new(
        RouterConfig::default(),
        gateway,
        schema,
        executor,
        index,
        None,
    )
}

#[tokio::test]
async fn s1_structured_turn_cites_the_consulted_table() {
    let gateway = Arc::new(FakeLlmGateway::default());
    *gateway.classify_mode_response.lock().unwrap() = Some(Mode::Structured);
    let schema = Arc::new(FakeSchemaCatalog::new(vec![incident_reports_table()]));
    let executor = Arc::new(FakeQueryExecutor::new(Ok(ExecutorResponse {
        columns: vec![ColumnDescriptor {
            name: "count".to_string(),
            type_hint: Some("int".to_string()),
        }],
        rows: vec![vec![serde_json::json!(42)]],
        tables_referenced: vec!["incident_reports".to_string()],
        truncated: false,
    })));
    let index = Arc::new(FakeVectorIndex::new(Ok(Vec::new())));
    let pipeline = new_pipeline(gateway, schema, executor, index);

    let reply = pipeline
        .handle_turn(
            SessionId::new("A"),
            "How many incident reports happened in November 2024?",
            &[],
        )
        .await;

    assert_eq!(reply.mode, Mode::Structured);
    assert_eq!(reply.sources.len(), 1);
    assert!(matches!(
        &reply.sources[0],
        SourceCitation::Sql { table } if table == "incident_reports"
    ));
}

#[tokio::test]
async fn s4_unstructured_turn_cites_only_rag_sources() {
    let gateway = Arc::new(FakeLlmGateway::default());
    *gateway.classify_mode_response.lock().unwrap() = Some(Mode::Unstructured);
    let schema = Arc::new(FakeSchemaCatalog::new(vec![]));
    let executor = Arc::new(FakeQueryExecutor::new(Err(anyhow::anyhow!("unused"))));
    let index = Arc::new(FakeVectorIndex::new(Ok(vec![SearchHit {
        text: "Residents raised traffic safety concerns at the meeting.".to_string(),
        source: Some("town-hall-minutes-2024-06".to_string()),
        doc_type: Some("minutes".to_string()),
        distance: 0.2,
    }])));
    let pipeline = new_pipeline(gateway, schema, executor, index);

    let reply = pipeline
        .handle_turn(
            SessionId::new("B"),
            "What do residents say about traffic safety?",
            &[],
        )
        .await;

    assert_eq!(reply.mode, Mode::Unstructured);
    assert!(!reply.sources.is_empty());
    assert!(reply
        .sources
        .iter()
        .all(|s| matches!(s, SourceCitation::Rag { .. })));
}

#[tokio::test]
async fn s5_hybrid_turn_reports_structured_before_unstructured_sources() {
    let gateway = Arc::new(FakeLlmGateway::default());
    *gateway.classify_mode_response.lock().unwrap() = Some(Mode::Hybrid);
    let schema = Arc::new(FakeSchemaCatalog::new(vec![events_table()]));
    let executor = Arc::new(FakeQueryExecutor::new(Ok(ExecutorResponse {
        columns: vec![ColumnDescriptor {
            name: "name".to_string(),
            type_hint: None,
        }],
        rows: vec![vec![serde_json::json!("Farmers Market")]],
        tables_referenced: vec!["events".to_string()],
        truncated: false,
    })));
    let index = Arc::new(FakeVectorIndex::new(Ok(vec![SearchHit {
        text: "Community newsletter highlights this week's news.".to_string(),
        source: Some("newsletter-42".to_string()),
        doc_type: None,
        distance: 0.3,
    }])));
    let pipeline = new_pipeline(gateway, schema, executor, index);

    let reply = pipeline
        .handle_turn(
            SessionId::new("C"),
            "What events are on this weekend and what's the latest community news?",
            &[],
        )
        .await;

    assert_eq!(reply.mode, Mode::Hybrid);
    assert_eq!(reply.sources.len(), 2);
    assert!(matches!(reply.sources[0], SourceCitation::Sql { .. }));
    assert!(matches!(reply.sources[1], SourceCitation::Rag { .. }));
}

#[tokio::test]
async fn s6_executor_error_degrades_to_generic_failure_and_leaves_cache_untouched() {
    let gateway = Arc::new(FakeLlmGateway::default());
    *gateway.classify_mode_response.lock().unwrap() = Some(Mode::Structured);
    let schema = Arc::new(FakeSchemaCatalog::new(vec![incident_reports_table()]));
    let executor = Arc::new(FakeQueryExecutor::new(Err(anyhow::anyhow!(
        "database connection reset"
    ))));
    let index = Arc::new(FakeVectorIndex::new(Ok(Vec::new())));
    let pipeline = new_pipeline(gateway, schema, executor, index);

    let reply = pipeline
        .handle_turn(
            SessionId::new("D"),
            "How many incident reports were filed?",
            &[],
        )
        .await;

    assert_eq!(reply.answer, "Unable to retrieve information at this time.");
    assert!(reply.sources.is_empty());
    assert_eq!(reply.mode, Mode::Structured);
}

#[tokio::test]
async fn blank_question_short_circuits_with_no_retrieval() {
    let gateway = Arc::new(FakeLlmGateway::default());
    let schema = Arc::new(FakeSchemaCatalog::new(vec![]));
    let executor = Arc::new(FakeQueryExecutor::new(Err(anyhow::anyhow!("unused"))));
    let index = Arc::new(FakeVectorIndex::new(Ok(Vec::new())));
    let pipeline = new_pipeline(gateway.clone(), schema, executor, index);

    let reply = pipeline.handle_turn(SessionId::new("E"), "   ", &[]).await;

    assert_eq!(reply.answer, "Please enter a question.");
    assert!(reply.sources.is_empty());
    assert_eq!(reply.mode, Mode::History);
    assert_eq!(
        gateway
            .classify_mode_calls
            .load(std::sync::atomic::Ordering::SeqCst),
        0
    );
}

#[tokio::test]
async fn follow_up_turn_reuses_cached_answer_as_history_mode() {
    let gateway = Arc::new(FakeLlmGateway::default());
    *gateway.classify_mode_response.lock().unwrap() = Some(Mode::Structured);
    *gateway.plan_reuse_response.lock().unwrap() = Some(qa_core::ReuseVerdict::Reuse {
        reason: qa_core::ReuseReason::ModelJudged,
    });
    let schema = Arc::new(FakeSchemaCatalog::new(vec![incident_reports_table()]));
    let executor = Arc::new(FakeQueryExecutor::new(Ok(ExecutorResponse {
        columns: vec![ColumnDescriptor {
            name: "count".to_string(),
            type_hint: None,
        }],
        rows: vec![vec![serde_json::json!(7)]],
        tables_referenced: vec!["incident_reports".to_string()],
        truncated: false,
    })));
    let index = Arc::new(FakeVectorIndex::new(Ok(Vec::new())));
    let pipeline = new_pipeline(gateway.clone(), schema, executor, index);

    let first = pipeline
        .handle_turn(SessionId::new("F"), "how many incident reports?", &[])
        .await;
    assert_eq!(first.mode, Mode::Structured);

    let second = pipeline
        .handle_turn(SessionId::new("F"), "summarise what you just told me", &[])
        .await;

    assert_eq!(second.mode, Mode::History);
    assert_eq!(second.sources, first.sources);
}
