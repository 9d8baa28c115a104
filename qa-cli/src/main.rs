//! ABOUTME: Thin demo binary — reads questions from stdin and prints handle_turn's reply envelope
//! ABOUTME: Exists only to exercise the library crates end-to-end; not itself a spec'd deliverable

mod cli;

use clap::Parser;
use cli::Cli;
use qa_core::testing::{FakeLlmGateway, FakeQueryExecutor, FakeSchemaCatalog, FakeVectorIndex};
use qa_core::{ColumnDescriptor, ExecutorResponse, SessionId, TableInfo, Turn};
use qa_pipeline::Pipeline;
use std::io::{self, BufRead, Write};
use std::sync::Arc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    setup_tracing();

    let config = qa_config::RouterConfig::load(cli.config.as_deref())?;
    tracing::info!(?config, "router configuration loaded");

    // No real LLM vendor, database, or vector index is wired up for this
    // demo binary — the HTTP collaborator's surrounding services own those
    // connections in a real deployment (`spec.md` §1). The scripted fakes
    // here stand in so the pipeline is runnable without them.
    let pipeline = Pipeline::new(
        config,
        Arc::new(FakeLlmGateway::default()),
        Arc::new(FakeSchemaCatalog::new(vec![demo_table()])),
        Arc::new(FakeQueryExecutor::new(Ok(ExecutorResponse {
            columns: vec![ColumnDescriptor {
                name: "count".to_string(),
                type_hint: Some("integer".to_string()),
            }],
            rows: vec![vec![serde_json::json!(0)]],
            tables_referenced: vec!["incident_reports".to_string()],
            truncated: false,
        }))),
        Arc::new(FakeVectorIndex::new(Ok(Vec::new()))),
        None,
    );

    let session_id = SessionId::new(cli.session);
    let mut history: Vec<Turn> = Vec::new();

    let stdin = io::stdin();
    let mut stdout = io::stdout();
    for line in stdin.lock().lines() {
        let question = line?;
        if question.trim().is_empty() {
            continue;
        }

        let reply = pipeline.handle_turn(session_id.clone(), &question, &history).await;

        history.push(Turn {
            role: qa_core::Role::User,
            content: question,
        });
        history.push(Turn {
            role: qa_core::Role::Assistant,
            content: reply.answer.clone(),
        });

        let line = serde_json::to_string(&reply)?;
        writeln!(stdout, "{line}")?;
    }

    Ok(())
}

fn demo_table() -> TableInfo {
    TableInfo {
        name: "incident_reports".to_string(),
        description: "Civic incident reports, one row per filed incident.".to_string(),
        columns: vec![ColumnDescriptor {
            name: "id".to_string(),
            type_hint: Some("integer".to_string()),
        }],
    }
}

/// Mirrors the teacher's stderr-only tracing setup so stdout stays clean
/// for the JSON reply stream.
fn setup_tracing() {
    use tracing_subscriber::EnvFilter;
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}
