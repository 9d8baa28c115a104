//! ABOUTME: StructuredRetriever — schema lookup, query draft, execution, answer composition
//! ABOUTME: Implements spec.md §4.2's contract and failure taxonomy

use crate::readonly::is_read_only;
use qa_core::{
    LlmGateway, QueryExecutor, SchemaCatalog, StructuredFailure, StructuredResult, Turn,
};
use std::sync::Arc;
use thiserror::Error;

/// `retrieve_structured` can fail in one of the named taxonomy variants
/// (`spec.md` §4.2) or with a Gateway contract violation, which §7 says is
/// surfaced to the caller directly rather than absorbed into the taxonomy.
#[derive(Debug, Error)]
pub enum StructuredError {
    #[error("structured retrieval failed: {0:?}")]
    Known(StructuredFailure),
    #[error("LLM gateway contract violated during structured retrieval: {0}")]
    ModelContract(#[source] anyhow::Error),
}

impl From<StructuredFailure> for StructuredError {
    fn from(failure: StructuredFailure) -> Self {
        Self::Known(failure)
    }
}

pub struct StructuredRetriever {
    schema: Arc<dyn SchemaCatalog>,
    executor: Arc<dyn QueryExecutor>,
    gateway: Arc<dyn LlmGateway>,
    row_limit: usize,
}

impl StructuredRetriever {
    #[must_use]
    pub fn new(
        schema: Arc<dyn SchemaCatalog>,
        executor: Arc<dyn QueryExecutor>,
        gateway: Arc<dyn LlmGateway>,
        row_limit: usize,
    ) -> Self {
        Self {
            schema,
            executor,
            gateway,
            row_limit,
        }
    }

    pub async fn retrieve_structured(
        &self,
        question: &str,
        _recent_turns: &[Turn],
    ) -> Result<StructuredResult, StructuredError> {
        let candidate_tables = self
            .schema
            .keyword_hint(question)
            .await
            .map_err(|e| StructuredError::Known(StructuredFailure::ExecutorError(e.to_string())))?;
        if candidate_tables.is_empty() {
            return Err(StructuredFailure::SchemaMiss.into());
        }

        let tables = self
            .schema
            .list_tables()
            .await
            .map_err(|e| StructuredError::Known(StructuredFailure::ExecutorError(e.to_string())))?;
        let schema_hint = render_schema_hint(&tables, &candidate_tables);

        // Any failure to draft a usable query — including a Gateway contract
        // violation after its internal retry — is the `DraftInvalid` taxonomy
        // member, handled inside the retriever rather than surfaced as a
        // generic `ModelContractError` (see DESIGN.md).
        let query_text = self
            .gateway
            .draft_query(question, &schema_hint)
            .await
            .map_err(|_| StructuredError::Known(StructuredFailure::DraftInvalid))?;

        if !is_read_only(&query_text) {
            tracing::warn!(draft = %query_text, "rejecting non read-only drafted query");
            return Err(StructuredFailure::NonReadOnlyQuery.into());
        }

        let response = self
            .executor
            .execute_readonly(&query_text, self.row_limit)
            .await
            .map_err(|e| StructuredError::Known(StructuredFailure::ExecutorError(e.to_string())))?;

        if response.rows.is_empty() {
            return Ok(StructuredResult {
                columns: response.columns,
                rows: Vec::new(),
                tables: response.tables_referenced,
                answer_fragment: "No matching records found.".to_string(),
                sql_text: query_text,
                truncated: false,
            });
        }

        let was_capped = response.rows.len() > self.row_limit;
        let mut rows_for_answer = response.rows;
        rows_for_answer.truncate(self.row_limit);
        let truncated = response.truncated || was_capped;

        let mut answer_fragment = self
            .gateway
            .draft_sql_answer(
                question,
                &rows_for_answer,
                &response.columns,
                &response.tables_referenced,
            )
            .await
            .map_err(StructuredError::ModelContract)?;

        if truncated {
            answer_fragment.push_str(" (results were truncated to the first ");
            answer_fragment.push_str(&self.row_limit.to_string());
            answer_fragment.push_str(" rows.)");
        }

        Ok(StructuredResult {
            columns: response.columns,
            rows: rows_for_answer,
            tables: response.tables_referenced,
            answer_fragment,
            sql_text: query_text,
            truncated,
        })
    }
}

fn render_schema_hint(tables: &[qa_core::TableInfo], candidates: &[String]) -> String {
    tables
        .iter()
        .filter(|table| candidates.contains(&table.name))
        .map(|table| {
            let columns = table
                .columns
                .iter()
                .map(|c| c.name.clone())
                .collect::<Vec<_>>()
                .join(", ");
            format!("{}({}) -- {}", table.name, columns, table.description)
        })
        .collect::<Vec<_>>()
        .join("\n")
}
