//! ABOUTME: Source extraction — projects retrieval artifacts into deduplicated citations
//! ABOUTME: Structured citations always precede unstructured (`spec.md` §4.7)

use qa_core::{Chunk, SourceCitation, StructuredResult};
use std::collections::HashSet;

/// Builds the citation sequence for a turn from whichever sides ran,
/// deduplicating by identity while preserving first occurrence.
#[must_use]
pub fn build_sources(
    structured: Option<&StructuredResult>,
    unstructured_chunks: Option<&[Chunk]>,
) -> Vec<SourceCitation> {
    let mut sources = Vec::new();
    let mut seen_tables = HashSet::new();
    let mut seen_rag = HashSet::new();

    if let Some(result) = structured {
        for table in &result.tables {
            if seen_tables.insert(table.clone()) {
                sources.push(SourceCitation::Sql {
                    table: table.clone(),
                });
            }
        }
    }

    if let Some(chunks) = unstructured_chunks {
        for chunk in chunks {
            let key = (chunk.metadata.source.clone(), chunk.metadata.doc_type.clone());
            if seen_rag.insert(key) {
                sources.push(SourceCitation::Rag {
                    source: chunk.metadata.source.clone(),
                    doc_type: chunk.metadata.doc_type.clone(),
                });
            }
        }
    }

    sources
}

#[cfg(test)]
mod tests {
    use super::*;
    use qa_core::{ChunkMetadata, ColumnDescriptor};

    fn structured_with_tables(tables: &[&str]) -> StructuredResult {
        StructuredResult {
            columns: vec![ColumnDescriptor {
                name: "id".into(),
                type_hint: None,
            }],
            rows: vec![vec![serde_json::json!(1)]],
            tables: tables.iter().map(|t| t.to_string()).collect(),
            answer_fragment: String::new(),
            sql_text: String::new(),
            truncated: false,
        }
    }

    fn chunk(source: &str, doc_type: Option<&str>) -> Chunk {
        Chunk {
            text: "text".into(),
            metadata: ChunkMetadata {
                source: source.to_string(),
                doc_type: doc_type.map(str::to_string),
            },
        }
    }

    #[test]
    fn structured_citations_precede_unstructured() {
        let structured = structured_with_tables(&["incidents"]);
        let chunks = vec![chunk("doc-1", Some("ordinance"))];

        let sources = build_sources(Some(&structured), Some(&chunks));

        assert_eq!(sources.len(), 2);
        assert!(matches!(sources[0], SourceCitation::Sql { .. }));
        assert!(matches!(sources[1], SourceCitation::Rag { .. }));
    }

    #[test]
    fn duplicate_tables_suppressed_preserving_first_occurrence() {
        let structured = structured_with_tables(&["incidents", "incidents", "events"]);

        let sources = build_sources(Some(&structured), None);

        assert_eq!(sources.len(), 2);
    }

    #[test]
    fn duplicate_rag_pairs_suppressed() {
        let chunks = vec![
            chunk("doc-1", Some("ordinance")),
            chunk("doc-1", Some("ordinance")),
            chunk("doc-1", None),
        ];

        let sources = build_sources(None, Some(&chunks));

        assert_eq!(sources.len(), 2);
    }

    #[test]
    fn no_artifacts_yields_empty_sources() {
        assert!(build_sources(None, None).is_empty());
    }
}
