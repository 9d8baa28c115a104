//! ABOUTME: UnstructuredRetriever — vector search, distance threshold, answer composition
//! ABOUTME: Implements spec.md §4.3's contract and failure taxonomy

use qa_core::{
    Chunk, LlmGateway, UnstructuredFailure, UnstructuredResult, VectorIndex, VectorIndexError,
};
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum UnstructuredError {
    #[error("unstructured retrieval failed: {0:?}")]
    Known(UnstructuredFailure),
    #[error("LLM gateway contract violated during unstructured retrieval: {0}")]
    ModelContract(#[source] anyhow::Error),
}

impl From<UnstructuredFailure> for UnstructuredError {
    fn from(failure: UnstructuredFailure) -> Self {
        Self::Known(failure)
    }
}

impl From<VectorIndexError> for UnstructuredError {
    fn from(err: VectorIndexError) -> Self {
        match err {
            VectorIndexError::Unavailable(_) => UnstructuredFailure::IndexUnavailable.into(),
            VectorIndexError::Embedding(_) => UnstructuredFailure::EmbeddingFailure.into(),
        }
    }
}

pub struct UnstructuredRetriever {
    index: Arc<dyn VectorIndex>,
    gateway: Arc<dyn LlmGateway>,
    k_default: usize,
    k_max: usize,
    max_distance: f32,
}

impl UnstructuredRetriever {
    #[must_use]
    pub fn new(
        index: Arc<dyn VectorIndex>,
        gateway: Arc<dyn LlmGateway>,
        k_default: usize,
        k_max: usize,
        max_distance: f32,
    ) -> Self {
        Self {
            index,
            gateway,
            k_default,
            k_max,
            max_distance,
        }
    }

    /// Clamps a caller-supplied `k` to `k_max`, silently (`spec.md` §8).
    pub(crate) fn clamp_k(&self, requested: Option<usize>) -> usize {
        requested.unwrap_or(self.k_default).min(self.k_max)
    }

    pub async fn retrieve_unstructured(
        &self,
        question: &str,
        k: Option<usize>,
    ) -> Result<UnstructuredResult, UnstructuredError> {
        let k = self.clamp_k(k);
        let hits = self.index.search(question, k).await?;

        let surviving: Vec<Chunk> = hits
            .into_iter()
            .filter(|hit| hit.distance <= self.max_distance)
            .map(|hit| hit.into_chunk())
            .collect();

        if surviving.is_empty() {
            return Ok(UnstructuredResult {
                chunks: Vec::new(),
                answer_fragment: "No relevant documents found.".to_string(),
            });
        }

        let answer_fragment = self
            .gateway
            .draft_rag_answer(question, &surviving)
            .await
            .map_err(UnstructuredError::ModelContract)?;

        Ok(UnstructuredResult {
            chunks: surviving,
            answer_fragment,
        })
    }
}
