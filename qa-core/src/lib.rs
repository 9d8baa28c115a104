//! ABOUTME: Core types, traits, and error model for the civic QA router
//! ABOUTME: Foundation layer every other `qa-*` crate depends on

pub mod collaborators;
pub mod error;
#[cfg(feature = "testing")]
pub mod testing;
pub mod types;

pub use collaborators::{
    ExecutorResponse, InteractionLog, LlmGateway, NullInteractionLog, QueryExecutor,
    SchemaCatalog, SearchHit, TableInfo, TurnSummary, VectorIndex, VectorIndexError,
};
pub use error::{PipelineError, Result};
pub use types::{
    CacheEntry, CacheEntryUpdate, CachedDigest, Chunk, ChunkMetadata, ColumnDescriptor, Mode,
    RefreshReason, ReplyEnvelope, Role, Row, RoutingPlan, ReuseReason, ReuseVerdict, SessionId,
    SourceCitation, StructuredFailure, StructuredResult, Turn, UnstructuredFailure,
    UnstructuredResult,
};
