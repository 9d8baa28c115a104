//! ABOUTME: Structured Retriever (spec.md §4.2) — NL question to executed query results
//! ABOUTME: Schema lookup, draft, read-only guard, execution, grounded answer composition

mod readonly;
mod retriever;

pub use readonly::is_read_only;
pub use retriever::{StructuredError, StructuredRetriever};
