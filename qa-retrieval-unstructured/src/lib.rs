//! ABOUTME: Unstructured retrieval crate — vector search over the document index
//! ABOUTME: Distance-threshold filtering and grounded answer composition via the Gateway

mod retriever;

pub use retriever::{UnstructuredError, UnstructuredRetriever};
