//! ABOUTME: Turn routing: Reuse Judge and Mode Classifier
//! ABOUTME: Both consult the LLM Gateway as a deterministic-shaped oracle, never as a controller

mod mode;
mod reuse;
mod temporal;

pub use mode::ModeClassifier;
pub use reuse::ReuseJudge;
pub use temporal::{extract_anchors, is_temporal_shift};
