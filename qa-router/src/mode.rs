//! ABOUTME: Mode Classifier — decides a turn's Routing Plan without ever retrieving
//! ABOUTME: Falls back to Hybrid, the safest superset, on any Gateway irregularity

use qa_core::{LlmGateway, RoutingPlan, Turn};
use std::sync::Arc;
use tracing::warn;

pub struct ModeClassifier {
    gateway: Arc<dyn LlmGateway>,
}

impl ModeClassifier {
    #[must_use]
    pub fn new(gateway: Arc<dyn LlmGateway>) -> Self {
        Self { gateway }
    }

    pub async fn classify(&self, question: &str, history: &[Turn]) -> RoutingPlan {
        match self.gateway.classify_mode(question, history).await {
            Ok(plan) => plan,
            Err(err) => {
                warn!(error = %err, "classify_mode call failed; defaulting to hybrid");
                RoutingPlan::Hybrid
            }
        }
    }
}
