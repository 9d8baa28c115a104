//! ABOUTME: Reuse Judge — decides whether cached artifacts answer a follow-up turn
//! ABOUTME: Forces a temporal-shift refresh without consulting the Gateway (`spec.md` §4.5)

use crate::temporal::is_temporal_shift;
use qa_core::{CacheEntry, CachedDigest, LlmGateway, RefreshReason, ReuseVerdict, Turn};
use std::sync::Arc;
use tracing::warn;

pub struct ReuseJudge {
    gateway: Arc<dyn LlmGateway>,
}

impl ReuseJudge {
    #[must_use]
    pub fn new(gateway: Arc<dyn LlmGateway>) -> Self {
        Self { gateway }
    }

    pub async fn should_reuse(
        &self,
        question: &str,
        history: &[Turn],
        entry: Option<&CacheEntry>,
    ) -> ReuseVerdict {
        let Some(entry) = entry.filter(|e| e.has_artifacts()) else {
            return ReuseVerdict::Refresh {
                reason: RefreshReason::NoHistory,
            };
        };

        let digest = CachedDigest::from_entry(entry);
        let digest_text = digest.last_answer_summary.as_deref().unwrap_or("");
        if is_temporal_shift(question, digest_text) {
            return ReuseVerdict::Refresh {
                reason: RefreshReason::TemporalShift,
            };
        }

        match self.gateway.plan_reuse(question, history, &digest).await {
            Ok(verdict) => verdict,
            Err(err) => {
                warn!(error = %err, "plan_reuse call failed; defaulting to refresh");
                ReuseVerdict::Refresh {
                    reason: RefreshReason::ParseFallback,
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use qa_core::testing::FakeLlmGateway;
    use qa_core::{Mode, ReuseReason, StructuredResult};

    fn entry_with_structured_result() -> CacheEntry {
        let mut entry = CacheEntry::new("s1".into());
        entry.structured_result = Some(StructuredResult {
            columns: vec![],
            rows: vec![],
            tables: vec!["incidents".into()],
            answer_fragment: "referencing march 2024 filings".into(),
            sql_text: String::new(),
            truncated: false,
        });
        entry.last_answer = Some("referencing march 2024 filings".into());
        entry.last_mode = Some(Mode::Structured);
        entry
    }

    #[tokio::test]
    async fn no_prior_artifacts_forces_no_history_refresh() {
        let judge = ReuseJudge::new(Arc::new(FakeLlmGateway::default()));
        let empty = CacheEntry::new("s1".into());

        let verdict = judge.should_reuse("anything?", &[], Some(&empty)).await;

        assert!(matches!(
            verdict,
            ReuseVerdict::Refresh {
                reason: RefreshReason::NoHistory
            }
        ));
    }

    #[tokio::test]
    async fn no_entry_at_all_forces_no_history_refresh() {
        let judge = ReuseJudge::new(Arc::new(FakeLlmGateway::default()));

        let verdict = judge.should_reuse("anything?", &[], None).await;

        assert!(matches!(
            verdict,
            ReuseVerdict::Refresh {
                reason: RefreshReason::NoHistory
            }
        ));
    }

    #[tokio::test]
    async fn differing_temporal_anchor_forces_refresh_without_calling_gateway() {
        let gateway = Arc::new(FakeLlmGateway::default());
        let judge = ReuseJudge::new(gateway.clone());
        let entry = entry_with_structured_result();

        let verdict = judge
            .should_reuse("what about 2019 filings?", &[], Some(&entry))
            .await;

        assert!(matches!(
            verdict,
            ReuseVerdict::Refresh {
                reason: RefreshReason::TemporalShift
            }
        ));
        assert_eq!(gateway.plan_reuse_calls.load(std::sync::atomic::Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn no_temporal_shift_defers_to_gateway_verdict() {
        let gateway = Arc::new(FakeLlmGateway::default());
        *gateway.plan_reuse_response.lock().unwrap() = Some(ReuseVerdict::Reuse {
            reason: ReuseReason::ModelJudged,
        });
        let judge = ReuseJudge::new(gateway.clone());
        let entry = entry_with_structured_result();

        let verdict = judge
            .should_reuse("any more detail on that?", &[], Some(&entry))
            .await;

        assert!(verdict.is_reuse());
        assert_eq!(gateway.plan_reuse_calls.load(std::sync::atomic::Ordering::SeqCst), 1);
    }
}
