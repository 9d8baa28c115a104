//! ABOUTME: Model-vendor abstraction the Gateway drives, generalized from ProviderInstance
//! ABOUTME: Implementations plug in an actual chat-completion API; tests use a scripted stub

use async_trait::async_trait;

/// A single text-generation call, stripped down from the teacher's
/// `ProviderInstance::complete` to the three knobs every Gateway operation
/// needs: a temperature, a max-tokens ceiling, and a timeout.
#[async_trait]
pub trait ModelVendor: Send + Sync {
    async fn generate(&self, request: &GenerationRequest) -> anyhow::Result<String>;

    fn model_id(&self) -> &str;
}

#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub prompt: String,
    pub temperature: f32,
    pub max_tokens: usize,
    pub timeout: std::time::Duration,
    /// Whether the vendor should be asked to constrain output to JSON.
    pub json_mode: bool,
}

impl GenerationRequest {
    #[must_use]
    pub fn new(prompt: impl Into<String>, temperature: f32) -> Self {
        Self {
            prompt: prompt.into(),
            temperature,
            max_tokens: 1024,
            timeout: std::time::Duration::from_secs(20),
            json_mode: false,
        }
    }

    #[must_use]
    pub const fn json_mode(mut self) -> Self {
        self.json_mode = true;
        self
    }
}
