//! Model provider abstraction
//!
//! One request in, one complete response text out. The chat flow only
//! depends on [`ModelClient`]; the Gemini service is the production
//! implementation.

mod error;
mod gemini;
mod types;

pub use error::{LlmError, LlmErrorKind};
pub use gemini::{GeminiService, DEFAULT_MODEL};
pub use types::*;

use async_trait::async_trait;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Common interface for model providers
#[async_trait]
pub trait ModelClient: Send + Sync {
    /// Generate the full response text for a request
    async fn generate(&self, request: &ModelRequest) -> Result<String, LlmError>;

    /// Get the model ID
    fn model_id(&self) -> &str;
}

/// Run `generate` with a deadline. Expiry maps to [`LlmErrorKind::Timeout`].
pub async fn generate_with_timeout(
    client: &dyn ModelClient,
    request: &ModelRequest,
    limit: Duration,
) -> Result<String, LlmError> {
    match tokio::time::timeout(limit, client.generate(request)).await {
        Ok(result) => result,
        Err(_) => Err(LlmError::timeout(format!(
            "No response from {} within {}s",
            client.model_id(),
            limit.as_secs()
        ))),
    }
}

/// Logging wrapper for model services
pub struct LoggingService {
    inner: Arc<dyn ModelClient>,
    model_id: String,
}

impl LoggingService {
    pub fn new(inner: Arc<dyn ModelClient>) -> Self {
        let model_id = inner.model_id().to_string();
        Self { inner, model_id }
    }
}

#[async_trait]
impl ModelClient for LoggingService {
    async fn generate(&self, request: &ModelRequest) -> Result<String, LlmError> {
        let start = Instant::now();
        let result = self.inner.generate(request).await;
        let duration = start.elapsed();

        match &result {
            Ok(text) => {
                tracing::info!(
                    model = %self.model_id,
                    duration_ms = %duration.as_millis(),
                    has_image = request.image.is_some(),
                    response_bytes = text.len(),
                    "Model request completed"
                );
            }
            Err(e) => {
                tracing::error!(
                    model = %self.model_id,
                    duration_ms = %duration.as_millis(),
                    error = %e.message,
                    retryable = e.kind.is_retryable(),
                    "Model request failed"
                );
            }
        }

        result
    }

    fn model_id(&self) -> &str {
        &self.model_id
    }
}

/// Stand-in used when no API key is configured; every call fails with an
/// auth error so the viewer sees why nothing comes back
pub struct UnconfiguredModel;

#[async_trait]
impl ModelClient for UnconfiguredModel {
    async fn generate(&self, _request: &ModelRequest) -> Result<String, LlmError> {
        Err(LlmError::auth("GEMINI_API_KEY is not set"))
    }

    fn model_id(&self) -> &str {
        "unconfigured"
    }
}

/// Configuration for the model provider
#[derive(Debug, Clone, Default)]
pub struct LlmConfig {
    pub gemini_api_key: Option<String>,
    pub model: Option<String>,
    pub base_url: Option<String>,
}

impl LlmConfig {
    pub fn from_env() -> Self {
        Self {
            gemini_api_key: std::env::var("GEMINI_API_KEY")
                .ok()
                .filter(|k| !k.is_empty()),
            model: std::env::var("GEMINI_MODEL").ok(),
            base_url: std::env::var("GEMINI_BASE_URL").ok(),
        }
    }

    /// Build the logging-wrapped client this configuration describes
    pub fn build_client(&self) -> Result<Arc<dyn ModelClient>, LlmError> {
        let Some(key) = self.gemini_api_key.clone() else {
            tracing::warn!("No model API key configured. Set GEMINI_API_KEY.");
            return Ok(Arc::new(UnconfiguredModel));
        };

        let model = self.model.as_deref().unwrap_or(DEFAULT_MODEL);
        let service = GeminiService::new(key, model, self.base_url.as_deref())?;
        Ok(Arc::new(LoggingService::new(Arc::new(service))))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{DelayedMockModelClient, MockModelClient};

    #[tokio::test(start_paused = true)]
    async fn test_deadline_expiry_is_a_timeout() {
        let client = DelayedMockModelClient::new("slow", Duration::from_secs(120));
        client.queue_response("## Late");

        let request = ModelRequest::for_prompt("hi", None);
        let err = generate_with_timeout(&client, &request, Duration::from_secs(60))
            .await
            .unwrap_err();
        assert_eq!(err.kind, LlmErrorKind::Timeout);
    }

    #[tokio::test]
    async fn test_response_within_deadline_passes_through() {
        let client = MockModelClient::new("fast");
        client.queue_response("## Done");

        let request = ModelRequest::for_prompt("hi", None);
        let text = generate_with_timeout(&client, &request, Duration::from_secs(60))
            .await
            .unwrap();
        assert_eq!(text, "## Done");
        assert_eq!(client.recorded_requests(), vec![request]);
    }

    #[tokio::test]
    async fn test_missing_key_yields_auth_failure() {
        let client = LlmConfig::default().build_client().unwrap();
        assert_eq!(client.model_id(), "unconfigured");
        let err = client
            .generate(&ModelRequest::for_prompt("hi", None))
            .await
            .unwrap_err();
        assert_eq!(err.kind, LlmErrorKind::Auth);
    }

    #[tokio::test]
    async fn test_logging_wrapper_keeps_model_id_and_result() {
        let inner = Arc::new(MockModelClient::new("gemini-test"));
        inner.queue_error(LlmError::rate_limit("slow down"));
        let logged = LoggingService::new(inner);

        assert_eq!(logged.model_id(), "gemini-test");
        let err = logged
            .generate(&ModelRequest::for_prompt("hi", None))
            .await
            .unwrap_err();
        assert_eq!(err.kind, LlmErrorKind::RateLimit);
    }
}
