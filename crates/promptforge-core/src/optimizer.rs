// ABOUTME: Optimizer backend client contract and a concrete HTTP implementation
use async_trait::async_trait;
use backoff::{future::retry, Error as BackoffError, ExponentialBackoff};
use promptforge_types::{ForgeError, NetworkError, OptimizationRequest, OptimizationResult};
use reqwest::Client;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tracing::{debug, warn};

#[async_trait]
pub trait OptimizerClient: Send + Sync {
    async fn optimize(&self, request: &OptimizationRequest) -> Result<OptimizationResult, ForgeError>;
}

#[derive(Debug, Clone)]
pub struct OptimizerConfig {
    pub base_url: String,
    pub api_key: String,
    pub timeout: Duration,
    pub max_concurrent_requests: usize,
    pub max_retries: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

impl OptimizerConfig {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            api_key: api_key.into(),
            timeout: Duration::from_secs(60),
            max_concurrent_requests: 5,
            max_retries: 3,
            initial_backoff: Duration::from_millis(500),
            max_backoff: Duration::from_secs(30),
        }
    }
}

/// Calls a remote optimizer backend over HTTP, retrying transient failures
/// with exponential backoff and bounding concurrent in-flight requests with
/// a semaphore so the queue's worker pool can't overrun the backend's own
/// rate limits.
pub struct HttpOptimizerClient {
    http: Client,
    config: OptimizerConfig,
    semaphore: Arc<Semaphore>,
}

impl HttpOptimizerClient {
    pub fn new(config: OptimizerConfig) -> Result<Self, ForgeError> {
        let http = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| NetworkError::Unreachable(e.to_string()))?;
        let semaphore = Arc::new(Semaphore::new(config.max_concurrent_requests));
        Ok(Self {
            http,
            config,
            semaphore,
        })
    }

    fn backoff_policy(&self) -> ExponentialBackoff {
        ExponentialBackoff {
            initial_interval: self.config.initial_backoff,
            max_interval: self.config.max_backoff,
            max_elapsed_time: Some(self.config.max_backoff * self.config.max_retries.max(1)),
            ..ExponentialBackoff::default()
        }
    }

    async fn send_once(&self, request: &OptimizationRequest) -> Result<OptimizationResult, ForgeError> {
        let response = self
            .http
            .post(format!("{}/v1/optimize", self.config.base_url))
            .bearer_auth(&self.config.api_key)
            .json(request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    NetworkError::Timeout(self.config.timeout)
                } else {
                    NetworkError::Unreachable(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(NetworkError::HttpStatus {
                status: status.as_u16(),
                message,
            }
            .into());
        }

        response
            .json::<OptimizationResult>()
            .await
            .map_err(|e| NetworkError::ShapeMismatch(e.to_string()).into())
    }
}

#[async_trait]
impl OptimizerClient for HttpOptimizerClient {
    async fn optimize(&self, request: &OptimizationRequest) -> Result<OptimizationResult, ForgeError> {
        let _permit = self.semaphore.acquire().await.expect("semaphore is never closed");

        let outcome = retry(self.backoff_policy(), || async {
            match self.send_once(request).await {
                Ok(result) => Ok(result),
                Err(err @ ForgeError::Network(_)) => {
                    warn!(error = %err, "optimizer request failed, retrying");
                    Err(BackoffError::transient(err))
                }
                Err(err) => Err(BackoffError::permanent(err)),
            }
        })
        .await;

        match outcome {
            Ok(result) => {
                debug!(task = %request.task, "optimizer request succeeded");
                Ok(result)
            }
            Err(err) => Err(err),
        }
    }
}

#[cfg(test)]
pub struct MockOptimizerClient {
    pub responder: Box<dyn Fn(&OptimizationRequest) -> Result<OptimizationResult, ForgeError> + Send + Sync>,
}

#[cfg(test)]
#[async_trait]
impl OptimizerClient for MockOptimizerClient {
    async fn optimize(&self, request: &OptimizationRequest) -> Result<OptimizationResult, ForgeError> {
        (self.responder)(request)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use promptforge_types::{OptimizationMetrics, OptimizationStatus};

    fn sample_result() -> OptimizationResult {
        OptimizationResult {
            optimized_prompt: "optimized".to_string(),
            metrics: OptimizationMetrics {
                accuracy_improvement: 0.2,
                token_reduction: 0.1,
                cost_reduction: 1.0,
                processing_time_ms: 10,
                api_calls_used: 1,
                complexity_reduction: 0.0,
            },
            confidence: Some(0.95),
            status: OptimizationStatus::Completed,
            created_at: chrono::Utc::now(),
            completed_at: Some(chrono::Utc::now()),
        }
    }

    #[tokio::test]
    async fn mock_client_returns_configured_result() {
        let client = MockOptimizerClient {
            responder: Box::new(|_| Ok(sample_result())),
        };
        let request = OptimizationRequest::new("summarize", "Hello {{name}}");
        let result = client.optimize(&request).await.unwrap();
        assert_eq!(result.optimized_prompt, "optimized");
    }

    #[tokio::test]
    async fn mock_client_propagates_errors() {
        let client = MockOptimizerClient {
            responder: Box::new(|_| Err(NetworkError::Unreachable("down".to_string()).into())),
        };
        let request = OptimizationRequest::new("summarize", "Hello {{name}}");
        assert!(client.optimize(&request).await.is_err());
    }
}
