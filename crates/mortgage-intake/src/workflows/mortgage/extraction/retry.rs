use std::future::Future;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

use super::super::domain::DocumentType;
use super::super::errors::PipelineError;
use super::service::ServiceError;

/// Bounded retry with exponential backoff for document-service calls.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub timeout_ms: u64,
    pub initial_backoff_ms: u64,
    pub backoff_multiplier: f64,
    pub max_backoff_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            timeout_ms: 15_000,
            initial_backoff_ms: 250,
            backoff_multiplier: 2.0,
            max_backoff_ms: 4_000,
        }
    }
}

impl RetryPolicy {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Delay before the attempt following `attempt` (1-based).
    pub fn backoff_after(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(i32::MAX as u32) as i32;
        let scaled = self.initial_backoff_ms as f64 * self.backoff_multiplier.powi(exponent);
        let capped = if scaled.is_finite() {
            scaled.min(self.max_backoff_ms as f64).max(0.0)
        } else {
            self.max_backoff_ms as f64
        };
        Duration::from_millis(capped as u64)
    }
}

/// Run `call` under the policy, converting exhaustion into a terminal pipeline error.
pub(crate) async fn call_with_retry<T, F, Fut>(
    policy: &RetryPolicy,
    document_type: DocumentType,
    field: Option<&str>,
    mut call: F,
) -> Result<T, PipelineError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ServiceError>>,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut last_error = None;

    for attempt in 1..=max_attempts {
        match tokio::time::timeout(policy.timeout(), call()).await {
            Ok(Ok(value)) => return Ok(value),
            Ok(Err(error)) => {
                warn!(
                    document_type = document_type.key(),
                    field = field.unwrap_or("*"),
                    attempt,
                    error = %error,
                    "document service call failed"
                );
                let retryable = error.is_retryable();
                last_error = Some(PipelineError::ExtractionServiceError {
                    document_type,
                    field: field.map(str::to_string),
                    attempts: attempt,
                    detail: error.to_string(),
                });
                if !retryable {
                    break;
                }
            }
            Err(_) => {
                warn!(
                    document_type = document_type.key(),
                    field = field.unwrap_or("*"),
                    attempt,
                    timeout_ms = policy.timeout_ms,
                    "document service call timed out"
                );
                last_error = Some(PipelineError::ExtractionTimeout {
                    document_type,
                    field: field.map(str::to_string),
                    attempts: attempt,
                });
            }
        }

        if attempt < max_attempts {
            tokio::time::sleep(policy.backoff_after(attempt)).await;
        }
    }

    Err(
        last_error.unwrap_or_else(|| PipelineError::ExtractionServiceError {
            document_type,
            field: field.map(str::to_string),
            attempts: 0,
            detail: "no attempts were made".to_string(),
        }),
    )
}
