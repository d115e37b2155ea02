//! Batch executor: run a list of operation descriptors against one session,
//! sequentially or with bounded concurrency.
//!
//! Per-operation failures are captured into the result list instead of
//! aborting the batch, and results always come back in input order. Within
//! a single session the page lock still serializes the browser work, so a
//! "parallel" batch overlaps validation, pacing, and post-processing rather
//! than page operations.

use std::sync::Arc;

use futures::future::join_all;
use tokio::sync::Semaphore;
use tracing::info;

use crate::error::{Result, ServiceError};

use super::types::{BatchItemResult, BatchOperation, BatchRequest, BatchResult};
use super::Operations;

impl Operations {
    pub async fn batch(&self, session_id: &str, request: BatchRequest) -> Result<BatchResult> {
        if request.operations.is_empty() {
            return Err(ServiceError::validation(
                "operations",
                "batch requires at least one operation",
            ));
        }
        let max_concurrent = request.max_concurrent.max(1);

        // Resolve once up front so an unknown session fails the whole batch
        // rather than every item.
        self.registry.get(session_id).await?;

        let results = if request.parallel {
            let semaphore = Arc::new(Semaphore::new(max_concurrent));
            let futures = request.operations.iter().map(|operation| {
                let semaphore = Arc::clone(&semaphore);
                async move {
                    let _permit = semaphore
                        .acquire()
                        .await
                        .expect("batch semaphore is never closed");
                    self.run_one(session_id, operation).await
                }
            });
            join_all(futures).await
        } else {
            let mut results = Vec::with_capacity(request.operations.len());
            for operation in &request.operations {
                results.push(self.run_one(session_id, operation).await);
            }
            results
        };

        let successful = results.iter().filter(|r| r.success).count();
        let total = results.len();

        info!(
            session_id,
            total,
            successful,
            parallel = request.parallel,
            "batch completed"
        );

        Ok(BatchResult {
            success: successful == total,
            results,
            total_operations: total,
            successful_operations: successful,
            failed_operations: total - successful,
            parallel: request.parallel,
            max_concurrent: if request.parallel { max_concurrent } else { 1 },
        })
    }

    async fn run_one(&self, session_id: &str, operation: &BatchOperation) -> BatchItemResult {
        let name = operation.name().to_string();
        let outcome = match operation.clone() {
            BatchOperation::Navigate(request) => self
                .navigate(session_id, request)
                .await
                .and_then(|r| serde_json::to_value(r).map_err(into_serialize_error)),
            BatchOperation::Extract(request) => self
                .extract(session_id, request)
                .await
                .and_then(|r| serde_json::to_value(r).map_err(into_serialize_error)),
            BatchOperation::ExtractStructured {
                content_type,
                selector,
                timeout_ms,
            } => self
                .extract_structured(session_id, content_type, selector, timeout_ms)
                .await
                .and_then(|r| serde_json::to_value(r).map_err(into_serialize_error)),
            BatchOperation::DetectCaptcha {
                selector,
                timeout_ms,
            } => self
                .detect_captcha(session_id, selector, timeout_ms)
                .await
                .and_then(|r| serde_json::to_value(r).map_err(into_serialize_error)),
            BatchOperation::Interact(request) => self
                .interact(session_id, request)
                .await
                .and_then(|r| serde_json::to_value(r).map_err(into_serialize_error)),
            BatchOperation::Screenshot(request) => self
                .screenshot(session_id, request)
                .await
                .and_then(|r| serde_json::to_value(r).map_err(into_serialize_error)),
        };

        match outcome {
            Ok(data) => BatchItemResult {
                operation: name,
                success: true,
                data: Some(data),
                error: None,
                error_code: None,
            },
            Err(e) => BatchItemResult {
                operation: name,
                success: false,
                data: None,
                error: Some(e.to_string()),
                error_code: Some(e.error_code().to_string()),
            },
        }
    }
}

fn into_serialize_error(e: serde_json::Error) -> ServiceError {
    ServiceError::browser("batch", format!("result serialization failed: {e}"))
}
