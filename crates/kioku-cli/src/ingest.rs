//! Batch ingestion
//!
//! Batches are sent in chunks of concurrent requests with a pause between
//! chunks. Bad items are reported and skipped; the run stops only when a
//! whole chunk fails while the backend looks down.

use anyhow::{Context, Result};
use futures::future::join_all;
use std::future::Future;
use std::time::Duration;

use crate::api::{is_infrastructure, AddMemoriesRequest, AddMemoriesResponse};

#[derive(Debug, Clone)]
pub struct IngestOptions {
    pub chunk_size: usize,
    pub pause: Duration,
    /// Consecutive infrastructure failures that, with a fully failed chunk, abort the run
    pub abort_after: usize,
}

impl Default for IngestOptions {
    fn default() -> Self {
        Self {
            chunk_size: 10,
            pause: Duration::from_millis(100),
            abort_after: 3,
        }
    }
}

/// One failed batch
#[derive(Debug)]
pub struct ItemFailure {
    /// Position in the input
    pub index: usize,
    pub error: String,
    pub infrastructure: bool,
}

#[derive(Debug, Default)]
pub struct IngestReport {
    pub succeeded: usize,
    pub memories_stored: usize,
    pub failures: Vec<ItemFailure>,
    /// Batches never sent because the run aborted
    pub skipped: usize,
    pub aborted: bool,
}

/// Parse a JSONL file of batches. Blank lines are ignored; unparseable lines
/// are returned as errors next to the good ones.
pub fn parse_batches(content: &str) -> (Vec<AddMemoriesRequest>, Vec<(usize, String)>) {
    let mut batches = Vec::new();
    let mut errors = Vec::new();

    for (i, line) in content.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<AddMemoriesRequest>(line)
            .with_context(|| format!("line {}", i + 1))
        {
            Ok(batch) => batches.push(batch),
            Err(e) => errors.push((i + 1, format!("{e:#}"))),
        }
    }

    (batches, errors)
}

/// Send every batch through `send`
pub async fn ingest<F, Fut>(
    batches: Vec<AddMemoriesRequest>,
    options: &IngestOptions,
    send: F,
) -> IngestReport
where
    F: Fn(AddMemoriesRequest) -> Fut,
    Fut: Future<Output = Result<AddMemoriesResponse>>,
{
    let mut report = IngestReport::default();
    let total = batches.len();
    let chunk_size = options.chunk_size.max(1);
    let mut consecutive_infra = 0usize;
    let mut sent = 0usize;

    let mut pending = batches.into_iter().enumerate().peekable();
    while pending.peek().is_some() {
        let chunk: Vec<(usize, AddMemoriesRequest)> = pending.by_ref().take(chunk_size).collect();
        sent += chunk.len();

        let results = join_all(chunk.into_iter().map(|(index, batch)| {
            let fut = send(batch);
            async move { (index, fut.await) }
        }))
        .await;

        let mut chunk_successes = 0;
        for (index, result) in results {
            match result {
                Ok(response) => {
                    chunk_successes += 1;
                    consecutive_infra = 0;
                    report.succeeded += 1;
                    report.memories_stored += response.memories.len();
                }
                Err(e) => {
                    let infrastructure = is_infrastructure(&e);
                    consecutive_infra = if infrastructure {
                        consecutive_infra + 1
                    } else {
                        0
                    };
                    tracing::warn!("⚠️  Batch {} failed: {:#}", index + 1, e);
                    report.failures.push(ItemFailure {
                        index,
                        error: format!("{e:#}"),
                        infrastructure,
                    });
                }
            }
        }

        if chunk_successes == 0 && consecutive_infra >= options.abort_after {
            report.aborted = true;
            report.skipped = total - sent;
            tracing::error!(
                "❌ Aborting ingest after {} consecutive infrastructure failures",
                consecutive_infra
            );
            break;
        }

        if pending.peek().is_some() && !options.pause.is_zero() {
            tokio::time::sleep(options.pause).await;
        }
    }

    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::ApiError;
    use reqwest::StatusCode;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn batch(source_id: &str) -> AddMemoriesRequest {
        serde_json::from_value(serde_json::json!({
            "messages": [{ "role": "user", "content": "remember the milk" }],
            "ownerId": 1,
            "source": "chat",
            "sourceId": source_id
        }))
        .unwrap()
    }

    fn batches(n: usize) -> Vec<AddMemoriesRequest> {
        (0..n).map(|i| batch(&format!("b-{i}"))).collect()
    }

    fn options() -> IngestOptions {
        IngestOptions {
            pause: Duration::ZERO,
            ..Default::default()
        }
    }

    fn down() -> anyhow::Error {
        ApiError::Unreachable("connection refused".into()).into()
    }

    fn bad_request() -> anyhow::Error {
        ApiError::Status {
            status: StatusCode::BAD_REQUEST,
            body: "ownerId is required".into(),
        }
        .into()
    }

    #[tokio::test]
    async fn test_all_succeed() {
        let calls = Arc::new(AtomicUsize::new(0));
        let report = ingest(batches(25), &options(), |_| {
            let calls = calls.clone();
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(AddMemoriesResponse::default())
            }
        })
        .await;

        assert_eq!(calls.load(Ordering::SeqCst), 25);
        assert_eq!(report.succeeded, 25);
        assert!(report.failures.is_empty());
        assert!(!report.aborted);
    }

    #[tokio::test]
    async fn test_bad_items_are_skipped() {
        // Every fourth batch (b-3, b-7, b-11) is rejected
        let report = ingest(batches(12), &options(), |b| async move {
            let position: usize = b.source_id.trim_start_matches("b-").parse().unwrap();
            if position % 4 == 3 {
                Err(bad_request())
            } else {
                Ok(AddMemoriesResponse::default())
            }
        })
        .await;

        assert_eq!(report.succeeded, 9);
        assert_eq!(report.failures.len(), 3);
        assert!(report.failures.iter().all(|f| !f.infrastructure));
        assert!(!report.aborted);
    }

    #[tokio::test]
    async fn test_backend_down_aborts_after_first_chunk() {
        let calls = Arc::new(AtomicUsize::new(0));
        let report = ingest(batches(35), &options(), |_| {
            let calls = calls.clone();
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(down())
            }
        })
        .await;

        assert!(report.aborted);
        assert_eq!(calls.load(Ordering::SeqCst), 10);
        assert_eq!(report.failures.len(), 10);
        assert_eq!(report.skipped, 25);
    }

    #[tokio::test]
    async fn test_non_infrastructure_failures_never_abort() {
        let report = ingest(batches(30), &options(), |_| async { Err(bad_request()) }).await;

        assert!(!report.aborted);
        assert_eq!(report.failures.len(), 30);
        assert_eq!(report.skipped, 0);
    }

    #[tokio::test]
    async fn test_partial_chunk_success_keeps_going() {
        // Only the first batch of every chunk succeeds; the rest see a 503
        let report = ingest(batches(30), &options(), |b| async move {
            if b.source_id.ends_with('0') {
                Ok(AddMemoriesResponse::default())
            } else {
                Err(ApiError::Status {
                    status: StatusCode::SERVICE_UNAVAILABLE,
                    body: String::new(),
                }
                .into())
            }
        })
        .await;

        assert!(!report.aborted);
        assert_eq!(report.succeeded, 3);
        assert_eq!(report.failures.len(), 27);
    }

    #[test]
    fn test_parse_batches() {
        let content = format!(
            "{}\n\n{{not json}}\n{}\n",
            serde_json::to_string(&batch("a")).unwrap(),
            serde_json::to_string(&batch("b")).unwrap()
        );
        let (batches, errors) = parse_batches(&content);

        assert_eq!(batches.len(), 2);
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].0, 3);
    }
}
