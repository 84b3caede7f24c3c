use std::time::Duration;

use chrono::Utc;
use wayfarer::error::ServiceError;
use wayfarer::kernel::content::ContentKind;
use wayfarer::kernel::event::{DeliveryLogEntry, DeliveryOutcome};
use wayfarer::kernel::poi::PoiId;
use wayfarer::kernel::session::TripId;
use wayfarer::services::retry::{retry, with_timeout, RetryPolicy};
use wayfarer::services::store::{JsonlDeliveryLog, MemoryDeliveryLog};
use wayfarer::services::DeliveryLog;

fn entry(outcome: DeliveryOutcome) -> DeliveryLogEntry {
    DeliveryLogEntry {
        trip_id: TripId::new(),
        timestamp: Utc::now(),
        content_type: ContentKind::Story,
        poi_id: Some(PoiId::new("castle")),
        outcome,
    }
}

#[test]
fn test_backoff_doubles() {
    let policy = RetryPolicy::single_retry(Duration::from_millis(250));
    assert_eq!(policy.max_attempts, 2);
    assert_eq!(policy.backoff_for(0), Duration::from_millis(250));
    assert_eq!(policy.backoff_for(1), Duration::from_millis(500));
}

#[tokio::test]
async fn test_timeout_maps_to_service_error() {
    let result: Result<(), ServiceError> = with_timeout(
        "slow",
        Duration::from_millis(10),
        std::future::pending::<Result<(), ServiceError>>(),
    )
    .await;
    assert!(matches!(result, Err(ServiceError::Timeout { service: "slow", after_ms: 10 })));
}

#[tokio::test]
async fn test_retry_stops_after_policy() {
    let policy = RetryPolicy::single_retry(Duration::from_millis(1));
    let mut attempts = Vec::new();
    let result: Result<(), ServiceError> = retry("flaky", policy, |attempt| {
        attempts.push(attempt);
        async { Err(ServiceError::Unavailable("down".to_string())) }
    })
    .await;
    assert!(result.is_err());
    assert_eq!(attempts, vec![0, 1]);
}

#[tokio::test]
async fn test_cancellation_never_retried() {
    let policy = RetryPolicy::single_retry(Duration::from_millis(1));
    let mut calls = 0;
    let result: Result<(), ServiceError> = retry("cancelled", policy, |_| {
        calls += 1;
        async { Err(ServiceError::Cancelled) }
    })
    .await;
    assert!(matches!(result, Err(ServiceError::Cancelled)));
    assert_eq!(calls, 1);
}

#[tokio::test]
async fn test_memory_log_keeps_order() {
    let log = MemoryDeliveryLog::new();
    log.append(entry(DeliveryOutcome::Delivered)).await.unwrap();
    log.append(entry(DeliveryOutcome::Preempted)).await.unwrap();

    let outcomes: Vec<_> = log.entries().into_iter().map(|e| e.outcome).collect();
    assert_eq!(outcomes, vec![DeliveryOutcome::Delivered, DeliveryOutcome::Preempted]);
}

#[tokio::test]
async fn test_jsonl_log_appends_lines() {
    let path = std::env::temp_dir().join(format!("wayfarer-log-{}.jsonl", uuid::Uuid::new_v4()));
    let log = JsonlDeliveryLog::new(&path);
    log.append(entry(DeliveryOutcome::Delivered)).await.unwrap();
    log.append(entry(DeliveryOutcome::Cancelled)).await.unwrap();

    let text = tokio::fs::read_to_string(&path).await.unwrap();
    let parsed: Vec<DeliveryLogEntry> = text
        .lines()
        .map(|l| serde_json::from_str(l).unwrap())
        .collect();
    assert_eq!(parsed.len(), 2);
    assert_eq!(parsed[1].outcome, DeliveryOutcome::Cancelled);
    assert!(text.contains("\"contentType\":\"story\""), "camelCase fields: {}", text);

    let _ = tokio::fs::remove_file(&path).await;
}
