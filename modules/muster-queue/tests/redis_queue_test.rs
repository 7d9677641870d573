//! Integration tests against a real Redis container. Gated behind
//! `test-support` and `#[ignore]` — run with
//! `cargo test -p muster-queue --features test-support -- --ignored`.

#![cfg(feature = "test-support")]

use chrono::Utc;
use muster_queue::{EnqueueOptions, JobState, Page, QueueBroker, QueueName, RedisQueueBroker};
use testcontainers::runners::AsyncRunner;
use testcontainers::ContainerAsync;
use testcontainers_modules::redis::Redis;

async fn redis_broker() -> (ContainerAsync<Redis>, RedisQueueBroker) {
    let container = Redis::default().start().await.expect("start redis container");
    let host_port = container.get_host_port_ipv4(6379).await.expect("get host port");
    let url = format!("redis://127.0.0.1:{host_port}");

    let broker = RedisQueueBroker::connect(&url).await.expect("connect to redis");
    (container, broker)
}

fn never_shutdown() -> tokio::sync::watch::Receiver<bool> {
    let (_tx, rx) = tokio::sync::watch::channel(false);
    rx
}

#[tokio::test]
#[ignore]
async fn enqueue_dequeue_ack_roundtrip() {
    let (_container, broker) = redis_broker().await;

    let job_id = broker
        .enqueue(QueueName::Scrape, serde_json::json!({"sourceId": "abc"}), EnqueueOptions::default())
        .await
        .unwrap();

    let counts = broker.counts(QueueName::Scrape).await.unwrap();
    assert_eq!(counts.waiting, 1);

    let mut shutdown = never_shutdown();
    let job = broker.dequeue(QueueName::Scrape, &mut shutdown).await.unwrap().unwrap();
    assert_eq!(job.id, job_id);
    assert_eq!(job.attempts, 0);

    let counts = broker.counts(QueueName::Scrape).await.unwrap();
    assert_eq!(counts.waiting, 0);
    assert_eq!(counts.active, 1);

    broker.ack(&job).await.unwrap();

    let counts = broker.counts(QueueName::Scrape).await.unwrap();
    assert_eq!(counts.active, 0);
    assert_eq!(counts.completed, 1);
}

#[tokio::test]
#[ignore]
async fn enqueue_with_explicit_job_id_is_idempotent() {
    let (_container, broker) = redis_broker().await;

    let opts = EnqueueOptions { job_id: Some("match-after-scrape-run-1".into()), ..Default::default() };
    let a = broker.enqueue(QueueName::Match, serde_json::json!({}), opts.clone()).await.unwrap();
    let b = broker.enqueue(QueueName::Match, serde_json::json!({}), opts).await.unwrap();
    assert_eq!(a, b);

    let counts = broker.counts(QueueName::Match).await.unwrap();
    assert_eq!(counts.waiting, 1);
}

#[tokio::test]
#[ignore]
async fn nack_retries_with_backoff_then_dead_letters() {
    let (_container, broker) = redis_broker().await;

    let opts = EnqueueOptions { max_attempts: Some(2), ..Default::default() };
    broker.enqueue(QueueName::Instagram, serde_json::json!({}), opts).await.unwrap();

    let mut shutdown = never_shutdown();
    let job = broker.dequeue(QueueName::Instagram, &mut shutdown).await.unwrap().unwrap();
    broker.nack(&job, "boom").await.unwrap();

    // First nack: job goes back to delayed (backoff), not immediately waiting.
    let counts = broker.counts(QueueName::Instagram).await.unwrap();
    assert_eq!(counts.delayed, 1);
    assert_eq!(counts.waiting, 0);
    assert_eq!(counts.failed, 0);

    // Force it ready by retrying it directly is not representative of real backoff,
    // so instead simulate a second delivery by listing the delayed job and nacking
    // it again to hit max_attempts.
    let delayed = broker.list(QueueName::Instagram, JobState::Delayed, Page::default()).await.unwrap();
    assert_eq!(delayed.len(), 1);
    let mut job = delayed.into_iter().next().unwrap();
    job.attempts = 1;
    broker.nack(&job, "boom again").await.unwrap();

    let counts = broker.counts(QueueName::Instagram).await.unwrap();
    assert_eq!(counts.failed, 1);
    assert_eq!(counts.waiting, 0);
    assert_eq!(counts.delayed, 0);
}

#[tokio::test]
#[ignore]
async fn retry_moves_dead_lettered_job_back_to_waiting() {
    let (_container, broker) = redis_broker().await;

    let opts = EnqueueOptions { max_attempts: Some(1), ..Default::default() };
    let job_id = broker.enqueue(QueueName::Scrape, serde_json::json!({}), opts).await.unwrap();

    let mut shutdown = never_shutdown();
    let job = broker.dequeue(QueueName::Scrape, &mut shutdown).await.unwrap().unwrap();
    broker.nack(&job, "fatal").await.unwrap();

    let counts = broker.counts(QueueName::Scrape).await.unwrap();
    assert_eq!(counts.failed, 1);

    broker.retry(QueueName::Scrape, &job_id).await.unwrap();

    let counts = broker.counts(QueueName::Scrape).await.unwrap();
    assert_eq!(counts.failed, 0);
    assert_eq!(counts.waiting, 1);
}

#[tokio::test]
#[ignore]
async fn clean_removes_old_completed_jobs() {
    let (_container, broker) = redis_broker().await;

    broker
        .enqueue(QueueName::Scrape, serde_json::json!({}), EnqueueOptions::default())
        .await
        .unwrap();

    let mut shutdown = never_shutdown();
    let job = broker.dequeue(QueueName::Scrape, &mut shutdown).await.unwrap().unwrap();
    broker.ack(&job).await.unwrap();

    // Cutoff in the future: the just-completed job is older than it, so it's swept.
    let removed = broker
        .clean(QueueName::Scrape, JobState::Completed, Utc::now() + chrono::Duration::seconds(1))
        .await
        .unwrap();
    assert_eq!(removed, 1);

    let counts = broker.counts(QueueName::Scrape).await.unwrap();
    assert_eq!(counts.completed, 0);
}
