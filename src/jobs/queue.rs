use crate::jobs::{execute, Job, JobContext, QueueName};
use crate::utils::trace::{self, TraceContext};
use chrono::{DateTime, Utc};
use rand::Rng;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};

pub const MAX_RETRIES: u32 = 3;
const MAX_BACKOFF_SECS: u64 = 600;
const RESULT_TTL: Duration = Duration::from_secs(3600);

#[derive(Debug, Clone)]
struct Envelope {
    id: String,
    job: Job,
    /// Retries already used
    attempt: u32,
    trace_id: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, utoipa::ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Running,
    Retrying,
    Completed,
    Failed,
}

/// Last known state of a job.
#[derive(Debug, Clone, Serialize, utoipa::ToSchema)]
pub struct JobRecord {
    pub job_id: String,
    pub name: String,
    pub queue: String,
    pub status: JobStatus,
    pub retries: u32,
    #[schema(value_type = Object)]
    pub result: Option<serde_json::Value>,
    pub error: Option<String>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip)]
    touched: Instant,
}

struct Receivers {
    email: UnboundedReceiver<Envelope>,
    default: UnboundedReceiver<Envelope>,
}

/// Handle for enqueueing jobs. Cheap to clone.
#[derive(Clone)]
pub struct JobQueue {
    email: UnboundedSender<Envelope>,
    default: UnboundedSender<Envelope>,
    receivers: Arc<Mutex<Option<Receivers>>>,
    results: Arc<Mutex<HashMap<String, JobRecord>>>,
}

impl Default for JobQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl JobQueue {
    pub fn new() -> Self {
        let (email, email_rx) = unbounded_channel();
        let (default, default_rx) = unbounded_channel();

        Self {
            email,
            default,
            receivers: Arc::new(Mutex::new(Some(Receivers {
                email: email_rx,
                default: default_rx,
            }))),
            results: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Queues `job` under the current trace id and returns its job id.
    pub fn enqueue(&self, job: Job) -> String {
        let envelope = Envelope {
            id: uuid::Uuid::new_v4().to_string(),
            job,
            attempt: 0,
            trace_id: trace::current_trace_id(),
        };
        let id = envelope.id.clone();

        log::debug!("📥 Job queued: {} ({})", envelope.job.name(), id);
        self.record(&envelope, JobStatus::Pending, None, None);
        self.send(envelope);
        id
    }

    fn send(&self, envelope: Envelope) {
        let queue = envelope.job.queue();
        let sender = match queue {
            QueueName::Email => &self.email,
            QueueName::Default => &self.default,
        };

        if sender.send(envelope).is_err() {
            log::error!("❌ Job queue '{}' is closed", queue.as_str());
        }
    }

    pub fn status(&self, job_id: &str) -> Option<JobRecord> {
        self.results.lock().ok()?.get(job_id).cloned()
    }

    #[cfg(test)]
    pub fn job_names(&self) -> Vec<String> {
        let results = self.results.lock().unwrap();
        results.values().map(|r| r.name.clone()).collect()
    }

    /// Forgets results older than one hour. Returns how many were dropped.
    pub fn purge_results(&self) -> usize {
        let Ok(mut results) = self.results.lock() else {
            return 0;
        };

        let before = results.len();
        results.retain(|_, record| record.touched.elapsed() < RESULT_TTL);
        before - results.len()
    }

    fn record(
        &self,
        envelope: &Envelope,
        status: JobStatus,
        result: Option<serde_json::Value>,
        error: Option<String>,
    ) {
        if let Ok(mut results) = self.results.lock() {
            results.insert(
                envelope.id.clone(),
                JobRecord {
                    job_id: envelope.id.clone(),
                    name: envelope.job.name().to_string(),
                    queue: envelope.job.queue().as_str().to_string(),
                    status,
                    retries: envelope.attempt,
                    result,
                    error,
                    updated_at: Utc::now(),
                    touched: Instant::now(),
                },
            );
        }
    }

    /// Spawns `workers_per_queue` workers on each queue. Only the first call has any effect.
    pub fn start_workers(&self, workers_per_queue: usize, ctx: JobContext) -> bool {
        let Some(receivers) = self.receivers.lock().ok().and_then(|mut r| r.take()) else {
            log::warn!("⚠️  Job workers already started");
            return false;
        };

        let workers = workers_per_queue.max(1);
        for (queue, rx) in [
            (QueueName::Email, receivers.email),
            (QueueName::Default, receivers.default),
        ] {
            let rx = Arc::new(tokio::sync::Mutex::new(rx));
            for n in 0..workers {
                let name = format!("{}-worker-{}", queue.as_str(), n + 1);
                tokio::spawn(worker_loop(name, rx.clone(), ctx.clone()));
            }
        }

        log::info!(
            "✅ Job workers started: {} per queue (email, default)",
            workers
        );
        true
    }

    async fn process(&self, envelope: Envelope, ctx: &JobContext) {
        let name = envelope.job.name();
        log::info!("▶️  Job started: {} ({})", name, envelope.id);
        self.record(&envelope, JobStatus::Running, None, None);

        match execute(&envelope.job, ctx).await {
            Ok(result) => {
                log::info!(
                    "✅ Job completed: {} ({}) -> {}",
                    name,
                    envelope.id,
                    truncate(&result.to_string(), 100)
                );
                self.record(&envelope, JobStatus::Completed, Some(result), None);
            }
            Err(e) if envelope.attempt < MAX_RETRIES => {
                let delay = backoff_delay(envelope.attempt);
                log::warn!(
                    "🔄 Job retrying: {} ({}) retry {}/{} in {}s: {}",
                    name,
                    envelope.id,
                    envelope.attempt + 1,
                    MAX_RETRIES,
                    delay.as_secs(),
                    e
                );
                self.record(&envelope, JobStatus::Retrying, None, Some(e.to_string()));
                self.schedule_retry(envelope, delay);
            }
            Err(e) => {
                log::error!("❌ Job failed: {} ({}): {}", name, envelope.id, e);
                self.record(&envelope, JobStatus::Failed, None, Some(e.to_string()));
            }
        }
    }

    fn schedule_retry(&self, mut envelope: Envelope, delay: Duration) {
        envelope.attempt += 1;
        let queue = self.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            queue.send(envelope);
        });
    }
}

async fn worker_loop(
    name: String,
    rx: Arc<tokio::sync::Mutex<UnboundedReceiver<Envelope>>>,
    ctx: JobContext,
) {
    log::debug!("👷 {} ready", name);

    loop {
        let next = rx.lock().await.recv().await;
        let Some(envelope) = next else {
            log::info!("🛑 {} stopped: queue closed", name);
            break;
        };

        let context = TraceContext {
            trace_id: envelope
                .trace_id
                .clone()
                .unwrap_or_else(|| envelope.id.clone()),
            path: None,
            expose_errors: false,
        };
        trace::scope(context, ctx.queue.process(envelope, &ctx)).await;
    }
}

/// Exponential backoff `2^attempt` seconds, capped, with full jitter.
fn backoff_delay(attempt: u32) -> Duration {
    let cap = 2u64.saturating_pow(attempt).min(MAX_BACKOFF_SECS);
    Duration::from_secs(rand::thread_rng().gen_range(0..=cap))
}

fn truncate(s: &str, max_chars: usize) -> String {
    s.chars().take(max_chars).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{RedisClient, TokenBlacklist};

    fn started_queue() -> JobQueue {
        let queue = JobQueue::new();
        let ctx = JobContext {
            queue: queue.clone(),
            blacklist: TokenBlacklist::new(RedisClient::disconnected()),
        };
        assert!(queue.start_workers(1, ctx));
        queue
    }

    async fn wait_for(queue: &JobQueue, job_id: &str, done: impl Fn(JobStatus) -> bool) -> JobRecord {
        for _ in 0..200 {
            if let Some(record) = queue.status(job_id) {
                if done(record.status) {
                    return record;
                }
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("job {} did not reach the expected state", job_id);
    }

    #[test]
    fn test_backoff_is_capped() {
        for attempt in 0..20 {
            let cap = 2u64.saturating_pow(attempt).min(MAX_BACKOFF_SECS);
            assert!(backoff_delay(attempt).as_secs() <= cap);
        }
    }

    #[test]
    fn test_enqueue_records_pending() {
        let queue = JobQueue::new();
        let id = queue.enqueue(Job::DeactivateUserData { user_id: "7".into() });

        let record = queue.status(&id).unwrap();
        assert_eq!(record.status, JobStatus::Pending);
        assert_eq!(record.queue, "default");
        assert_eq!(record.retries, 0);
        assert!(queue.status("missing").is_none());
    }

    #[tokio::test]
    async fn test_worker_completes_job() {
        let queue = started_queue();
        let id = queue.enqueue(Job::ExportUserData {
            user_id: "42".into(),
            export_format: "json".into(),
        });

        let record = wait_for(&queue, &id, |s| s == JobStatus::Completed).await;
        let result = record.result.unwrap();
        assert_eq!(result["file_path"], "/exports/user_42.json");
    }

    #[tokio::test]
    async fn test_failing_job_is_retried() {
        let queue = started_queue();
        let id = queue.enqueue(Job::SendEmail {
            to_email: "no-at-sign".into(),
            subject: "Hi".into(),
            body: "Hello".into(),
            html_body: None,
        });

        let record = wait_for(&queue, &id, |s| {
            matches!(s, JobStatus::Retrying | JobStatus::Failed)
        })
        .await;
        assert!(record.error.unwrap().contains("no-at-sign"));
    }

    #[tokio::test]
    async fn test_workers_start_once() {
        let queue = started_queue();
        let ctx = JobContext {
            queue: queue.clone(),
            blacklist: TokenBlacklist::new(RedisClient::disconnected()),
        };
        assert!(!queue.start_workers(1, ctx));
    }

    #[test]
    fn test_purge_keeps_fresh_results() {
        let queue = JobQueue::new();
        queue.enqueue(Job::CleanupExpiredTokens);
        assert_eq!(queue.purge_results(), 0);
    }

    #[test]
    fn test_truncate_counts_chars() {
        assert_eq!(truncate("héllo", 2), "hé");
    }
}
