// ==================== PERIODIC SCHEDULER ====================
// Enqueues recurring jobs on a fixed interval.

use crate::jobs::{Job, JobQueue};
use tokio::time::{interval_at, Duration, Instant};

/// `cleanup-expired-tokens` cadence.
pub const CLEANUP_INTERVAL: Duration = Duration::from_secs(3600);

/// Starts the scheduler in the background. The first run happens one interval after startup.
pub fn start_scheduler(queue: JobQueue) {
    log::info!(
        "📅 Starting job scheduler (cleanup-expired-tokens every {}s)",
        CLEANUP_INTERVAL.as_secs()
    );

    tokio::spawn(async move {
        let mut ticker = interval_at(Instant::now() + CLEANUP_INTERVAL, CLEANUP_INTERVAL);

        loop {
            ticker.tick().await;
            run_tick(&queue);
        }
    });
}

fn run_tick(queue: &JobQueue) -> String {
    let job_id = queue.enqueue(Job::CleanupExpiredTokens);
    let purged = queue.purge_results();
    log::debug!(
        "⏰ Scheduled cleanup-expired-tokens ({}), {} stale job results dropped",
        job_id,
        purged
    );
    job_id
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jobs::JobStatus;

    #[test]
    fn test_tick_enqueues_cleanup() {
        let queue = JobQueue::new();
        let job_id = run_tick(&queue);

        let record = queue.status(&job_id).unwrap();
        assert_eq!(record.name, "cleanup_expired_tokens");
        assert_eq!(record.status, JobStatus::Pending);
    }
}
