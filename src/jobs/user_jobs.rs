use crate::cache::TokenBlacklist;
use crate::jobs::{Job, JobQueue};
use serde_json::{json, Value};

fn now() -> String {
    chrono::Utc::now().to_rfc3339()
}

/// Hourly sweep of revoked tokens whose natural expiry has passed.
pub fn cleanup_expired_tokens(blacklist: &TokenBlacklist) -> Value {
    log::info!("🧹 Starting expired token cleanup");
    let deleted_count = blacklist.purge_expired();
    log::info!("🧹 Cleaned up {} expired tokens", deleted_count);

    json!({
        "status": "completed",
        "deleted_count": deleted_count,
        "timestamp": now(),
    })
}

/// Post-registration work: currently the welcome email.
pub fn process_user_registration(queue: &JobQueue, user_id: &str, user_email: &str) -> Value {
    log::info!("👤 Processing registration for user {}", user_id);

    let user_name = user_email.split('@').next().unwrap_or(user_email);
    let welcome_job_id = queue.enqueue(Job::SendWelcomeEmail {
        user_email: user_email.to_string(),
        user_name: user_name.to_string(),
    });

    json!({
        "status": "completed",
        "user_id": user_id,
        "welcome_email_job_id": welcome_job_id,
    })
}

pub fn deactivate_user_data(user_id: &str) -> Value {
    log::info!("👤 Processing deactivation for user {}", user_id);

    json!({
        "status": "completed",
        "user_id": user_id,
        "timestamp": now(),
    })
}

pub fn export_user_data(user_id: &str, export_format: &str) -> Value {
    log::info!(
        "📦 Exporting data for user {} in {} format",
        user_id,
        export_format
    );

    json!({
        "status": "completed",
        "user_id": user_id,
        "format": export_format,
        "file_path": format!("/exports/user_{}.{}", user_id, export_format),
        "timestamp": now(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::RedisClient;

    #[test]
    fn test_export_paths_and_formats() {
        let result = export_user_data("42", "csv");
        assert_eq!(result["file_path"], "/exports/user_42.csv");
        assert_eq!(result["status"], "completed");

        let xml = export_user_data("42", "xml");
        assert_eq!(xml["format"], "xml");
        assert_eq!(xml["file_path"], "/exports/user_42.xml");
    }

    #[tokio::test]
    async fn test_cleanup_reports_purged_count() {
        let blacklist = TokenBlacklist::new(RedisClient::disconnected());
        let result = cleanup_expired_tokens(&blacklist);
        assert_eq!(result["deleted_count"], 0);
    }

    #[test]
    fn test_registration_queues_welcome_email() {
        let queue = JobQueue::new();
        let result = process_user_registration(&queue, "u1", "jane@example.com");

        let job_id = result["welcome_email_job_id"].as_str().unwrap();
        let record = queue.status(job_id).unwrap();
        assert_eq!(record.name, "send_welcome_email");
        assert_eq!(record.queue, "email");
    }
}
