// ==================== BACKGROUND JOBS ====================
// In-process job queue with retrying workers, plus the periodic scheduler.

pub mod email_jobs;
pub mod queue;
pub mod scheduler;
pub mod user_jobs;

pub use queue::{JobQueue, JobRecord, JobStatus};

use crate::cache::TokenBlacklist;
use serde::Deserialize;
use thiserror::Error;

/// Named queues. Each has its own worker pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueueName {
    Email,
    Default,
}

impl QueueName {
    pub fn as_str(&self) -> &'static str {
        match self {
            QueueName::Email => "email",
            QueueName::Default => "default",
        }
    }
}

fn default_export_format() -> String {
    "json".to_string()
}

/// A unit of background work. Deserializes from `{"name": ..., "args": {...}}`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "name", content = "args", rename_all = "snake_case")]
pub enum Job {
    SendEmail {
        to_email: String,
        subject: String,
        body: String,
        #[serde(default)]
        html_body: Option<String>,
    },
    SendWelcomeEmail {
        user_email: String,
        user_name: String,
    },
    SendPasswordResetEmail {
        user_email: String,
        reset_token: String,
        reset_url: String,
    },
    CleanupExpiredTokens,
    ProcessUserRegistration {
        user_id: String,
        user_email: String,
    },
    DeactivateUserData {
        user_id: String,
    },
    ExportUserData {
        user_id: String,
        #[serde(default = "default_export_format")]
        export_format: String,
    },
}

impl Job {
    pub fn name(&self) -> &'static str {
        match self {
            Job::SendEmail { .. } => "send_email",
            Job::SendWelcomeEmail { .. } => "send_welcome_email",
            Job::SendPasswordResetEmail { .. } => "send_password_reset_email",
            Job::CleanupExpiredTokens => "cleanup_expired_tokens",
            Job::ProcessUserRegistration { .. } => "process_user_registration",
            Job::DeactivateUserData { .. } => "deactivate_user_data",
            Job::ExportUserData { .. } => "export_user_data",
        }
    }

    pub fn queue(&self) -> QueueName {
        match self {
            Job::SendEmail { .. } | Job::SendWelcomeEmail { .. } | Job::SendPasswordResetEmail { .. } => {
                QueueName::Email
            }
            _ => QueueName::Default,
        }
    }
}

#[derive(Debug, Error)]
pub enum JobError {
    #[error("Invalid recipient address: {0:?}")]
    InvalidRecipient(String),
}

/// What running jobs may touch.
#[derive(Clone)]
pub struct JobContext {
    pub queue: JobQueue,
    pub blacklist: TokenBlacklist,
}

/// Runs one job to completion and returns its JSON result.
pub async fn execute(job: &Job, ctx: &JobContext) -> Result<serde_json::Value, JobError> {
    match job {
        Job::SendEmail {
            to_email,
            subject,
            body,
            html_body,
        } => email_jobs::send_email(to_email, subject, body, html_body.as_deref()),
        Job::SendWelcomeEmail {
            user_email,
            user_name,
        } => email_jobs::send_welcome_email(user_email, user_name),
        Job::SendPasswordResetEmail {
            user_email,
            reset_token,
            reset_url,
        } => email_jobs::send_password_reset_email(user_email, reset_token, reset_url),
        Job::CleanupExpiredTokens => Ok(user_jobs::cleanup_expired_tokens(&ctx.blacklist)),
        Job::ProcessUserRegistration {
            user_id,
            user_email,
        } => Ok(user_jobs::process_user_registration(&ctx.queue, user_id, user_email)),
        Job::DeactivateUserData { user_id } => Ok(user_jobs::deactivate_user_data(user_id)),
        Job::ExportUserData {
            user_id,
            export_format,
        } => Ok(user_jobs::export_user_data(user_id, export_format)),
    }
}
