use crate::jobs::JobError;
use serde_json::{json, Value};

/// Delivers an email. Delivery is logged only; no mail transport is configured.
pub fn send_email(
    to_email: &str,
    subject: &str,
    body: &str,
    html_body: Option<&str>,
) -> Result<Value, JobError> {
    let valid = to_email
        .split_once('@')
        .is_some_and(|(local, domain)| !local.is_empty() && !domain.is_empty());
    if !valid {
        return Err(JobError::InvalidRecipient(to_email.to_string()));
    }

    log::info!("📧 Sending email to {}: {}", to_email, subject);
    log::debug!(
        "   {} bytes text, html: {}",
        body.len(),
        html_body.is_some()
    );

    Ok(json!({
        "status": "sent",
        "to": to_email,
        "subject": subject,
    }))
}

pub fn send_welcome_email(user_email: &str, user_name: &str) -> Result<Value, JobError> {
    let body = format!(
        "Hi {},\n\nWelcome to our platform! We're excited to have you on board.\n\nBest regards,\nThe Team\n",
        user_name
    );
    send_email(user_email, "Welcome to Our Platform!", &body, None)
}

pub fn send_password_reset_email(
    user_email: &str,
    reset_token: &str,
    reset_url: &str,
) -> Result<Value, JobError> {
    let body = format!(
        "You requested a password reset.\n\n\
         Click the link below to reset your password:\n{}?token={}\n\n\
         This link will expire in 1 hour.\n\n\
         If you didn't request this, please ignore this email.\n\nBest regards,\nThe Team\n",
        reset_url, reset_token
    );
    send_email(user_email, "Password Reset Request", &body, None)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_send_email_result() {
        let result = send_email("a@b.com", "Hello", "body", Some("<p>body</p>")).unwrap();
        assert_eq!(result["status"], "sent");
        assert_eq!(result["to"], "a@b.com");
        assert_eq!(result["subject"], "Hello");
    }

    #[test]
    fn test_bad_recipient_fails() {
        assert!(send_email("not-an-address", "s", "b", None).is_err());
        assert!(send_email("@b.com", "s", "b", None).is_err());
        assert!(send_welcome_email("", "x").is_err());
    }

    #[test]
    fn test_templates_set_subject() {
        let welcome = send_welcome_email("a@b.com", "a").unwrap();
        assert_eq!(welcome["subject"], "Welcome to Our Platform!");

        let reset = send_password_reset_email("a@b.com", "tok", "https://x/reset").unwrap();
        assert_eq!(reset["subject"], "Password Reset Request");
    }
}
