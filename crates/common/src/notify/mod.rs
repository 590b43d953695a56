//! Candidate notifications
//!
//! Delivers the submission link to a candidate over email and SMS.
//! Delivery is best effort: an outcome is recorded on the candidate
//! token but a failed send never fails the assignment itself.

use crate::config::NotificationConfig;
use crate::errors::{AppError, Result};
use async_trait::async_trait;
use backoff::{future::retry, ExponentialBackoff};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Result of one delivery attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryOutcome {
    /// Not requested by the caller
    NotSent,
    /// No transport configured for the channel
    NotConfigured,
    Sent,
    Failed(String),
}

impl DeliveryOutcome {
    /// Value stored in the token's status column
    pub fn status(&self) -> &'static str {
        match self {
            DeliveryOutcome::NotSent | DeliveryOutcome::NotConfigured => "not_sent",
            DeliveryOutcome::Sent => "sent",
            DeliveryOutcome::Failed(_) => "failed",
        }
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            DeliveryOutcome::NotConfigured => Some("not configured"),
            DeliveryOutcome::Failed(message) => Some(message),
            _ => None,
        }
    }

    pub fn is_sent(&self) -> bool {
        matches!(self, DeliveryOutcome::Sent)
    }
}

/// What the candidate needs to know
#[derive(Debug, Clone)]
pub struct CandidateNotice {
    pub candidate_name: String,
    pub email: String,
    pub mobile: String,
    pub reference_number: String,
    pub submission_link: String,
    pub expires_at: DateTime<Utc>,
}

impl CandidateNotice {
    pub fn email_subject(&self) -> String {
        format!("Address Verification Request - {}", self.reference_number)
    }

    pub fn email_body(&self) -> String {
        format!(
            "Dear {},\n\nPlease complete the address verification for case {} using the link below:\n\n{}\n\nThis link is valid until {} and can be used only once.",
            self.candidate_name,
            self.reference_number,
            self.submission_link,
            self.expires_at.format("%d/%m/%Y %H:%M UTC"),
        )
    }

    pub fn sms_body(&self) -> String {
        format!(
            "Dear {}, complete your address verification for case {}: {} (valid till {})",
            self.candidate_name,
            self.reference_number,
            self.submission_link,
            self.expires_at.format("%d/%m/%Y"),
        )
    }
}

/// Trait for candidate notification transports
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Send the submission link by email
    async fn send_email(&self, notice: &CandidateNotice) -> DeliveryOutcome;

    /// Send the submission link by SMS
    async fn send_sms(&self, notice: &CandidateNotice) -> DeliveryOutcome;

    /// Transport name for logs
    fn name(&self) -> &str;
}

/// Send on the requested channels
pub async fn notify_candidate(
    notifier: &dyn Notifier,
    notice: &CandidateNotice,
    send_email: bool,
    send_sms: bool,
) -> (DeliveryOutcome, DeliveryOutcome) {
    let email = if send_email {
        notifier.send_email(notice).await
    } else {
        DeliveryOutcome::NotSent
    };
    let sms = if send_sms {
        notifier.send_sms(notice).await
    } else {
        DeliveryOutcome::NotSent
    };

    crate::metrics::record_notification("email", &email);
    crate::metrics::record_notification("sms", &sms);

    (email, sms)
}

/// Logs notices instead of delivering them
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn send_email(&self, notice: &CandidateNotice) -> DeliveryOutcome {
        info!(
            reference = %notice.reference_number,
            subject = %notice.email_subject(),
            "Email transport not configured, skipping"
        );
        DeliveryOutcome::NotConfigured
    }

    async fn send_sms(&self, notice: &CandidateNotice) -> DeliveryOutcome {
        info!(
            reference = %notice.reference_number,
            "SMS transport not configured, skipping"
        );
        DeliveryOutcome::NotConfigured
    }

    fn name(&self) -> &str {
        "log"
    }
}

#[derive(Serialize)]
struct WebhookPayload<'a> {
    channel: &'a str,
    to: &'a str,
    subject: Option<String>,
    body: String,
    reference: &'a str,
}

/// Posts notices as JSON to email/SMS webhooks
pub struct WebhookNotifier {
    client: reqwest::Client,
    email_url: Option<String>,
    sms_url: Option<String>,
    api_key: Option<String>,
    max_retries: u32,
}

impl WebhookNotifier {
    /// Create a new webhook notifier
    pub fn new(config: &NotificationConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            email_url: config.email_webhook_url.clone(),
            sms_url: config.sms_webhook_url.clone(),
            api_key: config.api_key.clone(),
            max_retries: config.max_retries.max(1),
        })
    }

    async fn post(&self, url: &str, payload: &WebhookPayload<'_>) -> Result<()> {
        let mut request = self.client.post(url).json(payload);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await?;
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::Notification {
                message: format!("Webhook error {}: {}", status, body),
            });
        }

        Ok(())
    }

    /// Post with exponential backoff, giving up after `max_retries` attempts
    async fn deliver(&self, url: Option<&str>, payload: WebhookPayload<'_>) -> DeliveryOutcome {
        let Some(url) = url else {
            return DeliveryOutcome::NotConfigured;
        };

        let attempts = AtomicU32::new(0);
        let policy = ExponentialBackoff {
            initial_interval: Duration::from_millis(200),
            max_elapsed_time: Some(Duration::from_secs(30)),
            ..Default::default()
        };

        let attempts = &attempts;
        let payload = &payload;
        let result = retry(policy, move || async move {
            let attempt = attempts.fetch_add(1, Ordering::SeqCst) + 1;
            self.post(url, payload).await.map_err(|e| {
                warn!(
                    channel = payload.channel,
                    attempt = attempt,
                    max_retries = self.max_retries,
                    error = %e,
                    "Notification webhook failed"
                );
                if attempt >= self.max_retries {
                    backoff::Error::permanent(e)
                } else {
                    backoff::Error::transient(e)
                }
            })
        })
        .await;

        match result {
            Ok(()) => DeliveryOutcome::Sent,
            Err(e) => DeliveryOutcome::Failed(e.to_string()),
        }
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn send_email(&self, notice: &CandidateNotice) -> DeliveryOutcome {
        let payload = WebhookPayload {
            channel: "email",
            to: &notice.email,
            subject: Some(notice.email_subject()),
            body: notice.email_body(),
            reference: &notice.reference_number,
        };
        self.deliver(self.email_url.as_deref(), payload).await
    }

    async fn send_sms(&self, notice: &CandidateNotice) -> DeliveryOutcome {
        let payload = WebhookPayload {
            channel: "sms",
            to: &notice.mobile,
            subject: None,
            body: notice.sms_body(),
            reference: &notice.reference_number,
        };
        self.deliver(self.sms_url.as_deref(), payload).await
    }

    fn name(&self) -> &str {
        "webhook"
    }
}

/// Create a notifier based on configuration
pub fn create_notifier(config: &NotificationConfig) -> Result<Arc<dyn Notifier>> {
    if config.email_webhook_url.is_none() && config.sms_webhook_url.is_none() {
        warn!("No notification webhooks configured, candidate notices will only be logged");
        return Ok(Arc::new(LogNotifier));
    }

    Ok(Arc::new(WebhookNotifier::new(config)?))
}
