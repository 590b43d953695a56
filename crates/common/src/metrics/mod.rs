//! Metrics and observability utilities
//!
//! Prometheus metrics for the case workflow with standardized naming.

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram, Unit};
use std::time::Instant;

use crate::notify::DeliveryOutcome;

/// Metrics prefix for all CaseDesk metrics
pub const METRICS_PREFIX: &str = "casedesk";

/// Histogram buckets for request latency (in seconds)
pub const LATENCY_BUCKETS: &[f64] = &[
    0.005, // 5ms
    0.010, // 10ms
    0.025, // 25ms
    0.050, // 50ms
    0.100, // 100ms
    0.250, // 250ms
    0.500, // 500ms
    1.000, // 1s
    2.500, // 2.5s
    5.000, // 5s
    10.00, // 10s
];

/// Register all metric descriptions
pub fn register_metrics() {
    // Request metrics
    describe_counter!(
        format!("{}_requests_total", METRICS_PREFIX),
        Unit::Count,
        "Total number of HTTP requests"
    );

    describe_histogram!(
        format!("{}_request_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "HTTP request latency in seconds"
    );

    // Case metrics
    describe_counter!(
        format!("{}_records_created_total", METRICS_PREFIX),
        Unit::Count,
        "Total case records created"
    );

    describe_counter!(
        format!("{}_case_transitions_total", METRICS_PREFIX),
        Unit::Count,
        "Total case status transitions"
    );

    describe_counter!(
        format!("{}_verifications_submitted_total", METRICS_PREFIX),
        Unit::Count,
        "Total verifications submitted"
    );

    describe_gauge!(
        format!("{}_overdue_cases", METRICS_PREFIX),
        Unit::Count,
        "Open cases past their TAT due date"
    );

    // Auth metrics
    describe_counter!(
        format!("{}_logins_total", METRICS_PREFIX),
        Unit::Count,
        "Login attempts by role and outcome"
    );

    // Notification metrics
    describe_counter!(
        format!("{}_notifications_total", METRICS_PREFIX),
        Unit::Count,
        "Candidate notifications by channel and outcome"
    );

    // Maintenance metrics
    describe_counter!(
        format!("{}_sweeper_deleted_total", METRICS_PREFIX),
        Unit::Count,
        "Expired rows removed by the sweeper"
    );

    describe_counter!(
        format!("{}_reports_generated_total", METRICS_PREFIX),
        Unit::Count,
        "Case reports generated"
    );

    tracing::info!("Metrics registered");
}

/// Helper to record request metrics
pub struct RequestMetrics {
    start: Instant,
    endpoint: String,
    method: String,
}

impl RequestMetrics {
    /// Start tracking a request
    pub fn start(method: &str, endpoint: &str) -> Self {
        Self {
            start: Instant::now(),
            endpoint: endpoint.to_string(),
            method: method.to_string(),
        }
    }

    /// Record request completion
    pub fn finish(self, status: u16) {
        let duration = self.start.elapsed().as_secs_f64();

        counter!(
            format!("{}_requests_total", METRICS_PREFIX),
            "method" => self.method.clone(),
            "endpoint" => self.endpoint.clone(),
            "status" => status.to_string()
        )
        .increment(1);

        histogram!(
            format!("{}_request_duration_seconds", METRICS_PREFIX),
            "method" => self.method,
            "endpoint" => self.endpoint
        )
        .record(duration);
    }
}

/// Records inserted by bulk upload or manual entry
pub fn record_records_created(source: &str, count: usize) {
    counter!(
        format!("{}_records_created_total", METRICS_PREFIX),
        "source" => source.to_string()
    )
    .increment(count as u64);
}

/// A persisted state machine transition
pub fn record_transition(action: &str, to_status: &str) {
    counter!(
        format!("{}_case_transitions_total", METRICS_PREFIX),
        "action" => action.to_string(),
        "to" => to_status.to_string()
    )
    .increment(1);
}

/// A verification submitted by an officer or candidate
pub fn record_verification(submitted_by: &str, late: bool) {
    counter!(
        format!("{}_verifications_submitted_total", METRICS_PREFIX),
        "by" => submitted_by.to_string(),
        "late" => late.to_string()
    )
    .increment(1);
}

/// Current number of overdue cases
pub fn set_overdue_cases(count: u64) {
    gauge!(format!("{}_overdue_cases", METRICS_PREFIX)).set(count as f64);
}

/// Login attempt outcome
pub fn record_login(role: &str, success: bool) {
    let outcome = if success { "success" } else { "failure" };

    counter!(
        format!("{}_logins_total", METRICS_PREFIX),
        "role" => role.to_string(),
        "outcome" => outcome
    )
    .increment(1);
}

/// Notification delivery outcome; skipped when the channel was not requested
pub fn record_notification(channel: &str, outcome: &DeliveryOutcome) {
    if *outcome == DeliveryOutcome::NotSent {
        return;
    }

    let status = match outcome {
        DeliveryOutcome::NotConfigured => "not_configured",
        other => other.status(),
    };

    counter!(
        format!("{}_notifications_total", METRICS_PREFIX),
        "channel" => channel.to_string(),
        "status" => status
    )
    .increment(1);
}

/// Rows removed by a sweep
pub fn record_sweep(kind: &str, deleted: u64) {
    counter!(
        format!("{}_sweeper_deleted_total", METRICS_PREFIX),
        "kind" => kind.to_string()
    )
    .increment(deleted);
}

/// A generated case report
pub fn record_report(scope: &str, rows: usize) {
    counter!(
        format!("{}_reports_generated_total", METRICS_PREFIX),
        "scope" => scope.to_string()
    )
    .increment(1);

    tracing::debug!(scope = scope, rows = rows, "Report generated");
}
