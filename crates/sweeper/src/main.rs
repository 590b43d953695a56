//! CaseDesk Sweeper
//!
//! Periodic maintenance worker:
//! 1. Deletes expired candidate tokens and used tokens past retention
//! 2. Deletes expired short links
//! 3. Publishes the count of overdue cases
//!
//! Run with `once` to perform a single sweep and exit.

mod sweep;

use anyhow::Context;
use casedesk_common::{config::AppConfig, db::DbPool, metrics, telemetry, Repository, VERSION};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::time::Duration;
use sweep::Sweeper;
use tracing::{error, info, warn};

/// Consecutive failures before backing off
const MAX_FAILURES: u32 = 5;
const FAILURE_PAUSE: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Once,
    Service,
}

impl Mode {
    fn from_args(args: &[String]) -> Self {
        match args.get(1).map(String::as_str) {
            Some("once") => Mode::Once,
            _ => Mode::Service,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Load configuration
    let config = AppConfig::load().context("Failed to load configuration")?;

    // Initialize tracing
    telemetry::init_tracing(&config.observability);

    info!("Starting CaseDesk Sweeper v{}", VERSION);

    let args: Vec<String> = std::env::args().collect();
    let mode = Mode::from_args(&args);

    if mode == Mode::Service && config.observability.metrics_port != 0 {
        PrometheusBuilder::new()
            .with_http_listener(([0, 0, 0, 0], config.observability.metrics_port))
            .install()
            .context("Failed to install Prometheus exporter")?;
    }
    metrics::register_metrics();

    // Initialize database connection
    let db = DbPool::new(&config.database).await?;
    let sweeper = Sweeper::new(
        Repository::new(db),
        config.sweeper.used_token_retention_days,
    );

    if mode == Mode::Once {
        let report = sweeper.run_once(chrono::Utc::now()).await?;
        println!(
            "Deleted {} tokens and {} short links; {} cases overdue",
            report.tokens_deleted, report.links_deleted, report.overdue_cases
        );
        return Ok(());
    }

    let mut interval = tokio::time::interval(config.sweep_interval());
    let mut consecutive_failures = 0;

    info!(interval_secs = config.sweeper.interval_secs, "Sweeper ready");

    loop {
        if consecutive_failures >= MAX_FAILURES {
            warn!(failures = consecutive_failures, "Repeated sweep failures, pausing...");
            tokio::time::sleep(FAILURE_PAUSE).await;
            consecutive_failures = 0;
        }

        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Shutdown signal received");
                break;
            }
            _ = interval.tick() => {
                match sweeper.run_once(chrono::Utc::now()).await {
                    Ok(_) => consecutive_failures = 0,
                    Err(e) => {
                        consecutive_failures += 1;
                        error!(error = %e, failures = consecutive_failures, "Sweep failed");
                    }
                }
            }
        }
    }

    info!("Sweeper shutting down");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mode_from_args() {
        let args = |list: &[&str]| list.iter().map(|s| s.to_string()).collect::<Vec<_>>();
        assert_eq!(Mode::from_args(&args(&["casedesk-sweeper"])), Mode::Service);
        assert_eq!(Mode::from_args(&args(&["casedesk-sweeper", "once"])), Mode::Once);
        assert_eq!(Mode::from_args(&args(&["casedesk-sweeper", "other"])), Mode::Service);
    }
}
