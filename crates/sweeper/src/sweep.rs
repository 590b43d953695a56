//! One cleanup pass over tokens, short links and overdue cases

use chrono::{DateTime, Utc};
use casedesk_common::{db::Repository, errors::Result, metrics};
use tracing::info;

/// What a single sweep did
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SweepReport {
    pub tokens_deleted: u64,
    pub links_deleted: u64,
    pub overdue_cases: u64,
}

impl SweepReport {
    pub fn deleted(&self) -> u64 {
        self.tokens_deleted + self.links_deleted
    }
}

pub struct Sweeper {
    repo: Repository,
    used_token_retention_days: i64,
}

impl Sweeper {
    pub fn new(repo: Repository, used_token_retention_days: i64) -> Self {
        Self {
            repo,
            used_token_retention_days,
        }
    }

    /// Delete expired tokens and links, then publish the overdue gauge
    pub async fn run_once(&self, now: DateTime<Utc>) -> Result<SweepReport> {
        let tokens_deleted = self
            .repo
            .delete_expired_tokens(now, self.used_token_retention_days)
            .await?;
        metrics::record_sweep("candidate_tokens", tokens_deleted);

        let links_deleted = self.repo.delete_expired_short_links(now).await?;
        metrics::record_sweep("short_links", links_deleted);

        let overdue_cases = self.repo.count_overdue(now).await?;
        metrics::set_overdue_cases(overdue_cases);

        let report = SweepReport {
            tokens_deleted,
            links_deleted,
            overdue_cases,
        };
        info!(
            tokens_deleted = report.tokens_deleted,
            links_deleted = report.links_deleted,
            overdue_cases = report.overdue_cases,
            "Sweep complete"
        );

        Ok(report)
    }
}
