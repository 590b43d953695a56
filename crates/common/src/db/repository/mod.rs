//! Repository pattern for database operations
//!
//! Provides a clean interface for all data access operations
//! with proper error handling and transaction support.

mod accounts;
mod records;
mod tokens;

pub use accounts::{AccountChanges, NewFieldOfficer, NewVendor};
pub use records::{
    reference_number, CaseEdits, RecordFilter, StatusCounts, SubmissionTokenUse,
    VerificationDraft,
};

use crate::db::DbPool;
use crate::errors::Result;
use sea_orm::DatabaseConnection;

/// Repository for data access operations
#[derive(Clone)]
pub struct Repository {
    pool: DbPool,
}

impl Repository {
    /// Create a new repository with the given connection pool
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    fn conn(&self) -> &DatabaseConnection {
        self.pool.conn()
    }

    /// Ping the database
    pub async fn ping(&self) -> Result<()> {
        self.pool.ping().await
    }
}

/// Zero-based page index for a one-based page number
pub(crate) fn page_index(page: u64) -> u64 {
    page.saturating_sub(1)
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_index() {
        assert_eq!(page_index(0), 0);
        assert_eq!(page_index(1), 0);
        assert_eq!(page_index(3), 2);
    }
}
