//! Candidate submission tokens and short links

use chrono::{DateTime, Duration, Utc};
use sea_orm::prelude::DateTimeWithTimeZone;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, EntityTrait, PaginatorTrait, QueryFilter, Set,
    TransactionTrait,
};
use tracing::info;
use uuid::Uuid;

use super::Repository;
use crate::db::models::*;
use crate::errors::Result;
use crate::notify::DeliveryOutcome;
use crate::workflow::CandidateContact;

impl Repository {
    // ========================================================================
    // Candidate Token Operations
    // ========================================================================

    /// Store a new candidate token
    pub async fn create_candidate_token(
        &self,
        record_id: Uuid,
        token: &str,
        candidate: &CandidateContact,
        expires_at: DateTime<Utc>,
    ) -> Result<CandidateToken> {
        let now = Utc::now();
        let model = CandidateTokenActiveModel {
            id: Set(Uuid::new_v4()),
            token: Set(token.to_string()),
            record_id: Set(record_id),
            candidate_name: Set(candidate.name.clone()),
            candidate_email: Set(candidate.email.clone()),
            candidate_mobile: Set(candidate.mobile.clone()),
            expires_at: Set(expires_at.into()),
            is_used: Set(false),
            used_at: Set(None),
            ip_address: Set(None),
            email_status: Set(DeliveryOutcome::NotSent.status().to_string()),
            email_error: Set(None),
            sms_status: Set(DeliveryOutcome::NotSent.status().to_string()),
            sms_error: Set(None),
            created_at: Set(now.into()),
        };

        model.insert(self.conn()).await.map_err(Into::into)
    }

    /// Find a candidate token by its value
    pub async fn find_candidate_token(&self, token: &str) -> Result<Option<CandidateToken>> {
        CandidateTokenEntity::find()
            .filter(CandidateTokenColumn::Token.eq(token))
            .one(self.conn())
            .await
            .map_err(Into::into)
    }

    /// Drop unused tokens and short links issued earlier for a record
    ///
    /// Used tokens stay for the audit trail until the sweeper removes them.
    pub async fn revoke_candidate_tokens(&self, record_id: Uuid) -> Result<u64> {
        let txn = self.conn().begin().await?;

        let tokens = CandidateTokenEntity::delete_many()
            .filter(CandidateTokenColumn::RecordId.eq(record_id))
            .filter(CandidateTokenColumn::IsUsed.eq(false))
            .exec(&txn)
            .await?;
        ShortLinkEntity::delete_many()
            .filter(ShortLinkColumn::RecordId.eq(record_id))
            .exec(&txn)
            .await?;

        txn.commit().await?;
        Ok(tokens.rows_affected)
    }

    /// Record email and SMS delivery results on a token
    pub async fn record_delivery(
        &self,
        token: CandidateToken,
        email: &DeliveryOutcome,
        sms: &DeliveryOutcome,
    ) -> Result<CandidateToken> {
        let mut active: CandidateTokenActiveModel = token.into();
        active.email_status = Set(email.status().to_string());
        active.email_error = Set(email.error().map(str::to_string));
        active.sms_status = Set(sms.status().to_string());
        active.sms_error = Set(sms.error().map(str::to_string));

        active.update(self.conn()).await.map_err(Into::into)
    }

    /// Delete unused expired tokens and used tokens past retention
    pub async fn delete_expired_tokens(
        &self,
        now: DateTime<Utc>,
        used_retention_days: i64,
    ) -> Result<u64> {
        let expired: DateTimeWithTimeZone = now.into();
        let used_before: DateTimeWithTimeZone = (now - Duration::days(used_retention_days)).into();

        let result = CandidateTokenEntity::delete_many()
            .filter(
                Condition::any()
                    .add(
                        Condition::all()
                            .add(CandidateTokenColumn::IsUsed.eq(false))
                            .add(CandidateTokenColumn::ExpiresAt.lt(expired)),
                    )
                    .add(
                        Condition::all()
                            .add(CandidateTokenColumn::IsUsed.eq(true))
                            .add(CandidateTokenColumn::UsedAt.lt(used_before)),
                    ),
            )
            .exec(self.conn())
            .await?;

        if result.rows_affected > 0 {
            info!(deleted = result.rows_affected, "Expired candidate tokens removed");
        }
        Ok(result.rows_affected)
    }

    // ========================================================================
    // Short Link Operations
    // ========================================================================

    /// Check whether a short code is taken
    pub async fn short_code_exists(&self, code: &str) -> Result<bool> {
        let count = ShortLinkEntity::find()
            .filter(ShortLinkColumn::ShortCode.eq(code))
            .count(self.conn())
            .await?;
        Ok(count > 0)
    }

    /// Store a new short link
    pub async fn create_short_link(
        &self,
        code: &str,
        full_url: &str,
        record_id: Option<Uuid>,
        expires_at: DateTime<Utc>,
    ) -> Result<ShortLink> {
        let now = Utc::now();
        let model = ShortLinkActiveModel {
            id: Set(Uuid::new_v4()),
            short_code: Set(code.to_string()),
            full_url: Set(full_url.to_string()),
            record_id: Set(record_id),
            expires_at: Set(expires_at.into()),
            is_used: Set(false),
            used_at: Set(None),
            ip_address: Set(None),
            user_agent: Set(None),
            created_at: Set(now.into()),
        };

        model.insert(self.conn()).await.map_err(Into::into)
    }

    /// Find a short link by code
    pub async fn find_short_link(&self, code: &str) -> Result<Option<ShortLink>> {
        ShortLinkEntity::find()
            .filter(ShortLinkColumn::ShortCode.eq(code))
            .one(self.conn())
            .await
            .map_err(Into::into)
    }

    /// Mark a short link as followed
    pub async fn mark_short_link_used(
        &self,
        link: ShortLink,
        ip_address: Option<String>,
        user_agent: Option<String>,
    ) -> Result<ShortLink> {
        let mut active: ShortLinkActiveModel = link.into();
        active.is_used = Set(true);
        active.used_at = Set(Some(Utc::now().into()));
        active.ip_address = Set(ip_address);
        active.user_agent = Set(user_agent);

        active.update(self.conn()).await.map_err(Into::into)
    }

    /// Delete short links past their expiry
    pub async fn delete_expired_short_links(&self, now: DateTime<Utc>) -> Result<u64> {
        let now: DateTimeWithTimeZone = now.into();
        let result = ShortLinkEntity::delete_many()
            .filter(ShortLinkColumn::ExpiresAt.lt(now))
            .exec(self.conn())
            .await?;

        if result.rows_affected > 0 {
            info!(deleted = result.rows_affected, "Expired short links removed");
        }
        Ok(result.rows_affected)
    }
}

#[cfg(test)]
mod tests {
    use super::super::mock;
    use super::*;

    #[test]
    fn test_revoke_removes_unused_tokens_and_links() {
        let repo = mock::repository(&[2, 1]);

        let revoked = tokio_test::block_on(repo.revoke_candidate_tokens(Uuid::new_v4())).unwrap();
        assert_eq!(revoked, 2);

        let sql = mock::executed_sql(&repo);
        assert_eq!(sql.len(), 2);
        assert!(sql[0].starts_with(r#"DELETE FROM "candidate_tokens""#));
        assert!(sql[0].contains(r#""is_used""#));
        assert!(sql[1].starts_with(r#"DELETE FROM "short_links""#));
    }
}
