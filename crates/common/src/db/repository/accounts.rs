//! Admin users, vendors and field officers

use chrono::Utc;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, ModelTrait, PaginatorTrait, QueryFilter,
    QueryOrder, Set, TransactionTrait,
};
use tracing::info;
use uuid::Uuid;

use super::Repository;
use crate::auth::Role;
use crate::db::models::*;
use crate::errors::{AppError, Result};
use crate::workflow::Party;

/// Vendor account to create; email already normalised, password already hashed
#[derive(Debug, Clone)]
pub struct NewVendor {
    pub name: String,
    pub company: String,
    pub email: String,
    pub phone_number: String,
    pub password_hash: String,
}

/// Field officer account to create
#[derive(Debug, Clone)]
pub struct NewFieldOfficer {
    pub name: String,
    pub email: String,
    pub phone_number: String,
    pub password_hash: String,
    pub vendor: Party,
}

/// Partial account update; `None` leaves the column unchanged
#[derive(Debug, Clone, Default)]
pub struct AccountChanges {
    pub name: Option<String>,
    /// Vendors only
    pub company: Option<String>,
    pub email: Option<String>,
    pub phone_number: Option<String>,
    pub password_hash: Option<String>,
    pub status: Option<AccountStatus>,
    /// Field officers only
    pub vendor: Option<Party>,
}

impl Repository {
    // ========================================================================
    // Admin User Operations
    // ========================================================================

    /// Number of admin users
    pub async fn count_users(&self) -> Result<u64> {
        UserEntity::find()
            .count(self.conn())
            .await
            .map_err(Into::into)
    }

    /// Find admin by ID
    pub async fn find_user(&self, id: Uuid) -> Result<Option<User>> {
        UserEntity::find_by_id(id)
            .one(self.conn())
            .await
            .map_err(Into::into)
    }

    /// Find admin by normalised email
    pub async fn find_user_by_email(&self, email: &str) -> Result<Option<User>> {
        UserEntity::find()
            .filter(UserColumn::Email.eq(email))
            .one(self.conn())
            .await
            .map_err(Into::into)
    }

    /// Create a super admin
    pub async fn create_user(&self, name: &str, email: &str, password_hash: &str) -> Result<User> {
        let now = Utc::now();
        let user = UserActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set(name.to_string()),
            email: Set(email.to_string()),
            password_hash: Set(password_hash.to_string()),
            role: Set(Role::SuperAdmin.as_str().to_string()),
            is_active: Set(true),
            created_at: Set(now.into()),
            updated_at: Set(now.into()),
        };

        let user = user.insert(self.conn()).await?;
        info!(user_id = %user.id, "Admin user created");
        Ok(user)
    }

    // ========================================================================
    // Vendor Operations
    // ========================================================================

    /// Create a vendor
    pub async fn create_vendor(&self, input: NewVendor) -> Result<Vendor> {
        let now = Utc::now();
        let vendor = VendorActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set(input.name),
            company: Set(input.company),
            email: Set(input.email),
            phone_number: Set(input.phone_number),
            password_hash: Set(input.password_hash),
            status: Set(AccountStatus::Active.into()),
            created_at: Set(now.into()),
            updated_at: Set(now.into()),
        };

        let vendor = vendor.insert(self.conn()).await?;
        info!(vendor_id = %vendor.id, "Vendor created");
        Ok(vendor)
    }

    /// Find vendor by ID
    pub async fn find_vendor(&self, id: Uuid) -> Result<Option<Vendor>> {
        VendorEntity::find_by_id(id)
            .one(self.conn())
            .await
            .map_err(Into::into)
    }

    /// Find vendor by ID or fail with 404
    pub async fn get_vendor(&self, id: Uuid) -> Result<Vendor> {
        self.find_vendor(id)
            .await?
            .ok_or_else(|| AppError::VendorNotFound { id: id.to_string() })
    }

    /// Find vendor by normalised email
    pub async fn find_vendor_by_email(&self, email: &str) -> Result<Option<Vendor>> {
        VendorEntity::find()
            .filter(VendorColumn::Email.eq(email))
            .one(self.conn())
            .await
            .map_err(Into::into)
    }

    /// List vendors newest first
    pub async fn list_vendors(&self, status: Option<AccountStatus>) -> Result<Vec<Vendor>> {
        let mut query = VendorEntity::find();
        if let Some(status) = status {
            query = query.filter(VendorColumn::Status.eq(status.as_str()));
        }

        query
            .order_by_desc(VendorColumn::CreatedAt)
            .all(self.conn())
            .await
            .map_err(Into::into)
    }

    /// Update vendor fields; company renames and deactivation reach its officers
    pub async fn update_vendor(&self, vendor: Vendor, changes: AccountChanges) -> Result<Vendor> {
        let now = Utc::now();
        let vendor_id = vendor.id;
        let company_changed = changes
            .company
            .as_ref()
            .is_some_and(|company| *company != vendor.company);
        let deactivated = vendor.is_active() && changes.status == Some(AccountStatus::Inactive);

        let txn = self.conn().begin().await?;

        let mut active: VendorActiveModel = vendor.into();
        if let Some(name) = changes.name {
            active.name = Set(name);
        }
        if let Some(company) = changes.company {
            active.company = Set(company);
        }
        if let Some(email) = changes.email {
            active.email = Set(email);
        }
        if let Some(phone_number) = changes.phone_number {
            active.phone_number = Set(phone_number);
        }
        if let Some(password_hash) = changes.password_hash {
            active.password_hash = Set(password_hash);
        }
        if let Some(status) = changes.status {
            active.status = Set(status.into());
        }
        active.updated_at = Set(now.into());
        let vendor = active.update(&txn).await?;

        if company_changed {
            FieldOfficerEntity::update_many()
                .col_expr(FieldOfficerColumn::VendorName, Expr::value(vendor.company.clone()))
                .filter(FieldOfficerColumn::VendorId.eq(vendor_id))
                .exec(&txn)
                .await?;
        }
        if deactivated {
            deactivate_officers(&txn, vendor_id).await?;
        }

        txn.commit().await?;
        Ok(vendor)
    }

    /// Flip vendor status; deactivation cascades to all of its field officers
    pub async fn toggle_vendor_status(&self, vendor: Vendor) -> Result<Vendor> {
        let now = Utc::now();
        let vendor_id = vendor.id;
        let status = vendor.account_status().toggled();

        let txn = self.conn().begin().await?;

        let mut active: VendorActiveModel = vendor.into();
        active.status = Set(status.into());
        active.updated_at = Set(now.into());
        let vendor = active.update(&txn).await?;

        let cascaded = if status == AccountStatus::Inactive {
            deactivate_officers(&txn, vendor_id).await?
        } else {
            0
        };

        txn.commit().await?;

        info!(
            vendor_id = %vendor_id,
            status = status.as_str(),
            officers_deactivated = cascaded,
            "Vendor status toggled"
        );
        Ok(vendor)
    }

    // ========================================================================
    // Field Officer Operations
    // ========================================================================

    /// Create a field officer under a vendor
    pub async fn create_field_officer(&self, input: NewFieldOfficer) -> Result<FieldOfficer> {
        let now = Utc::now();
        let officer = FieldOfficerActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set(input.name),
            email: Set(input.email),
            phone_number: Set(input.phone_number),
            password_hash: Set(input.password_hash),
            vendor_id: Set(input.vendor.id),
            vendor_name: Set(input.vendor.name),
            status: Set(AccountStatus::Active.into()),
            created_at: Set(now.into()),
            updated_at: Set(now.into()),
        };

        let officer = officer.insert(self.conn()).await?;
        info!(field_officer_id = %officer.id, vendor_id = %officer.vendor_id, "Field officer created");
        Ok(officer)
    }

    /// Find field officer by ID
    pub async fn find_field_officer(&self, id: Uuid) -> Result<Option<FieldOfficer>> {
        FieldOfficerEntity::find_by_id(id)
            .one(self.conn())
            .await
            .map_err(Into::into)
    }

    /// Find field officer by ID or fail with 404
    pub async fn get_field_officer(&self, id: Uuid) -> Result<FieldOfficer> {
        self.find_field_officer(id)
            .await?
            .ok_or_else(|| AppError::FieldOfficerNotFound { id: id.to_string() })
    }

    /// Find field officer by normalised email
    pub async fn find_field_officer_by_email(&self, email: &str) -> Result<Option<FieldOfficer>> {
        FieldOfficerEntity::find()
            .filter(FieldOfficerColumn::Email.eq(email))
            .one(self.conn())
            .await
            .map_err(Into::into)
    }

    /// List field officers newest first, optionally scoped to a vendor
    pub async fn list_field_officers(
        &self,
        vendor_id: Option<Uuid>,
        status: Option<AccountStatus>,
    ) -> Result<Vec<FieldOfficer>> {
        let mut query = FieldOfficerEntity::find();
        if let Some(vendor_id) = vendor_id {
            query = query.filter(FieldOfficerColumn::VendorId.eq(vendor_id));
        }
        if let Some(status) = status {
            query = query.filter(FieldOfficerColumn::Status.eq(status.as_str()));
        }

        query
            .order_by_desc(FieldOfficerColumn::CreatedAt)
            .all(self.conn())
            .await
            .map_err(Into::into)
    }

    /// Update field officer fields
    pub async fn update_field_officer(
        &self,
        officer: FieldOfficer,
        changes: AccountChanges,
    ) -> Result<FieldOfficer> {
        let mut active: FieldOfficerActiveModel = officer.into();
        if let Some(name) = changes.name {
            active.name = Set(name);
        }
        if let Some(email) = changes.email {
            active.email = Set(email);
        }
        if let Some(phone_number) = changes.phone_number {
            active.phone_number = Set(phone_number);
        }
        if let Some(password_hash) = changes.password_hash {
            active.password_hash = Set(password_hash);
        }
        if let Some(status) = changes.status {
            active.status = Set(status.into());
        }
        if let Some(vendor) = changes.vendor {
            active.vendor_id = Set(vendor.id);
            active.vendor_name = Set(vendor.name);
        }
        active.updated_at = Set(Utc::now().into());

        active.update(self.conn()).await.map_err(Into::into)
    }

    /// Flip field officer status
    pub async fn toggle_field_officer_status(&self, officer: FieldOfficer) -> Result<FieldOfficer> {
        let status = officer.account_status().toggled();
        let mut active: FieldOfficerActiveModel = officer.into();
        active.status = Set(status.into());
        active.updated_at = Set(Utc::now().into());

        let officer = active.update(self.conn()).await?;
        info!(field_officer_id = %officer.id, status = status.as_str(), "Field officer status toggled");
        Ok(officer)
    }

    /// Delete a field officer
    pub async fn delete_field_officer(&self, officer: FieldOfficer) -> Result<()> {
        let officer_id = officer.id;
        officer.delete(self.conn()).await?;
        info!(field_officer_id = %officer_id, "Field officer deleted");
        Ok(())
    }
}

/// Mark every field officer of a vendor inactive
async fn deactivate_officers<C: sea_orm::ConnectionTrait>(conn: &C, vendor_id: Uuid) -> Result<u64> {
    let result = FieldOfficerEntity::update_many()
        .col_expr(
            FieldOfficerColumn::Status,
            Expr::value(AccountStatus::Inactive.as_str()),
        )
        .col_expr(FieldOfficerColumn::UpdatedAt, Expr::current_timestamp().into())
        .filter(FieldOfficerColumn::VendorId.eq(vendor_id))
        .filter(FieldOfficerColumn::Status.eq(AccountStatus::Active.as_str()))
        .exec(conn)
        .await?;

    Ok(result.rows_affected)
}
