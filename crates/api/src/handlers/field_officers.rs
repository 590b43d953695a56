//! Admin field officer management
//!
//! Create and update checks live in `create_officer` and `update_officer` so
//! the vendor portal can reuse them for its own officers.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

use super::{vendors::checked_phone, vendors::StatusQuery, ApiResponse};
use crate::AppState;
use casedesk_common::{
    auth::{hash_password, AuthContext},
    db::{
        models::{AccountStatus, FieldOfficer, Vendor},
        AccountChanges, NewFieldOfficer, Repository,
    },
    errors::{AppError, Result},
    validation::{ensure_password_policy, normalize_email},
    workflow::Party,
};

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateFieldOfficerRequest {
    #[validate(length(min = 1, message = "Name is required"))]
    pub name: String,

    #[validate(email(message = "Invalid email format"))]
    pub email: String,

    pub phone_number: String,

    pub password: String,

    /// Ignored on the vendor portal, which always uses the caller
    pub vendor_id: Option<Uuid>,
}

#[derive(Debug, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateFieldOfficerRequest {
    #[validate(length(min = 1, message = "Name cannot be empty"))]
    pub name: Option<String>,

    #[validate(email(message = "Invalid email format"))]
    pub email: Option<String>,

    pub phone_number: Option<String>,

    pub password: Option<String>,

    pub status: Option<AccountStatus>,

    /// Admin only
    pub vendor_id: Option<Uuid>,
}

/// Validate and create an officer under `vendor`
pub(crate) async fn create_officer(
    repo: &Repository,
    vendor: &Vendor,
    request: CreateFieldOfficerRequest,
) -> Result<FieldOfficer> {
    request.validate()?;

    if !vendor.is_active() {
        return Err(AppError::invalid("Cannot assign to inactive vendor"));
    }

    let email = normalize_email(&request.email);
    let phone_number = checked_phone(&request.phone_number)?;
    ensure_password_policy(&request.password, &email)?;

    if repo.find_field_officer_by_email(&email).await?.is_some() {
        return Err(AppError::Duplicate {
            message: "Field officer with this email already exists".to_string(),
        });
    }

    repo.create_field_officer(NewFieldOfficer {
        name: request.name.trim().to_string(),
        email,
        phone_number,
        password_hash: hash_password(&request.password)?,
        vendor: Party::new(vendor.id, vendor.company.clone()),
    })
    .await
}

/// Validate and apply officer edits; `vendor` moves the officer to another vendor
pub(crate) async fn update_officer(
    repo: &Repository,
    officer: FieldOfficer,
    request: UpdateFieldOfficerRequest,
    vendor: Option<Vendor>,
) -> Result<FieldOfficer> {
    request.validate()?;

    let email = request.email.as_deref().map(normalize_email);
    if let Some(email) = email.as_deref().filter(|e| *e != officer.email) {
        if repo.find_field_officer_by_email(email).await?.is_some() {
            return Err(AppError::Duplicate {
                message: "Another field officer with this email already exists".to_string(),
            });
        }
    }

    let vendor = match vendor {
        Some(vendor) if vendor.id != officer.vendor_id => {
            if !vendor.is_active() {
                return Err(AppError::invalid("Cannot assign to inactive vendor"));
            }
            Some(Party::new(vendor.id, vendor.company))
        }
        _ => None,
    };

    let password_hash = match request.password.as_deref() {
        Some(password) => {
            ensure_password_policy(password, email.as_deref().unwrap_or(&officer.email))?;
            Some(hash_password(password)?)
        }
        None => None,
    };

    let changes = AccountChanges {
        name: request.name.map(|n| n.trim().to_string()),
        email,
        phone_number: request
            .phone_number
            .as_deref()
            .map(checked_phone)
            .transpose()?,
        password_hash,
        status: request.status,
        vendor,
        ..Default::default()
    };

    let officer = repo.update_field_officer(officer, changes).await?;
    tracing::info!(field_officer_id = %officer.id, "Field officer updated");
    Ok(officer)
}

/// Message for a toggled account
pub(crate) fn toggled_message(officer: &FieldOfficer) -> String {
    let verb = if officer.is_active() {
        "activated"
    } else {
        "deactivated"
    };
    format!("Field officer {} successfully", verb)
}

/// Create a field officer for any vendor
pub async fn create_field_officer(
    State(state): State<AppState>,
    auth: AuthContext,
    Json(request): Json<CreateFieldOfficerRequest>,
) -> Result<(StatusCode, Json<ApiResponse<FieldOfficer>>)> {
    auth.require_admin()?;

    let vendor_id = request
        .vendor_id
        .ok_or_else(|| AppError::invalid("Vendor is required"))?;

    let repo = Repository::new(state.db.clone());
    let vendor = repo.get_vendor(vendor_id).await?;
    let officer = create_officer(&repo, &vendor, request).await?;

    Ok((
        StatusCode::CREATED,
        ApiResponse::with_message("Field officer created successfully", officer),
    ))
}

/// List all field officers
pub async fn list_field_officers(
    State(state): State<AppState>,
    auth: AuthContext,
    Query(query): Query<StatusQuery>,
) -> Result<Json<ApiResponse<Vec<FieldOfficer>>>> {
    auth.require_admin()?;

    let repo = Repository::new(state.db.clone());
    let officers = repo
        .list_field_officers(None, query.account_status())
        .await?;

    Ok(ApiResponse::ok(officers))
}

/// Active field officers of one vendor
pub async fn list_by_vendor(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(vendor_id): Path<Uuid>,
) -> Result<Json<ApiResponse<Vec<FieldOfficer>>>> {
    auth.require_admin()?;

    let repo = Repository::new(state.db.clone());
    let officers = repo
        .list_field_officers(Some(vendor_id), Some(AccountStatus::Active))
        .await?;

    Ok(ApiResponse::ok(officers))
}

/// Get a field officer
pub async fn get_field_officer(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<FieldOfficer>>> {
    auth.require_admin()?;

    let repo = Repository::new(state.db.clone());
    Ok(ApiResponse::ok(repo.get_field_officer(id).await?))
}

/// Update a field officer, possibly moving them to another vendor
pub async fn update_field_officer(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(id): Path<Uuid>,
    Json(request): Json<UpdateFieldOfficerRequest>,
) -> Result<Json<ApiResponse<FieldOfficer>>> {
    auth.require_admin()?;

    let repo = Repository::new(state.db.clone());
    let officer = repo.get_field_officer(id).await?;
    let vendor = match request.vendor_id {
        Some(vendor_id) => Some(repo.get_vendor(vendor_id).await?),
        None => None,
    };

    let officer = update_officer(&repo, officer, request, vendor).await?;
    Ok(ApiResponse::with_message(
        "Field officer updated successfully",
        officer,
    ))
}

/// Flip a field officer between active and inactive
pub async fn toggle_status(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<FieldOfficer>>> {
    auth.require_admin()?;

    let repo = Repository::new(state.db.clone());
    let officer = repo.get_field_officer(id).await?;
    let officer = repo.toggle_field_officer_status(officer).await?;

    Ok(ApiResponse::with_message(toggled_message(&officer), officer))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_request_validation() {
        let request: CreateFieldOfficerRequest = serde_json::from_value(serde_json::json!({
            "name": "",
            "email": "fo@example.com",
            "phoneNumber": "9876543210",
            "password": "Str0ng!Pass"
        }))
        .unwrap();
        assert!(request.vendor_id.is_none());
        let err: AppError = request.validate().unwrap_err().into();
        assert_eq!(err.to_string(), "Name is required");
    }

    #[test]
    fn test_update_request_accepts_status() {
        let request: UpdateFieldOfficerRequest =
            serde_json::from_value(serde_json::json!({ "status": "inactive" })).unwrap();
        assert_eq!(request.status, Some(AccountStatus::Inactive));
        assert!(request.validate().is_ok());
    }
}
