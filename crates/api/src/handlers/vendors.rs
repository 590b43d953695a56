//! Admin vendor management

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use super::ApiResponse;
use crate::AppState;
use casedesk_common::{
    auth::{hash_password, verify_password, AuthContext},
    db::{
        models::{AccountStatus, Vendor},
        AccountChanges, NewVendor, Repository,
    },
    errors::{AppError, Result},
    validation::{digits_only, ensure_password_policy, is_valid_phone, normalize_email},
};

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateVendorRequest {
    #[validate(length(min = 1, message = "Name is required"))]
    pub name: String,

    #[validate(length(min = 1, message = "Company is required"))]
    pub company: String,

    #[validate(email(message = "Invalid email format"))]
    pub email: String,

    pub phone_number: String,

    pub password: String,
}

#[derive(Debug, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateVendorRequest {
    #[validate(length(min = 1, message = "Name cannot be empty"))]
    pub name: Option<String>,

    #[validate(length(min = 1, message = "Company cannot be empty"))]
    pub company: Option<String>,

    #[validate(email(message = "Invalid email format"))]
    pub email: Option<String>,

    pub phone_number: Option<String>,

    pub password: Option<String>,

    pub status: Option<AccountStatus>,
}

/// Optional `status` filter; anything other than active/inactive lists all
#[derive(Debug, Default, Deserialize)]
pub struct StatusQuery {
    pub status: Option<String>,
}

impl StatusQuery {
    pub fn account_status(&self) -> Option<AccountStatus> {
        match self.status.as_deref().map(str::trim) {
            Some("active") => Some(AccountStatus::Active),
            Some("inactive") => Some(AccountStatus::Inactive),
            _ => None,
        }
    }
}

/// Entry of the active vendor picker
#[derive(Debug, Serialize)]
pub struct VendorOption {
    pub id: Uuid,
    pub name: String,
    pub company: String,
}

/// Ten-digit phone number or a validation error
pub(crate) fn checked_phone(phone: &str) -> Result<String> {
    let phone = digits_only(phone);
    if !is_valid_phone(&phone) {
        return Err(AppError::invalid("Phone number must be exactly 10 digits"));
    }
    Ok(phone)
}

/// Create a vendor account
pub async fn create_vendor(
    State(state): State<AppState>,
    auth: AuthContext,
    Json(request): Json<CreateVendorRequest>,
) -> Result<(StatusCode, Json<ApiResponse<Vendor>>)> {
    auth.require_admin()?;
    request.validate()?;

    let email = normalize_email(&request.email);
    let phone_number = checked_phone(&request.phone_number)?;
    ensure_password_policy(&request.password, &email)?;

    let repo = Repository::new(state.db.clone());
    if repo.find_vendor_by_email(&email).await?.is_some() {
        return Err(AppError::Duplicate {
            message: "Vendor with this email already exists".to_string(),
        });
    }

    let vendor = repo
        .create_vendor(NewVendor {
            name: request.name.trim().to_string(),
            company: request.company.trim().to_string(),
            email,
            phone_number,
            password_hash: hash_password(&request.password)?,
        })
        .await?;

    Ok((
        StatusCode::CREATED,
        ApiResponse::with_message("Vendor created successfully", vendor),
    ))
}

/// List vendors
pub async fn list_vendors(
    State(state): State<AppState>,
    auth: AuthContext,
    Query(query): Query<StatusQuery>,
) -> Result<Json<ApiResponse<Vec<Vendor>>>> {
    auth.require_admin()?;

    let repo = Repository::new(state.db.clone());
    Ok(ApiResponse::ok(repo.list_vendors(query.account_status()).await?))
}

/// Active vendors for assignment pickers
pub async fn list_active_vendors(
    State(state): State<AppState>,
    auth: AuthContext,
) -> Result<Json<ApiResponse<Vec<VendorOption>>>> {
    auth.require_admin()?;

    let repo = Repository::new(state.db.clone());
    let vendors = repo
        .list_vendors(Some(AccountStatus::Active))
        .await?
        .into_iter()
        .map(|v| VendorOption {
            id: v.id,
            name: v.name,
            company: v.company,
        })
        .collect();

    Ok(ApiResponse::ok(vendors))
}

/// Get a vendor
pub async fn get_vendor(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<Vendor>>> {
    auth.require_admin()?;

    let repo = Repository::new(state.db.clone());
    Ok(ApiResponse::ok(repo.get_vendor(id).await?))
}

/// Update a vendor
pub async fn update_vendor(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(id): Path<Uuid>,
    Json(request): Json<UpdateVendorRequest>,
) -> Result<Json<ApiResponse<Vendor>>> {
    auth.require_admin()?;
    request.validate()?;

    let repo = Repository::new(state.db.clone());
    let vendor = repo.get_vendor(id).await?;

    let email = request.email.as_deref().map(normalize_email);
    if let Some(email) = email.as_deref().filter(|e| *e != vendor.email) {
        if repo.find_vendor_by_email(email).await?.is_some() {
            return Err(AppError::Duplicate {
                message: "Another vendor with this email already exists".to_string(),
            });
        }
    }

    let password_hash = match request.password.as_deref() {
        Some(password) => {
            ensure_password_policy(password, email.as_deref().unwrap_or(&vendor.email))?;
            if verify_password(password, &vendor.password_hash) {
                return Err(AppError::invalid(
                    "New password cannot be the same as current password",
                ));
            }
            Some(hash_password(password)?)
        }
        None => None,
    };

    let changes = AccountChanges {
        name: request.name.map(|n| n.trim().to_string()),
        company: request.company.map(|c| c.trim().to_string()),
        email,
        phone_number: request.phone_number.as_deref().map(checked_phone).transpose()?,
        password_hash,
        status: request.status,
        vendor: None,
    };

    let vendor = repo.update_vendor(vendor, changes).await?;
    tracing::info!(vendor_id = %vendor.id, "Vendor updated");

    Ok(ApiResponse::with_message("Vendor updated successfully", vendor))
}

/// Flip a vendor between active and inactive
pub async fn toggle_status(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<Vendor>>> {
    auth.require_admin()?;

    let repo = Repository::new(state.db.clone());
    let vendor = repo.get_vendor(id).await?;
    let vendor = repo.toggle_vendor_status(vendor).await?;

    let verb = if vendor.is_active() {
        "activated"
    } else {
        "deactivated"
    };
    Ok(ApiResponse::with_message(
        format!("Vendor {} successfully", verb),
        vendor,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_query() {
        let query = StatusQuery {
            status: Some("inactive".into()),
        };
        assert_eq!(query.account_status(), Some(AccountStatus::Inactive));

        let query = StatusQuery {
            status: Some("all".into()),
        };
        assert!(query.account_status().is_none());
        assert!(StatusQuery::default().account_status().is_none());
    }

    #[test]
    fn test_checked_phone() {
        assert_eq!(checked_phone("98765-43210").unwrap(), "9876543210");
        let err = checked_phone("12345").unwrap_err();
        assert_eq!(err.to_string(), "Phone number must be exactly 10 digits");
    }

    #[test]
    fn test_update_request_rejects_empty_company() {
        let request = UpdateVendorRequest {
            company: Some(String::new()),
            ..Default::default()
        };
        let err: AppError = request.validate().unwrap_err().into();
        assert_eq!(err.to_string(), "Company cannot be empty");
    }

    #[test]
    fn test_create_request_shape() {
        let request: CreateVendorRequest = serde_json::from_value(serde_json::json!({
            "name": "Ravi",
            "company": "Acme Verifications",
            "email": "ops@acme.example",
            "phoneNumber": "9876543210",
            "password": "Str0ng!Pass"
        }))
        .unwrap();
        assert!(request.validate().is_ok());
        assert_eq!(request.phone_number, "9876543210");
    }
}
