//! Vendor portal
//!
//! Every case and field officer lookup here is scoped to the calling vendor;
//! anything outside that scope reads as not found.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use super::{
    auth::{AuthResponse, LoginRequest},
    field_officers::{self, CreateFieldOfficerRequest, UpdateFieldOfficerRequest},
    message, non_blank,
    records::DashboardStats,
    transition,
    vendors::checked_phone,
    ApiResponse, CaseListQuery, Paged, Pagination,
};
use crate::AppState;
use casedesk_common::{
    auth::{generate_candidate_token, hash_password, verify_password, AuthContext, Role},
    db::{
        models::{AccountStatus, FieldOfficer, Record, Vendor},
        AccountChanges, RecordFilter, Repository,
    },
    errors::{AppError, Result},
    links::{generate_short_code, MAX_CODE_ATTEMPTS},
    metrics,
    notify::{notify_candidate, CandidateNotice, DeliveryOutcome},
    validation::{
        digits_only, ensure_password_policy, is_valid_email, is_valid_phone, normalize_email,
    },
    workflow::{CandidateContact, CaseAction, CaseStatus, Party},
};

/// Status filter value selecting late submissions
const LATE_SUBMISSION_FILTER: &str = "late_submission";

#[derive(Debug, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProfileRequest {
    #[validate(length(min = 1, message = "Name cannot be empty"))]
    pub name: Option<String>,
    pub phone_number: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangePasswordRequest {
    pub current_password: String,
    pub new_password: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignFieldOfficerRequest {
    pub field_officer_id: Uuid,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignCandidateRequest {
    #[serde(default)]
    pub candidate_name: String,
    #[serde(default)]
    pub candidate_email: String,
    #[serde(default)]
    pub candidate_mobile: String,
    pub expiry_hours: Option<i64>,
    pub send_email: Option<bool>,
    #[serde(rename = "sendSMS")]
    pub send_sms: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateStatusRequest {
    pub status: String,
    pub remarks: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VendorStats {
    #[serde(flatten)]
    pub counts: DashboardStats,
    pub assigned_to_field_officer: u64,
    pub late_submission_cases: u64,
}

#[derive(Debug, Serialize)]
pub struct ChannelStatus {
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl From<&DeliveryOutcome> for ChannelStatus {
    fn from(outcome: &DeliveryOutcome) -> Self {
        Self {
            status: outcome.status(),
            error: outcome.error().map(str::to_string),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct NotificationStatus {
    pub email: ChannelStatus,
    pub sms: ChannelStatus,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CandidateAssignment {
    pub record: Record,
    pub submission_link: String,
    pub short_link: String,
    pub expires_at: DateTime<Utc>,
    pub notification_status: NotificationStatus,
}

fn not_assigned() -> AppError {
    AppError::not_found("Case not found or not assigned to you")
}

fn officer_not_found() -> AppError {
    AppError::not_found("Field officer not found or not assigned to your company")
}

/// Require the vendor role and return the vendor id
fn vendor_id(auth: &AuthContext) -> Result<Uuid> {
    auth.require_role(Role::Vendor)?;
    Ok(auth.user_id)
}

/// Load a case assigned to the calling vendor
async fn owned_case(repo: &Repository, vendor_id: Uuid, id: Uuid) -> Result<Record> {
    match repo.find_record(id).await? {
        Some(record) if record.assigned_vendor == Some(vendor_id) => Ok(record),
        _ => Err(not_assigned()),
    }
}

/// Load a field officer belonging to the calling vendor
async fn owned_officer(repo: &Repository, vendor_id: Uuid, id: Uuid) -> Result<FieldOfficer> {
    match repo.find_field_officer(id).await? {
        Some(officer) if officer.vendor_id == vendor_id => Ok(officer),
        _ => Err(officer_not_found()),
    }
}

/// Validated candidate contact details
fn candidate_contact(request: &AssignCandidateRequest) -> Result<CandidateContact> {
    let name = request.candidate_name.trim();
    let email = normalize_email(&request.candidate_email);
    let mobile = digits_only(&request.candidate_mobile);

    if name.is_empty() || email.is_empty() || request.candidate_mobile.trim().is_empty() {
        return Err(AppError::invalid(
            "Candidate name, email, and mobile number are required",
        ));
    }
    if !is_valid_email(&email) {
        return Err(AppError::invalid("Invalid email format"));
    }
    if !is_valid_phone(&mobile) {
        return Err(AppError::invalid("Mobile number must be exactly 10 digits"));
    }

    Ok(CandidateContact {
        name: name.to_string(),
        email,
        mobile,
    })
}

/// Token expiry `hours` after `now`; non-positive requests fall back to the default
fn token_expiry(now: DateTime<Utc>, requested: Option<i64>, default_hours: i64) -> Result<DateTime<Utc>> {
    let hours = requested.filter(|h| *h > 0).unwrap_or(default_hours);
    Duration::try_hours(hours)
        .and_then(|span| now.checked_add_signed(span))
        .ok_or_else(|| AppError::invalid("Expiry hours is out of range"))
}

/// Map a vendor-requested status to its action
fn status_action(request: UpdateStatusRequest) -> Result<CaseAction> {
    match request.status.trim() {
        "submitted" => Ok(CaseAction::Submit),
        "insufficient" => Ok(CaseAction::MarkInsufficient {
            reason: request.remarks,
        }),
        _ => Err(AppError::Forbidden {
            message: "You are not authorized to set this status".to_string(),
        }),
    }
}

/// Vendor login
pub async fn login(
    State(state): State<AppState>,
    Json(request): Json<LoginRequest>,
) -> Result<Json<ApiResponse<AuthResponse<Vendor>>>> {
    request.validate()?;

    let repo = Repository::new(state.db.clone());
    let email = normalize_email(&request.email);

    let vendor = match repo.find_vendor_by_email(&email).await? {
        Some(vendor) if verify_password(&request.password, &vendor.password_hash) => vendor,
        _ => {
            metrics::record_login(Role::Vendor.as_str(), false);
            return Err(AppError::InvalidCredentials);
        }
    };

    if !vendor.is_active() {
        metrics::record_login(Role::Vendor.as_str(), false);
        return Err(AppError::AccountInactive);
    }

    let token = state
        .jwt
        .generate_token(vendor.id, Role::Vendor, &vendor.name, Some(vendor.id))?;
    metrics::record_login(Role::Vendor.as_str(), true);

    tracing::info!(vendor_id = %vendor.id, "Vendor logged in");

    Ok(ApiResponse::with_message(
        "Login successful",
        AuthResponse {
            token,
            user: vendor,
        },
    ))
}

/// Calling vendor's profile
pub async fn get_profile(
    State(state): State<AppState>,
    auth: AuthContext,
) -> Result<Json<ApiResponse<Vendor>>> {
    let vendor_id = vendor_id(&auth)?;

    let repo = Repository::new(state.db.clone());
    Ok(ApiResponse::ok(repo.get_vendor(vendor_id).await?))
}

/// Update name and phone number
pub async fn update_profile(
    State(state): State<AppState>,
    auth: AuthContext,
    Json(request): Json<UpdateProfileRequest>,
) -> Result<Json<ApiResponse<Vendor>>> {
    let vendor_id = vendor_id(&auth)?;
    request.validate()?;

    let repo = Repository::new(state.db.clone());
    let vendor = repo.get_vendor(vendor_id).await?;

    let changes = AccountChanges {
        name: request.name.map(|n| n.trim().to_string()),
        phone_number: request
            .phone_number
            .as_deref()
            .map(checked_phone)
            .transpose()?,
        ..Default::default()
    };
    let vendor = repo.update_vendor(vendor, changes).await?;

    Ok(ApiResponse::with_message("Profile updated successfully", vendor))
}

/// Change the calling vendor's password
pub async fn change_password(
    State(state): State<AppState>,
    auth: AuthContext,
    Json(request): Json<ChangePasswordRequest>,
) -> Result<Json<ApiResponse<()>>> {
    let vendor_id = vendor_id(&auth)?;

    let repo = Repository::new(state.db.clone());
    let vendor = repo.get_vendor(vendor_id).await?;

    if !verify_password(&request.current_password, &vendor.password_hash) {
        return Err(AppError::invalid("Current password is incorrect"));
    }
    if request.current_password == request.new_password {
        return Err(AppError::invalid(
            "New password cannot be the same as current password",
        ));
    }
    ensure_password_policy(&request.new_password, &vendor.email)?;

    let changes = AccountChanges {
        password_hash: Some(hash_password(&request.new_password)?),
        ..Default::default()
    };
    repo.update_vendor(vendor, changes).await?;
    tracing::info!(vendor_id = %vendor_id, "Vendor password changed");

    Ok(message("Password changed successfully"))
}

/// Case counts for the calling vendor
pub async fn dashboard_stats(
    State(state): State<AppState>,
    auth: AuthContext,
) -> Result<Json<ApiResponse<VendorStats>>> {
    let vendor_id = vendor_id(&auth)?;

    let repo = Repository::new(state.db.clone());
    let counts = repo.status_counts(Some(vendor_id)).await?;

    Ok(ApiResponse::ok(VendorStats {
        counts: DashboardStats::from(&counts),
        assigned_to_field_officer: counts.get(CaseStatus::Assigned),
        late_submission_cases: counts.late_submission,
    }))
}

/// Cases assigned to the calling vendor
pub async fn list_cases(
    State(state): State<AppState>,
    auth: AuthContext,
    Query(query): Query<CaseListQuery>,
) -> Result<Json<ApiResponse<Paged<Record>>>> {
    let vendor_id = vendor_id(&auth)?;

    let mut filter = RecordFilter {
        vendor_id: Some(vendor_id),
        search: query.search.clone(),
        ..Default::default()
    };
    match query.status_filter() {
        Some(LATE_SUBMISSION_FILTER) => filter.late_only = true,
        Some(status) => filter.status = Some(status.parse()?),
        None => {}
    }

    let repo = Repository::new(state.db.clone());
    let (items, total) = repo.list_records(&filter, query.page(), query.limit()).await?;

    Ok(ApiResponse::ok(Paged {
        items,
        pagination: Pagination::new(total, query.page(), query.limit()),
    }))
}

/// One of the calling vendor's cases
pub async fn get_case(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<Record>>> {
    let vendor_id = vendor_id(&auth)?;

    let repo = Repository::new(state.db.clone());
    Ok(ApiResponse::ok(owned_case(&repo, vendor_id, id).await?))
}

/// Hand a case to one of the vendor's field officers
pub async fn assign_field_officer(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(id): Path<Uuid>,
    Json(request): Json<AssignFieldOfficerRequest>,
) -> Result<Json<ApiResponse<Record>>> {
    let vendor_id = vendor_id(&auth)?;

    let repo = Repository::new(state.db.clone());
    let record = owned_case(&repo, vendor_id, id).await?;
    let officer = owned_officer(&repo, vendor_id, request.field_officer_id).await?;
    if !officer.is_active() {
        return Err(officer_not_found());
    }

    let action = CaseAction::AssignFieldOfficer {
        officer: Party::new(officer.id, officer.name),
    };
    let record = transition(&state, &repo, record, action, &auth).await?;

    Ok(ApiResponse::with_message(
        "Field officer assigned successfully",
        record,
    ))
}

/// Short code not yet in use
async fn unused_short_code(repo: &Repository) -> Result<String> {
    for _ in 0..MAX_CODE_ATTEMPTS {
        let code = generate_short_code();
        if !repo.short_code_exists(&code).await? {
            return Ok(code);
        }
    }
    Err(AppError::Internal {
        message: format!(
            "Failed to generate unique short code after {} attempts",
            MAX_CODE_ATTEMPTS
        ),
    })
}

/// Send a case to the candidate for self-verification
///
/// Issues a single-use token and a short link, then notifies the candidate.
/// Delivery failures are recorded on the token and never fail the request.
pub async fn assign_candidate(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(id): Path<Uuid>,
    Json(request): Json<AssignCandidateRequest>,
) -> Result<Json<ApiResponse<CandidateAssignment>>> {
    let vendor_id = vendor_id(&auth)?;
    let candidate = candidate_contact(&request)?;

    let repo = Repository::new(state.db.clone());
    let record = owned_case(&repo, vendor_id, id).await?;

    let now = Utc::now();
    let expires_at = token_expiry(
        now,
        request.expiry_hours,
        state.config.workflow.candidate_token_hours,
    )?;
    let link_expires_at = token_expiry(now, None, state.config.workflow.short_link_hours)?;

    let action = CaseAction::AssignCandidate {
        candidate: candidate.clone(),
    };
    let record = transition(&state, &repo, record, action, &auth).await?;

    let revoked = repo.revoke_candidate_tokens(record.id).await?;
    if revoked > 0 {
        tracing::info!(record_id = %record.id, revoked, "Earlier candidate tokens revoked");
    }

    let token = generate_candidate_token();
    let stored = repo
        .create_candidate_token(record.id, &token, &candidate, expires_at)
        .await?;
    let submission_link = state.config.submission_link(&token);

    let code = unused_short_code(&repo).await?;
    repo.create_short_link(
        &code,
        &submission_link,
        Some(record.id),
        link_expires_at,
    )
    .await?;
    let short_link = state.config.short_url(&code);

    let notice = CandidateNotice {
        candidate_name: candidate.name,
        email: candidate.email,
        mobile: candidate.mobile,
        reference_number: record.reference_number.clone(),
        submission_link: short_link.clone(),
        expires_at,
    };
    let (email, sms) = notify_candidate(
        state.notifier.as_ref(),
        &notice,
        request.send_email.unwrap_or(true),
        request.send_sms.unwrap_or(false),
    )
    .await;
    repo.record_delivery(stored, &email, &sms).await?;

    tracing::info!(
        record_id = %record.id,
        email = email.status(),
        sms = sms.status(),
        "Case assigned to candidate"
    );

    Ok(ApiResponse::with_message(
        "Case assigned to candidate successfully",
        CandidateAssignment {
            record,
            submission_link,
            short_link,
            expires_at,
            notification_status: NotificationStatus {
                email: ChannelStatus::from(&email),
                sms: ChannelStatus::from(&sms),
            },
        },
    ))
}

/// Mark a case submitted or insufficient on the vendor's behalf
pub async fn update_case_status(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(id): Path<Uuid>,
    Json(request): Json<UpdateStatusRequest>,
) -> Result<Json<ApiResponse<Record>>> {
    let vendor_id = vendor_id(&auth)?;
    let action = status_action(UpdateStatusRequest {
        remarks: non_blank(request.remarks),
        ..request
    })?;

    let repo = Repository::new(state.db.clone());
    let record = owned_case(&repo, vendor_id, id).await?;
    let record = transition(&state, &repo, record, action, &auth).await?;

    Ok(ApiResponse::with_message(
        "Case status updated successfully",
        record,
    ))
}

/// The vendor's field officers
pub async fn list_field_officers(
    State(state): State<AppState>,
    auth: AuthContext,
    Query(query): Query<super::vendors::StatusQuery>,
) -> Result<Json<ApiResponse<Vec<FieldOfficer>>>> {
    let vendor_id = vendor_id(&auth)?;

    let repo = Repository::new(state.db.clone());
    let officers = repo
        .list_field_officers(Some(vendor_id), query.account_status())
        .await?;

    Ok(ApiResponse::ok(officers))
}

/// Create a field officer under the calling vendor
pub async fn create_field_officer(
    State(state): State<AppState>,
    auth: AuthContext,
    Json(request): Json<CreateFieldOfficerRequest>,
) -> Result<(StatusCode, Json<ApiResponse<FieldOfficer>>)> {
    let vendor_id = vendor_id(&auth)?;

    let repo = Repository::new(state.db.clone());
    let vendor = repo.get_vendor(vendor_id).await?;
    let officer = field_officers::create_officer(&repo, &vendor, request).await?;

    Ok((
        StatusCode::CREATED,
        ApiResponse::with_message("Field officer created successfully", officer),
    ))
}

/// One of the vendor's field officers
pub async fn get_field_officer(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<FieldOfficer>>> {
    let vendor_id = vendor_id(&auth)?;

    let repo = Repository::new(state.db.clone());
    Ok(ApiResponse::ok(owned_officer(&repo, vendor_id, id).await?))
}

/// Update one of the vendor's field officers
pub async fn update_field_officer(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(id): Path<Uuid>,
    Json(request): Json<UpdateFieldOfficerRequest>,
) -> Result<Json<ApiResponse<FieldOfficer>>> {
    let vendor_id = vendor_id(&auth)?;

    let repo = Repository::new(state.db.clone());
    let officer = owned_officer(&repo, vendor_id, id).await?;
    let officer = field_officers::update_officer(
        &repo,
        officer,
        UpdateFieldOfficerRequest {
            vendor_id: None,
            ..request
        },
        None,
    )
    .await?;

    Ok(ApiResponse::with_message(
        "Field officer updated successfully",
        officer,
    ))
}

/// Delete one of the vendor's field officers
pub async fn delete_field_officer(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<()>>> {
    let vendor_id = vendor_id(&auth)?;

    let repo = Repository::new(state.db.clone());
    let officer = owned_officer(&repo, vendor_id, id).await?;
    repo.delete_field_officer(officer).await?;

    Ok(message("Field officer deleted successfully"))
}

/// Officers of an inactive vendor stay inactive
fn ensure_can_activate(vendor: &Vendor) -> Result<()> {
    if vendor.is_active() {
        Ok(())
    } else {
        Err(AppError::invalid(
            "Cannot activate a field officer of an inactive vendor",
        ))
    }
}

/// Flip one of the vendor's field officers between active and inactive
pub async fn toggle_field_officer_status(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<FieldOfficer>>> {
    let vendor_id = vendor_id(&auth)?;

    let repo = Repository::new(state.db.clone());
    let officer = owned_officer(&repo, vendor_id, id).await?;
    if officer.account_status() == AccountStatus::Inactive {
        let vendor = repo.get_vendor(vendor_id).await?;
        ensure_can_activate(&vendor)?;
    }
    let officer = repo.toggle_field_officer_status(officer).await?;

    Ok(ApiResponse::with_message(
        field_officers::toggled_message(&officer),
        officer,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate_request(name: &str, email: &str, mobile: &str) -> AssignCandidateRequest {
        AssignCandidateRequest {
            candidate_name: name.into(),
            candidate_email: email.into(),
            candidate_mobile: mobile.into(),
            expiry_hours: None,
            send_email: None,
            send_sms: None,
        }
    }

    #[test]
    fn test_candidate_contact_normalises() {
        let contact =
            candidate_contact(&candidate_request(" Asha ", "Asha@Example.COM", "98765 43210"))
                .unwrap();
        assert_eq!(contact.name, "Asha");
        assert_eq!(contact.email, "asha@example.com");
        assert_eq!(contact.mobile, "9876543210");
    }

    #[test]
    fn test_candidate_contact_errors() {
        let err = candidate_contact(&candidate_request("", "a@b.co", "9876543210")).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Candidate name, email, and mobile number are required"
        );

        let err = candidate_contact(&candidate_request("Asha", "nope", "9876543210")).unwrap_err();
        assert_eq!(err.to_string(), "Invalid email format");

        let err = candidate_contact(&candidate_request("Asha", "a@b.co", "12345")).unwrap_err();
        assert_eq!(err.to_string(), "Mobile number must be exactly 10 digits");
    }

    #[test]
    fn test_token_expiry() {
        let now = Utc::now();
        assert_eq!(token_expiry(now, Some(12), 48).unwrap(), now + Duration::hours(12));
        assert_eq!(token_expiry(now, Some(0), 48).unwrap(), now + Duration::hours(48));
        assert_eq!(token_expiry(now, None, 48).unwrap(), now + Duration::hours(48));
    }

    #[test]
    fn test_token_expiry_out_of_range() {
        let now = Utc::now();
        let err = token_expiry(now, Some(10_000_000_000), 48).unwrap_err();
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        assert!(token_expiry(now, Some(i64::MAX), 48).is_err());
    }

    #[test]
    fn test_officer_activation_needs_active_vendor() {
        let now = Utc::now();
        let mut vendor = Vendor {
            id: Uuid::new_v4(),
            name: "Priya".into(),
            company: "Acme Verifications".into(),
            email: "ops@acme.test".into(),
            phone_number: "9876543210".into(),
            password_hash: "hash".into(),
            status: AccountStatus::Active.into(),
            created_at: now.into(),
            updated_at: now.into(),
        };
        assert!(ensure_can_activate(&vendor).is_ok());

        vendor.status = AccountStatus::Inactive.into();
        let err = ensure_can_activate(&vendor).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Cannot activate a field officer of an inactive vendor"
        );
    }

    #[test]
    fn test_status_action() {
        let action = status_action(UpdateStatusRequest {
            status: "submitted".into(),
            remarks: None,
        })
        .unwrap();
        assert_eq!(action, CaseAction::Submit);

        let action = status_action(UpdateStatusRequest {
            status: "insufficient".into(),
            remarks: Some("Door locked".into()),
        })
        .unwrap();
        assert_eq!(
            action,
            CaseAction::MarkInsufficient {
                reason: Some("Door locked".into())
            }
        );

        let err = status_action(UpdateStatusRequest {
            status: "approved".into(),
            remarks: None,
        })
        .unwrap_err();
        assert_eq!(err.status_code(), StatusCode::FORBIDDEN);
    }

    #[test]
    fn test_assign_candidate_request_flags() {
        let request: AssignCandidateRequest = serde_json::from_value(serde_json::json!({
            "candidateName": "Asha",
            "candidateEmail": "asha@example.com",
            "candidateMobile": "9876543210",
            "sendSMS": true
        }))
        .unwrap();
        assert_eq!(request.send_sms, Some(true));
        assert!(request.send_email.is_none());
    }

    #[test]
    fn test_channel_status_from_outcome() {
        let status = ChannelStatus::from(&DeliveryOutcome::NotConfigured);
        assert_eq!(status.status, "not_sent");
        assert_eq!(status.error.as_deref(), Some("not configured"));

        let status = ChannelStatus::from(&DeliveryOutcome::Sent);
        assert_eq!(status.status, "sent");
        assert!(status.error.is_none());
    }
}
