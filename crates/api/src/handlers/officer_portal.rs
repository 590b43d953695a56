//! Field officer portal

use axum::{
    extract::{Path, Query, State},
    Json,
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use super::{
    auth::{AuthResponse, LoginRequest},
    non_blank, ApiResponse, CaseListQuery, Paged, Pagination,
};
use crate::AppState;
use casedesk_common::{
    auth::{verify_password, AuthContext, Role},
    db::{
        models::{FieldOfficer, Record, Verification},
        RecordFilter, Repository, VerificationDraft,
    },
    errors::{AppError, Result},
    metrics,
    validation::normalize_email,
    workflow::{self, CaseAction, CaseStatus},
};

/// Verification report from the field
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitVerificationRequest {
    /// `insufficient` marks the case insufficient; anything else submits it
    pub action: Option<String>,
    pub respondent_name: Option<String>,
    pub respondent_relationship: Option<String>,
    pub respondent_contact: Option<String>,
    pub period_of_stay: Option<String>,
    pub ownership_type: Option<String>,
    pub verification_date: Option<NaiveDate>,
    pub comments: Option<String>,
    pub insufficient_reason: Option<String>,
    pub gps_lat: Option<f64>,
    pub gps_lng: Option<f64>,
    #[serde(default)]
    pub documents: Vec<String>,
    #[serde(default)]
    pub photos: Vec<String>,
    pub selfie_with_house: Option<String>,
    pub candidate_with_respondent: Option<String>,
    pub officer_signature: Option<String>,
    pub respondent_signature: Option<String>,
}

impl SubmitVerificationRequest {
    fn is_insufficient(&self) -> bool {
        self.action.as_deref().map(str::trim) == Some("insufficient")
    }

    /// Check required evidence and build the stored verification
    fn into_draft(self, officer: &AuthContext) -> Result<(CaseAction, VerificationDraft)> {
        let insufficient = self.is_insufficient();
        let (gps_lat, gps_lng) = match (self.gps_lat, self.gps_lng) {
            (Some(lat), Some(lng)) if lat != 0.0 && lng != 0.0 => (lat, lng),
            _ => {
                return Err(AppError::invalid(
                    "GPS location is required. Please enable location services.",
                ))
            }
        };
        let selfie_with_house = non_blank(self.selfie_with_house)
            .ok_or_else(|| AppError::invalid("Selfie Photo with House is required"))?;
        let candidate_with_respondent = non_blank(self.candidate_with_respondent)
            .ok_or_else(|| AppError::invalid("Candidate with Respondent Photo is required"))?;

        let insufficient_reason = non_blank(self.insufficient_reason);
        let (action, status) = if insufficient {
            (
                CaseAction::MarkInsufficient {
                    reason: insufficient_reason.clone(),
                },
                CaseStatus::Insufficient,
            )
        } else {
            (CaseAction::Submit, CaseStatus::Submitted)
        };

        let draft = VerificationDraft {
            field_officer_id: Some(officer.user_id),
            respondent_name: non_blank(self.respondent_name),
            respondent_relationship: non_blank(self.respondent_relationship),
            respondent_contact: non_blank(self.respondent_contact),
            period_of_stay: non_blank(self.period_of_stay),
            ownership_type: non_blank(self.ownership_type),
            verification_date: self.verification_date,
            comments: non_blank(self.comments),
            insufficient_reason,
            verified_by: Some(officer.name.clone()),
            status: status.as_str().to_string(),
            gps_lat,
            gps_lng,
            documents: self.documents,
            photos: self.photos,
            selfie_with_house: Some(selfie_with_house),
            candidate_with_respondent: Some(candidate_with_respondent),
            officer_signature: non_blank(self.officer_signature),
            respondent_signature: non_blank(self.respondent_signature),
            ..Default::default()
        };

        Ok((action, draft))
    }
}

#[derive(Debug, Serialize)]
pub struct SubmissionResult {
    pub record: Record,
    pub verification: Verification,
}

fn officer_id(auth: &AuthContext) -> Result<Uuid> {
    auth.require_role(Role::FieldOfficer)?;
    Ok(auth.user_id)
}

/// Load a case assigned to the calling officer
async fn assigned_case(repo: &Repository, officer_id: Uuid, id: Uuid) -> Result<Record> {
    match repo.find_record(id).await? {
        Some(record) if record.assigned_field_officer == Some(officer_id) => Ok(record),
        _ => Err(AppError::not_found("Case not found or not assigned to you")),
    }
}

/// Field officer login
pub async fn login(
    State(state): State<AppState>,
    Json(request): Json<LoginRequest>,
) -> Result<Json<ApiResponse<AuthResponse<FieldOfficer>>>> {
    request.validate()?;

    let repo = Repository::new(state.db.clone());
    let email = normalize_email(&request.email);

    let officer = match repo.find_field_officer_by_email(&email).await? {
        Some(officer) if verify_password(&request.password, &officer.password_hash) => officer,
        _ => {
            metrics::record_login(Role::FieldOfficer.as_str(), false);
            return Err(AppError::InvalidCredentials);
        }
    };

    if !officer.is_active() {
        metrics::record_login(Role::FieldOfficer.as_str(), false);
        return Err(AppError::AccountInactive);
    }

    let token = state.jwt.generate_token(
        officer.id,
        Role::FieldOfficer,
        &officer.name,
        Some(officer.vendor_id),
    )?;
    metrics::record_login(Role::FieldOfficer.as_str(), true);

    tracing::info!(field_officer_id = %officer.id, "Field officer logged in");

    Ok(ApiResponse::with_message(
        "Login successful",
        AuthResponse {
            token,
            user: officer,
        },
    ))
}

/// Cases assigned to the calling officer
pub async fn list_cases(
    State(state): State<AppState>,
    auth: AuthContext,
    Query(query): Query<CaseListQuery>,
) -> Result<Json<ApiResponse<Paged<Record>>>> {
    let officer_id = officer_id(&auth)?;

    let filter = RecordFilter {
        field_officer_id: Some(officer_id),
        status: query
            .status_filter()
            .map(str::parse::<CaseStatus>)
            .transpose()?,
        search: query.search.clone(),
        ..Default::default()
    };

    let repo = Repository::new(state.db.clone());
    let (items, total) = repo.list_records(&filter, query.page(), query.limit()).await?;

    Ok(ApiResponse::ok(Paged {
        items,
        pagination: Pagination::new(total, query.page(), query.limit()),
    }))
}

/// One of the calling officer's cases
pub async fn get_case(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<Record>>> {
    let officer_id = officer_id(&auth)?;

    let repo = Repository::new(state.db.clone());
    Ok(ApiResponse::ok(assigned_case(&repo, officer_id, id).await?))
}

/// Submit a field verification or mark the case insufficient
pub async fn submit_verification(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(id): Path<Uuid>,
    Json(request): Json<SubmitVerificationRequest>,
) -> Result<Json<ApiResponse<SubmissionResult>>> {
    let officer_id = officer_id(&auth)?;

    let repo = Repository::new(state.db.clone());
    let record = assigned_case(&repo, officer_id, id).await?;
    if record.case_status() != CaseStatus::Assigned {
        return Err(AppError::invalid("Only assigned cases can be submitted"));
    }

    let insufficient = request.is_insufficient();
    let (action, draft) = request.into_draft(&auth)?;
    let update = workflow::apply(
        &record.snapshot(),
        action,
        &super::actor(&auth),
        chrono::Utc::now(),
        state.config.workflow.tat_days,
    )?;
    let action_name = update.history.action.clone();
    let late = update.is_late_submission.unwrap_or(false);

    let (record, verification) = repo.record_submission(record, update, draft, None).await?;
    metrics::record_transition(&action_name, record.status.as_str());
    if !insufficient {
        metrics::record_verification("field_officer", late);
    }

    Ok(ApiResponse::with_message(
        "Verification submitted",
        SubmissionResult {
            record,
            verification,
        },
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn officer() -> AuthContext {
        AuthContext {
            user_id: Uuid::new_v4(),
            role: Role::FieldOfficer,
            name: "Kiran".into(),
            vendor_id: Some(Uuid::new_v4()),
            request_id: "req-1".into(),
        }
    }

    fn complete_request() -> SubmitVerificationRequest {
        SubmitVerificationRequest {
            respondent_name: Some("Neighbour".into()),
            gps_lat: Some(12.97),
            gps_lng: Some(77.59),
            selfie_with_house: Some("https://cdn.example/selfie.jpg".into()),
            candidate_with_respondent: Some("https://cdn.example/pair.jpg".into()),
            ..Default::default()
        }
    }

    #[test]
    fn test_submit_builds_draft() {
        let auth = officer();
        let (action, draft) = complete_request().into_draft(&auth).unwrap();
        assert_eq!(action, CaseAction::Submit);
        assert_eq!(draft.status, "submitted");
        assert_eq!(draft.field_officer_id, Some(auth.user_id));
        assert_eq!(draft.verified_by.as_deref(), Some("Kiran"));
        assert_eq!(draft.respondent_name.as_deref(), Some("Neighbour"));
    }

    #[test]
    fn test_insufficient_action() {
        let request = SubmitVerificationRequest {
            action: Some("insufficient".into()),
            insufficient_reason: Some("House locked".into()),
            ..complete_request()
        };
        assert!(request.is_insufficient());
        let (action, draft) = request.into_draft(&officer()).unwrap();
        assert_eq!(
            action,
            CaseAction::MarkInsufficient {
                reason: Some("House locked".into())
            }
        );
        assert_eq!(draft.status, "insufficient");
    }

    #[test]
    fn test_required_evidence() {
        let request = SubmitVerificationRequest {
            gps_lat: None,
            ..complete_request()
        };
        let err = request.into_draft(&officer()).unwrap_err();
        assert_eq!(
            err.to_string(),
            "GPS location is required. Please enable location services."
        );

        let request = SubmitVerificationRequest {
            selfie_with_house: Some("  ".into()),
            ..complete_request()
        };
        let err = request.into_draft(&officer()).unwrap_err();
        assert_eq!(err.to_string(), "Selfie Photo with House is required");

        let request = SubmitVerificationRequest {
            candidate_with_respondent: None,
            ..complete_request()
        };
        let err = request.into_draft(&officer()).unwrap_err();
        assert_eq!(err.to_string(), "Candidate with Respondent Photo is required");
    }
}
