//! Candidate self-submission through a single-use token

use axum::{
    extract::{Path, State},
    http::HeaderMap,
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{client_ip, non_blank, ApiResponse};
use crate::AppState;
use casedesk_common::{
    auth::token_fingerprint,
    db::{
        models::{CandidateToken, Record},
        Repository, SubmissionTokenUse, VerificationDraft,
    },
    errors::{AppError, Result},
    metrics,
    workflow::{self, Actor, CaseAction, CaseStatus},
};

/// What the candidate sees before filling the form
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CandidateCase {
    pub record_id: Uuid,
    pub case_number: String,
    pub reference_number: String,
    pub candidate_name: String,
    pub candidate_email: String,
    pub candidate_mobile: String,
    pub address: String,
    pub district: String,
    pub state: String,
    pub pincode: String,
    pub expires_at: DateTime<Utc>,
}

impl CandidateCase {
    fn new(token: &CandidateToken, record: &Record) -> Self {
        Self {
            record_id: record.id,
            case_number: record.case_number.clone(),
            reference_number: record.reference_number.clone(),
            candidate_name: token.candidate_name.clone(),
            candidate_email: token.candidate_email.clone(),
            candidate_mobile: token.candidate_mobile.clone(),
            address: record.address.clone(),
            district: record.district.clone(),
            state: record.state.clone(),
            pincode: record.pincode.clone(),
            expires_at: token.expires_at.with_timezone(&Utc),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CandidateSubmission {
    pub address: Option<String>,
    pub pincode: Option<String>,
    pub landmark: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub ownership_type: Option<String>,
    pub owner_name: Option<String>,
    pub relation_with_owner: Option<String>,
    pub period_of_stay: Option<String>,
    pub gps_lat: Option<f64>,
    pub gps_lng: Option<f64>,
    pub verification_notes: Option<String>,
    pub candidate_selfie: Option<String>,
    pub house_photo: Option<String>,
    pub selfie_with_house: Option<String>,
    pub candidate_signature: Option<String>,
    #[serde(default)]
    pub documents: Vec<String>,
}

impl CandidateSubmission {
    /// Check required fields and build the stored verification
    fn into_draft(self, candidate_name: &str) -> Result<VerificationDraft> {
        let address = non_blank(self.address);
        let pincode = non_blank(self.pincode);
        let city = non_blank(self.city);
        let state = non_blank(self.state);
        if address.is_none() || pincode.is_none() || city.is_none() || state.is_none() {
            return Err(AppError::invalid("Address details are required"));
        }

        let ownership_type = non_blank(self.ownership_type)
            .ok_or_else(|| AppError::invalid("Ownership type is required"))?;

        let (gps_lat, gps_lng) = match (self.gps_lat, self.gps_lng) {
            (Some(lat), Some(lng)) if lat != 0.0 && lng != 0.0 => (lat, lng),
            _ => return Err(AppError::invalid("GPS location is required")),
        };

        let signature = non_blank(self.candidate_signature)
            .ok_or_else(|| AppError::invalid("Signature is required"))?;

        Ok(VerificationDraft {
            address,
            pincode,
            city,
            state,
            landmark: non_blank(self.landmark),
            ownership_type: Some(ownership_type),
            owner_name: non_blank(self.owner_name),
            relation_with_owner: non_blank(self.relation_with_owner),
            period_of_stay: non_blank(self.period_of_stay),
            verification_notes: non_blank(self.verification_notes),
            gps_lat,
            gps_lng,
            documents: self.documents,
            photos: non_blank(self.house_photo).into_iter().collect(),
            selfie_with_house: non_blank(self.selfie_with_house),
            candidate_with_respondent: non_blank(self.candidate_selfie),
            officer_signature: Some(signature),
            verified_by: Some(format!("Candidate: {}", candidate_name)),
            status: CaseStatus::Submitted.as_str().to_string(),
            ..Default::default()
        })
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionReceipt {
    pub verification_id: Uuid,
    pub case_number: String,
}

/// Token usability as a 400 with the reason
fn check_token(token: &CandidateToken, now: DateTime<Utc>) -> Result<()> {
    if token.is_used {
        return Err(AppError::invalid("Token has already been used"));
    }
    if token.expires_at.with_timezone(&Utc) < now {
        return Err(AppError::invalid("Token has expired"));
    }
    Ok(())
}

/// Resolve a token to its open case
async fn open_case(repo: &Repository, token: &str) -> Result<(CandidateToken, Record)> {
    let stored = repo
        .find_candidate_token(token)
        .await?
        .ok_or_else(|| AppError::invalid("Invalid token"))?;
    check_token(&stored, Utc::now())?;

    let record = repo.find_record(stored.record_id).await?;
    match record {
        Some(record) if record.case_status() == CaseStatus::CandidateAssigned => {
            Ok((stored, record))
        }
        _ => Err(AppError::invalid(
            "This case is no longer available for submission",
        )),
    }
}

/// Check a token and describe the case behind it
pub async fn validate_token(
    State(state): State<AppState>,
    Path(token): Path<String>,
) -> Result<Json<ApiResponse<CandidateCase>>> {
    let repo = Repository::new(state.db.clone());
    let (stored, record) = open_case(&repo, &token).await?;

    Ok(ApiResponse::ok(CandidateCase::new(&stored, &record)))
}

/// Accept the candidate's own verification and consume the token
pub async fn submit(
    State(state): State<AppState>,
    Path(token): Path<String>,
    headers: HeaderMap,
    Json(submission): Json<CandidateSubmission>,
) -> Result<Json<ApiResponse<SubmissionReceipt>>> {
    let repo = Repository::new(state.db.clone());
    let (stored, record) = open_case(&repo, &token).await?;

    let draft = submission.into_draft(&stored.candidate_name)?;
    let actor = Actor::new(None, format!("Candidate: {}", stored.candidate_name));
    let update = workflow::apply(
        &record.snapshot(),
        CaseAction::Submit,
        &actor,
        Utc::now(),
        state.config.workflow.tat_days,
    )?;
    let late = update.is_late_submission.unwrap_or(false);

    let token_use = SubmissionTokenUse {
        token_id: stored.id,
        ip_address: client_ip(&headers),
    };
    let (record, verification) = repo
        .record_submission(record, update, draft, Some(token_use))
        .await?;

    metrics::record_transition(CaseAction::Submit.name(), record.status.as_str());
    metrics::record_verification("candidate", late);
    tracing::info!(
        record_id = %record.id,
        token = %token_fingerprint(&token),
        "Candidate verification submitted"
    );

    Ok(ApiResponse::with_message(
        "Verification submitted successfully",
        SubmissionReceipt {
            verification_id: verification.id,
            case_number: record.case_number,
        },
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn token(expires_in: Duration, used: bool) -> CandidateToken {
        let now = Utc::now();
        CandidateToken {
            id: Uuid::new_v4(),
            token: "t".repeat(64),
            record_id: Uuid::new_v4(),
            candidate_name: "Asha".into(),
            candidate_email: "asha@example.com".into(),
            candidate_mobile: "9876543210".into(),
            expires_at: (now + expires_in).into(),
            is_used: used,
            used_at: None,
            ip_address: None,
            email_status: "not_sent".into(),
            email_error: None,
            sms_status: "not_sent".into(),
            sms_error: None,
            created_at: now.into(),
        }
    }

    fn submission() -> CandidateSubmission {
        CandidateSubmission {
            address: Some("12 MG Road".into()),
            pincode: Some("560001".into()),
            city: Some("Bengaluru".into()),
            state: Some("Karnataka".into()),
            ownership_type: Some("owned".into()),
            gps_lat: Some(12.97),
            gps_lng: Some(77.59),
            candidate_signature: Some("https://cdn.example/sign.png".into()),
            house_photo: Some("https://cdn.example/house.jpg".into()),
            ..Default::default()
        }
    }

    #[test]
    fn test_check_token() {
        let now = Utc::now();
        assert!(check_token(&token(Duration::hours(1), false), now).is_ok());

        let err = check_token(&token(Duration::hours(1), true), now).unwrap_err();
        assert_eq!(err.to_string(), "Token has already been used");

        let err = check_token(&token(Duration::hours(-1), false), now).unwrap_err();
        assert_eq!(err.to_string(), "Token has expired");
    }

    #[test]
    fn test_submission_draft() {
        let draft = submission().into_draft("Asha").unwrap();
        assert_eq!(draft.verified_by.as_deref(), Some("Candidate: Asha"));
        assert_eq!(draft.status, "submitted");
        assert_eq!(draft.photos, vec!["https://cdn.example/house.jpg".to_string()]);
        assert!(draft.field_officer_id.is_none());
    }

    #[test]
    fn test_submission_required_fields() {
        let cases = [
            (
                CandidateSubmission {
                    city: None,
                    ..submission()
                },
                "Address details are required",
            ),
            (
                CandidateSubmission {
                    ownership_type: Some(" ".into()),
                    ..submission()
                },
                "Ownership type is required",
            ),
            (
                CandidateSubmission {
                    gps_lng: None,
                    ..submission()
                },
                "GPS location is required",
            ),
            (
                CandidateSubmission {
                    candidate_signature: None,
                    ..submission()
                },
                "Signature is required",
            ),
        ];

        for (request, expected) in cases {
            let err = request.into_draft("Asha").unwrap_err();
            assert_eq!(err.to_string(), expected);
        }
    }
}
