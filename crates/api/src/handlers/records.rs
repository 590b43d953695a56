//! Admin case handlers

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

use super::{actor, non_blank, transition, ApiResponse, CaseListQuery, Paged, Pagination};
use crate::AppState;
use casedesk_common::{
    auth::AuthContext,
    db::{
        models::{Record, RecordSource, Verification},
        CaseEdits, RecordFilter, Repository, StatusCounts,
    },
    errors::{AppError, Result},
    metrics,
    validation::{self, check_record, normalize_row, RecordRow, RowFailure},
    workflow::{self, CaseAction, CaseStatus, Party},
};

/// Parsed spreadsheet rows
#[derive(Debug, Deserialize)]
pub struct BulkUploadRequest {
    #[serde(default)]
    pub rows: Vec<RecordRow>,
}

/// Per-row outcome of a rejected upload
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadReport {
    pub total_rows: usize,
    pub valid_rows: usize,
    pub failed_rows: usize,
    pub failures: Vec<RowFailure>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatedCase {
    pub id: Uuid,
    pub case_number: String,
    pub reference_number: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadResult {
    pub total_rows: usize,
    pub inserted: usize,
    pub records: Vec<CreatedCase>,
}

/// Response for bulk uploads: created list on success, row report on failure
#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum BulkUploadResponse {
    Created(UploadResult),
    Rejected(UploadReport),
}

/// Optional assignment change sent with an admin edit
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignmentChange {
    /// `null` removes the vendor and any field officer
    pub vendor_id: Option<Uuid>,
    pub field_officer_id: Option<Uuid>,
    pub assigned_date: Option<chrono::DateTime<chrono::Utc>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateRecordRequest {
    #[serde(flatten)]
    pub edits: CaseEdits,
    pub assignment: Option<AssignmentChange>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ReasonRequest {
    #[serde(alias = "remarks")]
    pub reason: Option<String>,
}

/// Count per status keyed by status name
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardStats {
    pub total: u64,
    #[serde(flatten)]
    pub by_status: BTreeMap<&'static str, u64>,
}

impl From<&StatusCounts> for DashboardStats {
    fn from(counts: &StatusCounts) -> Self {
        Self {
            total: counts.total,
            by_status: CaseStatus::ALL
                .into_iter()
                .map(|status| (status.as_str(), counts.get(status)))
                .collect(),
        }
    }
}

/// Bulk upload of already-parsed rows; all-or-nothing
pub async fn bulk_upload(
    State(state): State<AppState>,
    auth: AuthContext,
    Json(request): Json<BulkUploadRequest>,
) -> Result<(StatusCode, Json<ApiResponse<BulkUploadResponse>>)> {
    auth.require_admin()?;

    let rows = request.rows;
    if rows.is_empty() {
        return Err(AppError::invalid("No rows found in upload"));
    }
    let max_rows = state.config.workflow.max_bulk_rows;
    if rows.len() > max_rows {
        return Err(AppError::invalid(format!(
            "Maximum {} rows allowed per upload",
            max_rows
        )));
    }

    let repo = Repository::new(state.db.clone());
    let existing = repo
        .existing_case_numbers(&validation::case_numbers(&rows))
        .await?;
    let outcome = validation::validate_batch(&rows, &existing);

    if !outcome.is_clean() {
        tracing::warn!(
            total = rows.len(),
            failed = outcome.failed.len(),
            "Bulk upload rejected"
        );
        let report = UploadReport {
            total_rows: rows.len(),
            valid_rows: outcome.valid.len(),
            failed_rows: outcome.failed.len(),
            failures: outcome.failed,
        };
        return Ok((
            StatusCode::BAD_REQUEST,
            Json(ApiResponse {
                success: false,
                message: Some(format!(
                    "Upload rejected: {} of {} rows failed validation",
                    report.failed_rows, report.total_rows
                )),
                data: Some(BulkUploadResponse::Rejected(report)),
            }),
        ));
    }

    let records = repo
        .create_records(
            outcome.valid.into_iter().map(|row| row.record).collect(),
            RecordSource::Excel,
            &actor(&auth),
        )
        .await?;
    metrics::record_records_created("excel", records.len());

    let result = UploadResult {
        total_rows: rows.len(),
        inserted: records.len(),
        records: records
            .into_iter()
            .map(|r| CreatedCase {
                id: r.id,
                case_number: r.case_number,
                reference_number: r.reference_number,
            })
            .collect(),
    };

    Ok((
        StatusCode::CREATED,
        ApiResponse::with_message(
            format!("{} records uploaded successfully", result.inserted),
            BulkUploadResponse::Created(result),
        ),
    ))
}

/// Create a single case by hand
pub async fn create_manual(
    State(state): State<AppState>,
    auth: AuthContext,
    Json(row): Json<RecordRow>,
) -> Result<(StatusCode, Json<ApiResponse<Record>>)> {
    auth.require_admin()?;

    let record = normalize_row(&row);
    check_record(&record).map_err(AppError::invalid)?;

    let repo = Repository::new(state.db.clone());
    if repo.case_number_taken(&record.case_number, None).await? {
        return Err(AppError::Duplicate {
            message: "Case Number already exists in system".to_string(),
        });
    }

    let record = repo
        .create_record(record, RecordSource::Manual, &actor(&auth))
        .await?;
    metrics::record_records_created("manual", 1);

    Ok((
        StatusCode::CREATED,
        ApiResponse::with_message("Record created successfully", record),
    ))
}

/// Total and per-status counts
pub async fn dashboard_stats(
    State(state): State<AppState>,
    auth: AuthContext,
) -> Result<Json<ApiResponse<DashboardStats>>> {
    auth.require_admin()?;

    let repo = Repository::new(state.db.clone());
    let counts = repo.status_counts(None).await?;

    Ok(ApiResponse::ok(DashboardStats::from(&counts)))
}

/// List cases newest first
pub async fn list_records(
    State(state): State<AppState>,
    auth: AuthContext,
    Query(query): Query<CaseListQuery>,
) -> Result<Json<ApiResponse<Paged<Record>>>> {
    auth.require_admin()?;

    let filter = RecordFilter {
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

/// Get a case
pub async fn get_record(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<Record>>> {
    auth.require_admin()?;

    let repo = Repository::new(state.db.clone());
    Ok(ApiResponse::ok(repo.get_record(id).await?))
}

/// Get the verification submitted for a case
pub async fn get_verification(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<Verification>>> {
    auth.require_admin()?;

    let repo = Repository::new(state.db.clone());
    let verification = repo
        .find_verification(id)
        .await?
        .ok_or_else(|| AppError::VerificationNotFound {
            record_id: id.to_string(),
        })?;

    Ok(ApiResponse::ok(verification))
}

/// Resolve an assignment change into a state machine action
async fn assignment_action(
    repo: &Repository,
    record: &Record,
    change: AssignmentChange,
) -> Result<Option<CaseAction>> {
    let Some(vendor_id) = change.vendor_id else {
        return Ok(record.assigned_vendor.map(|_| CaseAction::UnassignVendor));
    };

    let vendor = repo.get_vendor(vendor_id).await?;
    if !vendor.is_active() {
        return Err(AppError::invalid("Cannot assign to inactive vendor"));
    }
    let vendor_party = Party::new(vendor.id, vendor.company.clone());

    let Some(officer_id) = change.field_officer_id else {
        let unchanged = record.assigned_vendor == Some(vendor.id)
            && record.assigned_field_officer.is_none()
            && change.assigned_date.is_none();
        return Ok((!unchanged).then_some(CaseAction::AssignVendor {
            vendor: vendor_party,
        }));
    };

    let officer = repo.get_field_officer(officer_id).await?;
    if officer.vendor_id != vendor.id {
        return Err(AppError::invalid(
            "Field officer does not belong to the selected vendor",
        ));
    }
    if !officer.is_active() {
        return Err(AppError::invalid("Cannot assign to inactive field officer"));
    }

    let unchanged = record.assigned_vendor == Some(vendor.id)
        && record.assigned_field_officer == Some(officer.id)
        && change.assigned_date.is_none();
    Ok((!unchanged).then_some(CaseAction::Assign {
        vendor: vendor_party,
        officer: Party::new(officer.id, officer.name),
        assigned_date: change.assigned_date,
    }))
}

/// Edit customer fields and optionally change the assignment
pub async fn update_record(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(id): Path<Uuid>,
    Json(request): Json<UpdateRecordRequest>,
) -> Result<Json<ApiResponse<Record>>> {
    auth.require_admin()?;

    let repo = Repository::new(state.db.clone());
    let record = repo.get_record(id).await?;

    let fields = normalize_row(&request.edits.merge(&record));
    check_record(&fields).map_err(AppError::invalid)?;
    if fields.case_number != record.case_number
        && repo.case_number_taken(&fields.case_number, Some(record.id)).await?
    {
        return Err(AppError::Duplicate {
            message: "Case Number already exists in system".to_string(),
        });
    }

    let update = match request.assignment {
        Some(change) => match assignment_action(&repo, &record, change).await? {
            Some(action) => Some(workflow::apply(
                &record.snapshot(),
                action,
                &actor(&auth),
                chrono::Utc::now(),
                state.config.workflow.tat_days,
            )?),
            None => None,
        },
        None => None,
    };
    let transition_name = update
        .as_ref()
        .map(|u| (u.history.action.clone(), u.status));

    let record = repo.update_record(record, fields, update).await?;
    if let Some((action, to)) = transition_name {
        metrics::record_transition(&action, to.as_str());
    }

    Ok(ApiResponse::with_message("Record updated successfully", record))
}

async fn lifecycle(
    state: AppState,
    auth: AuthContext,
    id: Uuid,
    action: CaseAction,
    done: &str,
) -> Result<Json<ApiResponse<Record>>> {
    auth.require_admin()?;

    let repo = Repository::new(state.db.clone());
    let record = repo.get_record(id).await?;
    let record = transition(&state, &repo, record, action, &auth).await?;

    Ok(ApiResponse::with_message(done, record))
}

/// Stop a case
pub async fn stop(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(id): Path<Uuid>,
    body: Option<Json<ReasonRequest>>,
) -> Result<Json<ApiResponse<Record>>> {
    let reason = body.and_then(|Json(b)| non_blank(b.reason));
    lifecycle(state, auth, id, CaseAction::Stop { reason }, "Case stopped successfully").await
}

/// Return a stopped case to pending
pub async fn revert(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<Record>>> {
    lifecycle(state, auth, id, CaseAction::Revert, "Case reverted successfully").await
}

/// Approve a submitted case
pub async fn approve(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<Record>>> {
    lifecycle(state, auth, id, CaseAction::Approve, "Case approved successfully").await
}

/// Reject a submitted case with a reason
pub async fn reject(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(id): Path<Uuid>,
    Json(body): Json<ReasonRequest>,
) -> Result<Json<ApiResponse<Record>>> {
    let reason = body.reason.unwrap_or_default();
    lifecycle(state, auth, id, CaseAction::Reject { reason }, "Case rejected successfully").await
}

/// Reopen a rejected case
pub async fn reinitiate(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<Record>>> {
    lifecycle(state, auth, id, CaseAction::Reinitiate, "Case re-initiated successfully").await
}

/// Return an insufficient case to its field officer
pub async fn send_back(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<Record>>> {
    lifecycle(
        state,
        auth,
        id,
        CaseAction::SendBack,
        "Case sent back to Field Officer successfully",
    )
    .await
}
