//! Case record, verification and statistics queries

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use sea_orm::prelude::DateTimeWithTimeZone;
use sea_orm::sea_query::{Expr, Func};
use sea_orm::{
    ActiveModelTrait, ActiveValue, ColumnTrait, Condition, ConnectionTrait, DbBackend,
    EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Set, Statement,
    TransactionTrait,
};
use serde::Deserialize;
use tracing::info;
use uuid::Uuid;

use super::{page_index, Repository};
use crate::db::models::*;
use crate::errors::{AppError, Result};
use crate::reports::ReportFilter;
use crate::validation::NewRecord;
use crate::workflow::{Actor, CaseStatus, CaseUpdate, HistoryEntry, Patch, Party};

const REFERENCE_COUNTER: &str = "recordRef";

/// Reference number for a counter value, e.g. `REC-2024-00042`
pub fn reference_number(year: i32, sequence: i64) -> String {
    format!("REC-{}-{:05}", year, sequence)
}

/// Reserve `count` consecutive values of a named counter, returning the last one
async fn reserve_sequence<C: ConnectionTrait>(conn: &C, name: &str, count: i64) -> Result<i64> {
    let stmt = Statement::from_sql_and_values(
        DbBackend::Postgres,
        r#"
        INSERT INTO counters (name, value)
        VALUES ($1, $2)
        ON CONFLICT (name) DO UPDATE SET value = counters.value + EXCLUDED.value
        RETURNING value
        "#,
        vec![name.into(), count.into()],
    );

    let row = conn.query_one(stmt).await?.ok_or_else(|| AppError::Internal {
        message: format!("Counter {} returned no value", name),
    })?;

    row.try_get_by_index::<i64>(0).map_err(Into::into)
}

/// Filters for case listings
#[derive(Debug, Clone, Default)]
pub struct RecordFilter {
    pub status: Option<CaseStatus>,
    /// Only cases submitted after their due date
    pub late_only: bool,
    pub search: Option<String>,
    pub vendor_id: Option<Uuid>,
    pub field_officer_id: Option<Uuid>,
}

impl RecordFilter {
    fn condition(&self) -> Condition {
        let mut condition = Condition::all();

        if let Some(status) = self.status {
            condition = condition.add(RecordColumn::Status.eq(status.as_str()));
        }
        if self.late_only {
            condition = condition.add(RecordColumn::IsLateSubmission.eq(true));
        }
        if let Some(vendor_id) = self.vendor_id {
            condition = condition.add(RecordColumn::AssignedVendor.eq(vendor_id));
        }
        if let Some(officer_id) = self.field_officer_id {
            condition = condition.add(RecordColumn::AssignedFieldOfficer.eq(officer_id));
        }
        if let Some(term) = self.search.as_deref().map(str::trim).filter(|t| !t.is_empty()) {
            let pattern = format!("%{}%", term.to_lowercase());
            let any = [
                RecordColumn::ReferenceNumber,
                RecordColumn::CaseNumber,
                RecordColumn::FullName,
                RecordColumn::ContactNumber,
            ]
            .into_iter()
            .fold(Condition::any(), |any, column| {
                any.add(Expr::expr(Func::lower(Expr::col(column))).like(pattern.clone()))
            });
            condition = condition.add(any);
        }

        condition
    }
}

/// Per-status case counts
#[derive(Debug, Clone, Default)]
pub struct StatusCounts {
    pub total: u64,
    pub by_status: HashMap<CaseStatus, u64>,
    pub late_submission: u64,
}

impl StatusCounts {
    pub fn get(&self, status: CaseStatus) -> u64 {
        self.by_status.get(&status).copied().unwrap_or(0)
    }
}

/// Present-but-null stays distinguishable from absent
fn clearable<'de, D>(deserializer: D) -> std::result::Result<Option<Option<String>>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Option::<String>::deserialize(deserializer).map(Some)
}

/// Admin edits to customer fields; absent fields are left unchanged
///
/// Optional fields sent as `null` or blank are cleared.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaseEdits {
    pub case_number: Option<String>,
    #[serde(default, deserialize_with = "clearable")]
    pub document_type: Option<Option<String>>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub contact_number: Option<String>,
    #[serde(default, deserialize_with = "clearable")]
    pub email: Option<Option<String>>,
    pub address: Option<String>,
    pub state: Option<String>,
    pub district: Option<String>,
    pub pincode: Option<String>,
    #[serde(default, deserialize_with = "clearable")]
    pub remarks: Option<Option<String>>,
}

impl CaseEdits {
    /// Overlay the edits on the stored values
    pub fn merge(self, current: &Record) -> crate::validation::RecordRow {
        crate::validation::RecordRow {
            case_number: Some(self.case_number.unwrap_or_else(|| current.case_number.clone())),
            document_type: self.document_type.unwrap_or_else(|| current.document_type.clone()),
            first_name: Some(self.first_name.unwrap_or_else(|| current.first_name.clone())),
            last_name: Some(self.last_name.unwrap_or_else(|| current.last_name.clone())),
            contact_number: Some(self.contact_number.unwrap_or_else(|| current.contact_number.clone())),
            email: self.email.unwrap_or_else(|| current.email.clone()),
            address: Some(self.address.unwrap_or_else(|| current.address.clone())),
            state: Some(self.state.unwrap_or_else(|| current.state.clone())),
            district: Some(self.district.unwrap_or_else(|| current.district.clone())),
            pincode: Some(self.pincode.unwrap_or_else(|| current.pincode.clone())),
            pin: None,
            remarks: self.remarks.unwrap_or_else(|| current.remarks.clone()),
        }
    }
}

/// Evidence captured by a field officer or candidate
#[derive(Debug, Clone, Default)]
pub struct VerificationDraft {
    pub field_officer_id: Option<Uuid>,
    pub respondent_name: Option<String>,
    pub respondent_relationship: Option<String>,
    pub respondent_contact: Option<String>,
    pub period_of_stay: Option<String>,
    pub ownership_type: Option<String>,
    pub owner_name: Option<String>,
    pub relation_with_owner: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub pincode: Option<String>,
    pub landmark: Option<String>,
    pub verification_notes: Option<String>,
    pub verification_date: Option<NaiveDate>,
    pub comments: Option<String>,
    pub insufficient_reason: Option<String>,
    pub verified_by: Option<String>,
    pub status: String,
    pub gps_lat: f64,
    pub gps_lng: f64,
    pub documents: Vec<String>,
    pub photos: Vec<String>,
    pub selfie_with_house: Option<String>,
    pub candidate_with_respondent: Option<String>,
    pub officer_signature: Option<String>,
    pub respondent_signature: Option<String>,
}

impl VerificationDraft {
    fn write_into(self, active: &mut VerificationActiveModel) {
        active.field_officer_id = Set(self.field_officer_id);
        active.respondent_name = Set(self.respondent_name);
        active.respondent_relationship = Set(self.respondent_relationship);
        active.respondent_contact = Set(self.respondent_contact);
        active.period_of_stay = Set(self.period_of_stay);
        active.ownership_type = Set(self.ownership_type);
        active.owner_name = Set(self.owner_name);
        active.relation_with_owner = Set(self.relation_with_owner);
        active.address = Set(self.address);
        active.city = Set(self.city);
        active.state = Set(self.state);
        active.pincode = Set(self.pincode);
        active.landmark = Set(self.landmark);
        active.verification_notes = Set(self.verification_notes);
        active.verification_date = Set(self.verification_date);
        active.comments = Set(self.comments);
        active.insufficient_reason = Set(self.insufficient_reason);
        active.verified_by = Set(self.verified_by);
        active.status = Set(self.status);
        active.gps_lat = Set(self.gps_lat);
        active.gps_lng = Set(self.gps_lng);
        active.documents = Set(serde_json::json!(self.documents));
        active.photos = Set(serde_json::json!(self.photos));
        active.selfie_with_house = Set(self.selfie_with_house);
        active.candidate_with_respondent = Set(self.candidate_with_respondent);
        active.officer_signature = Set(self.officer_signature);
        active.respondent_signature = Set(self.respondent_signature);
    }
}

/// Candidate token consumed by a submission
#[derive(Debug, Clone)]
pub struct SubmissionTokenUse {
    pub token_id: Uuid,
    pub ip_address: Option<String>,
}

fn set_party(
    id: &mut ActiveValue<Option<Uuid>>,
    name: &mut ActiveValue<Option<String>>,
    patch: Patch<Party>,
) {
    match patch {
        Patch::Keep => {}
        Patch::Set(party) => {
            *id = Set(Some(party.id));
            *name = Set(Some(party.name));
        }
        Patch::Clear => {
            *id = Set(None);
            *name = Set(None);
        }
    }
}

fn set_time(field: &mut ActiveValue<Option<DateTimeWithTimeZone>>, patch: Patch<DateTime<Utc>>) {
    match patch {
        Patch::Keep => {}
        Patch::Set(at) => *field = Set(Some(at.into())),
        Patch::Clear => *field = Set(None),
    }
}

fn appended_history(current: &serde_json::Value, entry: &HistoryEntry) -> Result<serde_json::Value> {
    let mut items = match current {
        serde_json::Value::Array(items) => items.clone(),
        _ => Vec::new(),
    };
    items.push(serde_json::to_value(entry)?);
    Ok(serde_json::Value::Array(items))
}

/// Turn a transition result into column changes on the stored record
fn case_update_model(record: Record, update: CaseUpdate) -> Result<RecordActiveModel> {
    let history = appended_history(&record.history, &update.history)?;
    let performed_at = update.history.performed_at;
    let mut active: RecordActiveModel = record.into();

    active.status = Set(update.status.as_str().to_string());
    set_party(&mut active.assigned_vendor, &mut active.assigned_vendor_name, update.vendor);
    set_party(
        &mut active.assigned_field_officer,
        &mut active.assigned_field_officer_name,
        update.field_officer,
    );
    match update.candidate {
        Patch::Keep => {}
        Patch::Set(candidate) => {
            active.candidate_name = Set(Some(candidate.name));
            active.candidate_email = Set(Some(candidate.email));
            active.candidate_mobile = Set(Some(candidate.mobile));
        }
        Patch::Clear => {
            active.candidate_name = Set(None);
            active.candidate_email = Set(None);
            active.candidate_mobile = Set(None);
        }
    }
    set_time(&mut active.assigned_date, update.assigned_date);
    set_time(&mut active.tat_due_date, update.tat_due_date);
    set_time(&mut active.completion_date, update.completion_date);
    set_time(&mut active.submitted_at, update.submitted_at);
    if let Some(late) = update.is_late_submission {
        active.is_late_submission = Set(late);
    }
    if let Some(remarks) = update.remarks {
        active.remarks = Set(Some(remarks));
    }
    active.history = Set(history);
    active.updated_at = Set(performed_at.into());

    Ok(active)
}

/// Lock the case row for a transition, failing when its status moved on since it was read
async fn claim_status<C: ConnectionTrait>(conn: &C, record_id: Uuid, from: CaseStatus) -> Result<()> {
    let claimed = RecordEntity::update_many()
        .col_expr(RecordColumn::Status, Expr::value(from.as_str()))
        .filter(RecordColumn::Id.eq(record_id))
        .filter(RecordColumn::Status.eq(from.as_str()))
        .exec(conn)
        .await?;

    if claimed.rows_affected == 0 {
        return Err(AppError::InvalidTransition {
            message: "Case was updated by another request. Please reload and try again".to_string(),
        });
    }
    Ok(())
}

/// Mark a candidate token used unless another submission already did
async fn consume_token<C: ConnectionTrait>(
    conn: &C,
    token_use: SubmissionTokenUse,
    now: DateTime<Utc>,
) -> Result<()> {
    let used_at: DateTimeWithTimeZone = now.into();
    let consumed = CandidateTokenEntity::update_many()
        .col_expr(CandidateTokenColumn::IsUsed, Expr::value(true))
        .col_expr(CandidateTokenColumn::UsedAt, Expr::value(Some(used_at)))
        .col_expr(CandidateTokenColumn::IpAddress, Expr::value(token_use.ip_address))
        .filter(CandidateTokenColumn::Id.eq(token_use.token_id))
        .filter(CandidateTokenColumn::IsUsed.eq(false))
        .exec(conn)
        .await?;

    if consumed.rows_affected == 0 {
        return Err(AppError::invalid("Token has already been used"));
    }
    Ok(())
}

fn new_record_model(
    row: NewRecord,
    reference: String,
    source: RecordSource,
    actor: &Actor,
    now: DateTime<Utc>,
) -> Result<RecordActiveModel> {
    let created = HistoryEntry {
        action: "create".to_string(),
        performed_by: actor.name.clone(),
        performed_by_id: actor.id,
        performed_at: now,
        from_status: CaseStatus::Pending,
        to_status: CaseStatus::Pending,
        details: Some(format!("Source: {}", String::from(source))),
    };
    let full_name = row.full_name();

    Ok(RecordActiveModel {
        id: Set(Uuid::new_v4()),
        case_number: Set(row.case_number),
        reference_number: Set(reference),
        document_type: Set(row.document_type),
        first_name: Set(row.first_name),
        last_name: Set(row.last_name),
        full_name: Set(full_name),
        contact_number: Set(row.contact_number),
        email: Set(row.email),
        address: Set(row.address),
        state: Set(row.state),
        district: Set(row.district),
        pincode: Set(row.pincode),
        remarks: Set(row.remarks),
        source: Set(source.into()),
        status: Set(CaseStatus::Pending.as_str().to_string()),
        assigned_vendor: Set(None),
        assigned_vendor_name: Set(None),
        assigned_field_officer: Set(None),
        assigned_field_officer_name: Set(None),
        candidate_name: Set(None),
        candidate_email: Set(None),
        candidate_mobile: Set(None),
        assigned_date: Set(None),
        tat_due_date: Set(None),
        completion_date: Set(None),
        submitted_at: Set(None),
        is_late_submission: Set(false),
        uploaded_date: Set(now.into()),
        history: Set(serde_json::Value::Array(vec![serde_json::to_value(&created)?])),
        created_at: Set(now.into()),
        updated_at: Set(now.into()),
    })
}

impl Repository {
    // ========================================================================
    // Record Operations
    // ========================================================================

    /// Which of the given case numbers are already stored
    pub async fn existing_case_numbers(&self, case_numbers: &[String]) -> Result<HashSet<String>> {
        if case_numbers.is_empty() {
            return Ok(HashSet::new());
        }

        let found: Vec<String> = RecordEntity::find()
            .select_only()
            .column(RecordColumn::CaseNumber)
            .filter(RecordColumn::CaseNumber.is_in(case_numbers.iter().cloned()))
            .into_tuple()
            .all(self.conn())
            .await?;

        Ok(found.into_iter().collect())
    }

    /// Check whether a case number is taken by any other record
    pub async fn case_number_taken(&self, case_number: &str, except: Option<Uuid>) -> Result<bool> {
        let mut query = RecordEntity::find().filter(RecordColumn::CaseNumber.eq(case_number));
        if let Some(id) = except {
            query = query.filter(RecordColumn::Id.ne(id));
        }
        Ok(query.count(self.conn()).await? > 0)
    }

    /// Insert validated rows in one transaction with fresh reference numbers
    pub async fn create_records(
        &self,
        rows: Vec<NewRecord>,
        source: RecordSource,
        actor: &Actor,
    ) -> Result<Vec<Record>> {
        if rows.is_empty() {
            return Ok(Vec::new());
        }

        let now = Utc::now();
        let txn = self.conn().begin().await?;

        let last = reserve_sequence(&txn, REFERENCE_COUNTER, rows.len() as i64).await?;
        let first = last - rows.len() as i64 + 1;

        let mut created = Vec::with_capacity(rows.len());
        for (offset, row) in rows.into_iter().enumerate() {
            let reference = reference_number(now.year(), first + offset as i64);
            let model = new_record_model(row, reference, source, actor, now)?;
            created.push(model.insert(&txn).await?);
        }

        txn.commit().await?;

        info!(count = created.len(), source = %String::from(source), "Records created");
        Ok(created)
    }

    /// Insert a single validated record
    pub async fn create_record(
        &self,
        row: NewRecord,
        source: RecordSource,
        actor: &Actor,
    ) -> Result<Record> {
        self.create_records(vec![row], source, actor)
            .await?
            .pop()
            .ok_or_else(|| AppError::Internal {
                message: "Record insert returned nothing".to_string(),
            })
    }

    /// Find record by ID
    pub async fn find_record(&self, id: Uuid) -> Result<Option<Record>> {
        RecordEntity::find_by_id(id)
            .one(self.conn())
            .await
            .map_err(Into::into)
    }

    /// Find record by ID or fail with 404
    pub async fn get_record(&self, id: Uuid) -> Result<Record> {
        self.find_record(id)
            .await?
            .ok_or_else(|| AppError::RecordNotFound { id: id.to_string() })
    }

    /// List records newest first with pagination
    pub async fn list_records(
        &self,
        filter: &RecordFilter,
        page: u64,
        limit: u64,
    ) -> Result<(Vec<Record>, u64)> {
        let paginator = RecordEntity::find()
            .filter(filter.condition())
            .order_by_desc(RecordColumn::CreatedAt)
            .paginate(self.conn(), limit.max(1));

        let total = paginator.num_items().await?;
        let records = paginator.fetch_page(page_index(page)).await?;

        Ok((records, total))
    }

    /// Write edited customer fields and an optional assignment transition
    pub async fn update_record(
        &self,
        record: Record,
        fields: NewRecord,
        transition: Option<CaseUpdate>,
    ) -> Result<Record> {
        let now = Utc::now();
        let full_name = fields.full_name();

        let txn = self.conn().begin().await?;
        let mut active = match transition {
            Some(update) => {
                claim_status(&txn, record.id, update.history.from_status).await?;
                case_update_model(record, update)?
            }
            None => record.into(),
        };

        active.case_number = Set(fields.case_number);
        active.document_type = Set(fields.document_type);
        active.first_name = Set(fields.first_name);
        active.last_name = Set(fields.last_name);
        active.full_name = Set(full_name);
        active.contact_number = Set(fields.contact_number);
        active.email = Set(fields.email);
        active.address = Set(fields.address);
        active.state = Set(fields.state);
        active.district = Set(fields.district);
        active.pincode = Set(fields.pincode);
        active.remarks = Set(fields.remarks);
        active.updated_at = Set(now.into());

        let updated = active.update(&txn).await?;
        txn.commit().await?;
        Ok(updated)
    }

    /// Persist a state machine transition
    pub async fn apply_case_update(&self, record: Record, update: CaseUpdate) -> Result<Record> {
        let record_id = record.id;
        let from = update.history.from_status;
        let to = update.status;

        let txn = self.conn().begin().await?;
        claim_status(&txn, record_id, from).await?;
        let updated = case_update_model(record, update)?.update(&txn).await?;
        txn.commit().await?;

        info!(record_id = %record_id, from = %from, to = %to, "Case status changed");
        Ok(updated)
    }

    /// Count cases per status, optionally scoped to a vendor
    pub async fn status_counts(&self, vendor_id: Option<Uuid>) -> Result<StatusCounts> {
        let scope = match vendor_id {
            Some(id) => Condition::all().add(RecordColumn::AssignedVendor.eq(id)),
            None => Condition::all(),
        };

        let rows: Vec<(String, i64)> = RecordEntity::find()
            .select_only()
            .column(RecordColumn::Status)
            .column_as(Expr::col(RecordColumn::Id).count(), "count")
            .filter(scope.clone())
            .group_by(RecordColumn::Status)
            .into_tuple()
            .all(self.conn())
            .await?;

        let late_submission = RecordEntity::find()
            .filter(scope)
            .filter(RecordColumn::IsLateSubmission.eq(true))
            .count(self.conn())
            .await?;

        let mut counts = StatusCounts {
            late_submission,
            ..Default::default()
        };
        for (status, count) in rows {
            let count = count.max(0) as u64;
            counts.total += count;
            if let Ok(status) = status.parse::<CaseStatus>() {
                *counts.by_status.entry(status).or_default() += count;
            }
        }

        Ok(counts)
    }

    /// Cases still open past their due date
    pub async fn count_overdue(&self, now: DateTime<Utc>) -> Result<u64> {
        let now: DateTimeWithTimeZone = now.into();
        RecordEntity::find()
            .filter(RecordColumn::Status.is_in([
                CaseStatus::Assigned.as_str(),
                CaseStatus::CandidateAssigned.as_str(),
            ]))
            .filter(RecordColumn::TatDueDate.lt(now))
            .count(self.conn())
            .await
            .map_err(Into::into)
    }

    /// Records matching a report filter, newest first
    pub async fn records_for_report(&self, filter: &ReportFilter) -> Result<Vec<Record>> {
        let mut query = RecordEntity::find();

        if let Some(vendor_id) = filter.vendor_id {
            query = query.filter(RecordColumn::AssignedVendor.eq(vendor_id));
        }
        if let Some(status) = filter.status {
            query = query.filter(RecordColumn::Status.eq(status.as_str()));
        }
        let (from, until) = filter.created_range();
        if let Some(from) = from {
            let from: DateTimeWithTimeZone = from.into();
            query = query.filter(RecordColumn::CreatedAt.gte(from));
        }
        if let Some(until) = until {
            let until: DateTimeWithTimeZone = until.into();
            query = query.filter(RecordColumn::CreatedAt.lt(until));
        }

        query
            .order_by_desc(RecordColumn::CreatedAt)
            .all(self.conn())
            .await
            .map_err(Into::into)
    }

    // ========================================================================
    // Verification Operations
    // ========================================================================

    /// Find verification for a record
    pub async fn find_verification(&self, record_id: Uuid) -> Result<Option<Verification>> {
        VerificationEntity::find()
            .filter(VerificationColumn::RecordId.eq(record_id))
            .one(self.conn())
            .await
            .map_err(Into::into)
    }

    /// Upsert the verification, apply the transition and consume the token atomically
    pub async fn record_submission(
        &self,
        record: Record,
        update: CaseUpdate,
        draft: VerificationDraft,
        token_use: Option<SubmissionTokenUse>,
    ) -> Result<(Record, Verification)> {
        let now = Utc::now();
        let record_id = record.id;
        let txn = self.conn().begin().await?;

        if let Some(token_use) = token_use {
            consume_token(&txn, token_use, now).await?;
        }
        claim_status(&txn, record_id, update.history.from_status).await?;

        let existing = VerificationEntity::find()
            .filter(VerificationColumn::RecordId.eq(record_id))
            .one(&txn)
            .await?;

        let verification = match existing {
            Some(existing) => {
                let mut active: VerificationActiveModel = existing.into();
                draft.write_into(&mut active);
                active.updated_at = Set(now.into());
                active.update(&txn).await?
            }
            None => {
                let mut active = VerificationActiveModel {
                    id: Set(Uuid::new_v4()),
                    record_id: Set(record_id),
                    created_at: Set(now.into()),
                    updated_at: Set(now.into()),
                    ..Default::default()
                };
                draft.write_into(&mut active);
                active.insert(&txn).await?
            }
        };

        let record = case_update_model(record, update)?.update(&txn).await?;

        txn.commit().await?;

        info!(
            record_id = %record_id,
            verification_id = %verification.id,
            status = %record.status,
            "Verification recorded"
        );
        Ok((record, verification))
    }
}

#[cfg(test)]
mod tests {
    use super::super::mock;
    use super::*;
    use crate::workflow::{self, CaseAction, CaseSnapshot};

    fn stored(status: CaseStatus) -> Record {
        let now = Utc::now();
        let row = NewRecord {
            case_number: "C-1".into(),
            document_type: None,
            first_name: "Asha".into(),
            last_name: "Verma".into(),
            contact_number: "9876543210".into(),
            email: None,
            address: "12 MG Road".into(),
            state: "Karnataka".into(),
            district: "Bengaluru".into(),
            pincode: "560001".into(),
            remarks: None,
        };
        let actor = Actor::new(None, "Admin");
        let active = new_record_model(row, reference_number(2024, 1), RecordSource::Manual, &actor, now).unwrap();
        Record {
            id: active.id.clone().unwrap(),
            case_number: active.case_number.clone().unwrap(),
            reference_number: active.reference_number.clone().unwrap(),
            document_type: None,
            first_name: "Asha".into(),
            last_name: "Verma".into(),
            full_name: active.full_name.clone().unwrap(),
            contact_number: "9876543210".into(),
            email: None,
            address: "12 MG Road".into(),
            state: "Karnataka".into(),
            district: "Bengaluru".into(),
            pincode: "560001".into(),
            remarks: None,
            source: "manual".into(),
            status: status.as_str().into(),
            assigned_vendor: None,
            assigned_vendor_name: None,
            assigned_field_officer: None,
            assigned_field_officer_name: None,
            candidate_name: None,
            candidate_email: None,
            candidate_mobile: None,
            assigned_date: None,
            tat_due_date: None,
            completion_date: None,
            submitted_at: None,
            is_late_submission: false,
            uploaded_date: now.into(),
            history: active.history.clone().unwrap(),
            created_at: now.into(),
            updated_at: now.into(),
        }
    }

    #[test]
    fn test_reference_number_format() {
        assert_eq!(reference_number(2024, 7), "REC-2024-00007");
        assert_eq!(reference_number(2025, 123456), "REC-2025-123456");
    }

    #[test]
    fn test_new_record_has_creation_history() {
        let record = stored(CaseStatus::Pending);
        assert_eq!(record.full_name, "Asha Verma");
        let history = record.history_entries();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].action, "create");
    }

    #[test]
    fn test_case_update_model_sets_assignment_and_history() {
        let record = stored(CaseStatus::Pending);
        let vendor = Party::new(Uuid::new_v4(), "Acme");
        let officer = Party::new(Uuid::new_v4(), "Ravi");
        let update = workflow::apply(
            &record.snapshot(),
            CaseAction::Assign { vendor: vendor.clone(), officer, assigned_date: None },
            &Actor::new(None, "Admin"),
            Utc::now(),
            7,
        )
        .unwrap();

        let active = case_update_model(record, update).unwrap();
        assert_eq!(active.status.clone().unwrap(), "assigned");
        assert_eq!(active.assigned_vendor.clone().unwrap(), Some(vendor.id));
        assert_eq!(active.assigned_vendor_name.clone().unwrap(), Some("Acme".to_string()));
        assert!(active.tat_due_date.clone().unwrap().is_some());
        match active.history.clone().unwrap() {
            serde_json::Value::Array(items) => assert_eq!(items.len(), 2),
            other => panic!("unexpected history: {other}"),
        }
    }

    fn candidate_submission() -> (Record, CaseUpdate, SubmissionTokenUse) {
        let record = stored(CaseStatus::CandidateAssigned);
        let update = workflow::apply(
            &record.snapshot(),
            CaseAction::Submit,
            &Actor::new(None, "Candidate: Asha"),
            Utc::now(),
            7,
        )
        .unwrap();
        let token_use = SubmissionTokenUse {
            token_id: Uuid::new_v4(),
            ip_address: Some("10.0.0.7".into()),
        };
        (record, update, token_use)
    }

    #[test]
    fn test_used_token_cannot_submit_again() {
        let repo = mock::repository(&[0]);
        let (record, update, token_use) = candidate_submission();

        let err = tokio_test::block_on(repo.record_submission(
            record,
            update,
            VerificationDraft::default(),
            Some(token_use),
        ))
        .unwrap_err();
        assert_eq!(err.to_string(), "Token has already been used");

        let sql = mock::executed_sql(&repo);
        assert_eq!(sql.len(), 1);
        assert!(sql[0].starts_with(r#"UPDATE "candidate_tokens""#));
        assert!(sql[0].contains(r#"AND "candidate_tokens"."is_used" = "#));
    }

    #[test]
    fn test_submission_refused_when_status_moved_on() {
        let repo = mock::repository(&[1, 0]);
        let (record, update, token_use) = candidate_submission();

        let err = tokio_test::block_on(repo.record_submission(
            record,
            update,
            VerificationDraft::default(),
            Some(token_use),
        ))
        .unwrap_err();
        assert_eq!(err.code(), crate::errors::ErrorCode::InvalidTransition);

        let sql = mock::executed_sql(&repo);
        assert_eq!(sql.len(), 2);
        assert!(sql[1].starts_with(r#"UPDATE "records""#));
        assert!(sql[1].contains(r#"AND "records"."status" = "#));
    }

    #[test]
    fn test_stale_transition_is_refused() {
        let repo = mock::repository(&[0]);
        let record = stored(CaseStatus::Submitted);
        let update = workflow::apply(
            &record.snapshot(),
            CaseAction::Approve,
            &Actor::new(None, "Admin"),
            Utc::now(),
            7,
        )
        .unwrap();

        let err = tokio_test::block_on(repo.apply_case_update(record, update)).unwrap_err();
        assert_eq!(err.status_code(), axum::http::StatusCode::BAD_REQUEST);
        assert_eq!(
            err.to_string(),
            "Case was updated by another request. Please reload and try again"
        );
    }

    #[test]
    fn test_case_update_model_keeps_untouched_fields() {
        let mut record = stored(CaseStatus::Submitted);
        record.remarks = Some("original".into());
        let snapshot: CaseSnapshot = record.snapshot();
        let update = workflow::apply(&snapshot, CaseAction::Approve, &Actor::new(None, "Admin"), Utc::now(), 7).unwrap();

        let active = case_update_model(record, update).unwrap();
        assert!(!active.remarks.is_set());
        assert!(!active.assigned_vendor.is_set());
        assert!(active.completion_date.is_set());
    }

    #[test]
    fn test_case_edits_merge() {
        let record = stored(CaseStatus::Pending);
        let edits = CaseEdits {
            first_name: Some("Anita".into()),
            pincode: Some("560002".into()),
            ..Default::default()
        };
        let row = edits.merge(&record);
        assert_eq!(row.first_name.as_deref(), Some("Anita"));
        assert_eq!(row.last_name.as_deref(), Some("Verma"));
        assert_eq!(row.pincode.as_deref(), Some("560002"));
        assert_eq!(row.case_number.as_deref(), Some("C-1"));
    }

    #[test]
    fn test_case_edits_clear_optional_fields() {
        let mut record = stored(CaseStatus::Pending);
        record.email = Some("asha@example.com".into());
        record.remarks = Some("call after 6pm".into());
        record.document_type = Some("Aadhaar".into());

        let edits: CaseEdits = serde_json::from_value(serde_json::json!({
            "email": null,
            "remarks": "",
        }))
        .unwrap();
        let fields = crate::validation::normalize_row(&edits.merge(&record));
        assert_eq!(fields.email, None);
        assert_eq!(fields.remarks, None);
        assert_eq!(fields.document_type.as_deref(), Some("Aadhaar"));
    }

    #[test]
    fn test_record_filter_builds() {
        let filter = RecordFilter {
            status: Some(CaseStatus::Assigned),
            search: Some("  ".into()),
            ..Default::default()
        };
        assert!(!filter.condition().is_empty());
        assert!(RecordFilter::default().condition().is_empty());
    }
}
