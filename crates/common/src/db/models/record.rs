//! Case record entity

use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use crate::workflow::{CandidateContact, CaseSnapshot, CaseStatus, HistoryEntry, Party};

/// How a case entered the system
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordSource {
    Excel,
    Manual,
}

impl From<RecordSource> for String {
    fn from(source: RecordSource) -> Self {
        match source {
            RecordSource::Excel => "excel".to_string(),
            RecordSource::Manual => "manual".to_string(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "records")]
#[serde(rename_all = "camelCase")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    #[sea_orm(column_type = "Text", unique)]
    pub case_number: String,

    /// REC-<year>-<5 digit counter>
    #[sea_orm(column_type = "Text", unique)]
    pub reference_number: String,

    #[sea_orm(column_type = "Text", nullable)]
    pub document_type: Option<String>,

    #[sea_orm(column_type = "Text")]
    pub first_name: String,

    #[sea_orm(column_type = "Text")]
    pub last_name: String,

    #[sea_orm(column_type = "Text")]
    pub full_name: String,

    #[sea_orm(column_type = "Text")]
    pub contact_number: String,

    #[sea_orm(column_type = "Text", nullable)]
    pub email: Option<String>,

    #[sea_orm(column_type = "Text")]
    pub address: String,

    #[sea_orm(column_type = "Text")]
    pub state: String,

    #[sea_orm(column_type = "Text")]
    pub district: String,

    #[sea_orm(column_type = "Text")]
    pub pincode: String,

    #[sea_orm(column_type = "Text", nullable)]
    pub remarks: Option<String>,

    #[sea_orm(column_type = "Text")]
    pub source: String,

    #[sea_orm(column_type = "Text")]
    pub status: String,

    pub assigned_vendor: Option<Uuid>,

    #[sea_orm(column_type = "Text", nullable)]
    pub assigned_vendor_name: Option<String>,

    pub assigned_field_officer: Option<Uuid>,

    #[sea_orm(column_type = "Text", nullable)]
    pub assigned_field_officer_name: Option<String>,

    #[sea_orm(column_type = "Text", nullable)]
    pub candidate_name: Option<String>,

    #[sea_orm(column_type = "Text", nullable)]
    pub candidate_email: Option<String>,

    #[sea_orm(column_type = "Text", nullable)]
    pub candidate_mobile: Option<String>,

    pub assigned_date: Option<DateTimeWithTimeZone>,

    pub tat_due_date: Option<DateTimeWithTimeZone>,

    pub completion_date: Option<DateTimeWithTimeZone>,

    pub submitted_at: Option<DateTimeWithTimeZone>,

    pub is_late_submission: bool,

    pub uploaded_date: DateTimeWithTimeZone,

    /// Append-only audit log as JSONB array
    #[sea_orm(column_type = "JsonBinary")]
    pub history: serde_json::Value,

    pub created_at: DateTimeWithTimeZone,

    pub updated_at: DateTimeWithTimeZone,
}

fn utc(value: Option<DateTimeWithTimeZone>) -> Option<DateTime<Utc>> {
    value.map(|v| v.with_timezone(&Utc))
}

impl Model {
    /// Get the case status as an enum
    pub fn case_status(&self) -> CaseStatus {
        self.status.parse().unwrap_or(CaseStatus::Pending)
    }

    /// Assignment-relevant view for the state machine
    pub fn snapshot(&self) -> CaseSnapshot {
        let vendor = self
            .assigned_vendor
            .map(|id| Party::new(id, self.assigned_vendor_name.clone().unwrap_or_default()));
        let field_officer = self
            .assigned_field_officer
            .map(|id| Party::new(id, self.assigned_field_officer_name.clone().unwrap_or_default()));
        let candidate = match (&self.candidate_name, &self.candidate_email, &self.candidate_mobile) {
            (Some(name), Some(email), Some(mobile)) => Some(CandidateContact {
                name: name.clone(),
                email: email.clone(),
                mobile: mobile.clone(),
            }),
            _ => None,
        };

        CaseSnapshot {
            status: self.case_status(),
            vendor,
            field_officer,
            candidate,
            assigned_date: utc(self.assigned_date),
            tat_due_date: utc(self.tat_due_date),
        }
    }

    /// Decoded audit log; malformed entries are skipped
    pub fn history_entries(&self) -> Vec<HistoryEntry> {
        match &self.history {
            serde_json::Value::Array(items) => items
                .iter()
                .filter_map(|item| serde_json::from_value(item.clone()).ok())
                .collect(),
            _ => Vec::new(),
        }
    }

    /// Past due and still waiting on a submission
    pub fn is_overdue(&self, now: DateTime<Utc>) -> bool {
        self.case_status().is_open_assignment()
            && utc(self.tat_due_date).is_some_and(|due| now > due)
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::vendor::Entity",
        from = "Column::AssignedVendor",
        to = "super::vendor::Column::Id"
    )]
    Vendor,

    #[sea_orm(
        belongs_to = "super::field_officer::Entity",
        from = "Column::AssignedFieldOfficer",
        to = "super::field_officer::Column::Id"
    )]
    FieldOfficer,

    #[sea_orm(has_one = "super::verification::Entity")]
    Verification,
}

impl Related<super::vendor::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Vendor.def()
    }
}

impl Related<super::field_officer::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::FieldOfficer.def()
    }
}

impl Related<super::verification::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Verification.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn model(status: CaseStatus) -> Model {
        let now = Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap();
        Model {
            id: Uuid::new_v4(),
            case_number: "C-1".into(),
            reference_number: "REC-2024-00001".into(),
            document_type: None,
            first_name: "Asha".into(),
            last_name: "Verma".into(),
            full_name: "Asha Verma".into(),
            contact_number: "9876543210".into(),
            email: None,
            address: "12 MG Road".into(),
            state: "Karnataka".into(),
            district: "Bengaluru".into(),
            pincode: "560001".into(),
            remarks: None,
            source: RecordSource::Manual.into(),
            status: status.as_str().into(),
            assigned_vendor: Some(Uuid::new_v4()),
            assigned_vendor_name: Some("Acme".into()),
            assigned_field_officer: None,
            assigned_field_officer_name: None,
            candidate_name: Some("Asha".into()),
            candidate_email: Some("asha@example.com".into()),
            candidate_mobile: Some("9876543210".into()),
            assigned_date: Some(now.into()),
            tat_due_date: Some((now + Duration::days(7)).into()),
            completion_date: None,
            submitted_at: None,
            is_late_submission: false,
            uploaded_date: now.into(),
            history: serde_json::json!([]),
            created_at: now.into(),
            updated_at: now.into(),
        }
    }

    #[test]
    fn test_snapshot() {
        let record = model(CaseStatus::CandidateAssigned);
        let snapshot = record.snapshot();
        assert_eq!(snapshot.status, CaseStatus::CandidateAssigned);
        assert_eq!(snapshot.vendor.unwrap().name, "Acme");
        assert!(snapshot.field_officer.is_none());
        assert_eq!(snapshot.candidate.unwrap().mobile, "9876543210");
    }

    #[test]
    fn test_overdue() {
        let record = model(CaseStatus::CandidateAssigned);
        let due = utc(record.tat_due_date).unwrap();
        assert!(!record.is_overdue(due));
        assert!(record.is_overdue(due + Duration::minutes(1)));
        assert!(!model(CaseStatus::Submitted).is_overdue(due + Duration::days(1)));
    }

    #[test]
    fn test_history_entries_skip_malformed() {
        let mut record = model(CaseStatus::Pending);
        record.history = serde_json::json!([
            {
                "action": "stop",
                "performed_by": "Admin",
                "performed_by_id": null,
                "performed_at": "2024-05-01T10:00:00Z",
                "from_status": "pending",
                "to_status": "stopped"
            },
            {"unexpected": true}
        ]);
        let entries = record.history_entries();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].to_status, CaseStatus::Stopped);
    }
}
