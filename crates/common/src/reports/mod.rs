//! Case report generation
//!
//! Reports are CSV documents with one row per case. Dates are written
//! as `dd/mm/yyyy` and missing values as `N/A`.

use crate::db::models::Record;
use crate::errors::{AppError, Result};
use crate::workflow::CaseStatus;
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use sea_orm::prelude::DateTimeWithTimeZone;
use uuid::Uuid;

/// Column headers in output order
pub const REPORT_HEADERS: [&str; 10] = [
    "Case Number",
    "Reference",
    "Customer Name",
    "Vendor Name",
    "Field Officer",
    "Contact",
    "Location",
    "Status",
    "Case Created Date",
    "Case Completed Date",
];

const MISSING: &str = "N/A";

/// Report filters
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReportFilter {
    pub vendor_id: Option<Uuid>,
    pub status: Option<CaseStatus>,
    /// First creation day included
    pub from: Option<NaiveDate>,
    /// Last creation day included
    pub to: Option<NaiveDate>,
}

impl ReportFilter {
    /// Build a filter from raw query values; `all` or blank status means any
    pub fn parse(
        vendor_id: Option<Uuid>,
        status: Option<&str>,
        from: Option<&str>,
        to: Option<&str>,
    ) -> Result<Self> {
        let status = match status.map(str::trim) {
            None | Some("") | Some("all") => None,
            Some(value) => Some(value.parse::<CaseStatus>()?),
        };

        let to = parse_day(to)?;
        if to.is_some_and(|day| day.succ_opt().is_none()) {
            return Err(AppError::invalid("Date is out of range"));
        }

        Ok(Self {
            vendor_id,
            status,
            from: parse_day(from)?,
            to,
        })
    }

    /// Creation time bounds as `[from, until)`; a last day with no successor leaves the end open
    pub fn created_range(&self) -> (Option<DateTime<Utc>>, Option<DateTime<Utc>>) {
        let start = |day: NaiveDate| day.and_time(NaiveTime::MIN).and_utc();
        (
            self.from.map(start),
            self.to.and_then(|day| day.succ_opt()).map(start),
        )
    }
}

fn parse_day(value: Option<&str>) -> Result<Option<NaiveDate>> {
    match value.map(str::trim).filter(|v| !v.is_empty()) {
        None => Ok(None),
        Some(value) => NaiveDate::parse_from_str(value, "%Y-%m-%d")
            .map(Some)
            .map_err(|_| AppError::invalid("Invalid date format. Use YYYY-MM-DD")),
    }
}

/// `dd/mm/yyyy` or `N/A`
pub fn format_day(value: Option<DateTimeWithTimeZone>) -> String {
    value
        .map(|v| v.with_timezone(&Utc).format("%d/%m/%Y").to_string())
        .unwrap_or_else(|| MISSING.to_string())
}

fn or_missing(value: Option<&str>) -> String {
    match value.map(str::trim) {
        Some(v) if !v.is_empty() => v.to_string(),
        _ => MISSING.to_string(),
    }
}

fn location(record: &Record) -> String {
    let parts: Vec<&str> = [record.district.trim(), record.state.trim()]
        .into_iter()
        .filter(|p| !p.is_empty())
        .collect();
    if parts.is_empty() {
        MISSING.to_string()
    } else {
        parts.join(", ")
    }
}

fn report_row(record: &Record) -> [String; 10] {
    [
        or_missing(Some(&record.case_number)),
        or_missing(Some(&record.reference_number)),
        or_missing(Some(&record.full_name)),
        or_missing(record.assigned_vendor_name.as_deref()),
        or_missing(record.assigned_field_officer_name.as_deref()),
        or_missing(Some(&record.contact_number)),
        location(record),
        record.status.clone(),
        format_day(Some(record.created_at)),
        format_day(record.completion_date),
    ]
}

/// Render records as a CSV document
pub fn write_cases_csv(records: &[Record]) -> Result<Vec<u8>> {
    if records.is_empty() {
        return Err(AppError::not_found("No cases found for the selected filters"));
    }

    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(REPORT_HEADERS)?;
    for record in records {
        writer.write_record(report_row(record))?;
    }

    writer.into_inner().map_err(|e| AppError::Internal {
        message: format!("Failed to finish report: {}", e),
    })
}

/// Attachment name for a report generated at `now`
pub fn report_filename(prefix: &str, now: DateTime<Utc>) -> String {
    format!("{}_{}.csv", prefix, now.format("%Y%m%d_%H%M%S"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn record() -> Record {
        let created = Utc.with_ymd_and_hms(2024, 3, 9, 8, 30, 0).unwrap();
        Record {
            id: Uuid::new_v4(),
            case_number: "C-100".into(),
            reference_number: "REC-2024-00100".into(),
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
            source: "excel".into(),
            status: "approved".into(),
            assigned_vendor: None,
            assigned_vendor_name: Some("Acme Verifications".into()),
            assigned_field_officer: None,
            assigned_field_officer_name: None,
            candidate_name: None,
            candidate_email: None,
            candidate_mobile: None,
            assigned_date: None,
            tat_due_date: None,
            completion_date: Some(Utc.with_ymd_and_hms(2024, 3, 15, 18, 0, 0).unwrap().into()),
            submitted_at: None,
            is_late_submission: false,
            uploaded_date: created.into(),
            history: serde_json::json!([]),
            created_at: created.into(),
            updated_at: created.into(),
        }
    }

    #[test]
    fn test_csv_layout() {
        let bytes = write_cases_csv(&[record()]).unwrap();
        let text = String::from_utf8(bytes).unwrap();
        let mut lines = text.lines();
        assert_eq!(
            lines.next().unwrap(),
            "Case Number,Reference,Customer Name,Vendor Name,Field Officer,Contact,Location,Status,Case Created Date,Case Completed Date"
        );
        assert_eq!(
            lines.next().unwrap(),
            "C-100,REC-2024-00100,Asha Verma,Acme Verifications,N/A,9876543210,\"Bengaluru, Karnataka\",approved,09/03/2024,15/03/2024"
        );
    }

    #[test]
    fn test_empty_report_is_not_found() {
        let err = write_cases_csv(&[]).unwrap_err();
        assert_eq!(err.status_code(), axum::http::StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_parse_filter() {
        let filter = ReportFilter::parse(None, Some("all"), Some("2024-03-01"), Some("2024-03-31")).unwrap();
        assert!(filter.status.is_none());

        let (from, until) = filter.created_range();
        assert_eq!(from.unwrap(), Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap());
        assert_eq!(until.unwrap(), Utc.with_ymd_and_hms(2024, 4, 1, 0, 0, 0).unwrap());

        let filter = ReportFilter::parse(None, Some("submitted"), None, None).unwrap();
        assert_eq!(filter.status, Some(CaseStatus::Submitted));
        assert_eq!(filter.created_range(), (None, None));
    }

    #[test]
    fn test_parse_filter_rejects_bad_input() {
        assert!(ReportFilter::parse(None, Some("bogus"), None, None).is_err());
        assert!(ReportFilter::parse(None, None, Some("01/03/2024"), None).is_err());
    }

    #[test]
    fn test_far_future_dates() {
        let err = ReportFilter::parse(None, None, None, Some("+262142-12-31")).unwrap_err();
        assert_eq!(err.status_code(), axum::http::StatusCode::BAD_REQUEST);

        let filter = ReportFilter {
            to: Some(NaiveDate::MAX),
            ..Default::default()
        };
        assert_eq!(filter.created_range(), (None, None));

        let filter = ReportFilter::parse(None, None, Some("+262142-12-31"), None).unwrap();
        assert!(filter.created_range().0.is_some());
    }

    #[test]
    fn test_report_filename() {
        let now = Utc.with_ymd_and_hms(2024, 3, 9, 8, 30, 5).unwrap();
        assert_eq!(report_filename("cases", now), "cases_20240309_083005.csv");
    }
}
