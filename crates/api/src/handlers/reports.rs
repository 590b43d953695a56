//! CSV case report downloads

use axum::{
    extract::{Query, State},
    http::header,
    response::{IntoResponse, Response},
};
use chrono::Utc;
use serde::Deserialize;
use uuid::Uuid;

use crate::AppState;
use casedesk_common::{
    auth::{AuthContext, Role},
    db::Repository,
    errors::Result,
    metrics,
    reports::{report_filename, write_cases_csv, ReportFilter},
};

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportQuery {
    pub vendor_id: Option<Uuid>,
    pub status: Option<String>,
    pub from_date: Option<String>,
    pub to_date: Option<String>,
}

impl ReportQuery {
    fn filter(&self, vendor_id: Option<Uuid>) -> Result<ReportFilter> {
        ReportFilter::parse(
            vendor_id,
            self.status.as_deref(),
            self.from_date.as_deref(),
            self.to_date.as_deref(),
        )
    }
}

/// CSV attachment response
fn attachment(filename: String, body: Vec<u8>) -> Response {
    (
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", filename),
            ),
        ],
        body,
    )
        .into_response()
}

async fn download(state: &AppState, filter: ReportFilter, scope: &str, prefix: &str) -> Result<Response> {
    let repo = Repository::new(state.db.clone());
    let records = repo.records_for_report(&filter).await?;
    let body = write_cases_csv(&records)?;

    metrics::record_report(scope, records.len());
    tracing::info!(scope = scope, rows = records.len(), "Cases report generated");

    Ok(attachment(report_filename(prefix, Utc::now()), body))
}

/// Admin report across all vendors
pub async fn download_cases(
    State(state): State<AppState>,
    auth: AuthContext,
    Query(query): Query<ReportQuery>,
) -> Result<Response> {
    auth.require_admin()?;

    let filter = query.filter(query.vendor_id)?;
    download(&state, filter, "admin", "Cases_Report").await
}

/// Report limited to the calling vendor's cases
pub async fn download_vendor_cases(
    State(state): State<AppState>,
    auth: AuthContext,
    Query(query): Query<ReportQuery>,
) -> Result<Response> {
    auth.require_role(Role::Vendor)?;

    let filter = query.filter(Some(auth.user_id))?;
    download(&state, filter, "vendor", "Vendor_Cases_Report").await
}

#[cfg(test)]
mod tests {
    use super::*;
    use casedesk_common::workflow::CaseStatus;

    #[test]
    fn test_vendor_scope_overrides_query() {
        let own = Uuid::new_v4();
        let query = ReportQuery {
            vendor_id: Some(Uuid::new_v4()),
            status: Some("approved".into()),
            ..Default::default()
        };
        let filter = query.filter(Some(own)).unwrap();
        assert_eq!(filter.vendor_id, Some(own));
        assert_eq!(filter.status, Some(CaseStatus::Approved));
    }

    #[test]
    fn test_bad_date_rejected() {
        let query = ReportQuery {
            from_date: Some("17/10/2026".into()),
            ..Default::default()
        };
        let err = query.filter(None).unwrap_err();
        assert_eq!(err.to_string(), "Invalid date format. Use YYYY-MM-DD");
    }

    #[test]
    fn test_attachment_headers() {
        let response = attachment("Cases_Report_20261017_101500.csv".into(), b"a,b\n".to_vec());
        let headers = response.headers();
        assert_eq!(headers[header::CONTENT_TYPE], "text/csv; charset=utf-8");
        assert_eq!(
            headers[header::CONTENT_DISPOSITION],
            "attachment; filename=\"Cases_Report_20261017_101500.csv\""
        );
    }
}
