//! API handlers module

pub mod auth;
pub mod candidate;
pub mod field_officers;
pub mod health;
pub mod links;
pub mod officer_portal;
pub mod records;
pub mod reports;
pub mod vendor_portal;
pub mod vendors;

use axum::{http::HeaderMap, Json};
use casedesk_common::{
    auth::AuthContext,
    db::{models::Record, Repository},
    errors::Result,
    metrics,
    workflow::{self, Actor, CaseAction},
};
use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::AppState;

/// Success envelope `{ success, message, data }`
#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn ok(data: T) -> Json<Self> {
        Json(Self {
            success: true,
            message: None,
            data: Some(data),
        })
    }

    pub fn with_message(message: impl Into<String>, data: T) -> Json<Self> {
        Json(Self {
            success: true,
            message: Some(message.into()),
            data: Some(data),
        })
    }
}

/// Envelope carrying only a message
pub fn message(message: impl Into<String>) -> Json<ApiResponse<()>> {
    Json(ApiResponse {
        success: true,
        message: Some(message.into()),
        data: None,
    })
}

/// Pagination block for list responses
#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct Pagination {
    pub total: u64,
    pub page: u64,
    pub limit: u64,
    pub pages: u64,
}

impl Pagination {
    pub fn new(total: u64, page: u64, limit: u64) -> Self {
        Self {
            total,
            page,
            limit,
            pages: total.div_ceil(limit.max(1)),
        }
    }
}

/// A page of items
#[derive(Debug, Serialize)]
pub struct Paged<T: Serialize> {
    pub items: Vec<T>,
    pub pagination: Pagination,
}

/// Query parameters shared by case listings
#[derive(Debug, Default, Deserialize)]
pub struct CaseListQuery {
    pub status: Option<String>,
    pub search: Option<String>,
    pub page: Option<u64>,
    pub limit: Option<u64>,
}

impl CaseListQuery {
    pub const DEFAULT_LIMIT: u64 = 10;
    pub const MAX_LIMIT: u64 = 100;

    pub fn page(&self) -> u64 {
        self.page.unwrap_or(1).max(1)
    }

    pub fn limit(&self) -> u64 {
        self.limit
            .unwrap_or(Self::DEFAULT_LIMIT)
            .clamp(1, Self::MAX_LIMIT)
    }

    /// Status filter; blank and `all` mean no filter
    pub fn status_filter(&self) -> Option<&str> {
        self.status
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty() && *s != "all")
    }
}

/// Audit actor for the caller
pub fn actor(auth: &AuthContext) -> Actor {
    Actor::new(Some(auth.user_id), auth.name.clone())
}

/// Run a state machine action against a stored case and persist the result
pub async fn transition(
    state: &AppState,
    repo: &Repository,
    record: Record,
    action: CaseAction,
    auth: &AuthContext,
) -> Result<Record> {
    let update = workflow::apply(
        &record.snapshot(),
        action,
        &actor(auth),
        Utc::now(),
        state.config.workflow.tat_days,
    )?;
    let action_name = update.history.action.clone();
    let to_status = update.status;

    let record = repo.apply_case_update(record, update).await?;
    metrics::record_transition(&action_name, to_status.as_str());

    Ok(record)
}

/// Client address from proxy headers
pub fn client_ip(headers: &HeaderMap) -> Option<String> {
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .or_else(|| {
            headers
                .get("x-real-ip")
                .and_then(|v| v.to_str().ok())
                .map(str::trim)
        })
        .map(String::from)
}

/// Trimmed value or `None` when blank
pub fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_pagination_pages() {
        assert_eq!(Pagination::new(0, 1, 10).pages, 0);
        assert_eq!(Pagination::new(10, 1, 10).pages, 1);
        assert_eq!(Pagination::new(11, 2, 10).pages, 2);
    }

    #[test]
    fn test_case_list_query_defaults() {
        let query = CaseListQuery::default();
        assert_eq!(query.page(), 1);
        assert_eq!(query.limit(), 10);
        assert!(query.status_filter().is_none());

        let query = CaseListQuery {
            status: Some("all".into()),
            page: Some(0),
            limit: Some(1000),
            ..Default::default()
        };
        assert_eq!(query.page(), 1);
        assert_eq!(query.limit(), 100);
        assert!(query.status_filter().is_none());
    }

    #[test]
    fn test_client_ip() {
        let mut headers = HeaderMap::new();
        assert!(client_ip(&headers).is_none());

        headers.insert("x-real-ip", HeaderValue::from_static("10.0.0.2"));
        assert_eq!(client_ip(&headers).as_deref(), Some("10.0.0.2"));

        headers.insert("x-forwarded-for", HeaderValue::from_static("203.0.113.7, 10.0.0.1"));
        assert_eq!(client_ip(&headers).as_deref(), Some("203.0.113.7"));
    }

    #[test]
    fn test_non_blank() {
        assert_eq!(non_blank(Some("  x ".into())).as_deref(), Some("x"));
        assert!(non_blank(Some("   ".into())).is_none());
        assert!(non_blank(None).is_none());
    }
}
