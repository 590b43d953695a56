//! Short link redirects

use axum::{
    extract::{Path, State},
    http::{header, HeaderMap},
    response::Redirect,
};

use super::client_ip;
use crate::AppState;
use casedesk_common::{
    db::Repository,
    errors::{AppError, Result},
    links::is_short_code,
};

/// Follow a short link to its submission URL
pub async fn redirect(
    State(state): State<AppState>,
    Path(code): Path<String>,
    headers: HeaderMap,
) -> Result<Redirect> {
    if !is_short_code(&code) {
        return Err(AppError::not_found("Link not found"));
    }

    let repo = Repository::new(state.db.clone());
    let link = repo
        .find_short_link(&code)
        .await?
        .ok_or_else(|| AppError::not_found("Link not found"))?;

    if link.is_expired() {
        return Err(AppError::Gone {
            message: "This link has expired".to_string(),
        });
    }

    let user_agent = headers
        .get(header::USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .map(String::from);
    let link = repo
        .mark_short_link_used(link, client_ip(&headers), user_agent)
        .await?;

    tracing::debug!(code = %code, "Short link followed");
    Ok(Redirect::temporary(&link.full_url))
}
