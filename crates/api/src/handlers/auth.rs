//! Super admin registration and login

use axum::{extract::State, http::HeaderMap, http::StatusCode, Json};
use serde::{Deserialize, Serialize};
use validator::Validate;

use super::ApiResponse;
use crate::AppState;
use casedesk_common::{
    auth::{extract_bearer, hash_password, verify_password, Role},
    db::{models::User, Repository},
    errors::{AppError, Result},
    metrics,
    validation::{ensure_password_policy, normalize_email},
};

#[derive(Debug, Deserialize, Validate)]
pub struct RegisterRequest {
    #[validate(length(min = 1, message = "Name is required"))]
    pub name: String,

    #[validate(email(message = "Invalid email format"))]
    pub email: String,

    pub password: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(email(message = "Invalid email format"))]
    pub email: String,

    #[validate(length(min = 1, message = "Password is required"))]
    pub password: String,
}

#[derive(Serialize)]
pub struct AuthResponse<T: Serialize> {
    pub token: String,
    pub user: T,
}

/// Register a super admin
///
/// The first admin may register without a token while bootstrap
/// registration is enabled; later admins must be created by an admin.
pub async fn register(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<ApiResponse<User>>)> {
    request.validate()?;

    let repo = Repository::new(state.db.clone());

    let bootstrap = state.config.auth.allow_bootstrap_register && repo.count_users().await? == 0;
    if !bootstrap {
        let token = headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .and_then(extract_bearer)
            .ok_or_else(|| AppError::Unauthorized {
                message: "No authentication token, access denied".to_string(),
            })?;
        let claims = state.jwt.validate_token(token)?;
        if claims.role != Role::SuperAdmin {
            return Err(AppError::Forbidden {
                message: "Access denied. Admin only.".to_string(),
            });
        }
    }

    let email = normalize_email(&request.email);
    ensure_password_policy(&request.password, &email)?;

    if repo.find_user_by_email(&email).await?.is_some() {
        return Err(AppError::Duplicate {
            message: "User already exists".to_string(),
        });
    }

    let password_hash = hash_password(&request.password)?;
    let user = repo
        .create_user(request.name.trim(), &email, &password_hash)
        .await?;

    tracing::info!(user_id = %user.id, bootstrap = bootstrap, "Super admin registered");

    Ok((
        StatusCode::CREATED,
        ApiResponse::with_message("User registered successfully", user),
    ))
}

/// Admin login
pub async fn login(
    State(state): State<AppState>,
    Json(request): Json<LoginRequest>,
) -> Result<Json<ApiResponse<AuthResponse<User>>>> {
    request.validate()?;

    let repo = Repository::new(state.db.clone());
    let email = normalize_email(&request.email);

    let user = match repo.find_user_by_email(&email).await? {
        Some(user) if verify_password(&request.password, &user.password_hash) => user,
        _ => {
            metrics::record_login(Role::SuperAdmin.as_str(), false);
            return Err(AppError::InvalidCredentials);
        }
    };

    if !user.is_active {
        metrics::record_login(Role::SuperAdmin.as_str(), false);
        return Err(AppError::AccountInactive);
    }

    let token = state
        .jwt
        .generate_token(user.id, Role::SuperAdmin, &user.name, None)?;
    metrics::record_login(Role::SuperAdmin.as_str(), true);

    tracing::info!(user_id = %user.id, "Admin logged in");

    Ok(ApiResponse::with_message(
        "Login successful",
        AuthResponse { token, user },
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_login_request_validation() {
        let request = LoginRequest {
            email: "not-an-email".into(),
            password: "secret".into(),
        };
        let err: AppError = request.validate().unwrap_err().into();
        assert_eq!(err.to_string(), "Invalid email format");

        let request = LoginRequest {
            email: "admin@example.com".into(),
            password: String::new(),
        };
        let err: AppError = request.validate().unwrap_err().into();
        assert_eq!(err.to_string(), "Password is required");
    }

    #[test]
    fn test_register_request_validation() {
        let request = RegisterRequest {
            name: "Admin".into(),
            email: "admin@example.com".into(),
            password: "Str0ng!Pass".into(),
        };
        assert!(request.validate().is_ok());
    }
}
