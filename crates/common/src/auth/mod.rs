//! Authentication and authorization utilities
//!
//! Provides:
//! - Password hashing (argon2)
//! - JWT token generation and validation
//! - Role-scoped caller context extraction
//! - Opaque token generation for candidate links

use crate::errors::{AppError, Result};
use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use axum::{
    extract::{FromRef, FromRequestParts},
    http::request::Parts,
};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::sync::Arc;
use uuid::Uuid;

/// Caller role carried in every token
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    SuperAdmin,
    Vendor,
    FieldOfficer,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::SuperAdmin => "super_admin",
            Role::Vendor => "vendor",
            Role::FieldOfficer => "field_officer",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Extracted authentication context available to handlers
#[derive(Debug, Clone)]
pub struct AuthContext {
    /// Caller ID (user, vendor or field officer)
    pub user_id: Uuid,

    /// Caller role
    pub role: Role,

    /// Display name used in audit history
    pub name: String,

    /// Owning vendor (field officers only)
    pub vendor_id: Option<Uuid>,

    /// Request ID for tracing
    pub request_id: String,
}

impl AuthContext {
    /// Require a specific role, returning error if not present
    pub fn require_role(&self, role: Role) -> Result<()> {
        if self.role == role {
            Ok(())
        } else {
            Err(AppError::Forbidden {
                message: format!("Access denied. {} only.", role_label(role)),
            })
        }
    }

    pub fn require_admin(&self) -> Result<()> {
        self.require_role(Role::SuperAdmin)
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::SuperAdmin
    }
}

fn role_label(role: Role) -> &'static str {
    match role {
        Role::SuperAdmin => "Admin",
        Role::Vendor => "Vendor",
        Role::FieldOfficer => "Field officer",
    }
}

/// JWT claims structure
#[derive(Debug, Serialize, Deserialize)]
pub struct JwtClaims {
    /// Subject (caller ID)
    pub sub: String,

    /// Caller role
    pub role: Role,

    /// Caller display name
    #[serde(default)]
    pub name: String,

    /// Owning vendor for field officers
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vendor_id: Option<String>,

    /// Expiration time (Unix timestamp)
    pub exp: i64,

    /// Issued at (Unix timestamp)
    pub iat: i64,
}

/// JWT token manager
pub struct JwtManager {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    expiration_secs: i64,
}

impl JwtManager {
    /// Create a new JWT manager with the given secret
    pub fn new(secret: &str, expiration_secs: u64) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            expiration_secs: expiration_secs as i64,
        }
    }

    /// Generate a new JWT token
    pub fn generate_token(
        &self,
        user_id: Uuid,
        role: Role,
        name: &str,
        vendor_id: Option<Uuid>,
    ) -> Result<String> {
        let now = Utc::now();
        let exp = now + Duration::seconds(self.expiration_secs);

        let claims = JwtClaims {
            sub: user_id.to_string(),
            role,
            name: name.to_string(),
            vendor_id: vendor_id.map(|id| id.to_string()),
            exp: exp.timestamp(),
            iat: now.timestamp(),
        };

        encode(&Header::default(), &claims, &self.encoding_key)
            .map_err(|e| AppError::Internal {
                message: format!("Failed to generate token: {}", e)
            })
    }

    /// Validate and decode a JWT token
    pub fn validate_token(&self, token: &str) -> Result<JwtClaims> {
        decode::<JwtClaims>(token, &self.decoding_key, &Validation::default())
            .map(|data| data.claims)
            .map_err(|e| {
                match e.kind() {
                    jsonwebtoken::errors::ErrorKind::ExpiredSignature => {
                        AppError::ExpiredToken
                    }
                    _ => AppError::Unauthorized {
                        message: "Token verification failed".to_string(),
                    },
                }
            })
    }
}

/// Hash a password for storage
pub fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AppError::Internal {
            message: format!("Failed to hash password: {}", e),
        })
}

/// Verify a password against a stored hash
pub fn verify_password(password: &str, stored_hash: &str) -> bool {
    match PasswordHash::new(stored_hash) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(_) => false,
    }
}

/// Generate a single-use candidate token (64 hex chars)
pub fn generate_candidate_token() -> String {
    let random_bytes: [u8; 32] = rand::random();
    hex::encode(random_bytes)
}

/// Short digest of a secret for log lines
pub fn token_fingerprint(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hex::encode(&hasher.finalize()[..6])
}

/// Extract bearer token from Authorization header
pub fn extract_bearer(auth_header: &str) -> Option<&str> {
    auth_header
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

/// Axum extractor for AuthContext
impl<S> FromRequestParts<S> for AuthContext
where
    Arc<JwtManager>: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self> {
        let request_id = parts
            .headers
            .get("x-request-id")
            .and_then(|v| v.to_str().ok())
            .map(String::from)
            .unwrap_or_else(|| Uuid::new_v4().to_string());

        let auth_header = parts
            .headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| AppError::Unauthorized {
                message: "No authentication token, access denied".to_string(),
            })?;

        let token = extract_bearer(auth_header).ok_or_else(|| AppError::Unauthorized {
            message: "No authentication token, access denied".to_string(),
        })?;

        let jwt = Arc::<JwtManager>::from_ref(state);
        let claims = jwt.validate_token(token)?;

        let user_id = Uuid::parse_str(&claims.sub).map_err(|_| AppError::Unauthorized {
            message: "Token verification failed".to_string(),
        })?;
        let vendor_id = claims
            .vendor_id
            .as_deref()
            .and_then(|id| Uuid::parse_str(id).ok());

        Ok(AuthContext {
            user_id,
            role: claims.role,
            name: claims.name,
            vendor_id,
            request_id,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_password_roundtrip() {
        let hash = hash_password("Secret@123").unwrap();
        assert!(hash.starts_with("$argon2"));
        assert!(verify_password("Secret@123", &hash));
        assert!(!verify_password("Secret@124", &hash));
        assert!(!verify_password("Secret@123", "not-a-hash"));
    }

    #[test]
    fn test_candidate_token_shape() {
        let token = generate_candidate_token();
        assert_eq!(token.len(), 64);
        assert!(token.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(token, generate_candidate_token());
        assert_eq!(token_fingerprint(&token).len(), 12);
    }

    #[test]
    fn test_extract_bearer() {
        assert_eq!(extract_bearer("Bearer abc.def"), Some("abc.def"));
        assert_eq!(extract_bearer("Bearer "), None);
        assert_eq!(extract_bearer("abc.def"), None);
        assert_eq!(extract_bearer("Basic abc"), None);
    }

    #[test]
    fn test_jwt_roundtrip() {
        let manager = JwtManager::new("test_secret", 3600);

        let user_id = Uuid::new_v4();
        let vendor_id = Uuid::new_v4();

        let token = manager
            .generate_token(user_id, Role::FieldOfficer, "Ravi", Some(vendor_id))
            .unwrap();
        let claims = manager.validate_token(&token).unwrap();

        assert_eq!(claims.sub, user_id.to_string());
        assert_eq!(claims.role, Role::FieldOfficer);
        assert_eq!(claims.name, "Ravi");
        assert_eq!(claims.vendor_id, Some(vendor_id.to_string()));
    }

    #[test]
    fn test_jwt_wrong_secret_rejected() {
        let issuer = JwtManager::new("secret_a", 3600);
        let verifier = JwtManager::new("secret_b", 3600);
        let token = issuer
            .generate_token(Uuid::new_v4(), Role::Vendor, "Acme", None)
            .unwrap();
        let err = verifier.validate_token(&token).unwrap_err();
        assert_eq!(err.status_code(), axum::http::StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn test_jwt_expired_token() {
        let manager = JwtManager::new("test_secret", 3600);
        let now = Utc::now();
        let claims = JwtClaims {
            sub: Uuid::new_v4().to_string(),
            role: Role::SuperAdmin,
            name: "Admin".into(),
            vendor_id: None,
            exp: (now - Duration::hours(2)).timestamp(),
            iat: (now - Duration::hours(3)).timestamp(),
        };
        let token = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(b"test_secret"),
        )
        .unwrap();
        assert!(matches!(manager.validate_token(&token), Err(AppError::ExpiredToken)));
    }

    #[test]
    fn test_role_enforcement() {
        let ctx = AuthContext {
            user_id: Uuid::new_v4(),
            role: Role::Vendor,
            name: "Acme".into(),
            vendor_id: None,
            request_id: "req".into(),
        };
        assert!(ctx.require_role(Role::Vendor).is_ok());
        let err = ctx.require_admin().unwrap_err();
        assert_eq!(err.status_code(), axum::http::StatusCode::FORBIDDEN);
        assert_eq!(err.to_string(), "Access denied. Admin only.");
    }
}
