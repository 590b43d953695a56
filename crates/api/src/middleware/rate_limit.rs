//! Rate limiting middleware using token bucket algorithm

use axum::{extract::Request, middleware::Next, response::Response};
use casedesk_common::errors::AppError;
use governor::{
    clock::QuantaClock,
    state::{InMemoryState, NotKeyed},
    Quota, RateLimiter,
};
use std::num::NonZeroU32;
use std::sync::Arc;

/// Token bucket shared by the login routes
pub struct LoginRateLimiter {
    limiter: RateLimiter<NotKeyed, InMemoryState, QuantaClock>,
    per_second: u32,
}

impl LoginRateLimiter {
    /// Take one token, failing when the bucket is empty
    pub fn check(&self) -> Result<(), AppError> {
        self.limiter.check().map_err(|_| AppError::RateLimited {
            limit: self.per_second,
        })
    }
}

/// Create a new rate limiter; zero values fall back to one request
pub fn create_rate_limiter(requests_per_second: u32, burst: u32) -> Arc<LoginRateLimiter> {
    let rate = NonZeroU32::new(requests_per_second).unwrap_or(NonZeroU32::MIN);
    let burst = NonZeroU32::new(burst).unwrap_or(rate);
    let quota = Quota::per_second(rate).allow_burst(burst);

    Arc::new(LoginRateLimiter {
        limiter: RateLimiter::direct(quota),
        per_second: rate.get(),
    })
}

/// Rate limiting middleware
pub async fn rate_limit_middleware(
    request: Request,
    next: Next,
    limiter: Arc<LoginRateLimiter>,
) -> Result<Response, AppError> {
    if let Err(e) = limiter.check() {
        tracing::warn!(path = %request.uri().path(), "Login rate limit exceeded");
        return Err(e);
    }

    Ok(next.run(request).await)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rate_limiter_creation() {
        let limiter = create_rate_limiter(5, 10);
        assert!(limiter.check().is_ok());
    }

    #[test]
    fn test_burst_is_enforced() {
        let limiter = create_rate_limiter(1, 2);
        assert!(limiter.check().is_ok());
        assert!(limiter.check().is_ok());
        assert!(matches!(
            limiter.check(),
            Err(AppError::RateLimited { limit: 1 })
        ));
    }

    #[test]
    fn test_zero_config_still_builds() {
        let limiter = create_rate_limiter(0, 0);
        assert!(limiter.check().is_ok());
    }
}
